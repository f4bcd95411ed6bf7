// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server configuration loaded from environment variables.

use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Directory holding the OBJ fragments.
    pub assets_dir: PathBuf,
    /// Manifest file; synthesized from `assets_dir` when missing.
    pub manifest_path: PathBuf,
    /// Optional explicit layout or snapshot document.
    pub layout_path: Option<PathBuf>,
    /// Optional chart configuration JSON.
    pub chart_config_path: Option<PathBuf>,
    /// Maximum size of a served or loaded mesh file in MB.
    pub max_file_size_mb: u64,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Emit JSON log lines instead of the pretty format.
    pub json_logs: bool,
}

fn optional_path(var: &str) -> Option<PathBuf> {
    std::env::var(var)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let assets_dir: PathBuf = std::env::var("ASSETS_DIR")
            .unwrap_or_else(|_| "./models".into())
            .into();
        Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .unwrap_or(8080),
            manifest_path: optional_path("MANIFEST_PATH").unwrap_or_else(|| assets_dir.join("manifest.json")),
            assets_dir,
            layout_path: optional_path("LAYOUT_PATH"),
            chart_config_path: optional_path("CHART_CONFIG_PATH"),
            max_file_size_mb: std::env::var("MAX_FILE_SIZE_MB")
                .unwrap_or_else(|_| "64".into())
                .parse()
                .unwrap_or(64),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .unwrap_or(60),
            json_logs: std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")),
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
