// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Asset directory access: manifest, layout document, mesh files.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use dentchart_chart::{ChartConfig, Error as ChartError, LayoutMode, Manifest, ObjLoader, PrototypeStore, Viewer};

use crate::config::Config;
use crate::error::ApiError;

fn unavailable(path: &Path, e: std::io::Error) -> ChartError {
    ChartError::ManifestUnavailable(format!("{}: {}", path.display(), e))
}

/// Reads the manifest file, or synthesizes one from the OBJ files of the
/// assets directory when there is no manifest file.
pub async fn load_manifest(config: &Config) -> Result<Manifest, ChartError> {
    if tokio::fs::try_exists(&config.manifest_path).await.unwrap_or(false) {
        return Manifest::load(&config.manifest_path).await;
    }

    let dir = &config.assets_dir;
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| unavailable(dir, e))?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| unavailable(dir, e))? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    let manifest = Manifest::from_file_names(names);
    tracing::info!(
        teeth = manifest.teeth.len(),
        dir = %dir.display(),
        "manifest synthesized from asset directory"
    );
    Ok(manifest)
}

/// Layout document named by `LAYOUT_PATH`, derived layout otherwise.
pub async fn load_layout(config: &Config) -> Result<LayoutMode, ChartError> {
    let Some(path) = &config.layout_path else {
        return Ok(LayoutMode::Derived);
    };
    let text = tokio::fs::read_to_string(path).await?;
    LayoutMode::from_json_str(&text)
}

pub async fn load_inputs(config: &Config) -> Result<(Manifest, LayoutMode), ChartError> {
    Ok((load_manifest(config).await?, load_layout(config).await?))
}

/// A viewer over the assets directory, not yet built.
pub fn build_viewer(config: &Config) -> Result<Viewer, ChartError> {
    let chart_config = match &config.chart_config_path {
        Some(path) => ChartConfig::load(path)?,
        None => ChartConfig::default(),
    };
    let loader = ObjLoader::new(config.assets_dir.clone()).with_max_file_size(config.max_file_size_bytes());
    let store = Arc::new(PrototypeStore::new(Arc::new(loader)));
    Ok(Viewer::new(store, chart_config))
}

/// Maps a request path below `/models/` into the assets directory.
///
/// Only plain relative components are accepted, so the result can never
/// leave the directory.
pub fn model_path(config: &Config, file: &str) -> Result<PathBuf, ApiError> {
    let relative = Path::new(file);
    let plain = !file.is_empty()
        && !file.contains('\\')
        && relative.components().all(|c| matches!(c, Component::Normal(_)));
    if !plain {
        return Err(ApiError::Forbidden(file.to_string()));
    }
    Ok(config.assets_dir.join(relative))
}
