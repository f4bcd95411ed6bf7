// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chart tunables.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! { "arch_gap": 12.0, "implant": { "lower_offset": -5.0 } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use dentchart_geometry::FrustumParams;
use dentchart_scene::VisibilityState;

use crate::error::{Error, Result};
use crate::implant::ImplantConfig;
use crate::occlusal::OcclusalTable;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub margin: f64,
    pub near: f64,
    pub far: f64,
    pub camera_distance: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        let p = FrustumParams::default();
        Self {
            margin: p.margin,
            near: p.near,
            far: p.far,
            camera_distance: p.camera_distance,
        }
    }
}

impl From<ViewportConfig> for FrustumParams {
    fn from(v: ViewportConfig) -> Self {
        FrustumParams {
            margin: v.margin,
            near: v.near,
            far: v.far,
            camera_distance: v.camera_distance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Gap between a vestibular row and its occlusal row
    pub row_gap: f64,
    /// Gap between the upper and lower arch
    pub arch_gap: f64,
    pub viewport: ViewportConfig,
    pub implant: ImplantConfig,
    pub occlusal: OcclusalTable,
    pub default_visibility: VisibilityState,
    /// Hide groups whose every child is hidden
    pub hide_empty_groups: bool,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            row_gap: 1.0,
            arch_gap: 10.0,
            viewport: ViewportConfig::default(),
            implant: ImplantConfig::default(),
            occlusal: OcclusalTable::default(),
            default_visibility: VisibilityState::default(),
            hide_empty_groups: false,
        }
    }
}

impl ChartConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if !(self.row_gap >= 0.0 && self.arch_gap >= 0.0) {
            return Err(Error::Config("row gaps must be non-negative".into()));
        }
        let v = &self.viewport;
        if !(v.near > 0.0 && v.far > v.near) {
            return Err(Error::Config(format!("invalid clip planes {}..{}", v.near, v.far)));
        }
        Ok(())
    }

    /// Inter-row gaps top to bottom.
    pub fn gaps(&self) -> [f64; 3] {
        [self.row_gap, self.arch_gap, self.row_gap]
    }

    pub fn frustum(&self) -> FrustumParams {
        self.viewport.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dentchart_scene::ComponentType;

    #[test]
    fn test_defaults() {
        let c = ChartConfig::default();
        assert_eq!(c.gaps(), [1.0, 10.0, 1.0]);
        assert_eq!(c.frustum(), FrustumParams::default());
        assert_eq!(c.implant.lower_offset, -7.0);
        assert!(c.default_visibility.is_visible(ComponentType::Tooth));
        assert!(!c.default_visibility.is_visible(ComponentType::Canal));
    }

    #[test]
    fn test_partial_override() {
        let c = ChartConfig::from_json_str(
            r#"{ "arch_gap": 12.0, "implant": { "lower_offset": -5.0 }, "viewport": { "margin": 5 } }"#,
        )
        .unwrap();
        assert_eq!(c.gaps(), [1.0, 12.0, 1.0]);
        assert_eq!(c.implant.lower_offset, -5.0);
        assert_eq!(c.implant.files.len(), 2);
        assert_eq!(c.viewport.margin, 5.0);
        assert_eq!(c.viewport.far, 5000.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(ChartConfig::from_json_str(r#"{ "row_gap": -1 }"#), Err(Error::Config(_))));
        assert!(matches!(
            ChartConfig::from_json_str(r#"{ "viewport": { "near": 10, "far": 1 } }"#),
            Err(Error::Config(_))
        ));
        assert!(ChartConfig::from_json_str("not json").is_err());
    }
}
