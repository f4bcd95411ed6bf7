// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # DentChart
//!
//! Assembles per-tooth dental meshes into a four-row chart: vestibular and
//! occlusal views of the upper and lower arches.
//!
//! ## Overview
//!
//! - **Classification**: fragment file names map to component types and FDI teeth
//! - **Prototype store**: each fragment is loaded and normalized once
//! - **Assembly**: tooth groups, component subgroups, occlusal pivots, implants
//! - **Layout**: rows centered and stacked with fixed gaps, or placed from a
//!   layout document
//! - **Viewer**: visibility, painting, viewport fitting and export on the
//!   current chart
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dentchart_chart::{ChartConfig, LayoutMode, Manifest, ObjLoader, PrototypeStore, Viewer};
//!
//! let store = Arc::new(PrototypeStore::new(Arc::new(ObjLoader::new("./models"))));
//! let mut viewer = Viewer::new(store, ChartConfig::default());
//! let manifest = Manifest::load("./models/manifest.json").await?;
//! let chart = viewer.build(manifest, LayoutMode::Derived).await?;
//! println!("{}", chart.report);
//! ```

pub mod assemble;
pub mod classify;
pub mod config;
pub mod error;
pub mod implant;
pub mod layout;
pub mod loader;
pub mod manifest;
pub mod obj;
pub mod occlusal;
pub mod report;
pub mod rows;
pub mod snapshot;
pub mod store;
pub mod viewer;

pub use assemble::{Assembler, Chart, LayoutMode, ToothGroup};
pub use classify::{classify, fragment_base, obj_file_name, tooth_id_from_name};
pub use config::{ChartConfig, ViewportConfig};
pub use error::{Error, Result};
pub use implant::{ImplantConfig, ImplantPlacement};
pub use loader::{MemoryLoader, MeshLoader, ObjLoader, RawFragment, RawMesh};
pub use manifest::{Manifest, ToothEntry};
pub use occlusal::OcclusalTable;
pub use report::BuildReport;
pub use rows::{ChartRows, RowId};
pub use snapshot::{ExplicitEntry, ExplicitLayout, LayoutSnapshot};
pub use store::{Prototype, PrototypeStore};
pub use viewer::Viewer;
