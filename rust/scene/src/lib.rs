// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # DentChart Scene
//!
//! Arena-backed scene graph for assembled dental charts.
//!
//! Nodes live in a slot map with stable, generational keys. Each node is a
//! tagged variant (group or mesh) carrying an explicit component type,
//! FDI tooth id, arch side and part label instead of free-form metadata.
//! Mesh nodes hold shared references to their geometry and material, so a
//! color edit on one instance shows up on every instance of the same
//! fragment.

pub mod arena;
pub mod bounds;
pub mod error;
pub mod export;
pub mod keys;
pub mod node;
pub mod paint;
pub mod tags;
pub mod traversal;
pub mod visibility;

pub use arena::SceneGraph;
pub use error::{Error, Result};
pub use export::{export_name, ExportNode, ExportTree};
pub use keys::NodeKey;
pub use node::{Material, MeshRef, Node, NodeKind, NodeTags};
pub use tags::{ArchSide, ComponentType, ToothClass, ToothId};
pub use visibility::{ViewFilter, VisibilityState};
