// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DentChart Geometry
//!
//! Mesh buffers with shared vertex colors, axis-aligned bounding boxes,
//! TRS transforms with XYZ Euler angles and orthographic viewport fitting,
//! built on nalgebra.

pub mod bounds;
pub mod color;
pub mod error;
pub mod mesh;
pub mod transform;
pub mod viewport;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point3, Vector3};

pub use bounds::Aabb;
pub use color::Rgb;
pub use error::{Error, Result};
pub use mesh::MeshGeometry;
pub use transform::{EulerXyz, Trs};
pub use viewport::{fit_orthographic, FrustumParams, OrthoFrustum};
