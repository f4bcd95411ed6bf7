// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Position / rotation / scale transforms.
//!
//! Rotations are three Euler angles in radians applied in a fixed XYZ
//! order: the composed matrix is `Rx * Ry * Rz`, so Z acts first on a
//! column vector. Decomposition reproduces the same convention.

use nalgebra::{Matrix3, Matrix4, Rotation3, Translation3, Vector3};

use crate::error::{Error, Result};

/// Euler angles in radians, XYZ order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerXyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl EulerXyz {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn from_degrees(x: f64, y: f64, z: f64) -> Self {
        Self::new(x.to_radians(), y.to_radians(), z.to_radians())
    }

    pub fn to_degrees(self) -> [f64; 3] {
        [self.x.to_degrees(), self.y.to_degrees(), self.z.to_degrees()]
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// Rotation matrix `Rx * Ry * Rz`.
    pub fn to_rotation(self) -> Rotation3<f64> {
        Rotation3::from_axis_angle(&Vector3::x_axis(), self.x)
            * Rotation3::from_axis_angle(&Vector3::y_axis(), self.y)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), self.z)
    }

    /// Extracts XYZ angles from a pure rotation matrix.
    ///
    /// Near gimbal lock (|m13| ~ 1) the Z angle is pinned to zero.
    pub fn from_rotation_matrix(m: &Matrix3<f64>) -> Self {
        let m13 = m[(0, 2)].clamp(-1.0, 1.0);
        let y = m13.asin();
        if m13.abs() < 0.999_999_9 {
            Self::new((-m[(1, 2)]).atan2(m[(2, 2)]), y, (-m[(0, 1)]).atan2(m[(0, 0)]))
        } else {
            Self::new(m[(2, 1)].atan2(m[(1, 1)]), y, 0.0)
        }
    }

    /// Component-wise sum, used to stack relative offsets on top of an absolute rotation.
    pub fn offset_by(self, other: EulerXyz) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

/// Local transform of a scene node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trs {
    pub position: Vector3<f64>,
    pub rotation: EulerXyz,
    pub scale: Vector3<f64>,
}

impl Default for Trs {
    fn default() -> Self {
        Self::identity()
    }
}

impl Trs {
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: EulerXyz::default(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            ..Self::identity()
        }
    }

    pub fn new(position: Vector3<f64>, rotation: EulerXyz, scale: Vector3<f64>) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn with_rotation(mut self, rotation: EulerXyz) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Compose into `T * R * S`.
    pub fn to_matrix(&self) -> Matrix4<f64> {
        Translation3::from(self.position).to_homogeneous()
            * self.rotation.to_rotation().to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale)
    }

    /// Decompose an affine matrix into TRS.
    ///
    /// A negative determinant is folded into the X scale. Zero scale on any
    /// axis leaves the rotation at identity.
    pub fn from_matrix(m: &Matrix4<f64>) -> Self {
        let position = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
        let basis = m.fixed_view::<3, 3>(0, 0).into_owned();

        let mut sx = basis.column(0).norm();
        let sy = basis.column(1).norm();
        let sz = basis.column(2).norm();
        if basis.determinant() < 0.0 {
            sx = -sx;
        }

        let rotation = if sx.abs() < f64::EPSILON || sy < f64::EPSILON || sz < f64::EPSILON {
            EulerXyz::default()
        } else {
            let r = Matrix3::from_columns(&[
                basis.column(0) / sx,
                basis.column(1) / sy,
                basis.column(2) / sz,
            ]);
            EulerXyz::from_rotation_matrix(&r)
        };

        Self {
            position,
            rotation,
            scale: Vector3::new(sx, sy, sz),
        }
    }

    /// Local TRS that places a node at `world` when its parent sits at `parent_world`.
    pub fn relative_to(parent_world: &Matrix4<f64>, world: &Matrix4<f64>) -> Result<Self> {
        let inverse = parent_world.try_inverse().ok_or_else(|| {
            Error::DegenerateTransform("parent world matrix is not invertible".to_string())
        })?;
        Ok(Self::from_matrix(&(inverse * world)))
    }
}
