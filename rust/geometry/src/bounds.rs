// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned bounding boxes with an explicit empty sentinel.
//!
//! An empty box is never an error: every consumer checks [`Aabb::is_empty`]
//! and skips its transform instead.

use nalgebra::{Matrix4, Point3, Vector3};

/// Axis-aligned bounding box in f64 precision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    /// The empty sentinel: min at +inf, max at -inf, so any union replaces it.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Bounds of a flat `[x, y, z, x, y, z, ...]` position buffer.
    pub fn from_positions(positions: &[f32]) -> Self {
        let mut bounds = Self::empty();
        for chunk in positions.chunks_exact(3) {
            bounds.expand(&Point3::new(chunk[0] as f64, chunk[1] as f64, chunk[2] as f64));
        }
        bounds
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand bounds to include a point
    #[inline]
    pub fn expand(&mut self, p: &Point3<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Grow in place to cover `other`. Empty boxes contribute nothing.
    pub fn union_with(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    pub fn union(mut self, other: &Aabb) -> Aabb {
        self.union_with(other);
        self
    }

    /// Center of the box, `None` for the empty sentinel.
    pub fn center(&self) -> Option<Point3<f64>> {
        if self.is_empty() {
            return None;
        }
        Some(nalgebra::center(&self.min, &self.max))
    }

    /// Extent along each axis; zero for an empty box.
    pub fn size(&self) -> Vector3<f64> {
        if self.is_empty() {
            return Vector3::zeros();
        }
        self.max - self.min
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.size().y
    }

    /// Box enclosing the eight transformed corners.
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let mut out = Aabb::empty();
        for i in 0..8 {
            let corner = Point3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.expand(&matrix.transform_point(&corner));
        }
        out
    }

    pub fn translated(&self, offset: &Vector3<f64>) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        Aabb::new(self.min + offset, self.max + offset)
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}
