// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures
//!
//! Positions and indices are immutable once built. The per-vertex color
//! buffer sits behind a lock so every holder of an `Arc<MeshGeometry>` sees
//! the same paint state.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::bounds::Aabb;
use crate::color::Rgb;
use crate::error::{Error, Result};

/// Triangle mesh shared between every instance of a loaded fragment
#[derive(Debug)]
pub struct MeshGeometry {
    /// Vertex positions (x, y, z)
    positions: Vec<f32>,
    /// Triangle indices (i0, i1, i2); `None` means raw positional triples
    indices: Option<Vec<u32>>,
    /// Vertex colors (r, g, b); `None` until synthesized or supplied
    colors: RwLock<Option<Vec<f32>>>,
    /// Local-space bounds, computed once
    bounds: Aabb,
}

impl MeshGeometry {
    /// Build a mesh, validating buffer shapes.
    ///
    /// A color buffer whose length does not match the vertex count is dropped
    /// and treated as absent.
    pub fn new(positions: Vec<f32>, indices: Option<Vec<u32>>, colors: Option<Vec<f32>>) -> Result<Self> {
        if positions.len() % 3 != 0 {
            return Err(Error::InvalidBuffer(format!(
                "position buffer length {} is not a multiple of 3",
                positions.len()
            )));
        }
        let vertex_count = positions.len() / 3;

        if let Some(idx) = &indices {
            if idx.len() % 3 != 0 {
                return Err(Error::InvalidBuffer(format!(
                    "index buffer length {} is not a multiple of 3",
                    idx.len()
                )));
            }
            if let Some(&bad) = idx.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(Error::InvalidBuffer(format!(
                    "index {} out of range for {} vertices",
                    bad, vertex_count
                )));
            }
        }

        let colors = colors.filter(|c| c.len() == positions.len());
        let bounds = Aabb::from_positions(&positions);

        Ok(Self {
            positions,
            indices,
            colors: RwLock::new(colors),
            bounds,
        })
    }

    #[inline]
    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    #[inline]
    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Number of triangles, from the index buffer when present
    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(idx) => idx.len() / 3,
            None => self.vertex_count() / 3,
        }
    }

    #[inline]
    pub fn local_bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Vertex indices of triangle `face`.
    pub fn triangle(&self, face: usize) -> Option<[usize; 3]> {
        match &self.indices {
            Some(idx) => {
                let first = face.checked_mul(3)?;
                let tri = idx.get(first..first.checked_add(3)?)?;
                Some([tri[0] as usize, tri[1] as usize, tri[2] as usize])
            }
            None => {
                let first = face.checked_mul(3)?;
                (first.checked_add(2)? < self.vertex_count()).then_some([first, first + 1, first + 2])
            }
        }
    }

    fn read_colors(&self) -> RwLockReadGuard<'_, Option<Vec<f32>>> {
        self.colors.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_colors(&self) -> RwLockWriteGuard<'_, Option<Vec<f32>>> {
        self.colors.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn has_colors(&self) -> bool {
        self.read_colors().is_some()
    }

    /// Synthesize a color buffer filled with `fill` if none exists.
    ///
    /// Returns `true` when a buffer was created.
    pub fn ensure_colors(&self, fill: Rgb) -> bool {
        let mut guard = self.write_colors();
        if guard.is_some() {
            return false;
        }
        *guard = Some(solid_buffer(self.vertex_count(), fill));
        true
    }

    /// Set every vertex to `color`, creating the buffer when absent.
    pub fn fill_colors(&self, color: Rgb) {
        let mut guard = self.write_colors();
        match guard.as_mut() {
            Some(buffer) => {
                for rgb in buffer.chunks_exact_mut(3) {
                    rgb.copy_from_slice(&color.to_array());
                }
            }
            None => *guard = Some(solid_buffer(self.vertex_count(), color)),
        }
    }

    /// Recolor the three vertices of one triangle.
    ///
    /// A missing buffer is first synthesized with `base`. Returns `false`
    /// (and leaves colors untouched) when `face` is out of range.
    pub fn paint_triangle(&self, face: usize, color: Rgb, base: Rgb) -> bool {
        let Some(corners) = self.triangle(face) else {
            return false;
        };
        let vertex_count = self.vertex_count();
        let mut guard = self.write_colors();
        let buffer = guard.get_or_insert_with(|| solid_buffer(vertex_count, base));
        for v in corners {
            buffer[v * 3..v * 3 + 3].copy_from_slice(&color.to_array());
        }
        true
    }

    /// Color of one vertex, if a buffer exists.
    pub fn vertex_color(&self, vertex: usize) -> Option<Rgb> {
        let guard = self.read_colors();
        let first = vertex.checked_mul(3)?;
        let rgb = guard.as_ref()?.get(first..first.checked_add(3)?)?;
        Some(Rgb::new(rgb[0], rgb[1], rgb[2]))
    }

    /// Copy of the color buffer.
    pub fn colors(&self) -> Option<Vec<f32>> {
        self.read_colors().clone()
    }
}

fn solid_buffer(vertex_count: usize, color: Rgb) -> Vec<f32> {
    let rgb = color.to_array();
    let mut buffer = Vec::with_capacity(vertex_count * 3);
    for _ in 0..vertex_count {
        buffer.extend_from_slice(&rgb);
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn quad() -> MeshGeometry {
        MeshGeometry::new(
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            Some(vec![0, 1, 2, 0, 2, 3]),
            None,
        )
        .unwrap()
    }

    #[test]
    fn rejects_malformed_buffers() {
        assert!(MeshGeometry::new(vec![0.0; 4], None, None).is_err());
        assert!(MeshGeometry::new(vec![0.0; 9], Some(vec![0, 1, 3]), None).is_err());
        assert!(MeshGeometry::new(vec![0.0; 9], Some(vec![0, 1]), None).is_err());
    }

    #[test]
    fn mismatched_colors_are_dropped() {
        let mesh = MeshGeometry::new(vec![0.0; 9], None, Some(vec![1.0; 6])).unwrap();
        assert!(!mesh.has_colors());
        assert!(mesh.ensure_colors(Rgb::BASE_GREY));
        assert!(!mesh.ensure_colors(Rgb::BLUE));
        assert_eq!(mesh.vertex_color(2), Some(Rgb::BASE_GREY));
    }

    #[test]
    fn triangle_lookup_uses_index_buffer() {
        let mesh = quad();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.triangle(1), Some([0, 2, 3]));
        assert_eq!(mesh.triangle(2), None);

        let soup = MeshGeometry::new(vec![0.0; 18], None, None).unwrap();
        assert_eq!(soup.triangle(1), Some([3, 4, 5]));
        assert_eq!(soup.triangle(2), None);
    }

    #[test]
    fn paint_triangle_touches_only_its_corners() {
        let mesh = quad();
        assert!(mesh.paint_triangle(0, Rgb::BLUE, Rgb::BASE_GREY));
        assert_eq!(mesh.vertex_color(0), Some(Rgb::BLUE));
        assert_eq!(mesh.vertex_color(1), Some(Rgb::BLUE));
        assert_eq!(mesh.vertex_color(2), Some(Rgb::BLUE));
        assert_eq!(mesh.vertex_color(3), Some(Rgb::BASE_GREY));
        assert!(!mesh.paint_triangle(7, Rgb::PURPLE, Rgb::BASE_GREY));
    }

    #[test]
    fn huge_face_index_is_out_of_range() {
        let mesh = quad();
        assert_eq!(mesh.triangle(usize::MAX / 2), None);
        assert_eq!(mesh.triangle(usize::MAX), None);
        assert!(!mesh.paint_triangle(usize::MAX / 2, Rgb::PURPLE, Rgb::BASE_GREY));

        let soup = MeshGeometry::new(vec![0.0; 9], None, None).unwrap();
        assert_eq!(soup.triangle(usize::MAX / 3), None);
        assert!(!soup.paint_triangle(usize::MAX / 2, Rgb::PURPLE, Rgb::BASE_GREY));
        assert!(!soup.has_colors());
        assert_eq!(mesh.vertex_color(usize::MAX), None);
    }

    #[test]
    fn shared_geometry_sees_the_same_paint() {
        let a = Arc::new(quad());
        let b = Arc::clone(&a);
        a.fill_colors(Rgb::PURPLE);
        assert!((0..4).all(|v| b.vertex_color(v) == Some(Rgb::PURPLE)));
    }
}
