// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vertex-color painting.
//!
//! Paint writes through the shared geometry handle, so every mesh instance
//! built from the same fragment shows the change. None of these need
//! `&mut SceneGraph`: the node structure is not touched.

use dentchart_geometry::Rgb;

use crate::arena::SceneGraph;
use crate::keys::NodeKey;

impl SceneGraph {
    /// Nearest node at or above `key` carrying a part label.
    pub fn part_root(&self, key: NodeKey) -> Option<NodeKey> {
        self.find_ancestor(key, |n| n.tags.part_label.is_some())
    }

    /// Floods every mesh of the part containing `key` with `color`.
    ///
    /// Returns the number of meshes painted; zero when `key` has no labelled
    /// ancestor.
    pub fn paint_part(&self, key: NodeKey, color: Rgb) -> usize {
        let Some(part) = self.part_root(key) else {
            return 0;
        };
        self.fill_meshes(part, color)
    }

    /// Recolors the three corners of triangle `face` on mesh `key`.
    ///
    /// Missing color buffers are synthesized with the base grey first.
    pub fn paint_face(&self, key: NodeKey, face: usize, color: Rgb) -> bool {
        self.node(key)
            .and_then(|n| n.mesh_ref())
            .is_some_and(|m| m.geometry.paint_triangle(face, color, Rgb::BASE_GREY))
    }

    /// Resets every mesh at or below `scope` to `color`.
    pub fn fill_meshes(&self, scope: NodeKey, color: Rgb) -> usize {
        let mut painted = 0;
        for k in self.mesh_descendants(scope) {
            if let Some(mesh) = self.node(k).and_then(|n| n.mesh_ref()) {
                mesh.geometry.fill_colors(color);
                painted += 1;
            }
        }
        painted
    }

    /// Gives every mesh at or below `scope` a color buffer, filled with
    /// `fill` where one has to be created. Returns how many were created.
    pub fn ensure_vertex_colors(&self, scope: NodeKey, fill: Rgb) -> usize {
        self.mesh_descendants(scope)
            .into_iter()
            .filter_map(|k| self.node(k).and_then(|n| n.mesh_ref()))
            .filter(|m| m.geometry.ensure_colors(fill))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dentchart_geometry::MeshGeometry;
    use std::sync::Arc;

    use crate::node::{Material, MeshRef, NodeTags};

    fn tri_mesh() -> MeshRef {
        let geometry = MeshGeometry::new(
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            Some(vec![0, 1, 2, 0, 2, 3]),
            None,
        )
        .unwrap();
        MeshRef::new(Arc::new(geometry), Arc::new(Material::default()))
    }

    #[test]
    fn paint_part_floods_labelled_ancestor() {
        let mut g = SceneGraph::new("r");
        let part = g.add_group(g.root(), "part").unwrap();
        g.node_mut(part).unwrap().tags = NodeTags::default().with_part("D11C_V");
        let a = g.add_mesh(part, "a", tri_mesh()).unwrap();
        let b = g.add_mesh(part, "b", tri_mesh()).unwrap();

        assert_eq!(g.paint_part(a, Rgb::PURPLE), 2);
        let geom = &g.node(b).unwrap().mesh_ref().unwrap().geometry;
        assert!((0..4).all(|v| geom.vertex_color(v) == Some(Rgb::PURPLE)));
    }

    #[test]
    fn paint_part_without_label_is_noop() {
        let mut g = SceneGraph::new("r");
        let m = g.add_mesh(g.root(), "m", tri_mesh()).unwrap();
        assert_eq!(g.paint_part(m, Rgb::PURPLE), 0);
        assert!(!g.node(m).unwrap().mesh_ref().unwrap().geometry.has_colors());
    }

    #[test]
    fn paint_face_is_local_and_shared() {
        let mut g = SceneGraph::new("r");
        let shared = tri_mesh();
        let a = g.add_mesh(g.root(), "a", shared.clone()).unwrap();
        let b = g.add_mesh(g.root(), "b", shared).unwrap();

        assert!(g.paint_face(a, 1, Rgb::BLUE));
        let geom = &g.node(b).unwrap().mesh_ref().unwrap().geometry;
        assert_eq!(geom.vertex_color(2), Some(Rgb::BLUE));
        assert_eq!(geom.vertex_color(3), Some(Rgb::BLUE));
        assert_eq!(geom.vertex_color(1), Some(Rgb::BASE_GREY));
        assert!(!g.paint_face(a, 9, Rgb::BLUE));

        assert_eq!(g.fill_meshes(g.root(), Rgb::BASE_GREY), 2);
        assert_eq!(geom.vertex_color(2), Some(Rgb::BASE_GREY));
    }
}
