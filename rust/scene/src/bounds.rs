// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! World-space bounding boxes of subtrees.

use dentchart_geometry::Aabb;

use crate::arena::SceneGraph;
use crate::keys::NodeKey;
use crate::node::Node;
use crate::tags::ComponentType;

impl SceneGraph {
    /// Union of the world boxes of every mesh at or below `key`.
    ///
    /// A subtree without meshes yields [`Aabb::empty`].
    pub fn world_bounds(&self, key: NodeKey) -> Aabb {
        self.world_bounds_where(key, |_| true)
    }

    /// Like [`world_bounds`](Self::world_bounds) but only over meshes accepted by `include`.
    pub fn world_bounds_where<F>(&self, key: NodeKey, mut include: F) -> Aabb
    where
        F: FnMut(&Node) -> bool,
    {
        let mut bounds = Aabb::empty();
        for k in self.mesh_descendants(key) {
            let Some(node) = self.node(k) else { continue };
            let Some(mesh) = node.mesh_ref() else { continue };
            if !include(node) {
                continue;
            }
            let local = mesh.geometry.local_bounds();
            if local.is_empty() {
                continue;
            }
            bounds.union_with(&local.transformed(&self.world_matrix(k)));
        }
        bounds
    }

    /// World box of the meshes tagged with `ty`.
    pub fn component_bounds(&self, key: NodeKey, ty: ComponentType) -> Aabb {
        self.world_bounds_where(key, |n| n.tags.component_type == Some(ty))
    }
}
