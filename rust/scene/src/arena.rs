// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena-based storage for scene nodes.
//!
//! The [`SceneGraph`] owns every node of an assembled chart. Nodes live in a
//! slot map with stable keys; parent/child links are stored on the nodes
//! themselves. There is exactly one root, created with the graph, which can
//! be neither moved nor removed.

use nalgebra::{Matrix4, Vector3};
use slotmap::SlotMap;

use dentchart_geometry::Trs;

use crate::error::{Error, Result};
use crate::keys::NodeKey;
use crate::node::{MeshRef, Node};

/// The central arena that owns all scene nodes.
///
/// # Example
///
/// ```
/// use dentchart_scene::SceneGraph;
///
/// let mut graph = SceneGraph::new("chart");
/// let row = graph.add_group(graph.root(), "row-vest-up").unwrap();
/// let tooth = graph.add_group(row, "tooth-11").unwrap();
///
/// assert_eq!(graph.parent(tooth), Some(row));
/// assert_eq!(graph.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct SceneGraph {
    pub(crate) nodes: SlotMap<NodeKey, Node>,
    root: NodeKey,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new("root")
    }
}

impl SceneGraph {
    /// Creates a graph holding only a root group.
    pub fn new(root_name: impl Into<String>) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::group(root_name));
        Self { nodes, root }
    }

    #[inline]
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Returns the node for the given key, or `None` if not found.
    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    pub(crate) fn get(&self, key: NodeKey) -> Result<&Node> {
        self.nodes.get(key).ok_or(Error::NodeNotFound(key))
    }

    pub(crate) fn get_mut(&mut self, key: NodeKey) -> Result<&mut Node> {
        self.nodes.get_mut(key).ok_or(Error::NodeNotFound(key))
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the root remains.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &Node)> {
        self.nodes.iter()
    }

    // --- Construction ---

    /// Inserts `node` as the last child of `parent`.
    pub fn insert(&mut self, parent: NodeKey, mut node: Node) -> Result<NodeKey> {
        self.get(parent)?;
        node.parent = Some(parent);
        node.children.clear();
        let key = self.nodes.insert(node);
        self.get_mut(parent)?.children.push(key);
        Ok(key)
    }

    pub fn add_group(&mut self, parent: NodeKey, name: impl Into<String>) -> Result<NodeKey> {
        self.insert(parent, Node::group(name))
    }

    pub fn add_mesh(&mut self, parent: NodeKey, name: impl Into<String>, mesh: MeshRef) -> Result<NodeKey> {
        self.insert(parent, Node::mesh(name, mesh))
    }

    /// First direct child group of `parent` named `name`.
    pub fn find_child(&self, parent: NodeKey, name: &str) -> Option<NodeKey> {
        self.children(parent).iter().copied().find(|&c| {
            self.nodes
                .get(c)
                .is_some_and(|n| n.is_group() && n.name == name)
        })
    }

    /// Returns the child group named `name`, creating it when missing.
    pub fn find_or_add_group(&mut self, parent: NodeKey, name: &str) -> Result<NodeKey> {
        match self.find_child(parent, name) {
            Some(existing) => Ok(existing),
            None => self.add_group(parent, name),
        }
    }

    // --- Links ---

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key).and_then(|n| n.parent)
    }

    /// Direct children, empty for unknown keys.
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes.get(key).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// True when `ancestor` is `key` itself or lies on its parent chain.
    pub fn is_descendant_of(&self, key: NodeKey, ancestor: NodeKey) -> bool {
        let mut cursor = Some(key);
        while let Some(k) = cursor {
            if k == ancestor {
                return true;
            }
            cursor = self.parent(k);
        }
        false
    }

    fn unlink(&mut self, key: NodeKey) {
        if let Some(old) = self.parent(key) {
            if let Some(p) = self.nodes.get_mut(old) {
                p.children.retain(|&c| c != key);
            }
        }
    }

    /// Moves `key` under `new_parent`, keeping its local transform.
    pub fn reparent(&mut self, key: NodeKey, new_parent: NodeKey) -> Result<()> {
        if key == self.root {
            return Err(Error::RootImmutable);
        }
        self.get(key)?;
        self.get(new_parent)?;
        if self.is_descendant_of(new_parent, key) {
            return Err(Error::CycleDetected {
                node: key,
                parent: new_parent,
            });
        }
        if self.parent(key) == Some(new_parent) {
            return Ok(());
        }
        self.unlink(key);
        self.get_mut(key)?.parent = Some(new_parent);
        self.get_mut(new_parent)?.children.push(key);
        Ok(())
    }

    /// Moves `key` under `new_parent` while keeping its world placement.
    pub fn attach(&mut self, key: NodeKey, new_parent: NodeKey) -> Result<()> {
        let world = self.world_matrix(key);
        let parent_world = self.world_matrix(new_parent);
        let local = Trs::relative_to(&parent_world, &world)?;
        self.reparent(key, new_parent)?;
        self.get_mut(key)?.transform = local;
        Ok(())
    }

    /// Removes `key` and its whole subtree. Returns the number of nodes removed.
    pub fn remove(&mut self, key: NodeKey) -> Result<usize> {
        if key == self.root {
            return Err(Error::RootImmutable);
        }
        self.get(key)?;
        self.unlink(key);
        let doomed = self.descendants(key);
        for k in &doomed {
            self.nodes.remove(*k);
        }
        Ok(doomed.len())
    }

    /// Removes every child subtree of `key`.
    pub fn clear_children(&mut self, key: NodeKey) -> Result<usize> {
        let children = self.get(key)?.children.clone();
        let mut removed = 0;
        for child in children {
            removed += self.remove(child)?;
        }
        Ok(removed)
    }

    // --- Transforms ---

    pub fn set_transform(&mut self, key: NodeKey, transform: Trs) -> Result<()> {
        self.get_mut(key)?.transform = transform;
        Ok(())
    }

    /// Adds `delta` to the node's local position.
    pub fn translate(&mut self, key: NodeKey, delta: Vector3<f64>) -> Result<()> {
        self.get_mut(key)?.transform.position += delta;
        Ok(())
    }

    /// Local-to-world matrix; identity for unknown keys.
    pub fn world_matrix(&self, key: NodeKey) -> Matrix4<f64> {
        let mut acc = Matrix4::identity();
        let mut cursor = Some(key);
        while let Some(k) = cursor {
            let Some(node) = self.nodes.get(k) else { break };
            acc = node.transform.to_matrix() * acc;
            cursor = node.parent;
        }
        acc
    }

    /// Sets the local transform so the node lands at `world`.
    pub fn set_world_transform(&mut self, key: NodeKey, world: &Matrix4<f64>) -> Result<()> {
        let parent_world = match self.get(key)?.parent {
            Some(p) => self.world_matrix(p),
            None => Matrix4::identity(),
        };
        let local = Trs::relative_to(&parent_world, world)?;
        self.get_mut(key)?.transform = local;
        Ok(())
    }

    // --- Cloning ---

    /// Clones the meshes under `source` that satisfy `include` into a new
    /// group under `parent`.
    ///
    /// The clones share geometry and material with their originals. Each
    /// clone's transform is its original's placement relative to `source`,
    /// so the new group reproduces the source layout when given the same
    /// transform. Returns `None` when no mesh matched.
    pub fn clone_meshes_flat<F>(
        &mut self,
        source: NodeKey,
        parent: NodeKey,
        name: impl Into<String>,
        mut include: F,
    ) -> Result<Option<NodeKey>>
    where
        F: FnMut(&Node) -> bool,
    {
        let source_world = self.world_matrix(source);
        let mut picked = Vec::new();
        for key in self.descendants(source) {
            let node = self.get(key)?;
            if node.is_mesh() && include(node) {
                let local = Trs::relative_to(&source_world, &self.world_matrix(key))?;
                picked.push((node.clone(), local));
            }
        }
        if picked.is_empty() {
            return Ok(None);
        }

        let group = self.add_group(parent, name)?;
        for (node, local) in picked {
            self.insert(group, Node { transform: local, ..node })?;
        }
        Ok(Some(group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use dentchart_geometry::{EulerXyz, MeshGeometry};
    use nalgebra::Point3;
    use std::f64::consts::PI;
    use std::sync::Arc;

    use crate::node::Material;

    fn unit_mesh() -> MeshRef {
        let geometry = MeshGeometry::new(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], None, None).unwrap();
        MeshRef::new(Arc::new(geometry), Arc::new(Material::default()))
    }

    #[test]
    fn insert_and_remove_subtree() {
        let mut g = SceneGraph::new("chart");
        let row = g.add_group(g.root(), "row").unwrap();
        let tooth = g.add_group(row, "tooth").unwrap();
        let mesh = g.add_mesh(tooth, "m", unit_mesh()).unwrap();
        assert_eq!(g.len(), 4);

        assert_eq!(g.remove(tooth).unwrap(), 2);
        assert!(!g.contains(mesh));
        assert!(g.children(row).is_empty());
        assert!(matches!(g.remove(g.root()), Err(Error::RootImmutable)));
    }

    #[test]
    fn reparent_rejects_cycles() {
        let mut g = SceneGraph::new("chart");
        let a = g.add_group(g.root(), "a").unwrap();
        let b = g.add_group(a, "b").unwrap();
        assert!(matches!(g.reparent(a, b), Err(Error::CycleDetected { .. })));
        assert!(matches!(g.reparent(a, a), Err(Error::CycleDetected { .. })));
    }

    #[test]
    fn attach_preserves_world_placement() {
        let mut g = SceneGraph::new("chart");
        let a = g.add_group(g.root(), "a").unwrap();
        g.set_transform(a, Trs::from_translation(5.0, 0.0, 0.0)).unwrap();
        let b = g.add_group(g.root(), "b").unwrap();
        g.set_transform(
            b,
            Trs::from_translation(0.0, 3.0, 0.0).with_rotation(EulerXyz::new(0.0, 0.0, PI / 2.0)),
        )
        .unwrap();
        let m = g.add_mesh(a, "m", unit_mesh()).unwrap();
        g.set_transform(m, Trs::from_translation(1.0, 2.0, 3.0)).unwrap();

        let before = g.world_matrix(m).transform_point(&Point3::origin());
        g.attach(m, b).unwrap();
        let after = g.world_matrix(m).transform_point(&Point3::origin());
        assert_eq!(g.parent(m), Some(b));
        assert_relative_eq!(before, after, epsilon = 1e-9);
        assert_relative_eq!(after, Point3::new(6.0, 2.0, 3.0), epsilon = 1e-9);
    }

    #[test]
    fn flat_clone_shares_buffers_and_keeps_layout() {
        let mut g = SceneGraph::new("chart");
        let tooth = g.add_group(g.root(), "tooth").unwrap();
        let sub = g.add_group(tooth, "Faces").unwrap();
        g.set_transform(sub, Trs::from_translation(0.0, 4.0, 0.0)).unwrap();
        let m = g.add_mesh(sub, "crown", unit_mesh()).unwrap();
        let skip = g.add_mesh(tooth, "root", unit_mesh()).unwrap();

        let clone = g
            .clone_meshes_flat(tooth, g.root(), "copy", |n| n.name == "crown")
            .unwrap()
            .unwrap();
        assert_eq!(g.children(clone).len(), 1);
        let copy = g.children(clone)[0];
        assert!(g.node(copy).unwrap().mesh_ref().unwrap().shares_with(g.node(m).unwrap().mesh_ref().unwrap()));
        assert_relative_eq!(g.node(copy).unwrap().transform.position.y, 4.0);

        let none = g.clone_meshes_flat(tooth, g.root(), "none", |n| n.name == "missing").unwrap();
        assert!(none.is_none());
        assert!(g.contains(skip));
    }
}
