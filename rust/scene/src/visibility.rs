// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Visibility by component type.
//!
//! Mesh visibility is a plain flag per node, driven by the component type
//! tag. Per-viewport selection (crowns only, one arch, ...) is expressed as
//! a [`ViewFilter`] predicate evaluated at draw time instead of mutating
//! flags.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::arena::SceneGraph;
use crate::keys::NodeKey;
use crate::node::Node;
use crate::tags::{ArchSide, ComponentType};

/// Desired visibility for each component type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisibilityState(BTreeMap<ComponentType, bool>);

impl Default for VisibilityState {
    /// Crowns and roots shown; canals, nuclei and implants hidden.
    fn default() -> Self {
        Self(BTreeMap::from([
            (ComponentType::Tooth, true),
            (ComponentType::Root, true),
            (ComponentType::Canal, false),
            (ComponentType::Nucleus, false),
            (ComponentType::Implant, false),
        ]))
    }
}

impl VisibilityState {
    pub fn all_visible() -> Self {
        Self(ComponentType::ALL.iter().map(|&t| (t, true)).collect())
    }

    /// Types without an entry count as visible.
    pub fn is_visible(&self, ty: ComponentType) -> bool {
        self.0.get(&ty).copied().unwrap_or(true)
    }

    pub fn set(&mut self, ty: ComponentType, visible: bool) {
        self.0.insert(ty, visible);
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentType, bool)> + '_ {
        self.0.iter().map(|(&t, &v)| (t, v))
    }
}

impl SceneGraph {
    /// Sets the flag of every mesh at or below `scope` whose component type
    /// is `ty`. Meshes of other types are untouched.
    ///
    /// Returns the number of meshes matched.
    pub fn set_type_visibility(&mut self, scope: NodeKey, ty: ComponentType, visible: bool) -> usize {
        let mut matched = 0;
        for key in self.mesh_descendants(scope) {
            if let Some(node) = self.nodes.get_mut(key) {
                if node.tags.component_type == Some(ty) {
                    node.visible = visible;
                    matched += 1;
                }
            }
        }
        matched
    }

    /// Re-applies a full visibility snapshot. Untagged meshes keep their flag.
    pub fn apply_visibility(&mut self, scope: NodeKey, state: &VisibilityState) -> usize {
        let mut matched = 0;
        for key in self.mesh_descendants(scope) {
            if let Some(node) = self.nodes.get_mut(key) {
                if let Some(ty) = node.tags.component_type {
                    node.visible = state.is_visible(ty);
                    matched += 1;
                }
            }
        }
        matched
    }

    /// Marks each non-empty group below `scope` visible iff at least one child
    /// is visible. `scope` itself and every key in `keep` are left alone.
    pub fn hide_empty_groups(&mut self, scope: NodeKey, keep: &[NodeKey]) {
        // Reverse pre-order visits children before their parents
        for key in self.descendants(scope).into_iter().rev() {
            if key == scope || key == self.root() || keep.contains(&key) {
                continue;
            }
            let Some(node) = self.nodes.get(key) else { continue };
            if !node.is_group() || node.children.is_empty() {
                continue;
            }
            let any_visible = node
                .children
                .iter()
                .any(|&c| self.nodes.get(c).is_some_and(|n| n.visible));
            if let Some(node) = self.nodes.get_mut(key) {
                node.visible = any_visible;
            }
        }
    }

    /// Meshes a renderer should draw: visible along their whole ancestor
    /// chain and admitted by `filter`.
    pub fn visible_meshes(&self, scope: NodeKey, filter: &ViewFilter) -> Vec<NodeKey> {
        self.mesh_descendants(scope)
            .into_iter()
            .filter(|&k| {
                self.node(k).is_some_and(|n| filter.admits(n)) && self.is_visible_in_hierarchy(k)
            })
            .collect()
    }
}

/// Per-viewport draw predicate over node tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewFilter {
    /// Allowed component types; `None` admits every type, including untagged meshes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<BTreeSet<ComponentType>>,
    /// Restrict to one arch; nodes without an arch tag always pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<ArchSide>,
}

impl ViewFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(types: impl IntoIterator<Item = ComponentType>) -> Self {
        Self {
            types: Some(types.into_iter().collect()),
            arch: None,
        }
    }

    /// Crown faces only, as used by occlusal projections.
    pub fn crowns() -> Self {
        Self::only([ComponentType::Tooth, ComponentType::Nucleus])
    }

    pub fn with_arch(mut self, arch: ArchSide) -> Self {
        self.arch = Some(arch);
        self
    }

    pub fn admits(&self, node: &Node) -> bool {
        let type_ok = match (&self.types, node.tags.component_type) {
            (None, _) => true,
            (Some(allowed), Some(ty)) => allowed.contains(&ty),
            (Some(_), None) => false,
        };
        let arch_ok = match (self.arch, node.tags.arch) {
            (Some(want), Some(have)) => want == have,
            _ => true,
        };
        type_ok && arch_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dentchart_geometry::MeshGeometry;
    use std::sync::Arc;

    use crate::node::{Material, MeshRef, NodeTags};
    use crate::tags::ToothId;

    fn tagged(g: &mut SceneGraph, parent: NodeKey, ty: ComponentType, tooth: u8) -> NodeKey {
        let geometry = MeshGeometry::new(vec![0.0; 9], None, None).unwrap();
        let mesh = MeshRef::new(Arc::new(geometry), Arc::new(Material::default()));
        let key = g.add_mesh(parent, ty.as_str(), mesh).unwrap();
        g.node_mut(key).unwrap().tags = NodeTags::for_tooth(ToothId::new(tooth).unwrap()).with_component(ty);
        key
    }

    fn visible_set(g: &SceneGraph) -> Vec<NodeKey> {
        g.mesh_descendants(g.root())
            .into_iter()
            .filter(|&k| g.node(k).unwrap().visible)
            .collect()
    }

    #[test]
    fn type_toggle_round_trips() {
        let mut g = SceneGraph::new("r");
        let row = g.add_group(g.root(), "row").unwrap();
        for ty in ComponentType::ALL {
            tagged(&mut g, row, ty, 11);
        }
        g.apply_visibility(g.root(), &VisibilityState::all_visible());
        let before = visible_set(&g);

        assert_eq!(g.set_type_visibility(g.root(), ComponentType::Canal, false), 1);
        assert_eq!(visible_set(&g).len(), before.len() - 1);
        g.set_type_visibility(g.root(), ComponentType::Canal, true);
        assert_eq!(visible_set(&g), before);
    }

    #[test]
    fn other_types_untouched() {
        let mut g = SceneGraph::new("r");
        let root_key = g.root();
        let crown = tagged(&mut g, root_key, ComponentType::Tooth, 11);
        let root_mesh = tagged(&mut g, root_key, ComponentType::Root, 11);
        g.node_mut(root_mesh).unwrap().visible = false;

        g.set_type_visibility(root_key, ComponentType::Tooth, false);
        assert!(!g.node(crown).unwrap().visible);
        assert!(!g.node(root_mesh).unwrap().visible);
        g.set_type_visibility(root_key, ComponentType::Tooth, true);
        assert!(!g.node(root_mesh).unwrap().visible);
    }

    #[test]
    fn empty_groups_hide_but_kept_rows_stay() {
        let mut g = SceneGraph::new("r");
        let row = g.add_group(g.root(), "row").unwrap();
        let tooth = g.add_group(row, "tooth").unwrap();
        let sub = g.add_group(tooth, "Canal").unwrap();
        tagged(&mut g, sub, ComponentType::Canal, 11);

        g.set_type_visibility(g.root(), ComponentType::Canal, false);
        g.hide_empty_groups(g.root(), &[row]);
        assert!(!g.node(sub).unwrap().visible);
        assert!(!g.node(tooth).unwrap().visible);
        assert!(g.node(row).unwrap().visible);

        g.set_type_visibility(g.root(), ComponentType::Canal, true);
        g.hide_empty_groups(g.root(), &[row]);
        assert!(g.node(tooth).unwrap().visible);
    }

    #[test]
    fn view_filter_checks_type_and_arch() {
        let mut g = SceneGraph::new("r");
        let root_key = g.root();
        let upper = tagged(&mut g, root_key, ComponentType::Tooth, 11);
        let lower = tagged(&mut g, root_key, ComponentType::Tooth, 31);
        let root_mesh = tagged(&mut g, root_key, ComponentType::Root, 11);

        let filter = ViewFilter::crowns().with_arch(ArchSide::Upper);
        assert_eq!(g.visible_meshes(root_key, &filter), vec![upper]);
        let all = g.visible_meshes(root_key, &ViewFilter::all());
        assert!(all.contains(&lower) && all.contains(&root_mesh));
    }
}
