// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Export naming tree.
//!
//! Interchange writers consume an [`ExportTree`] rather than the arena: it
//! carries stable node names (part label, then source base, then node name),
//! local and world transforms, and a reference to the shared geometry.

use serde::{Deserialize, Serialize};

use crate::arena::SceneGraph;
use crate::error::{Error, Result};
use crate::keys::NodeKey;
use crate::node::Node;
use crate::tags::{ComponentType, ToothId};

/// Stable name of a node in exported files.
pub fn export_name(node: &Node) -> &str {
    node.tags
        .part_label
        .as_deref()
        .or(node.tags.source_base.as_deref())
        .unwrap_or(&node.name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMesh {
    /// Fragment the geometry was loaded from
    pub source: String,
    pub vertex_count: usize,
    pub triangle_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportNode {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_type: Option<ComponentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooth_id: Option<ToothId>,
    pub translation: [f64; 3],
    /// XYZ Euler angles, radians
    pub rotation: [f64; 3],
    pub scale: [f64; 3],
    /// Column-major
    pub world_matrix: [f64; 16],
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<ExportMesh>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ExportNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTree {
    pub root: ExportNode,
    pub mesh_count: usize,
}

impl ExportTree {
    /// Snapshot the subtree at `scope`. With `only_visible`, hidden nodes and
    /// everything beneath them are left out.
    pub fn build(graph: &SceneGraph, scope: NodeKey, only_visible: bool) -> Result<Self> {
        let mut mesh_count = 0;
        let root = export_node(graph, scope, only_visible, &mut mesh_count)?
            .ok_or(Error::NodeNotFound(scope))?;
        Ok(Self { root, mesh_count })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

fn export_node(
    graph: &SceneGraph,
    key: NodeKey,
    only_visible: bool,
    mesh_count: &mut usize,
) -> Result<Option<ExportNode>> {
    let node = graph.get(key)?;
    if only_visible && !node.visible {
        return Ok(None);
    }

    let mesh = node.mesh_ref().map(|m| {
        *mesh_count += 1;
        ExportMesh {
            source: node
                .tags
                .source_base
                .clone()
                .unwrap_or_else(|| node.name.clone()),
            vertex_count: m.geometry.vertex_count(),
            triangle_count: m.geometry.triangle_count(),
        }
    });

    let mut children = Vec::with_capacity(node.children.len());
    for &child in &node.children {
        if let Some(exported) = export_node(graph, child, only_visible, mesh_count)? {
            children.push(exported);
        }
    }

    let t = &node.transform;
    let mut world_matrix = [0.0; 16];
    world_matrix.copy_from_slice(graph.world_matrix(key).as_slice());

    Ok(Some(ExportNode {
        name: export_name(node).to_string(),
        component_type: node.tags.component_type,
        tooth_id: node.tags.tooth_id,
        translation: [t.position.x, t.position.y, t.position.z],
        rotation: [t.rotation.x, t.rotation.y, t.rotation.z],
        scale: [t.scale.x, t.scale.y, t.scale.z],
        world_matrix,
        visible: node.visible,
        mesh,
        children,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dentchart_geometry::{MeshGeometry, Trs};
    use std::sync::Arc;

    use crate::node::{Material, MeshRef, NodeTags};

    #[test]
    fn names_prefer_part_label_then_source() {
        let mut node = Node::group("inst:D11C_V");
        assert_eq!(export_name(&node), "inst:D11C_V");
        node.tags.source_base = Some("D11C_V".into());
        assert_eq!(export_name(&node), "D11C_V");
        node.tags.part_label = Some("crown-11".into());
        assert_eq!(export_name(&node), "crown-11");
    }

    #[test]
    fn hidden_subtrees_are_skipped() {
        let mut g = SceneGraph::new("chart");
        let row = g.add_group(g.root(), "row").unwrap();
        g.set_transform(row, Trs::from_translation(0.0, 7.0, 0.0)).unwrap();
        let geometry = MeshGeometry::new(vec![0.0; 9], None, None).unwrap();
        let mesh = MeshRef::new(Arc::new(geometry), Arc::new(Material::default()));
        let shown = g.add_mesh(row, "a", mesh.clone()).unwrap();
        g.node_mut(shown).unwrap().tags = NodeTags::default().with_part("D11C_V");
        let hidden = g.add_mesh(row, "b", mesh).unwrap();
        g.node_mut(hidden).unwrap().visible = false;

        let all = ExportTree::build(&g, g.root(), false).unwrap();
        assert_eq!(all.mesh_count, 2);

        let visible = ExportTree::build(&g, g.root(), true).unwrap();
        assert_eq!(visible.mesh_count, 1);
        let exported = &visible.root.children[0].children[0];
        assert_eq!(exported.name, "D11C_V");
        assert_eq!(exported.mesh.as_ref().unwrap().source, "D11C_V");
        assert_eq!(exported.world_matrix[13], 7.0);
        assert!(visible.to_json().unwrap().contains("\"D11C_V\""));
    }
}
