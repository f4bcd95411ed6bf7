// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scene node data.

use std::sync::Arc;

use dentchart_geometry::{MeshGeometry, Trs};
use serde::{Deserialize, Serialize};

use crate::keys::NodeKey;
use crate::tags::{ArchSide, ComponentType, ToothId};

/// Surface description shared by every mesh of the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub flat_shading: bool,
    pub double_sided: bool,
    /// Color comes from the per-vertex buffer, not a uniform
    pub vertex_colors: bool,
    pub roughness: f32,
    pub metalness: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            flat_shading: true,
            double_sided: true,
            vertex_colors: true,
            roughness: 0.95,
            metalness: 0.0,
        }
    }
}

/// Shared handles a mesh node draws with. Cloning clones the `Arc`s only.
#[derive(Debug, Clone)]
pub struct MeshRef {
    pub geometry: Arc<MeshGeometry>,
    pub material: Arc<Material>,
}

impl MeshRef {
    pub fn new(geometry: Arc<MeshGeometry>, material: Arc<Material>) -> Self {
        Self { geometry, material }
    }

    /// True when both handles point at the same allocations.
    pub fn shares_with(&self, other: &MeshRef) -> bool {
        Arc::ptr_eq(&self.geometry, &other.geometry) && Arc::ptr_eq(&self.material, &other.material)
    }
}

/// Tagged variant for node payloads
#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Mesh(MeshRef),
}

/// Typed metadata attached to a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeTags {
    pub component_type: Option<ComponentType>,
    pub tooth_id: Option<ToothId>,
    pub arch: Option<ArchSide>,
    /// Marks the node standing for one loaded fragment; used for paint-by-part
    /// and export naming
    pub part_label: Option<String>,
    /// Base name of the fragment file the geometry came from
    pub source_base: Option<String>,
}

impl NodeTags {
    pub fn for_tooth(tooth: ToothId) -> Self {
        Self {
            tooth_id: Some(tooth),
            arch: Some(tooth.arch()),
            ..Self::default()
        }
    }

    pub fn with_component(mut self, ty: ComponentType) -> Self {
        self.component_type = Some(ty);
        self
    }

    pub fn with_part(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.source_base.get_or_insert_with(|| label.clone());
        self.part_label = Some(label);
        self
    }
}

/// A node in the scene graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub transform: Trs,
    pub visible: bool,
    pub tags: NodeTags,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
}

impl Node {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Group,
            transform: Trs::identity(),
            visible: true,
            tags: NodeTags::default(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: impl Into<String>, mesh: MeshRef) -> Self {
        Self {
            kind: NodeKind::Mesh(mesh),
            ..Self::group(name)
        }
    }

    pub fn with_tags(mut self, tags: NodeTags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_transform(mut self, transform: Trs) -> Self {
        self.transform = transform;
        self
    }

    #[inline]
    pub fn is_mesh(&self) -> bool {
        matches!(self.kind, NodeKind::Mesh(_))
    }

    #[inline]
    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group)
    }

    pub fn mesh_ref(&self) -> Option<&MeshRef> {
        match &self.kind {
            NodeKind::Mesh(m) => Some(m),
            NodeKind::Group => None,
        }
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }
}
