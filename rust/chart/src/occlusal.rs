// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Occlusal pivots.
//!
//! An occlusal row shows each tooth's crown turned towards the viewer. The
//! crown meshes are cloned (sharing geometry) into a pivot group whose origin
//! sits on the crown's bounding-box center, and the pivot is then rotated by
//! the class rotation table, so the crown turns in place.

use std::collections::BTreeMap;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use dentchart_geometry::{EulerXyz, Trs};
use dentchart_scene::{ComponentType, Node, NodeKey, SceneGraph, ToothClass, ToothId};

use crate::error::Result;

/// Relative rotation (degrees) and translation added on top of the table.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PivotOffset {
    pub rotation: [f64; 3],
    pub position: [f64; 3],
}

/// Occlusal orientation per tooth class, in degrees, XYZ order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcclusalTable {
    pub absolute: BTreeMap<ToothClass, [f64; 3]>,
    pub class_offsets: BTreeMap<ToothClass, PivotOffset>,
    pub tooth_offsets: BTreeMap<ToothId, PivotOffset>,
}

impl Default for OcclusalTable {
    fn default() -> Self {
        let absolute = BTreeMap::from([
            (ToothClass::UpperPosterior, [90.0, 180.0, 180.0]),
            (ToothClass::UpperAnterior, [0.0, 180.0, 180.0]),
            (ToothClass::LowerPosterior, [90.0, 0.0, 0.0]),
            (ToothClass::LowerAnterior, [0.0, 180.0, 180.0]),
            (ToothClass::Unknown, [0.0, 0.0, 0.0]),
        ]);
        Self {
            absolute,
            class_offsets: BTreeMap::new(),
            tooth_offsets: BTreeMap::new(),
        }
    }
}

impl OcclusalTable {
    fn offsets(&self, tooth: ToothId) -> [PivotOffset; 2] {
        [
            self.class_offsets.get(&tooth.class()).copied().unwrap_or_default(),
            self.tooth_offsets.get(&tooth).copied().unwrap_or_default(),
        ]
    }

    /// Absolute class rotation plus class and tooth offsets.
    pub fn rotation_for(&self, tooth: ToothId) -> EulerXyz {
        let [x, y, z] = self
            .absolute
            .get(&tooth.class())
            .or_else(|| self.absolute.get(&ToothClass::Unknown))
            .copied()
            .unwrap_or_default();
        self.offsets(tooth)
            .iter()
            .fold(EulerXyz::from_degrees(x, y, z), |acc, o| {
                let [dx, dy, dz] = o.rotation;
                acc.offset_by(EulerXyz::from_degrees(dx, dy, dz))
            })
    }

    /// Sum of class and tooth position offsets.
    pub fn position_offset(&self, tooth: ToothId) -> Vector3<f64> {
        self.offsets(tooth)
            .iter()
            .map(|o| Vector3::from(o.position))
            .sum()
    }
}

/// Crown meshes: anything not tagged root, canal or implant.
pub fn is_crown_mesh(node: &Node) -> bool {
    !matches!(
        node.tags.component_type,
        Some(ComponentType::Root | ComponentType::Canal | ComponentType::Implant)
    )
}

pub fn pivot_name(tooth: ToothId) -> String {
    format!("tooth-{}-oclu-pivot", tooth)
}

/// Builds the occlusal pivot of `tooth_group` under `row`.
///
/// Returns `None` when the tooth has no crown geometry.
pub fn build_pivot(
    graph: &mut SceneGraph,
    tooth_group: NodeKey,
    row: NodeKey,
    tooth: ToothId,
    table: &OcclusalTable,
) -> Result<Option<NodeKey>> {
    let crown = graph.world_bounds_where(tooth_group, is_crown_mesh);
    let Some(center) = crown.center() else {
        return Ok(None);
    };

    let local_center = match graph.world_matrix(row).try_inverse() {
        Some(inv) => inv.transform_point(&center),
        None => center,
    };
    let pivot = graph.insert(
        row,
        Node::group(pivot_name(tooth))
            .with_tags(dentchart_scene::NodeTags::for_tooth(tooth))
            .with_transform(Trs::from_translation(local_center.x, local_center.y, local_center.z)),
    )?;

    let tooth_world = graph.world_matrix(tooth_group);
    let Some(clone) = graph.clone_meshes_flat(tooth_group, pivot, format!("tooth-{}-oclu", tooth), is_crown_mesh)?
    else {
        graph.remove(pivot)?;
        return Ok(None);
    };
    if let Some(node) = graph.node_mut(clone) {
        node.tags = dentchart_scene::NodeTags::for_tooth(tooth);
    }
    graph.set_world_transform(clone, &tooth_world)?;

    let offset = table.position_offset(tooth);
    if let Some(node) = graph.node_mut(pivot) {
        node.transform.rotation = table.rotation_for(tooth);
        node.transform.position += offset;
    }
    Ok(Some(pivot))
}

/// Crown center of a pivot in world space.
pub fn pivot_center(graph: &SceneGraph, pivot: NodeKey) -> Option<Point3<f64>> {
    graph.world_bounds_where(pivot, is_crown_mesh).center()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use dentchart_geometry::MeshGeometry;
    use dentchart_scene::{Material, MeshRef, NodeTags};
    use std::sync::Arc;

    fn boxed(g: &mut SceneGraph, parent: NodeKey, ty: ComponentType, min: [f32; 3], max: [f32; 3]) -> NodeKey {
        let raw = crate::loader::RawMesh::cuboid("m", min, max);
        let geometry = MeshGeometry::new(raw.positions, raw.indices, None).unwrap();
        let node = Node::mesh(ty.as_str(), MeshRef::new(Arc::new(geometry), Arc::new(Material::default())))
            .with_tags(NodeTags::default().with_component(ty));
        g.insert(parent, node).unwrap()
    }

    #[test]
    fn test_rotation_table_defaults_and_offsets() {
        let mut table = OcclusalTable::default();
        let t16 = ToothId::new(16).unwrap();
        let t41 = ToothId::new(41).unwrap();
        let close = |a: [f64; 3], b: [f64; 3]| a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9);
        assert!(close(table.rotation_for(t16).to_degrees(), [90.0, 180.0, 180.0]));
        assert!(close(table.rotation_for(t41).to_degrees(), [0.0, 180.0, 180.0]));

        table.class_offsets.insert(
            ToothClass::UpperPosterior,
            PivotOffset {
                rotation: [0.0, 0.0, 5.0],
                position: [1.0, 0.0, 0.0],
            },
        );
        table.tooth_offsets.insert(
            t16,
            PivotOffset {
                rotation: [0.0, 0.0, 5.0],
                position: [0.0, 2.0, 0.0],
            },
        );
        let deg = table.rotation_for(t16).to_degrees();
        assert_relative_eq!(deg[2], 190.0, epsilon = 1e-9);
        assert_eq!(table.position_offset(t16), Vector3::new(1.0, 2.0, 0.0));
        assert_eq!(table.position_offset(t41), Vector3::zeros());
    }

    #[test]
    fn test_table_parses_partial_json() {
        let table: OcclusalTable =
            serde_json::from_str(r#"{"tooth_offsets": {"26": {"rotation": [0, 0, 5]}}}"#).unwrap();
        let t26 = ToothId::new(26).unwrap();
        assert_relative_eq!(table.rotation_for(t26).to_degrees()[0], 90.0, epsilon = 1e-9);
        assert_relative_eq!(table.rotation_for(t26).to_degrees()[2], 185.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pivot_rotates_about_crown_center() {
        let mut g = SceneGraph::new("chart");
        let vest = g.add_group(g.root(), "row-vest-up").unwrap();
        let oclu = g.add_group(g.root(), "row-oclu-up").unwrap();
        let tooth = g.add_group(vest, "tooth-11").unwrap();
        boxed(&mut g, tooth, ComponentType::Tooth, [4.0, 10.0, -1.0], [6.0, 14.0, 1.0]);
        boxed(&mut g, tooth, ComponentType::Root, [4.5, 0.0, -0.5], [5.5, 10.0, 0.5]);

        let id = ToothId::new(11).unwrap();
        let pivot = build_pivot(&mut g, tooth, oclu, id, &OcclusalTable::default())
            .unwrap()
            .unwrap();

        assert_eq!(g.node(pivot).unwrap().name, "tooth-11-oclu-pivot");
        let center = pivot_center(&g, pivot).unwrap();
        assert_relative_eq!(center.x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(center.y, 12.0, epsilon = 1e-9);
        assert_relative_eq!(center.z, 0.0, epsilon = 1e-9);
        // roots are not cloned
        assert_eq!(g.mesh_descendants(pivot).len(), 1);
    }

    #[test]
    fn test_rootless_tooth_has_no_pivot() {
        let mut g = SceneGraph::new("chart");
        let oclu = g.add_group(g.root(), "row-oclu-low").unwrap();
        let tooth = g.add_group(g.root(), "tooth-36").unwrap();
        boxed(&mut g, tooth, ComponentType::Root, [0.0; 3], [1.0; 3]);
        let id = ToothId::new(36).unwrap();
        assert_eq!(build_pivot(&mut g, tooth, oclu, id, &OcclusalTable::default()).unwrap(), None);
        assert!(g.children(oclu).is_empty());
    }
}
