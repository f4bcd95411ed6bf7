// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Layout documents: the compact explicit list and the exported snapshot.
//!
//! Explicit layouts are arrays of tuples:
//!
//! ```json
//! [["D11C_V.obj", 0, 12.5, 3.0, 0.0, 0.0, 0.0, 0.0]]
//! ```
//!
//! `[fragment, row, px, py, pz, rx, ry, rz]`, radians, XYZ order. The older
//! seven-element form without a row index lands in row 0.
//!
//! Snapshots nest TRS descriptors under `views.chart`:
//!
//! ```json
//! { "views": { "chart": {
//!     "rows":     { "row-vest-up": { "transformWorld": { "position": { "x": 0, "y": 13, "z": 0 } } } },
//!     "teeth":    { "11": [ { "inRow": "row-vest-up", "transformLocal": { ... }, "parts": [ { "id": "D11C_V", "type": "tooth" } ] } ] },
//!     "implants": { "11": [ { "inRow": "row-vest-up", "transformLocal": { ... }, "parts": ["IMP11_IMP"] } ] }
//! } } }
//! ```

use std::collections::BTreeMap;

use nalgebra::{Matrix3, Matrix4, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use dentchart_geometry::Trs;
use dentchart_scene::{export_name, ComponentType, NodeKey, SceneGraph};

use crate::assemble::Chart;
use crate::error::{Error, Result};
use crate::rows::RowId;

// --- TRS descriptors ---

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Xyz {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleDesc {
    #[serde(default = "one")]
    pub x: f64,
    #[serde(default = "one")]
    pub y: f64,
    #[serde(default = "one")]
    pub z: f64,
}

fn xyz_order() -> String {
    "XYZ".to_string()
}

/// Euler rotation in radians with its application order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationDesc {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "xyz_order")]
    pub order: String,
}

impl RotationDesc {
    /// `order` "XYZ" yields `Rx * Ry * Rz`, and so on for the other five.
    pub fn to_matrix(&self) -> std::result::Result<Matrix3<f64>, String> {
        let order = self.order.to_uppercase();
        let mut seen = [false; 3];
        let mut m = Matrix3::identity();
        for axis in order.chars() {
            let (slot, rot) = match axis {
                'X' => (0, Rotation3::from_axis_angle(&Vector3::x_axis(), self.x)),
                'Y' => (1, Rotation3::from_axis_angle(&Vector3::y_axis(), self.y)),
                'Z' => (2, Rotation3::from_axis_angle(&Vector3::z_axis(), self.z)),
                _ => return Err(format!("unknown rotation order '{}'", self.order)),
            };
            if seen[slot] {
                return Err(format!("unknown rotation order '{}'", self.order));
            }
            seen[slot] = true;
            m *= rot.matrix();
        }
        if seen != [true; 3] {
            return Err(format!("unknown rotation order '{}'", self.order));
        }
        Ok(m)
    }
}

/// Position / rotation / scale; missing parts mean identity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrsDesc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Xyz>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<RotationDesc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleDesc>,
}

impl TrsDesc {
    pub fn from_trs(t: &Trs) -> Self {
        Self {
            position: Some(Xyz {
                x: t.position.x,
                y: t.position.y,
                z: t.position.z,
            }),
            rotation: Some(RotationDesc {
                x: t.rotation.x,
                y: t.rotation.y,
                z: t.rotation.z,
                order: xyz_order(),
            }),
            scale: Some(ScaleDesc {
                x: t.scale.x,
                y: t.scale.y,
                z: t.scale.z,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.rotation.is_none() && self.scale.is_none()
    }

    pub fn to_matrix(&self) -> std::result::Result<Matrix4<f64>, String> {
        let t = self.position.map_or_else(Vector3::zeros, |p| Vector3::new(p.x, p.y, p.z));
        let r = match &self.rotation {
            Some(r) => r.to_matrix()?,
            None => Matrix3::identity(),
        };
        let s = self.scale.map_or_else(|| Vector3::repeat(1.0), |s| Vector3::new(s.x, s.y, s.z));
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&(r * Matrix3::from_diagonal(&s)));
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&t);
        Ok(m)
    }
}

/// Which frame a placement was given in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    World,
    Local,
}

/// A node placement: `transformWorld`, `transformLocal`, or bare TRS fields
/// (treated as local).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Placement {
    #[serde(rename = "transformWorld", default, skip_serializing_if = "Option::is_none")]
    pub world: Option<TrsDesc>,
    #[serde(rename = "transformLocal", default, skip_serializing_if = "Option::is_none")]
    pub local: Option<TrsDesc>,
    #[serde(flatten)]
    pub inline: TrsDesc,
}

impl Placement {
    pub fn world(t: &Trs) -> Self {
        Self {
            world: Some(TrsDesc::from_trs(t)),
            ..Self::default()
        }
    }

    pub fn local(t: &Trs) -> Self {
        Self {
            local: Some(TrsDesc::from_trs(t)),
            ..Self::default()
        }
    }

    /// Sets the node's transform from this placement. Returns the frame
    /// used, or `None` when the placement carries nothing.
    pub fn apply(&self, graph: &mut SceneGraph, key: NodeKey) -> Result<Option<Space>> {
        let (space, desc) = match (&self.world, &self.local) {
            (Some(w), _) => (Space::World, w),
            (None, Some(l)) => (Space::Local, l),
            (None, None) if !self.inline.is_empty() => (Space::Local, &self.inline),
            _ => return Ok(None),
        };
        let name = graph.node(key).map(|n| n.name.clone()).unwrap_or_default();
        let m = desc.to_matrix().map_err(|why| Error::unresolvable(name, why))?;
        match space {
            Space::World => graph.set_world_transform(key, &m)?,
            Space::Local => graph.set_transform(key, Trs::from_matrix(&m))?,
        }
        Ok(Some(space))
    }
}

// --- Snapshot document ---

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnapshotPart {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(flatten)]
    pub placement: Placement,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnapshotTooth {
    #[serde(rename = "inRow", default)]
    pub in_row: String,
    #[serde(flatten)]
    pub placement: Placement,
    #[serde(default)]
    pub parts: Vec<SnapshotPart>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnapshotImplant {
    #[serde(rename = "inRow", default)]
    pub in_row: String,
    #[serde(flatten)]
    pub placement: Placement,
    #[serde(default)]
    pub parts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartView {
    #[serde(default)]
    pub rows: BTreeMap<String, Placement>,
    #[serde(default)]
    pub teeth: BTreeMap<String, Vec<SnapshotTooth>>,
    #[serde(default)]
    pub implants: BTreeMap<String, Vec<SnapshotImplant>>,
}

/// Occlusal entry of the older layout format.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LegacyEntry {
    #[serde(flatten)]
    pub placement: Placement,
    #[serde(default)]
    pub parts: Vec<SnapshotPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyTeeth {
    Many(Vec<LegacyEntry>),
    One(LegacyEntry),
}

impl LegacyTeeth {
    pub fn entries(&self) -> &[LegacyEntry] {
        match self {
            LegacyTeeth::Many(v) => v,
            LegacyTeeth::One(e) => std::slice::from_ref(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LegacyArch {
    #[serde(default)]
    pub teeth: BTreeMap<String, LegacyTeeth>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LegacyOcclusal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<LegacyArch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<LegacyArch>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Views {
    #[serde(default)]
    pub chart: ChartView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oclusal: Option<LegacyOcclusal>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    #[serde(default)]
    pub views: Views,
}

impl LayoutSnapshot {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// --- Explicit layout ---

/// One placed fragment of an explicit layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplicitEntry {
    pub fragment: String,
    pub row: i64,
    pub position: [f64; 3],
    /// Radians, XYZ order
    pub rotation: [f64; 3],
}

impl TryFrom<&Value> for ExplicitEntry {
    type Error = String;

    fn try_from(value: &Value) -> std::result::Result<Self, String> {
        let items = value.as_array().ok_or("entry is not an array")?;
        let (head, rest) = items.split_first().ok_or("empty entry")?;
        let fragment = head.as_str().ok_or("fragment id is not a string")?.to_string();
        let numbers = rest
            .iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| format!("non-numeric field in entry for '{}'", fragment))?;
        let (row, n) = match numbers.len() {
            7 => (numbers[0], &numbers[1..]),
            6 => (0.0, &numbers[..]),
            len => return Err(format!("entry for '{}' has {} numeric fields", fragment, len)),
        };
        if row.fract() != 0.0 {
            return Err(format!("row index {} for '{}' is not an integer", row, fragment));
        }
        Ok(Self {
            fragment,
            row: row as i64,
            position: [n[0], n[1], n[2]],
            rotation: [n[3], n[4], n[5]],
        })
    }
}

impl From<&ExplicitEntry> for Value {
    fn from(e: &ExplicitEntry) -> Self {
        let mut items = vec![Value::from(e.fragment.clone()), Value::from(e.row)];
        items.extend(e.position.iter().chain(&e.rotation).map(|&v| Value::from(v)));
        Value::Array(items)
    }
}

/// Parsed explicit layout. Malformed entries are kept aside as messages
/// so one bad line does not reject the whole file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Value>", into = "Vec<Value>")]
pub struct ExplicitLayout {
    pub entries: Vec<ExplicitEntry>,
    pub rejected: Vec<String>,
}

impl From<Vec<Value>> for ExplicitLayout {
    fn from(values: Vec<Value>) -> Self {
        let mut layout = ExplicitLayout::default();
        for (i, v) in values.iter().enumerate() {
            match ExplicitEntry::try_from(v) {
                Ok(e) => layout.entries.push(e),
                Err(why) => layout.rejected.push(format!("entry {}: {}", i, why)),
            }
        }
        layout
    }
}

impl From<ExplicitLayout> for Vec<Value> {
    fn from(layout: ExplicitLayout) -> Self {
        layout.entries.iter().map(Value::from).collect()
    }
}

impl ExplicitLayout {
    pub fn new(entries: Vec<ExplicitEntry>) -> Self {
        Self {
            entries,
            rejected: Vec::new(),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// --- Export ---

fn relative(graph: &SceneGraph, frame: NodeKey, key: NodeKey) -> Result<Trs> {
    Ok(Trs::relative_to(&graph.world_matrix(frame), &graph.world_matrix(key))?)
}

/// Part roots (nodes carrying a part label) below `scope`, skipping implants.
fn part_roots(graph: &SceneGraph, scope: NodeKey) -> Vec<NodeKey> {
    graph
        .descendants(scope)
        .into_iter()
        .filter(|&k| {
            graph.node(k).is_some_and(|n| {
                n.tags.part_label.is_some() && n.tags.component_type != Some(ComponentType::Implant)
            })
        })
        .collect()
}

fn snapshot_part(graph: &SceneGraph, frame: NodeKey, key: NodeKey) -> Result<Option<SnapshotPart>> {
    let Some(node) = graph.node(key) else {
        return Ok(None);
    };
    Ok(Some(SnapshotPart {
        id: export_name(node).to_string(),
        component: node.tags.component_type.map(|t| t.as_str().to_string()),
        placement: Placement::local(&relative(graph, frame, key)?),
    }))
}

impl Chart {
    fn row_name(&self, key: NodeKey) -> String {
        self.graph.node(key).map(|n| n.name.clone()).unwrap_or_default()
    }

    /// Writes the assembled chart as a snapshot document.
    ///
    /// Rows carry world transforms; teeth, parts and implants carry local
    /// ones, so importing the document reproduces the current placement.
    pub fn export_snapshot(&self) -> Result<LayoutSnapshot> {
        let g = &self.graph;
        let mut view = ChartView::default();

        let row_keys = self.rows.iter().map(|(_, k)| k).chain(self.placeholders.iter().copied());
        for key in row_keys {
            let world = Trs::from_matrix(&g.world_matrix(key));
            view.rows.insert(self.row_name(key), Placement::world(&world));
        }

        for tooth in self.teeth.values() {
            let Some(node) = g.node(tooth.group) else { continue };
            let mut parts = Vec::new();
            for key in part_roots(g, tooth.group) {
                parts.extend(snapshot_part(g, tooth.group, key)?);
            }
            view.teeth.entry(tooth.tooth.to_string()).or_default().push(SnapshotTooth {
                in_row: tooth.row.name().to_string(),
                placement: Placement::local(&node.transform),
                parts,
            });
        }

        for (tooth, &pivot) in &self.pivots {
            let Some(node) = g.node(pivot) else { continue };
            let mut parts: Vec<SnapshotPart> = Vec::new();
            for key in g.mesh_descendants(pivot) {
                if let Some(part) = snapshot_part(g, pivot, key)? {
                    if !parts.iter().any(|p| p.id == part.id) {
                        parts.push(part);
                    }
                }
            }
            let in_row = g.parent(pivot).map(|r| self.row_name(r)).unwrap_or_default();
            view.teeth.entry(tooth.to_string()).or_default().push(SnapshotTooth {
                in_row,
                placement: Placement::local(&node.transform),
                parts,
            });
        }

        for implant in &self.implants {
            let Some(node) = g.node(implant.group) else { continue };
            let parts = g
                .children(implant.group)
                .iter()
                .filter_map(|&c| g.node(c).map(|n| export_name(n).to_string()))
                .collect();
            let in_row = self
                .teeth
                .values()
                .find(|t| t.group == implant.tooth_group)
                .map(|t| t.row)
                .unwrap_or_else(|| RowId::vestibular(implant.tooth.arch()));
            view.implants
                .entry(implant.tooth.to_string())
                .or_default()
                .push(SnapshotImplant {
                    in_row: in_row.name().to_string(),
                    placement: Placement::local(&node.transform),
                    parts,
                });
        }

        Ok(LayoutSnapshot {
            views: Views {
                chart: view,
                oclusal: None,
            },
        })
    }
}
