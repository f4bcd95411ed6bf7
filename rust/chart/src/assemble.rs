// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chart assembly.
//!
//! A build turns a manifest plus a layout mode into a [`Chart`]:
//!
//! - **Derived**: one tooth group per manifest entry in the vestibular row of
//!   its arch, implants and occlusal pivots computed, rows stacked.
//! - **Explicit**: fragments placed from a tuple list, then grouped by tooth.
//! - **Snapshot**: every row, tooth, part and implant placed from a
//!   previously exported document. No layout pass runs afterwards.
//!
//! Missing or broken fragments are recorded in the [`BuildReport`] and the
//! build continues without them.

use std::collections::BTreeMap;
use std::sync::Arc;

use nalgebra::Vector3;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, info};

use dentchart_geometry::{Aabb, EulerXyz, Trs};
use dentchart_scene::{ComponentType, Node, NodeKey, NodeTags, SceneGraph, ToothId};

use crate::classify::{classify, fragment_base, tooth_id_from_name};
use crate::config::ChartConfig;
use crate::error::{Error, Result};
use crate::implant::{implant_name, place_implants, ImplantPlacement, ImplantSite};
use crate::layout::layout_rows;
use crate::manifest::Manifest;
use crate::occlusal::{build_pivot, pivot_name};
use crate::report::BuildReport;
use crate::rows::{ChartRows, RowId};
use crate::snapshot::{ExplicitLayout, LayoutSnapshot, Placement, SnapshotPart, Space};
use crate::store::{Prototype, PrototypeStore};

/// How the chart is laid out.
#[derive(Debug, Clone, Default)]
pub enum LayoutMode {
    /// Placement computed from the manifest alone.
    #[default]
    Derived,
    Explicit(ExplicitLayout),
    Snapshot(LayoutSnapshot),
}

impl LayoutMode {
    /// Detects the document kind: a top-level array is an explicit layout,
    /// an object with `views` is a snapshot.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        if value.is_array() {
            Ok(LayoutMode::Explicit(serde_json::from_value(value)?))
        } else if value.get("views").is_some() {
            Ok(LayoutMode::Snapshot(serde_json::from_value(value)?))
        } else {
            Err(Error::Config("layout document is neither a tuple list nor a snapshot".into()))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LayoutMode::Derived => "derived",
            LayoutMode::Explicit(_) => "explicit",
            LayoutMode::Snapshot(_) => "snapshot",
        }
    }
}

/// A `tooth-##` group and its five component subgroups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToothGroup {
    pub tooth: ToothId,
    pub row: RowId,
    pub group: NodeKey,
    subgroups: [NodeKey; 5],
}

impl ToothGroup {
    pub fn subgroup(&self, ty: ComponentType) -> NodeKey {
        self.subgroups[ty as usize]
    }

    pub fn subgroups(&self) -> impl Iterator<Item = (ComponentType, NodeKey)> + '_ {
        ComponentType::ALL.into_iter().zip(self.subgroups)
    }

    fn owns(&self, key: NodeKey) -> bool {
        self.group == key || self.subgroups.contains(&key)
    }
}

/// An assembled chart.
#[derive(Debug)]
pub struct Chart {
    pub graph: SceneGraph,
    pub rows: ChartRows,
    pub teeth: BTreeMap<(RowId, ToothId), ToothGroup>,
    /// Occlusal pivot per tooth
    pub pivots: BTreeMap<ToothId, NodeKey>,
    pub implants: Vec<ImplantPlacement>,
    /// Row groups outside the four canonical rows
    pub placeholders: Vec<NodeKey>,
    pub report: BuildReport,
}

impl Chart {
    /// An empty chart: root plus the four rows.
    pub fn new() -> Result<Self> {
        let mut graph = SceneGraph::new("chart");
        let rows = ChartRows::create(&mut graph)?;
        Ok(Self {
            graph,
            rows,
            teeth: BTreeMap::new(),
            pivots: BTreeMap::new(),
            implants: Vec::new(),
            placeholders: Vec::new(),
            report: BuildReport::default(),
        })
    }

    pub fn root(&self) -> NodeKey {
        self.graph.root()
    }

    /// The vestibular group of a tooth.
    pub fn tooth(&self, id: ToothId) -> Option<&ToothGroup> {
        self.teeth.get(&(RowId::vestibular(id.arch()), id))
    }

    pub fn bounds(&self) -> Aabb {
        self.graph.world_bounds(self.graph.root())
    }

    /// Finds the part root carrying `label` (a fragment name, extension optional).
    pub fn find_part(&self, label: &str) -> Option<NodeKey> {
        let base = fragment_base(label);
        self.graph
            .descendants(self.graph.root())
            .into_iter()
            .find(|&k| {
                self.graph
                    .node(k)
                    .and_then(|n| n.tags.part_label.as_deref())
                    .is_some_and(|l| fragment_base(l) == base)
            })
    }

    /// Returns the group of `tooth` in `row`, creating it with its subgroups.
    pub(crate) fn ensure_tooth_group(&mut self, tooth: ToothId, row: RowId) -> Result<ToothGroup> {
        if let Some(existing) = self.teeth.get(&(row, tooth)) {
            return Ok(*existing);
        }
        let tags = NodeTags::for_tooth(tooth);
        let group = self.graph.insert(
            self.rows.get(row),
            Node::group(format!("tooth-{}", tooth)).with_tags(tags.clone()),
        )?;
        let mut subgroups = [group; 5];
        for ty in ComponentType::ALL {
            subgroups[ty as usize] = self.graph.insert(
                group,
                Node::group(ty.subgroup_name()).with_tags(tags.clone().with_component(ty)),
            )?;
        }
        let created = ToothGroup {
            tooth,
            row,
            group,
            subgroups,
        };
        self.teeth.insert((row, tooth), created);
        Ok(created)
    }

    /// Moves every tagged part in the vestibular rows into the subgroup of
    /// its tooth and component, keeping world placement. Groups left empty
    /// by the move are removed. Running it again moves nothing.
    ///
    /// Returns the number of parts moved.
    pub fn group_by_tooth(&mut self) -> Result<usize> {
        let mut moves = Vec::new();
        for row in [RowId::VestibularUpper, RowId::VestibularLower] {
            for key in self.graph.descendants(self.rows.get(row)) {
                let Some(node) = self.graph.node(key) else { continue };
                if node.tags.part_label.is_none() {
                    continue;
                }
                let Some(tooth) = node.tags.tooth_id else { continue };
                let ty = node.tags.component_type.unwrap_or(ComponentType::Tooth);
                let placed = self
                    .teeth
                    .get(&(row, tooth))
                    .is_some_and(|t| self.graph.is_descendant_of(key, t.group));
                if !placed {
                    moves.push((key, row, tooth, ty));
                }
            }
        }

        let mut vacated = Vec::new();
        for &(key, row, tooth, ty) in &moves {
            let target = self.ensure_tooth_group(tooth, row)?;
            if let Some(old) = self.graph.parent(key) {
                vacated.push(old);
            }
            self.graph.attach(key, target.subgroup(ty))?;
        }

        vacated.sort_unstable();
        vacated.dedup();
        for old in vacated {
            if self.is_removable(old) {
                self.graph.remove(old)?;
            }
        }
        if !moves.is_empty() {
            debug!(moved = moves.len(), teeth = self.teeth.len(), "parts grouped by tooth");
        }
        Ok(moves.len())
    }

    fn is_removable(&self, key: NodeKey) -> bool {
        key != self.graph.root()
            && self.rows.row_of(key).is_none()
            && !self.placeholders.contains(&key)
            && !self.teeth.values().any(|t| t.owns(key))
            && self.graph.node(key).is_some_and(Node::is_group)
            && self.graph.children(key).is_empty()
    }

    /// Hides groups whose children are all hidden; rows are never hidden.
    pub fn hide_empty_groups(&mut self) {
        let mut keep: Vec<NodeKey> = self.rows.keys().to_vec();
        keep.extend(self.placeholders.iter().copied());
        let root = self.graph.root();
        self.graph.hide_empty_groups(root, &keep);
    }

    fn count_teeth(&mut self) {
        for (row, key) in self.rows.iter() {
            self.report.teeth_per_row[row.index()] = self
                .graph
                .children(key)
                .iter()
                .filter(|&&c| {
                    self.graph.node(c).is_some_and(|n| {
                        n.is_group() && n.tags.tooth_id.is_some() && n.tags.part_label.is_none()
                    })
                })
                .count();
        }
    }
}

type Loaded = FxHashMap<String, Result<Arc<Prototype>>>;

/// Instantiates one loaded fragment, recording the outcome through `count`.
fn place_part(
    chart: &mut Chart,
    loaded: &Loaded,
    fragment: &str,
    parent: NodeKey,
    transform: Trs,
    tags: NodeTags,
    count: fn(&mut BuildReport, bool),
) -> Result<Option<NodeKey>> {
    match loaded.get(fragment_base(fragment)) {
        Some(Ok(proto)) => {
            let key = proto.instantiate_into(&mut chart.graph, parent, transform, tags)?;
            count(&mut chart.report, true);
            Ok(Some(key))
        }
        Some(Err(e)) => {
            count(&mut chart.report, false);
            chart.report.warn(e);
            Ok(None)
        }
        None => {
            count(&mut chart.report, false);
            chart.report.warn(&Error::fragment(fragment, "not requested"));
            Ok(None)
        }
    }
}

/// Applies a placement, downgrading recoverable failures to warnings.
fn place(chart: &mut Chart, placement: &Placement, key: NodeKey) -> Result<Option<Space>> {
    match placement.apply(&mut chart.graph, key) {
        Ok(space) => Ok(space),
        Err(e) if e.is_recoverable() => {
            chart.report.warn(&e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Builds charts from a manifest, a layout mode and a shared prototype store.
pub struct Assembler<'a> {
    store: &'a PrototypeStore,
    config: &'a ChartConfig,
}

impl<'a> Assembler<'a> {
    pub fn new(store: &'a PrototypeStore, config: &'a ChartConfig) -> Self {
        Self { store, config }
    }

    pub async fn assemble(&self, manifest: &Manifest, mode: &LayoutMode) -> Result<Chart> {
        let mut chart = Chart::new()?;
        info!(mode = mode.name(), teeth = manifest.teeth.len(), "chart build started");

        let relayout = match mode {
            LayoutMode::Derived => {
                self.derived(manifest, &mut chart).await?;
                true
            }
            LayoutMode::Explicit(layout) => {
                self.explicit(manifest, layout, &mut chart).await?;
                true
            }
            LayoutMode::Snapshot(snapshot) => {
                self.snapshot(manifest, snapshot, &mut chart).await?;
                false
            }
        };
        self.finish(&mut chart, relayout)?;

        info!(
            summary = %chart.report,
            warnings = chart.report.warnings.len(),
            "chart build finished"
        );
        Ok(chart)
    }

    async fn load<'f, I>(&self, fragments: I) -> Loaded
    where
        I: IntoIterator<Item = &'f str>,
    {
        self.store.preload(fragments).await.into_iter().collect()
    }

    async fn derived(&self, manifest: &Manifest, chart: &mut Chart) -> Result<()> {
        let teeth = manifest.valid_teeth();
        if teeth.is_empty() {
            return Err(Error::ManifestUnavailable("manifest lists no valid teeth".into()));
        }
        for key in manifest.invalid_keys() {
            chart
                .report
                .warn(&Error::unresolvable(key, "not a permanent FDI tooth number"));
        }

        let loaded = self.load(teeth.iter().flat_map(|(_, entry)| entry.fragments())).await;

        for (tooth, entry) in &teeth {
            let group = chart.ensure_tooth_group(*tooth, RowId::vestibular(tooth.arch()))?;
            if let Some(hint) = entry.position_hint {
                chart
                    .graph
                    .set_transform(group.group, Trs::from_translation(hint.x, hint.y, hint.z))?;
            }
            for fragment in entry.fragments() {
                let ty = classify(fragment);
                let tags = NodeTags::for_tooth(*tooth).with_component(ty);
                place_part(
                    chart,
                    &loaded,
                    fragment,
                    group.subgroup(ty),
                    Trs::identity(),
                    tags,
                    BuildReport::part,
                )?;
            }
        }

        self.attach_implants(chart).await?;
        self.build_pivots(chart)?;
        Ok(())
    }

    async fn explicit(&self, manifest: &Manifest, layout: &ExplicitLayout, chart: &mut Chart) -> Result<()> {
        for why in &layout.rejected {
            chart.report.warn(&Error::unresolvable("explicit layout", why));
        }

        let mut accepted = Vec::new();
        for entry in &layout.entries {
            let row = usize::try_from(entry.row).ok().and_then(RowId::from_index);
            let Some(row) = row else {
                chart.report.warn(&Error::unresolvable(
                    &entry.fragment,
                    format!("row index {} out of range", entry.row),
                ));
                continue;
            };
            if !manifest.is_empty() && !manifest.contains_fragment(&entry.fragment) {
                chart
                    .report
                    .warn(&Error::unresolvable(&entry.fragment, "not listed in the manifest"));
                continue;
            }
            accepted.push((entry, row));
        }

        let loaded = self.load(accepted.iter().map(|(e, _)| e.fragment.as_str())).await;

        for (entry, row) in accepted {
            let ty = classify(&entry.fragment);
            let tags = match tooth_id_from_name(&entry.fragment) {
                Some(tooth) => NodeTags::for_tooth(tooth),
                None => NodeTags::default(),
            }
            .with_component(ty);
            let [x, y, z] = entry.rotation;
            let transform = Trs {
                position: Vector3::from(entry.position),
                rotation: EulerXyz::new(x, y, z),
                scale: Vector3::repeat(1.0),
            };
            let parent = chart.rows.get(row);
            place_part(chart, &loaded, &entry.fragment, parent, transform, tags, BuildReport::part)?;
        }

        chart.group_by_tooth()?;
        self.attach_implants(chart).await?;
        Ok(())
    }

    async fn snapshot(&self, manifest: &Manifest, snapshot: &LayoutSnapshot, chart: &mut Chart) -> Result<()> {
        let view = &snapshot.views.chart;
        let mut rows = RowIndex::new(chart);

        for (name, placement) in &view.rows {
            let key = match RowId::from_name(name) {
                Some(row) => chart.rows.get(row),
                None => {
                    let root = chart.graph.root();
                    let key = chart.graph.add_group(root, name.as_str())?;
                    chart.placeholders.push(key);
                    key
                }
            };
            rows.names.insert(name.clone(), key);
            place(chart, placement, key)?;
        }

        let mut wanted: Vec<&str> = view
            .teeth
            .values()
            .flatten()
            .flat_map(|t| t.parts.iter().map(|p| p.id.as_str()))
            .filter(|id| manifest.is_empty() || manifest.contains_fragment(id))
            .collect();
        wanted.extend(view.implants.values().flatten().flat_map(|i| i.parts.iter().map(String::as_str)));
        if let Some(legacy) = &snapshot.views.oclusal {
            for arch in [&legacy.upper, &legacy.lower].into_iter().flatten() {
                for entry in arch.teeth.values().flat_map(|t| t.entries()) {
                    wanted.extend(entry.parts.iter().map(|p| p.id.as_str()));
                }
            }
        }
        let loaded = self.load(wanted).await;

        let mut tooth_nodes: FxHashMap<(NodeKey, ToothId), NodeKey> = FxHashMap::default();
        for (id, entries) in &view.teeth {
            let Some(tooth) = ToothId::parse(id) else {
                chart.report.warn(&Error::unresolvable(id, "not a permanent FDI tooth number"));
                continue;
            };
            for entry in entries {
                let row_key = rows.resolve(chart, &entry.in_row)?;
                let canonical = chart.rows.row_of(row_key);
                let (node, container) = match canonical {
                    Some(row) if !row.is_occlusal() => {
                        let group = chart.ensure_tooth_group(tooth, row)?;
                        (group.group, PartContainer::Tooth(group))
                    }
                    _ => {
                        let name = if canonical.is_some() {
                            pivot_name(tooth)
                        } else {
                            format!("tooth-{}", tooth)
                        };
                        let key = chart
                            .graph
                            .insert(row_key, Node::group(name).with_tags(NodeTags::for_tooth(tooth)))?;
                        if canonical.is_some() {
                            chart.pivots.entry(tooth).or_insert(key);
                        }
                        (key, PartContainer::Plain(key))
                    }
                };

                match place(chart, &entry.placement, node)? {
                    Some(Space::World) => chart.report.world_transforms += 1,
                    Some(Space::Local) => chart.report.local_transforms += 1,
                    None => {}
                }
                for part in &entry.parts {
                    self.snapshot_part(manifest, chart, &loaded, part, tooth, container)?;
                }
                tooth_nodes.entry((row_key, tooth)).or_insert(node);
            }
        }

        for (id, entries) in &view.implants {
            let Some(tooth) = ToothId::parse(id) else {
                chart.report.warn(&Error::unresolvable(id, "not a permanent FDI tooth number"));
                continue;
            };
            for entry in entries {
                let host = rows
                    .names
                    .get(&entry.in_row)
                    .and_then(|&row| tooth_nodes.get(&(row, tooth)))
                    .copied();
                let Some(host) = host else {
                    chart.report.warn(&Error::unresolvable(
                        format!("implant {}", id),
                        format!("no tooth {} in row '{}'", id, entry.in_row),
                    ));
                    continue;
                };
                let parent = chart
                    .teeth
                    .values()
                    .find(|t| t.group == host)
                    .map(|t| t.subgroup(ComponentType::Implant))
                    .unwrap_or(host);
                let tags = NodeTags::for_tooth(tooth).with_component(ComponentType::Implant);
                let group = chart
                    .graph
                    .insert(parent, Node::group(implant_name(tooth)).with_tags(tags.clone()))?;
                place(chart, &entry.placement, group)?;
                for file in &entry.parts {
                    place_part(
                        chart,
                        &loaded,
                        file,
                        group,
                        Trs::identity(),
                        tags.clone(),
                        BuildReport::implant_part,
                    )?;
                }
                chart.implants.push(ImplantPlacement {
                    tooth,
                    group,
                    tooth_group: host,
                    calibrated: false,
                    abutment_pruned: false,
                });
            }
        }

        if let Some(legacy) = &snapshot.views.oclusal {
            for (row, arch) in [(RowId::OcclusalUpper, &legacy.upper), (RowId::OcclusalLower, &legacy.lower)] {
                let Some(arch) = arch else { continue };
                let row_key = chart.rows.get(row);
                let populated = chart.pivots.values().any(|&p| chart.graph.parent(p) == Some(row_key));
                if populated {
                    continue;
                }
                info!(row = row.name(), "filling occlusal row from legacy section");
                for (id, teeth) in &arch.teeth {
                    let Some(tooth) = ToothId::parse(id) else {
                        chart.report.warn(&Error::unresolvable(id, "not a permanent FDI tooth number"));
                        continue;
                    };
                    for entry in teeth.entries() {
                        let pivot = chart.graph.insert(
                            row_key,
                            Node::group(pivot_name(tooth)).with_tags(NodeTags::for_tooth(tooth)),
                        )?;
                        place(chart, &entry.placement, pivot)?;
                        for part in &entry.parts {
                            self.snapshot_part(manifest, chart, &loaded, part, tooth, PartContainer::Plain(pivot))?;
                        }
                        chart.pivots.entry(tooth).or_insert(pivot);
                    }
                }
            }
        }
        Ok(())
    }

    fn snapshot_part(
        &self,
        manifest: &Manifest,
        chart: &mut Chart,
        loaded: &Loaded,
        part: &SnapshotPart,
        tooth: ToothId,
        container: PartContainer,
    ) -> Result<()> {
        if !manifest.is_empty() && !manifest.contains_fragment(&part.id) {
            chart.report.part(false);
            chart
                .report
                .warn(&Error::unresolvable(&part.id, "not listed in the manifest"));
            return Ok(());
        }
        let ty = part
            .component
            .as_deref()
            .and_then(ComponentType::from_label)
            .unwrap_or_else(|| classify(&part.id));
        let parent = match container {
            PartContainer::Tooth(group) => group.subgroup(ty),
            PartContainer::Plain(key) => key,
        };
        let tags = NodeTags::for_tooth(tooth).with_component(ty);
        if let Some(key) = place_part(chart, loaded, &part.id, parent, Trs::identity(), tags, BuildReport::part)? {
            place(chart, &part.placement, key)?;
        }
        Ok(())
    }

    async fn attach_implants(&self, chart: &mut Chart) -> Result<()> {
        let cfg = &self.config.implant;
        if !cfg.enabled {
            return Ok(());
        }
        let sites: Vec<ImplantSite> = chart
            .teeth
            .values()
            .filter(|t| !t.row.is_occlusal())
            .map(|t| ImplantSite {
                tooth: t.tooth,
                tooth_group: t.group,
                parent: t.subgroup(ComponentType::Implant),
            })
            .collect();
        if sites.is_empty() {
            return Ok(());
        }

        let mut parts = Vec::new();
        for (_, result) in self.store.preload(cfg.files.iter().map(String::as_str)).await {
            match result {
                Ok(proto) => {
                    chart.report.implant_part(true);
                    parts.push(proto);
                }
                Err(e) => {
                    chart.report.implant_part(false);
                    chart.report.warn(&e);
                }
            }
        }

        chart.implants = place_implants(&mut chart.graph, &sites, &parts, cfg)?;
        debug!(implants = chart.implants.len(), "implants placed");
        Ok(())
    }

    fn build_pivots(&self, chart: &mut Chart) -> Result<()> {
        let vestibular: Vec<ToothGroup> = chart.teeth.values().filter(|t| !t.row.is_occlusal()).copied().collect();
        for tooth in vestibular {
            let row = chart.rows.get(RowId::occlusal(tooth.tooth.arch()));
            if let Some(pivot) = build_pivot(&mut chart.graph, tooth.group, row, tooth.tooth, &self.config.occlusal)? {
                chart.pivots.insert(tooth.tooth, pivot);
            }
        }
        Ok(())
    }

    fn finish(&self, chart: &mut Chart, relayout: bool) -> Result<()> {
        let root = chart.graph.root();
        chart.graph.apply_visibility(root, &self.config.default_visibility);
        if self.config.hide_empty_groups {
            chart.hide_empty_groups();
        }
        if relayout {
            layout_rows(&mut chart.graph, &chart.rows, self.config.gaps())?;
        }
        chart.count_teeth();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum PartContainer {
    /// Parts go to the subgroup matching their component type
    Tooth(ToothGroup),
    Plain(NodeKey),
}

/// Row names seen while importing a snapshot.
struct RowIndex {
    names: FxHashMap<String, NodeKey>,
}

impl RowIndex {
    fn new(chart: &Chart) -> Self {
        let names = chart.rows.iter().map(|(row, key)| (row.name().to_string(), key)).collect();
        Self { names }
    }

    /// Resolves a row reference; unknown names get a placeholder row.
    fn resolve(&mut self, chart: &mut Chart, name: &str) -> Result<NodeKey> {
        if let Some(&key) = self.names.get(name) {
            return Ok(key);
        }
        let key = match RowId::from_name(name) {
            Some(row) => {
                chart
                    .report
                    .warn(&Error::unresolvable(name, format!("row not declared, using {}", row)));
                chart.rows.get(row)
            }
            None => {
                chart
                    .report
                    .warn(&Error::unresolvable(name, "unknown row, placeholder created"));
                let root = chart.graph.root();
                let label = if name.is_empty() { "row-unknown" } else { name };
                let key = chart.graph.add_group(root, label)?;
                chart.placeholders.push(key);
                key
            }
        };
        self.names.insert(name.to_string(), key);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;

    fn tooth(n: u8) -> ToothId {
        ToothId::new(n).unwrap()
    }

    #[test]
    fn test_layout_mode_detection() {
        let explicit = LayoutMode::from_json_str(r#"[["D11C_V.obj", 0, 1, 2, 3, 0, 0, 0]]"#).unwrap();
        assert_eq!(explicit.name(), "explicit");
        let snapshot = LayoutMode::from_json_str(r#"{ "views": { "chart": {} } }"#).unwrap();
        assert_eq!(snapshot.name(), "snapshot");
        assert!(matches!(
            LayoutMode::from_json_str(r#"{ "rows": [] }"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_tooth_group_subgroups() {
        let mut chart = Chart::new().unwrap();
        let group = chart.ensure_tooth_group(tooth(11), RowId::VestibularUpper).unwrap();
        assert_eq!(chart.graph.node(group.group).unwrap().name, "tooth-11");
        assert_eq!(chart.graph.children(group.group).len(), 5);
        for (ty, key) in group.subgroups() {
            let node = chart.graph.node(key).unwrap();
            assert_eq!(node.name, ty.subgroup_name());
            assert_eq!(node.tags.component_type, Some(ty));
        }
        let again = chart.ensure_tooth_group(tooth(11), RowId::VestibularUpper).unwrap();
        assert_eq!(again, group);
    }

    #[tokio::test]
    async fn test_grouping_moves_loose_parts_once() {
        let store = PrototypeStore::new(Arc::new(
            MemoryLoader::new()
                .with_cuboid("D11C_V", [0.0; 3], [1.0; 3])
                .with_cuboid("D11R_V", [0.0, -2.0, 0.0], [1.0, 0.0, 1.0]),
        ));
        let mut chart = Chart::new().unwrap();
        let row = chart.rows.get(RowId::VestibularUpper);
        let loose = chart.graph.add_group(row, "import").unwrap();
        chart.graph.set_transform(loose, Trs::from_translation(5.0, 0.0, 0.0)).unwrap();

        for (name, ty) in [("D11C_V", ComponentType::Tooth), ("D11R_V", ComponentType::Root)] {
            let proto = store.get(name).await.unwrap();
            let tags = NodeTags::for_tooth(tooth(11)).with_component(ty);
            proto.instantiate_into(&mut chart.graph, loose, Trs::identity(), tags).unwrap();
        }
        let before = chart.bounds();

        assert_eq!(chart.group_by_tooth().unwrap(), 2);
        assert!(!chart.graph.contains(loose));
        let group = *chart.tooth(tooth(11)).unwrap();
        assert_eq!(chart.graph.children(group.subgroup(ComponentType::Tooth)).len(), 1);
        assert_eq!(chart.graph.children(group.subgroup(ComponentType::Root)).len(), 1);
        let after = chart.bounds();
        assert!((before.min - after.min).norm() < 1e-9);
        assert!((before.max - after.max).norm() < 1e-9);

        assert_eq!(chart.group_by_tooth().unwrap(), 0);
        assert_eq!(chart.teeth.len(), 1);
    }

    #[tokio::test]
    async fn test_derived_build_counts_rows() {
        let store = PrototypeStore::new(Arc::new(
            MemoryLoader::new()
                .with_cuboid("D11C_V", [0.0; 3], [1.0, 2.0, 1.0])
                .with_cuboid("D41C_V", [0.0; 3], [1.0, 2.0, 1.0]),
        ));
        let mut config = ChartConfig::default();
        config.implant.enabled = false;
        let manifest = Manifest::from_json_str(r#"{ "teeth": { "11": { "C": ["D11C_V.obj"] }, "41": { "C": ["D41C_V.obj"] } } }"#)
            .unwrap();

        let chart = Assembler::new(&store, &config)
            .assemble(&manifest, &LayoutMode::Derived)
            .await
            .unwrap();
        assert_eq!(chart.report.teeth_per_row, [1, 1, 1, 1]);
        assert_eq!(chart.pivots.len(), 2);
        assert!(chart.report.is_clean());
    }

    #[tokio::test]
    async fn test_derived_build_rejects_empty_manifest() {
        let store = PrototypeStore::new(Arc::new(MemoryLoader::new()));
        let config = ChartConfig::default();
        let manifest = Manifest::from_json_str(r#"{ "teeth": { "99": { "C": ["D99C_V.obj"] } } }"#).unwrap();
        let result = Assembler::new(&store, &config)
            .assemble(&manifest, &LayoutMode::Derived)
            .await;
        assert!(matches!(result, Err(Error::ManifestUnavailable(_))));
    }
}
