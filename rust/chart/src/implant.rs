// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Implant placement by anatomical landmarks.
//!
//! Placement runs in three passes:
//!
//! 1. **Landmark**: each tooth with a nucleus gets an implant instance whose
//!    abutment is centered (X/Z) on the nucleus and whose abutment bottom
//!    sits at `nucleus center Y + arch offset`.
//! 2. **Calibration**: per arch, the reference tooth's implant-top minus
//!    canal-top delta is measured once and reproduced on every other tooth
//!    of that arch that has a canal.
//! 3. **Pruning**: implant-only teeth lose their abutment.

use std::f64::consts::PI;
use std::sync::Arc;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use dentchart_geometry::{EulerXyz, Trs};
use dentchart_scene::{ArchSide, ComponentType, Node, NodeKey, NodeTags, SceneGraph, ToothId};

use crate::error::Result;
use crate::layout::world_delta_to_local;
use crate::store::Prototype;

/// Reference tooth per arch for the calibration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTeeth {
    pub upper: u8,
    pub lower: u8,
}

impl Default for ReferenceTeeth {
    fn default() -> Self {
        Self { upper: 11, lower: 41 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImplantConfig {
    pub enabled: bool,
    /// Fragments making up one implant
    pub files: Vec<String>,
    /// Case-insensitive tokens marking abutment parts
    pub abutment_pattern: Vec<String>,
    pub upper_offset: f64,
    pub lower_offset: f64,
    pub reference_teeth: ReferenceTeeth,
    /// Teeth that receive the fixture without its abutment
    pub implant_only_teeth: Vec<u8>,
    pub calibrate: bool,
}

impl Default for ImplantConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            files: vec!["IMP11_ABU.obj".into(), "IMP11_IMP.obj".into()],
            abutment_pattern: vec!["ABU".into(), "APU".into()],
            upper_offset: 0.0,
            lower_offset: -7.0,
            reference_teeth: ReferenceTeeth::default(),
            implant_only_teeth: vec![18, 28],
            calibrate: true,
        }
    }
}

impl ImplantConfig {
    pub fn arch_offset(&self, arch: ArchSide) -> f64 {
        match arch {
            ArchSide::Upper => self.upper_offset,
            ArchSide::Lower => self.lower_offset,
        }
    }

    pub fn reference_for(&self, arch: ArchSide) -> u8 {
        match arch {
            ArchSide::Upper => self.reference_teeth.upper,
            ArchSide::Lower => self.reference_teeth.lower,
        }
    }

    pub fn is_abutment_label(&self, label: &str) -> bool {
        let label = label.to_uppercase();
        self.abutment_pattern
            .iter()
            .any(|p| !p.is_empty() && label.contains(&p.to_uppercase()))
    }

    /// Node label, fragment or name matches the abutment pattern.
    pub fn is_abutment(&self, node: &Node) -> bool {
        [node.tags.part_label.as_deref(), node.tags.source_base.as_deref(), Some(node.name.as_str())]
            .into_iter()
            .flatten()
            .any(|l| self.is_abutment_label(l))
    }

    pub fn is_implant_only(&self, tooth: ToothId) -> bool {
        self.implant_only_teeth.contains(&tooth.number())
    }
}

/// Where one tooth's implant may go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImplantSite {
    pub tooth: ToothId,
    pub tooth_group: NodeKey,
    /// The tooth's `Implant` subgroup
    pub parent: NodeKey,
}

/// Outcome for one placed implant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImplantPlacement {
    pub tooth: ToothId,
    #[serde(skip)]
    pub group: NodeKey,
    #[serde(skip)]
    pub tooth_group: NodeKey,
    pub calibrated: bool,
    pub abutment_pruned: bool,
}

pub fn implant_name(tooth: ToothId) -> String {
    format!("tooth-{}-implant", tooth)
}

fn translate_world(graph: &mut SceneGraph, key: NodeKey, delta: Vector3<f64>) -> Result<()> {
    let local = world_delta_to_local(graph, graph.parent(key), delta);
    graph.translate(key, local)?;
    Ok(())
}

fn top_of(graph: &SceneGraph, key: NodeKey, ty: Option<ComponentType>) -> Option<f64> {
    let bounds = match ty {
        Some(ty) => graph.component_bounds(key, ty),
        None => graph.world_bounds(key),
    };
    (!bounds.is_empty()).then_some(bounds.max.y)
}

/// Landmark pass for one site. `None` when the tooth has no nucleus or the
/// implant parts carry no geometry.
fn place_one(
    graph: &mut SceneGraph,
    site: &ImplantSite,
    parts: &[Arc<Prototype>],
    cfg: &ImplantConfig,
) -> Result<Option<ImplantPlacement>> {
    let Some(nucleus) = graph
        .component_bounds(site.tooth_group, ComponentType::Nucleus)
        .center()
    else {
        return Ok(None);
    };

    let arch = site.tooth.arch();
    let rotation = match arch {
        ArchSide::Upper => EulerXyz::default(),
        ArchSide::Lower => EulerXyz::new(0.0, 0.0, PI),
    };
    let tags = NodeTags::for_tooth(site.tooth).with_component(ComponentType::Implant);
    let group = graph.insert(
        site.parent,
        Node::group(implant_name(site.tooth))
            .with_tags(tags.clone())
            .with_transform(Trs::identity().with_rotation(rotation)),
    )?;
    for part in parts {
        part.instantiate_into(graph, group, Trs::identity(), tags.clone())?;
    }

    let abutment = graph.world_bounds_where(group, |n| cfg.is_abutment(n));
    let landmark = if abutment.is_empty() {
        graph.world_bounds(group)
    } else {
        abutment
    };
    let Some(center) = landmark.center() else {
        graph.remove(group)?;
        return Ok(None);
    };

    let target_y = nucleus.y + cfg.arch_offset(arch);
    let delta = Vector3::new(
        nucleus.x - center.x,
        target_y - landmark.min.y,
        nucleus.z - center.z,
    );
    translate_world(graph, group, delta)?;

    Ok(Some(ImplantPlacement {
        tooth: site.tooth,
        group,
        tooth_group: site.tooth_group,
        calibrated: false,
        abutment_pruned: false,
    }))
}

/// Measure-once/apply-everywhere vertical calibration for one arch.
///
/// The reference is the configured tooth when it has a canal, otherwise the
/// first placed tooth of the arch with a canal.
fn calibrate_arch(
    graph: &mut SceneGraph,
    placed: &mut [ImplantPlacement],
    arch: ArchSide,
    cfg: &ImplantConfig,
) -> Result<Option<f64>> {
    let view: &SceneGraph = graph;
    let eligible: Vec<(usize, f64)> = placed
        .iter()
        .enumerate()
        .filter(|(_, p)| p.tooth.arch() == arch)
        .filter_map(|(i, p)| top_of(view, p.tooth_group, Some(ComponentType::Canal)).map(|t| (i, t)))
        .collect();

    let wanted = cfg.reference_for(arch);
    let Some(&(ref_index, ref_canal_top)) = eligible
        .iter()
        .find(|(i, _)| placed[*i].tooth.number() == wanted)
        .or_else(|| eligible.first())
    else {
        return Ok(None);
    };

    let Some(ref_top) = top_of(graph, placed[ref_index].group, None) else {
        return Ok(None);
    };
    let delta = ref_top - ref_canal_top;
    debug!(
        arch = ?arch,
        reference = %placed[ref_index].tooth,
        delta,
        "implant calibration measured"
    );

    for &(i, canal_top) in &eligible {
        if let Some(top) = top_of(graph, placed[i].group, None) {
            let dy = canal_top + delta - top;
            if dy.abs() > 1e-12 {
                translate_world(graph, placed[i].group, Vector3::new(0.0, dy, 0.0))?;
            }
        }
        placed[i].calibrated = true;
    }
    Ok(Some(delta))
}

/// Places, calibrates and prunes implants for every site.
pub fn place_implants(
    graph: &mut SceneGraph,
    sites: &[ImplantSite],
    parts: &[Arc<Prototype>],
    cfg: &ImplantConfig,
) -> Result<Vec<ImplantPlacement>> {
    if parts.is_empty() {
        return Ok(Vec::new());
    }

    let mut placed = Vec::new();
    for site in sites {
        if let Some(p) = place_one(graph, site, parts, cfg)? {
            placed.push(p);
        }
    }

    if cfg.calibrate {
        for arch in [ArchSide::Upper, ArchSide::Lower] {
            calibrate_arch(graph, &mut placed, arch, cfg)?;
        }
    }

    for p in placed.iter_mut().filter(|p| cfg.is_implant_only(p.tooth)) {
        let doomed: Vec<NodeKey> = graph
            .children(p.group)
            .iter()
            .copied()
            .filter(|&c| graph.node(c).is_some_and(|n| cfg.is_abutment(n)))
            .collect();
        for child in &doomed {
            graph.remove(*child)?;
        }
        p.abutment_pruned = !doomed.is_empty();
    }

    Ok(placed)
}
