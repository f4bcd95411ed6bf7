// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Implant calibration and the explicit / snapshot layout modes.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::Arc;

use approx::assert_relative_eq;
use dentchart_chart::{
    Assembler, Chart, ChartConfig, LayoutMode, LayoutSnapshot, Manifest, MemoryLoader, PrototypeStore, RowId,
    ToothEntry,
};
use dentchart_geometry::Aabb;
use dentchart_scene::{ArchSide, ComponentType, ToothId};

fn with_tooth(loader: MemoryLoader, tooth: u8, x: f32, canal_top: f32) -> MemoryLoader {
    let name = |suffix: &str| format!("D{}{}", tooth, suffix);
    loader
        .with_cuboid(&name("C_V"), [x, 0.0, 0.0], [x + 1.0, 2.0, 1.0])
        .with_cuboid(&name("R_V"), [x + 0.2, -3.0, 0.2], [x + 0.8, 0.0, 0.8])
        .with_cuboid(&name("R_CANAL"), [x + 0.4, -2.5, 0.4], [x + 0.6, canal_top, 0.6])
        .with_cuboid(&name("N_V"), [x + 0.3, -1.0, 0.3], [x + 0.7, 0.5, 0.7])
}

fn store() -> PrototypeStore {
    let loader = MemoryLoader::new()
        .with_cuboid("IMP11_ABU", [-0.5, 0.0, -0.5], [0.5, 1.0, 0.5])
        .with_cuboid("IMP11_IMP", [-0.3, -4.0, -0.3], [0.3, 0.0, 0.3]);
    let loader = [(11, 0.0, 0.5), (21, 2.0, 0.8), (18, 4.0, 0.6), (41, 0.0, 0.5), (31, 2.0, 0.3)]
        .into_iter()
        .fold(loader, |l, (tooth, x, canal)| with_tooth(l, tooth, x, canal));
    PrototypeStore::new(Arc::new(loader))
}

fn manifest(teeth: &[u8]) -> Manifest {
    let teeth = teeth
        .iter()
        .map(|t| {
            let entry = ToothEntry {
                crown: vec![format!("D{}C_V.obj", t)],
                root: vec![format!("D{}R_V.obj", t), format!("D{}R_CANAL.obj", t)],
                nucleus: vec![format!("D{}N_V.obj", t)],
                position_hint: None,
            };
            (t.to_string(), entry)
        })
        .collect::<BTreeMap<_, _>>();
    Manifest { teeth, notes: None }
}

fn tooth(n: u8) -> ToothId {
    ToothId::new(n).unwrap()
}

async fn derived(store: &PrototypeStore, teeth: &[u8]) -> Chart {
    let config = ChartConfig::default();
    Assembler::new(store, &config)
        .assemble(&manifest(teeth), &LayoutMode::Derived)
        .await
        .unwrap()
}

fn assert_same_box(a: &Aabb, b: &Aabb) {
    assert!(!a.is_empty() && !b.is_empty());
    assert_relative_eq!((a.min - b.min).norm(), 0.0, epsilon = 1e-6);
    assert_relative_eq!((a.max - b.max).norm(), 0.0, epsilon = 1e-6);
}

#[tokio::test]
async fn test_implant_calibration_is_shared_per_arch() {
    let store = store();
    let chart = derived(&store, &[11, 21, 41, 31]).await;
    assert_eq!(chart.implants.len(), 4);

    for arch in [ArchSide::Upper, ArchSide::Lower] {
        let deltas: Vec<f64> = chart
            .implants
            .iter()
            .filter(|p| p.tooth.arch() == arch)
            .map(|p| {
                assert!(p.calibrated);
                let implant_top = chart.graph.world_bounds(p.group).max.y;
                let canal_top = chart.graph.component_bounds(p.tooth_group, ComponentType::Canal).max.y;
                implant_top - canal_top
            })
            .collect();
        assert_eq!(deltas.len(), 2);
        assert_relative_eq!(deltas[0], deltas[1], epsilon = 1e-6);
    }

    for p in chart.implants.iter().filter(|p| p.tooth.arch() == ArchSide::Lower) {
        let rotation = chart.graph.node(p.group).unwrap().transform.rotation;
        assert_relative_eq!(rotation.z, PI, epsilon = 1e-12);
    }
}

#[tokio::test]
async fn test_implant_only_teeth_lose_abutment() {
    let store = store();
    let chart = derived(&store, &[18, 11]).await;

    let only = chart.implants.iter().find(|p| p.tooth == tooth(18)).unwrap();
    assert!(only.abutment_pruned);
    let children = chart.graph.children(only.group);
    assert_eq!(children.len(), 1);
    assert_eq!(chart.graph.node(children[0]).unwrap().name, "IMP11_IMP");

    let full = chart.implants.iter().find(|p| p.tooth == tooth(11)).unwrap();
    assert!(!full.abutment_pruned);
    assert_eq!(chart.graph.children(full.group).len(), 2);
}

#[tokio::test]
async fn test_snapshot_reproduces_placement() {
    let store = store();
    let teeth = [11, 41];
    let first = derived(&store, &teeth).await;

    let json = first.export_snapshot().unwrap().to_json().unwrap();
    let snapshot = LayoutSnapshot::from_json_str(&json).unwrap();
    assert_eq!(snapshot.views.chart.rows.len(), 4);
    assert_eq!(snapshot.views.chart.teeth["11"].len(), 2);

    let config = ChartConfig::default();
    let second = Assembler::new(&store, &config)
        .assemble(&manifest(&teeth), &LayoutMode::Snapshot(snapshot))
        .await
        .unwrap();

    for label in ["D11C_V", "D11N_V", "D41R_V", "D41R_CANAL"] {
        let a = first.graph.world_bounds(first.find_part(label).unwrap());
        let b = second.graph.world_bounds(second.find_part(label).unwrap());
        assert_same_box(&a, &b);
    }
    for t in teeth {
        let t = tooth(t);
        assert_same_box(
            &first.graph.world_bounds(first.pivots[&t]),
            &second.graph.world_bounds(second.pivots[&t]),
        );
    }

    assert_eq!(second.implants.len(), first.implants.len());
    for (a, b) in first.implants.iter().zip(&second.implants) {
        assert_eq!(a.tooth, b.tooth);
        assert_same_box(&first.graph.world_bounds(a.group), &second.graph.world_bounds(b.group));
    }

    assert_eq!(second.report.teeth_per_row, [1, 1, 1, 1]);
    assert_eq!(second.report.local_transforms, 4);
    assert_eq!(second.report.world_transforms, 0);
    assert!(second.report.is_clean(), "{:?}", second.report.warnings);
}

#[tokio::test]
async fn test_explicit_layout_groups_by_tooth() {
    let store = store();
    let mut config = ChartConfig::default();
    config.implant.enabled = false;
    let mode = LayoutMode::from_json_str(
        r#"[
            ["D11C_V.obj", 0, 5, 0, 0, 0, 0, 0],
            ["D11R_V.obj", 0, 5, 0, 0, 0, 0, 0],
            ["D41C_V.obj", 3, 0, 0, 0, 0, 0, 3.14159],
            ["D21C_V.obj", 9, 0, 0, 0, 0, 0, 0]
        ]"#,
    )
    .unwrap();

    let mut chart = Assembler::new(&store, &config)
        .assemble(&Manifest::default(), &mode)
        .await
        .unwrap();

    let upper = *chart.tooth(tooth(11)).unwrap();
    assert_eq!(upper.row, RowId::VestibularUpper);
    assert_eq!(chart.graph.children(upper.subgroup(ComponentType::Tooth)).len(), 1);
    assert_eq!(chart.graph.children(upper.subgroup(ComponentType::Root)).len(), 1);
    assert_eq!(chart.tooth(tooth(41)).unwrap().row, RowId::VestibularLower);

    assert_eq!(chart.report.teeth_per_row, [1, 0, 0, 1]);
    assert_eq!(chart.report.warnings.len(), 1);
    assert!(chart.report.warnings[0].contains("D21C_V"));

    let before = chart.bounds();
    assert_eq!(chart.group_by_tooth().unwrap(), 0);
    assert_same_box(&before, &chart.bounds());
}

#[tokio::test]
async fn test_undeclared_row_becomes_placeholder() {
    let store = store();
    let config = ChartConfig::default();
    let mode = LayoutMode::from_json_str(
        r#"{ "views": { "chart": {
            "teeth": {
                "11": [ { "inRow": "mystery", "transformLocal": { "position": { "x": 3 } },
                          "parts": [ { "id": "D11C_V" } ] } ],
                "21": [ { "inRow": "chart-row-vest-up", "parts": [ { "id": "D21C_V", "type": "dente" } ] } ]
            }
        } } }"#,
    )
    .unwrap();

    let chart = Assembler::new(&store, &config)
        .assemble(&Manifest::default(), &mode)
        .await
        .unwrap();

    assert_eq!(chart.placeholders.len(), 1);
    let placeholder = chart.placeholders[0];
    let crown = chart.find_part("D11C_V").unwrap();
    assert!(chart.graph.is_descendant_of(crown, placeholder));
    assert_relative_eq!(chart.graph.world_bounds(crown).min.x, 3.0, epsilon = 1e-9);

    // Resolvable but undeclared: lands in the canonical row with a warning
    let upper = chart.tooth(tooth(21)).unwrap();
    assert_eq!(chart.graph.children(upper.subgroup(ComponentType::Tooth)).len(), 1);
    assert_eq!(chart.report.teeth_per_row, [1, 0, 0, 0]);
    assert_eq!(chart.report.warnings.len(), 2);
    assert_eq!(chart.report.local_transforms, 1);
}
