// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Row centering and vertical stacking.

use nalgebra::{Vector3, Vector4};

use dentchart_geometry::Aabb;
use dentchart_scene::{NodeKey, Result as SceneResult, SceneGraph};

use crate::rows::{ChartRows, RowId};

/// Heights and Y centers the stacking pass produced.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RowLayout {
    pub heights: [f64; 4],
    pub offsets: [f64; 4],
    /// World shift applied to all rows after stacking
    pub recentered: Vector3<f64>,
}

/// Y center of each row when rows are stacked top to bottom with `gaps`
/// between neighbours and the whole stack is centered on zero.
///
/// `gaps[i]` separates row `i` from row `i + 1`; missing gaps count as 0.
pub fn stack_offsets(heights: &[f64], gaps: &[f64]) -> Vec<f64> {
    let gap = |i: usize| gaps.get(i).copied().unwrap_or(0.0);
    let total: f64 = heights.iter().sum::<f64>() + (0..heights.len().saturating_sub(1)).map(gap).sum::<f64>();

    let mut cursor = total / 2.0;
    let mut centers = Vec::with_capacity(heights.len());
    for (i, h) in heights.iter().enumerate() {
        centers.push(cursor - h / 2.0);
        cursor -= h + gap(i);
    }
    centers
}

/// Converts a world-space displacement into the local frame of `parent`.
pub(crate) fn world_delta_to_local(graph: &SceneGraph, parent: Option<NodeKey>, delta: Vector3<f64>) -> Vector3<f64> {
    let Some(parent) = parent else {
        return delta;
    };
    match graph.world_matrix(parent).try_inverse() {
        Some(inv) => (inv * Vector4::new(delta.x, delta.y, delta.z, 0.0)).xyz(),
        None => delta,
    }
}

/// Translates `row` so the center of its content lands on the row origin
/// in X and Y. Returns the applied world delta, or `None` for an empty row.
pub fn center_row(graph: &mut SceneGraph, row: NodeKey) -> SceneResult<Option<Vector3<f64>>> {
    let Some(center) = graph.world_bounds(row).center() else {
        return Ok(None);
    };
    let origin = graph.world_matrix(row).transform_point(&nalgebra::Point3::origin());
    let delta = Vector3::new(origin.x - center.x, origin.y - center.y, 0.0);
    let local = world_delta_to_local(graph, graph.parent(row), delta);
    graph.translate(row, local)?;
    Ok(Some(delta))
}

/// Centers every row, stacks them with `gaps` (row gap, arch gap, row
/// gap), then shifts the occupied rows so the whole chart is centered on
/// the origin in X and Y. Empty rows keep height 0 and are left where they
/// are.
pub fn layout_rows(graph: &mut SceneGraph, rows: &ChartRows, gaps: [f64; 3]) -> SceneResult<RowLayout> {
    let mut layout = RowLayout::default();
    let mut occupied = [false; 4];

    for (row, key) in rows.iter() {
        if center_row(graph, key)?.is_some() {
            occupied[row.index()] = true;
            layout.heights[row.index()] = graph.world_bounds(key).height();
        }
    }

    let offsets = stack_offsets(&layout.heights, &gaps);
    for row in RowId::ALL {
        let i = row.index();
        layout.offsets[i] = offsets[i];
        if occupied[i] {
            let key = rows.get(row);
            let local = world_delta_to_local(graph, graph.parent(key), Vector3::new(0.0, offsets[i], 0.0));
            graph.translate(key, local)?;
        }
    }

    // the stack as a whole goes back onto the origin in X and Y
    let mut all = Aabb::empty();
    for (_, key) in rows.iter() {
        all.union_with(&graph.world_bounds(key));
    }
    if let Some(center) = all.center() {
        let delta = Vector3::new(-center.x, -center.y, 0.0);
        for (row, key) in rows.iter() {
            if occupied[row.index()] {
                let local = world_delta_to_local(graph, graph.parent(key), delta);
                graph.translate(key, local)?;
            }
        }
        layout.recentered = delta;
    }

    tracing::debug!(
        heights = ?layout.heights,
        offsets = ?layout.offsets,
        recentered = ?[layout.recentered.x, layout.recentered.y],
        "rows stacked"
    );
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use dentchart_geometry::{MeshGeometry, Trs};
    use dentchart_scene::{Material, MeshRef};
    use std::sync::Arc;

    fn slab(g: &mut SceneGraph, parent: NodeKey, y0: f32, y1: f32, x_shift: f64) {
        let geometry = MeshGeometry::new(
            vec![0.0, y0, 0.0, 4.0, y0, 0.0, 4.0, y1, 1.0, 0.0, y1, 1.0],
            Some(vec![0, 1, 2, 0, 2, 3]),
            None,
        )
        .unwrap();
        let mesh = g
            .add_mesh(parent, "slab", MeshRef::new(Arc::new(geometry), Arc::new(Material::default())))
            .unwrap();
        g.set_transform(mesh, Trs::from_translation(x_shift, 0.0, 0.0)).unwrap();
    }

    #[test]
    fn test_stack_offsets_are_gap_exact() {
        let heights = [10.0, 2.0, 2.0, 10.0];
        let centers = stack_offsets(&heights, &[1.0, 10.0, 1.0]);
        assert_eq!(centers, vec![13.0, 6.0, -6.0, -13.0]);

        let bottom = |i: usize| centers[i] - heights[i] / 2.0;
        let top = |i: usize| centers[i] + heights[i] / 2.0;
        assert_relative_eq!(bottom(0) - top(1), 1.0);
        assert_relative_eq!(bottom(1) - top(2), 10.0);
        assert_relative_eq!(bottom(2) - top(3), 1.0);
        assert_relative_eq!(top(0), -bottom(3));
    }

    #[test]
    fn test_center_row_keeps_z() {
        let mut g = SceneGraph::new("chart");
        let row = g.add_group(g.root(), "row").unwrap();
        slab(&mut g, row, 3.0, 7.0, 10.0);

        let delta = center_row(&mut g, row).unwrap().unwrap();
        assert_relative_eq!(delta.x, -12.0);
        assert_relative_eq!(delta.y, -5.0);
        let c = g.world_bounds(row).center().unwrap();
        assert_relative_eq!(c.x, 0.0);
        assert_relative_eq!(c.y, 0.0);
        assert_relative_eq!(c.z, 0.5);
    }

    #[test]
    fn test_empty_row_is_noop() {
        let mut g = SceneGraph::new("chart");
        let row = g.add_group(g.root(), "row").unwrap();
        assert_eq!(center_row(&mut g, row).unwrap(), None);
        assert!(g.node(row).unwrap().transform.is_identity());
    }

    #[test]
    fn test_layout_rows_stacks_content() {
        let mut g = SceneGraph::new("chart");
        let rows = ChartRows::create(&mut g).unwrap();
        slab(&mut g, rows.get(RowId::VestibularUpper), 0.0, 10.0, 0.0);
        slab(&mut g, rows.get(RowId::OcclusalUpper), 50.0, 52.0, 3.0);
        slab(&mut g, rows.get(RowId::OcclusalLower), -8.0, -6.0, 0.0);
        slab(&mut g, rows.get(RowId::VestibularLower), 100.0, 110.0, -7.0);

        let layout = layout_rows(&mut g, &rows, [1.0, 10.0, 1.0]).unwrap();
        assert_eq!(layout.heights, [10.0, 2.0, 2.0, 10.0]);

        let b = |r: RowId| g.world_bounds(rows.get(r));
        assert_relative_eq!(b(RowId::VestibularUpper).min.y - b(RowId::OcclusalUpper).max.y, 1.0, epsilon = 1e-9);
        assert_relative_eq!(b(RowId::OcclusalUpper).min.y - b(RowId::OcclusalLower).max.y, 10.0, epsilon = 1e-9);
        assert_relative_eq!(b(RowId::OcclusalLower).min.y - b(RowId::VestibularLower).max.y, 1.0, epsilon = 1e-9);
        assert_relative_eq!(b(RowId::VestibularUpper).center().unwrap().x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_partial_chart_is_recentered() {
        let mut g = SceneGraph::new("chart");
        let rows = ChartRows::create(&mut g).unwrap();
        let upper = rows.get(RowId::VestibularUpper);
        g.set_transform(upper, Trs::from_translation(20.0, 0.0, 0.0)).unwrap();
        slab(&mut g, upper, 0.0, 10.0, 0.0);
        slab(&mut g, rows.get(RowId::OcclusalUpper), 50.0, 52.0, 3.0);

        let layout = layout_rows(&mut g, &rows, [1.0, 10.0, 1.0]).unwrap();
        // stacked alone, the two rows would span y = -1..12
        assert_relative_eq!(layout.recentered.y, -5.5, epsilon = 1e-9);

        let b = |r: RowId| g.world_bounds(rows.get(r));
        let all = b(RowId::VestibularUpper).union(&b(RowId::OcclusalUpper));
        let c = all.center().unwrap();
        assert_relative_eq!(c.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(c.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(c.z, 0.5, epsilon = 1e-9);
        assert_relative_eq!(b(RowId::VestibularUpper).min.y - b(RowId::OcclusalUpper).max.y, 1.0, epsilon = 1e-9);
        assert!(g.world_bounds(rows.get(RowId::OcclusalLower)).is_empty());
    }
}
