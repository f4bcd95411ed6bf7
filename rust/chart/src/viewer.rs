// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Composition root.
//!
//! A [`Viewer`] owns the prototype store, the active configuration and the
//! current chart. Reloading builds a fresh chart and drops the old one; the
//! store survives, so fragments already loaded are not fetched again.

use std::sync::Arc;

use tracing::{debug, info};

use dentchart_geometry::{fit_orthographic, OrthoFrustum, Rgb};
use dentchart_scene::{ComponentType, ExportTree, NodeKey, ViewFilter, VisibilityState};

use crate::assemble::{Assembler, Chart, LayoutMode};
use crate::config::ChartConfig;
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::snapshot::LayoutSnapshot;
use crate::store::PrototypeStore;

pub struct Viewer {
    store: Arc<PrototypeStore>,
    config: ChartConfig,
    visibility: VisibilityState,
    manifest: Manifest,
    mode: LayoutMode,
    chart: Option<Chart>,
}

impl Viewer {
    pub fn new(store: Arc<PrototypeStore>, config: ChartConfig) -> Self {
        let visibility = config.default_visibility.clone();
        Self {
            store,
            config,
            visibility,
            manifest: Manifest::default(),
            mode: LayoutMode::Derived,
            chart: None,
        }
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<PrototypeStore> {
        &self.store
    }

    pub fn visibility(&self) -> &VisibilityState {
        &self.visibility
    }

    pub fn chart(&self) -> Option<&Chart> {
        self.chart.as_ref()
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn mode(&self) -> &LayoutMode {
        &self.mode
    }

    fn current(&self) -> Result<&Chart> {
        self.chart.as_ref().ok_or(Error::NotBuilt)
    }

    fn current_mut(&mut self) -> Result<&mut Chart> {
        self.chart.as_mut().ok_or(Error::NotBuilt)
    }

    /// Builds a chart and makes it current. On failure the previous chart
    /// stays in place.
    pub async fn build(&mut self, manifest: Manifest, mode: LayoutMode) -> Result<&Chart> {
        let mut chart = Assembler::new(&self.store, &self.config)
            .assemble(&manifest, &mode)
            .await?;
        let root = chart.root();
        chart.graph.apply_visibility(root, &self.visibility);
        if self.config.hide_empty_groups {
            chart.hide_empty_groups();
        }

        self.manifest = manifest;
        self.mode = mode;
        Ok(self.chart.insert(chart))
    }

    /// Discards the current chart and rebuilds it from the same inputs.
    pub async fn reload(&mut self) -> Result<&Chart> {
        info!(mode = self.mode.name(), cached = self.store.len(), "reloading chart");
        let manifest = self.manifest.clone();
        let mode = self.mode.clone();
        self.chart = None;
        self.build(manifest, mode).await
    }

    /// Shows or hides one component type everywhere; returns the meshes touched.
    pub fn set_type_visibility(&mut self, ty: ComponentType, visible: bool) -> Result<usize> {
        self.visibility.set(ty, visible);
        let hide_empty = self.config.hide_empty_groups;
        let chart = self.current_mut()?;
        let root = chart.root();
        let touched = chart.graph.set_type_visibility(root, ty, visible);
        if hide_empty {
            chart.hide_empty_groups();
        }
        debug!(component = %ty, visible, touched, "visibility changed");
        Ok(touched)
    }

    /// Replaces the whole visibility state.
    pub fn apply_visibility(&mut self, state: VisibilityState) -> Result<usize> {
        let hide_empty = self.config.hide_empty_groups;
        let chart = self.current_mut()?;
        let root = chart.root();
        let touched = chart.graph.apply_visibility(root, &state);
        if hide_empty {
            chart.hide_empty_groups();
        }
        self.visibility = state;
        Ok(touched)
    }

    /// Floods the part containing `key`. Zero when `key` belongs to no part.
    pub fn paint_node(&self, key: NodeKey, color: Rgb) -> Result<usize> {
        Ok(self.current()?.graph.paint_part(key, color))
    }

    /// Floods the part loaded from `label`.
    pub fn paint_part(&self, label: &str, color: Rgb) -> Result<usize> {
        let chart = self.current()?;
        let part = chart
            .find_part(label)
            .ok_or_else(|| Error::unresolvable(label, "no part with this label"))?;
        Ok(chart.graph.paint_part(part, color))
    }

    pub fn paint_face(&self, mesh: NodeKey, face: usize, color: Rgb) -> Result<bool> {
        Ok(self.current()?.graph.paint_face(mesh, face, color))
    }

    /// Resets every color buffer in the chart to the base grey.
    pub fn clear_marks(&self) -> Result<usize> {
        let chart = self.current()?;
        Ok(chart.graph.fill_meshes(chart.root(), Rgb::BASE_GREY))
    }

    /// Orthographic frustum framing the chart in a `width` x `height` viewport.
    pub fn fit_viewport(&self, width: f64, height: f64) -> Result<OrthoFrustum> {
        let chart = self.current()?;
        Ok(fit_orthographic(&chart.bounds(), width, height, &self.config.frustum()))
    }

    pub fn visible_meshes(&self, filter: &ViewFilter) -> Result<Vec<NodeKey>> {
        let chart = self.current()?;
        Ok(chart.graph.visible_meshes(chart.root(), filter))
    }

    pub fn export_tree(&self, only_visible: bool) -> Result<ExportTree> {
        let chart = self.current()?;
        Ok(ExportTree::build(&chart.graph, chart.root(), only_visible)?)
    }

    pub fn export_snapshot(&self) -> Result<LayoutSnapshot> {
        self.current()?.export_snapshot()
    }
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("mode", &self.mode.name())
            .field("teeth", &self.manifest.teeth.len())
            .field("built", &self.chart.is_some())
            .finish()
    }
}
