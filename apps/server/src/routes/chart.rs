// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chart endpoints: snapshot, visibility, painting and reload.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    Json,
};
use dentchart_chart::{BuildReport, Error as ChartError, LayoutSnapshot};
use dentchart_geometry::{OrthoFrustum, Rgb};
use dentchart_scene::{ComponentType, ExportTree, VisibilityState};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::services::load_inputs;
use crate::AppState;

fn default_width() -> f64 {
    1280.0
}

fn default_height() -> f64 {
    720.0
}

/// Viewport size the returned frustum is fitted to.
#[derive(Debug, Deserialize)]
pub struct ViewportQuery {
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
}

#[derive(Debug, Serialize)]
pub struct FrustumBody {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
    pub near: f64,
    pub far: f64,
    pub eye: [f64; 3],
    pub target: [f64; 3],
}

impl From<OrthoFrustum> for FrustumBody {
    fn from(f: OrthoFrustum) -> Self {
        Self {
            left: f.left,
            right: f.right,
            top: f.top,
            bottom: f.bottom,
            near: f.near,
            far: f.far,
            eye: [f.eye.x, f.eye.y, f.eye.z],
            target: [f.target.x, f.target.y, f.target.z],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChartResponse {
    pub mode: &'static str,
    pub snapshot: LayoutSnapshot,
    pub report: BuildReport,
    pub frustum: FrustumBody,
    pub visibility: VisibilityState,
}

/// GET /api/v1/chart - Snapshot, build report and fitted viewport.
pub async fn get_chart(
    State(state): State<AppState>,
    Query(query): Query<ViewportQuery>,
) -> Result<Json<ChartResponse>, ApiError> {
    if !(query.width > 0.0 && query.height > 0.0) {
        return Err(ApiError::BadRequest(format!(
            "viewport {}x{} must be positive",
            query.width, query.height
        )));
    }
    let viewer = state.viewer.lock().await;
    let chart = viewer.chart().ok_or(ChartError::NotBuilt)?;
    Ok(Json(ChartResponse {
        mode: viewer.mode().name(),
        snapshot: chart.export_snapshot()?,
        report: chart.report.clone(),
        frustum: viewer.fit_viewport(query.width, query.height)?.into(),
        visibility: viewer.visibility().clone(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    /// Skip hidden subtrees
    #[serde(default)]
    pub visible: bool,
}

/// GET /api/v1/chart/tree - Export naming tree.
pub async fn get_tree(
    State(state): State<AppState>,
    Query(query): Query<TreeQuery>,
) -> Result<Json<ExportTree>, ApiError> {
    let viewer = state.viewer.lock().await;
    Ok(Json(viewer.export_tree(query.visible)?))
}

/// One component type, or a map of several.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum VisibilityRequest {
    One {
        #[serde(rename = "type")]
        component: String,
        visible: bool,
    },
    Many(BTreeMap<String, bool>),
}

fn component(label: &str) -> Result<ComponentType, ApiError> {
    ComponentType::from_label(label).ok_or_else(|| ApiError::BadRequest(format!("unknown component type '{}'", label)))
}

#[derive(Debug, Serialize)]
pub struct VisibilityResponse {
    pub touched: usize,
    pub visibility: VisibilityState,
}

/// POST /api/v1/chart/visibility - Show or hide component types.
pub async fn set_visibility(
    State(state): State<AppState>,
    Json(request): Json<VisibilityRequest>,
) -> Result<Json<VisibilityResponse>, ApiError> {
    let mut viewer = state.viewer.lock().await;
    let touched = match request {
        VisibilityRequest::One { component: label, visible } => {
            viewer.set_type_visibility(component(&label)?, visible)?
        }
        VisibilityRequest::Many(map) => {
            let mut next = viewer.visibility().clone();
            for (label, visible) in &map {
                next.set(component(label)?, *visible);
            }
            viewer.apply_visibility(next)?
        }
    };
    Ok(Json(VisibilityResponse {
        touched,
        visibility: viewer.visibility().clone(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct PaintRequest {
    /// Fragment name of the part, extension optional
    pub part: String,
    /// `#rrggbb` or `#rgb`
    pub color: String,
}

#[derive(Debug, Serialize)]
pub struct PaintResponse {
    pub part: String,
    pub painted: usize,
}

/// POST /api/v1/chart/paint - Flood a whole part with one color.
pub async fn paint(
    State(state): State<AppState>,
    Json(request): Json<PaintRequest>,
) -> Result<Json<PaintResponse>, ApiError> {
    let color = Rgb::parse(&request.color)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid color '{}'", request.color)))?;
    let viewer = state.viewer.lock().await;
    let painted = viewer.paint_part(&request.part, color)?;
    tracing::debug!(part = %request.part, painted, "part painted");
    Ok(Json(PaintResponse {
        part: request.part,
        painted,
    }))
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: usize,
}

/// POST /api/v1/chart/clear - Reset every mark to the base grey.
pub async fn clear(State(state): State<AppState>) -> Result<Json<ClearResponse>, ApiError> {
    let viewer = state.viewer.lock().await;
    Ok(Json(ClearResponse {
        cleared: viewer.clear_marks()?,
    }))
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub summary: String,
    pub report: BuildReport,
}

/// POST /api/v1/chart/reload - Re-read inputs, discard the chart and rebuild.
pub async fn reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, ApiError> {
    let (manifest, mode) = load_inputs(&state.config).await?;
    let mut viewer = state.viewer.lock().await;
    let chart = viewer.build(manifest, mode).await?;
    tracing::info!(summary = %chart.report, "chart reloaded");
    Ok(Json(ReloadResponse {
        summary: chart.report.to_string(),
        report: chart.report.clone(),
    }))
}
