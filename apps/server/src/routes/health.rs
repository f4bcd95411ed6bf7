// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    /// Whether a chart is currently assembled
    pub chart_built: bool,
    pub cached_prototypes: usize,
}

/// API information response.
#[derive(Debug, Serialize)]
pub struct ApiInfoResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: Vec<EndpointInfo>,
}

/// Endpoint information.
#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

/// GET /api/v1/health - Health check endpoint.
pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let viewer = state.viewer.lock().await;
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "dentchart-server",
        chart_built: viewer.chart().is_some(),
        cached_prototypes: viewer.store().len(),
    })
}

/// GET / - API information endpoint.
pub async fn info() -> Json<ApiInfoResponse> {
    let endpoint = |method, path, description| EndpointInfo {
        method,
        path,
        description,
    };
    Json(ApiInfoResponse {
        service: "dentchart-server",
        version: env!("CARGO_PKG_VERSION"),
        description: "Dental chart assets and assembled charts",
        endpoints: vec![
            endpoint("GET", "/api/v1/health", "Health check endpoint"),
            endpoint("GET", "/manifest.json", "Tooth to fragment manifest"),
            endpoint("GET", "/models/*file", "Mesh fragment files"),
            endpoint("GET", "/api/v1/chart", "Layout snapshot, build report and fitted viewport"),
            endpoint("GET", "/api/v1/chart/tree", "Export naming tree"),
            endpoint("POST", "/api/v1/chart/visibility", "Show or hide component types"),
            endpoint("POST", "/api/v1/chart/paint", "Paint a whole part"),
            endpoint("POST", "/api/v1/chart/clear", "Reset all marks to base grey"),
            endpoint("POST", "/api/v1/chart/reload", "Discard and rebuild the chart"),
        ],
    })
}
