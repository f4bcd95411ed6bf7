// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dentchart Server - dental chart assets and assembled charts over HTTP.
//!
//! The server hosts the OBJ fragments and manifest of an assets directory
//! and keeps one assembled chart in memory. It supports:
//!
//! - Serving the manifest (synthesized from the directory when missing)
//! - Serving raw mesh files with path confinement
//! - Layout snapshots, visibility toggles and painting on the live chart
//!
//! # Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `GET /manifest.json` - Tooth to fragment manifest
//! - `GET /models/*file` - Mesh fragment files
//! - `GET /api/v1/chart` - Snapshot, build report and fitted viewport
//! - `GET /api/v1/chart/tree` - Export naming tree
//! - `POST /api/v1/chart/visibility` - Show or hide component types
//! - `POST /api/v1/chart/paint` - Paint a whole part
//! - `POST /api/v1/chart/clear` - Reset marks
//! - `POST /api/v1/chart/reload` - Re-read inputs and rebuild

use axum::{
    routing::{get, post},
    Router,
};
use dentchart_chart::Viewer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod routes;
mod services;

use config::Config;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub viewer: Arc<Mutex<Viewer>>,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    Router::new()
        // Root endpoint - API information
        .route("/", get(routes::health::info))
        .route("/api/v1/health", get(routes::health::check))
        // Assets
        .route("/manifest.json", get(routes::assets::manifest))
        .route("/models/*file", get(routes::assets::model))
        // Chart
        .route("/api/v1/chart", get(routes::chart::get_chart))
        .route("/api/v1/chart/tree", get(routes::chart::get_tree))
        .route("/api/v1/chart/visibility", post(routes::chart::set_visibility))
        .route("/api/v1/chart/paint", post(routes::chart::paint))
        .route("/api/v1/chart/clear", post(routes::chart::clear))
        .route("/api/v1/chart/reload", post(routes::chart::reload))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dentchart_server=info,dentchart_chart=info,tower_http=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(config.json_logs);

    tracing::info!(
        port = config.port,
        assets_dir = %config.assets_dir.display(),
        manifest = %config.manifest_path.display(),
        layout = ?config.layout_path,
        max_file_size_mb = config.max_file_size_mb,
        "Starting Dentchart Server"
    );

    let mut viewer = services::build_viewer(&config)?;
    match services::load_inputs(&config).await {
        Ok((manifest, mode)) => match viewer.build(manifest, mode).await {
            Ok(chart) => tracing::info!(summary = %chart.report, "initial chart built"),
            Err(e) => tracing::error!(error = %e, "initial chart build failed"),
        },
        Err(e) => tracing::error!(error = %e, "chart inputs unavailable"),
    }

    let state = AppState {
        viewer: Arc::new(Mutex::new(viewer)),
        config: Arc::new(config.clone()),
    };
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
