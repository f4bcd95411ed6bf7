// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Manifest and mesh file endpoints.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use dentchart_chart::Manifest;

use crate::error::ApiError;
use crate::services::{load_manifest, model_path};
use crate::AppState;

/// GET /manifest.json - Manifest file, or one synthesized from the assets.
pub async fn manifest(State(state): State<AppState>) -> Result<Json<Manifest>, ApiError> {
    Ok(Json(load_manifest(&state.config).await?))
}

/// GET /models/*file - Raw mesh file.
pub async fn model(State(state): State<AppState>, Path(file): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let path = model_path(&state.config, &file)?;
    let meta = tokio::fs::metadata(&path)
        .await
        .map_err(|_| ApiError::NotFound(file.clone()))?;
    if !meta.is_file() {
        return Err(ApiError::NotFound(file));
    }
    if meta.len() > state.config.max_file_size_bytes() {
        return Err(ApiError::FileTooLarge {
            max_mb: state.config.max_file_size_mb,
        });
    }

    let bytes = tokio::fs::read(&path).await?;
    tracing::debug!(file = %file, size = bytes.len(), "serving model file");
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], bytes))
}
