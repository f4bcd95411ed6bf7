// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types and handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dentchart_chart::Error as ChartError;
use serde::Serialize;
use thiserror::Error;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden path: {0}")]
    Forbidden(String),

    #[error("File too large: maximum size is {max_mb} MB")]
    FileTooLarge { max_mb: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ApiError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN_PATH"),
            ApiError::FileTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            ApiError::Chart(e) => match e {
                ChartError::ManifestUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "MANIFEST_UNAVAILABLE"),
                ChartError::NotBuilt => (StatusCode::CONFLICT, "CHART_NOT_BUILT"),
                ChartError::LayoutEntryUnresolvable { .. } => (StatusCode::NOT_FOUND, "UNRESOLVABLE"),
                ChartError::FragmentLoadFailed { .. } | ChartError::ObjParse { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "FRAGMENT_LOAD_FAILED")
                }
                ChartError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "CHART_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
