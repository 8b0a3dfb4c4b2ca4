// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::cipher::CipherError;
use crate::store::{RecordKind, StoreError};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AppError {
    #[error("missing or invalid caller identity")]
    Unauthorized,
    #[error("{0} not found")]
    NotFound(RecordKind),
    #[error("unable to decrypt credential")]
    DecryptError,
    #[error("internal server error")]
    InternalServerError,
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            Self::NotFound(kind) => (StatusCode::NOT_FOUND, kind.not_found_message()),
            Self::DecryptError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Unable to decrypt credential".to_string(),
            ),
            Self::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            ),
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({"code": status.as_u16(), "message": message}));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(source: StoreError) -> Self {
        match source {
            StoreError::NotFound(kind) => AppError::NotFound(kind),
            other => {
                tracing::error!("{:?}", other);
                AppError::InternalServerError
            }
        }
    }
}

impl From<CipherError> for AppError {
    fn from(_source: CipherError) -> Self {
        tracing::error!("{:?}", _source);
        AppError::DecryptError
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(source: validator::ValidationErrors) -> Self {
        tracing::error!("[api] validation failed: {}", source);
        AppError::ValidationError(source.to_string())
    }
}
