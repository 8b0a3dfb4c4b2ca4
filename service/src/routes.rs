// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! HTTP route handlers for the IaC vault API.
//!
//! This module provides the following endpoints:
//!
//! | Method | Path | Handler | Description |
//! |--------|------|---------|-------------|
//! | GET | `/health` | [`health`] | Health check endpoint |
//! | POST | `/users` | [`create_account`] | Register the caller's account |
//! | GET | `/users/{id}` | [`get_account`] | Fetch the caller's account |
//! | POST | `/keys` | [`create_credential_set`] | Store an encrypted key pair |
//! | GET | `/keys` | [`list_credential_sets`] | List the caller's key pairs |
//! | GET | `/keys/{id}` | [`get_credential_set`] | Fetch one key pair |
//! | DELETE | `/keys/{id}` | [`delete_credential_set`] | Delete one key pair |
//! | POST | `/scripts` | [`create_script`] | Store a script |
//! | GET | `/scripts` | [`list_scripts`] | List the caller's scripts |
//! | GET | `/scripts/{id}` | [`get_script`] | Fetch one script with content |
//! | DELETE | `/scripts/{id}` | [`delete_script`] | Delete one script |
//! | POST | `/execute` | [`execute`] | Apply a script with a key pair |
//!
//! Every endpoint except `/health` takes a [`Caller`], so unauthenticated
//! requests are rejected with 401 before the body is read. Key pairs are
//! always returned as [`CredentialSetView`], never with the secret.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value, json};
use validator::Validate;

use crate::application::AppState;
use crate::errors::AppError;
use crate::identity::Caller;
use crate::models::{
    Account, CredentialSet, CredentialSetView, ExecuteRequest, ExecuteResponse, NewAccount,
    NewCredentialSet, NewScript, RunnerCredential, Script, ScriptSummary,
};

/// Health check endpoint.
///
/// Returns a simple JSON response indicating the service is running.
///
/// # Response
///
/// ```json
/// {"status": "ok"}
/// ```
pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Registers the caller's account.
///
/// The account id in the body must equal the caller identity. An existing
/// account is returned unchanged with 200; a new one is stored and returned
/// with 201.
#[tracing::instrument(skip(state, request))]
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(request): Json<NewAccount>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    if request.id != caller {
        tracing::warn!("[api] account id does not match caller {}", caller);
        return Err(AppError::Unauthorized);
    }
    request.validate()?;

    let (account, created) = state.store.register_account(Account::new(request)).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(account)))
}

#[tracing::instrument(skip(state))]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<Account>, AppError> {
    if id != caller {
        return Err(AppError::Unauthorized);
    }

    let account = state.store.get_account(&id).await?;
    Ok(Json(account))
}

/// Stores a key pair for the caller.
///
/// The secret is encrypted before it is persisted and is left out of the
/// response.
#[tracing::instrument(skip(state, request))]
pub async fn create_credential_set(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(request): Json<NewCredentialSet>,
) -> Result<(StatusCode, Json<CredentialSetView>), AppError> {
    request.validate()?;

    let envelope = state.cipher.encrypt(&request.secret_value).map_err(|e| {
        tracing::error!("[api] unable to encrypt secret: {}", e);
        AppError::InternalServerError
    })?;
    let record = CredentialSet::new(&caller, &request.name, &request.access_key_id, envelope);
    let record = state.store.credential_sets.create(record).await?;

    Ok((StatusCode::CREATED, Json(record.redacted())))
}

#[tracing::instrument(skip(state))]
pub async fn list_credential_sets(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> Result<Json<Vec<CredentialSetView>>, AppError> {
    let records = state.store.credential_sets.list_owned(&caller).await?;
    Ok(Json(records.iter().map(CredentialSet::redacted).collect()))
}

#[tracing::instrument(skip(state))]
pub async fn get_credential_set(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<CredentialSetView>, AppError> {
    let record = state.store.credential_sets.get_owned(&id, &caller).await?;
    Ok(Json(record.redacted()))
}

#[tracing::instrument(skip(state))]
pub async fn delete_credential_set(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.store.credential_sets.delete_owned(&id, &caller).await?;
    Ok(Json(json!({"message": "Credential set deleted"})))
}

#[tracing::instrument(skip(state, request))]
pub async fn create_script(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(request): Json<NewScript>,
) -> Result<(StatusCode, Json<Script>), AppError> {
    request.validate()?;

    let script = state
        .store
        .scripts
        .create(Script::new(&caller, request))
        .await?;

    Ok((StatusCode::CREATED, Json(script)))
}

/// Lists the caller's scripts without their content.
#[tracing::instrument(skip(state))]
pub async fn list_scripts(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> Result<Json<Vec<ScriptSummary>>, AppError> {
    let scripts = state.store.scripts.list_owned(&caller).await?;
    Ok(Json(scripts.iter().map(Script::summary).collect()))
}

#[tracing::instrument(skip(state))]
pub async fn get_script(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<Script>, AppError> {
    let script = state.store.scripts.get_owned(&id, &caller).await?;
    Ok(Json(script))
}

#[tracing::instrument(skip(state))]
pub async fn delete_script(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.store.scripts.delete_owned(&id, &caller).await?;
    Ok(Json(json!({"message": "Script deleted"})))
}

/// Applies one of the caller's scripts with one of the caller's key pairs.
///
/// # Request Flow
///
/// 1. Validate the incoming [`ExecuteRequest`]
/// 2. Load the key pair and the script, both scoped to the caller
/// 3. Decrypt the secret
/// 4. Run init, plan and apply in a fresh workspace
///
/// A failing provisioning step is not an HTTP error: the response is 200
/// with `outcome` set to `failure` and the tool's stderr in `output`.
///
/// # Errors
///
/// - [`AppError::ValidationError`] - Request validation failed
/// - [`AppError::NotFound`] - Key pair or script missing or not owned
/// - [`AppError::DecryptError`] - Stored secret could not be decrypted
#[tracing::instrument(skip(state, request))]
pub async fn execute(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, AppError> {
    request.validate()?;

    let credential_set = state
        .store
        .credential_sets
        .get_owned(&request.credential_set_id, &caller)
        .await?;
    let script = state
        .store
        .scripts
        .get_owned(&request.script_id, &caller)
        .await?;

    let secret_access_key = state.cipher.decrypt(&credential_set.secret_value)?;
    let credential = RunnerCredential {
        access_key_id: credential_set.access_key_id,
        secret_access_key,
    };

    tracing::info!(
        "[api] executing script {} with credential set {}",
        script.id,
        credential_set.id
    );
    let outcome = state.runner.run(&credential, &script).await;

    Ok(Json(ExecuteResponse::from(outcome)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    // Integration tests using TestServer are in tests/http_integration.rs

    #[tokio::test]
    async fn test_health_returns_ok() {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_health_response_structure() {
        let response = health().await.into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        // Should have exactly one key
        assert_eq!(json.as_object().unwrap().len(), 1);
        assert!(json.get("status").is_some());
    }
}
