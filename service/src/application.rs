// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::serve::Serve;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::cipher::{CipherKey, SecretCipher};
use crate::configuration::ServiceOptions;
use crate::constants::MAX_BODY_SIZE;
use crate::errors::AppError;
use crate::identity::{IdentityVerifier, UnverifiedClaims};
use crate::routes;
use crate::runner::ExecutionRunner;
use crate::store::RecordStore;

const ALLOWED_METHODS: &str = "GET,POST,DELETE,OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type,Authorization";

pub struct AppState {
    pub options: ServiceOptions,
    pub cipher: SecretCipher,
    pub store: RecordStore,
    pub runner: ExecutionRunner,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub fn new(
        options: ServiceOptions,
        cipher: SecretCipher,
        store: RecordStore,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let runner = ExecutionRunner::from_options(&options);
        Self {
            options,
            cipher,
            store,
            runner,
            verifier,
        }
    }

    /// Builds the state for the configured key and storage backend.
    pub async fn build(options: ServiceOptions) -> Result<Self, AppError> {
        let key = CipherKey::from_config(&options.encryption_key).map_err(|e| {
            tracing::error!("[service] invalid encryption key: {}", e);
            AppError::ConfigError(
                "ENCRYPTION_KEY must be 64 hex characters or a 32-byte string".to_string(),
            )
        })?;
        let store = RecordStore::from_options(&options).await;

        tracing::warn!("[service] bearer token signatures are not verified");

        Ok(Self::new(
            options,
            SecretCipher::new(key),
            store,
            Arc::new(UnverifiedClaims),
        ))
    }
}

pub struct Application {
    port: u16,
    server: Serve<TcpListener, Router, Router>,
}

impl Application {
    pub async fn build(options: ServiceOptions, state: Arc<AppState>) -> Result<Self, std::io::Error> {
        let address = format!("{}:{}", options.host, options.port);
        let listener = TcpListener::bind(address).await?;
        let server = run(listener, state)?;
        let port = server.local_addr()?.port();

        tracing::info!("[service] listening at http://{}:{}", options.host, port);

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

/// Adds the CORS headers to every response except 401s, and answers
/// preflight requests before they reach a handler.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    if response.status() != StatusCode::UNAUTHORIZED {
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
    }

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/users", post(routes::create_account))
        .route("/users/{id}", get(routes::get_account))
        .route(
            "/keys",
            post(routes::create_credential_set).get(routes::list_credential_sets),
        )
        .route(
            "/keys/{id}",
            get(routes::get_credential_set).delete(routes::delete_credential_set),
        )
        .route(
            "/scripts",
            post(routes::create_script).get(routes::list_scripts),
        )
        .route(
            "/scripts/{id}",
            get(routes::get_script).delete(routes::delete_script),
        )
        .route("/execute", post(routes::execute))
        .layer(middleware::from_fn(cors))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tracing::instrument(skip_all)]
pub fn run(
    listener: TcpListener,
    state: Arc<AppState>,
) -> Result<Serve<TcpListener, Router, Router>, std::io::Error> {
    let app = create_router(state);
    Ok(axum::serve(listener, app))
}
