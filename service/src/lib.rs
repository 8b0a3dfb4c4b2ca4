// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! # IaC Vault
//!
//! An HTTP service that stores AWS key pairs and infrastructure-as-code
//! scripts per user, and applies a script with a key pair on request.
//!
//! ## Architecture
//!
//! ```text
//! Client -> HTTP API -> IaC Vault (this crate) -> terraform init/plan/apply
//!                            |
//!                            +-> DynamoDB or in-memory store
//! ```
//!
//! - **Identity**: the caller is the `sub` claim of the bearer token
//! - **Secret Cipher**: AES-256-CBC envelopes (`hex(nonce):hex(ciphertext)`)
//!   for stored secrets
//! - **Record Store**: accounts, key pairs and scripts, every access scoped to
//!   the owning caller
//! - **Execution Runner**: a throwaway workspace per run, with the decrypted key
//!   pair passed to the tool through its environment
//!
//! ## Modules
//!
//! - [`application`]: HTTP server setup with Axum, CORS and body limits
//! - [`cipher`]: secret encryption and the envelope format
//! - [`configuration`]: CLI argument parsing with clap
//! - [`constants`]: Configuration constants for the application
//! - [`errors`]: Application error types with HTTP response mapping
//! - [`identity`]: bearer token parsing and the [`identity::Caller`] extractor
//! - [`models`]: Records and request/response types with validation
//! - [`routes`]: HTTP route handlers
//! - [`runner`]: provisioning tool invocation
//! - [`store`]: ownership-scoped persistence backends
//!
//! ## Usage
//!
//! ```bash
//! ENCRYPTION_KEY=$(openssl rand -hex 32) iac-vault --port 8080 --store dynamodb
//! ```
//!
//! ## Security Considerations
//!
//! - Token signatures are not verified by the default verifier
//! - Secrets are zeroized on drop and redacted from `Debug` output
//! - Request validation enforces strict size limits
//! - Records owned by another caller are reported as not found

pub mod application;
pub mod cipher;
pub mod configuration;
pub mod constants;
pub mod errors;
pub mod identity;
pub mod models;
pub mod routes;
pub mod runner;
pub mod store;
