// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Ownership-scoped persistence for accounts, credential sets and scripts.
//!
//! Storage backends implement [`Collection`], a plain key-value interface
//! with a secondary "by owner" lookup. Access control lives one layer up in
//! [`Owned`]: every read, list and delete of an owned record checks
//! `ownerId` against the caller, and a record owned by someone else is
//! reported exactly like a missing one ([`StoreError::NotFound`]).
//!
//! # Backends
//!
//! - [`MemoryCollection`]: process-local maps, used for local runs and tests
//! - [`DynamoCollection`]: one DynamoDB table per record kind, listing through
//!   the [`OWNER_INDEX_NAME`] global secondary index
//!
//! [`OWNER_INDEX_NAME`]: crate::constants::OWNER_INDEX_NAME

mod dynamodb;
mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::configuration::{ServiceOptions, StoreBackend};
use crate::constants::OWNER_INDEX_NAME;
use crate::models::{Account, CredentialSet, Script};

pub use dynamodb::DynamoCollection;
pub use memory::MemoryCollection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Account,
    CredentialSet,
    Script,
}

impl RecordKind {
    pub fn not_found_message(self) -> String {
        let label = self.to_string();
        let mut chars = label.chars();
        match chars.next() {
            Some(first) => format!("{}{} not found", first.to_uppercase(), chars.as_str()),
            None => "Not found".to_string(),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account => f.write_str("account"),
            Self::CredentialSet => f.write_str("credential set"),
            Self::Script => f.write_str("script"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(RecordKind),
    #[error("unable to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("backend error: {0}")]
    Backend(String),
}

/// A persisted record with a primary key and an owning account.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: RecordKind;

    fn id(&self) -> &str;

    /// For accounts this is the account id itself.
    fn owner_id(&self) -> &str;
}

/// Key-value access to one record kind.
#[async_trait]
pub trait Collection<R: Record>: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<R>, StoreError>;

    /// Inserts or replaces the record under its id.
    async fn put(&self, record: &R) -> Result<(), StoreError>;

    /// Inserts the record only if its id is free. Returns `false`, leaving
    /// the stored record untouched, when the id is already taken.
    async fn put_if_absent(&self, record: &R) -> Result<bool, StoreError>;

    /// Removing a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<R>, StoreError>;
}

/// Ownership checks over a [`Collection`].
pub struct Owned<R: Record> {
    collection: Arc<dyn Collection<R>>,
}

impl<R: Record> Clone for Owned<R> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
        }
    }
}

impl<R: Record> Owned<R> {
    pub fn new(collection: Arc<dyn Collection<R>>) -> Self {
        Self { collection }
    }

    /// Persists a freshly minted record and returns it.
    pub async fn create(&self, record: R) -> Result<R, StoreError> {
        self.collection.put(&record).await?;
        tracing::debug!("[store] created {} {}", R::KIND, record.id());
        Ok(record)
    }

    /// Returns the record only if it exists and belongs to `caller_id`.
    pub async fn get_owned(&self, id: &str, caller_id: &str) -> Result<R, StoreError> {
        match self.collection.get(id).await? {
            Some(record) if record.owner_id() == caller_id => Ok(record),
            _ => Err(StoreError::NotFound(R::KIND)),
        }
    }

    pub async fn list_owned(&self, caller_id: &str) -> Result<Vec<R>, StoreError> {
        let mut records = self.collection.list_by_owner(caller_id).await?;
        records.retain(|record| record.owner_id() == caller_id);
        Ok(records)
    }

    /// Deletes the record after the same ownership check as [`get_owned`](Self::get_owned).
    pub async fn delete_owned(&self, id: &str, caller_id: &str) -> Result<(), StoreError> {
        let record = self.get_owned(id, caller_id).await?;
        self.collection.delete(record.id()).await?;
        tracing::debug!("[store] deleted {} {}", R::KIND, id);
        Ok(())
    }
}

/// All record collections used by the service.
#[derive(Clone)]
pub struct RecordStore {
    accounts: Arc<dyn Collection<Account>>,
    pub credential_sets: Owned<CredentialSet>,
    pub scripts: Owned<Script>,
}

impl RecordStore {
    pub fn new(
        accounts: Arc<dyn Collection<Account>>,
        credential_sets: Arc<dyn Collection<CredentialSet>>,
        scripts: Arc<dyn Collection<Script>>,
    ) -> Self {
        Self {
            accounts,
            credential_sets: Owned::new(credential_sets),
            scripts: Owned::new(scripts),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryCollection::new()),
            Arc::new(MemoryCollection::new()),
            Arc::new(MemoryCollection::new()),
        )
    }

    /// Builds the store for the configured backend.
    pub async fn from_options(options: &ServiceOptions) -> Self {
        match options.store {
            StoreBackend::Memory => {
                tracing::warn!("[store] using in-memory store, records are lost on restart");
                Self::in_memory()
            }
            StoreBackend::Dynamodb => {
                let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
                let client = aws_sdk_dynamodb::Client::new(&config);
                tracing::info!(
                    "[store] using DynamoDB tables {}, {}, {}",
                    options.users_table,
                    options.keys_table,
                    options.scripts_table
                );
                Self::new(
                    Arc::new(DynamoCollection::new(
                        client.clone(),
                        &options.users_table,
                        None,
                    )),
                    Arc::new(DynamoCollection::new(
                        client.clone(),
                        &options.keys_table,
                        Some(OWNER_INDEX_NAME),
                    )),
                    Arc::new(DynamoCollection::new(
                        client,
                        &options.scripts_table,
                        Some(OWNER_INDEX_NAME),
                    )),
                )
            }
        }
    }

    /// Stores the account unless it already exists. Accounts are never
    /// mutated, so an existing account is returned as stored.
    ///
    /// Returns the account and whether it was created by this call.
    pub async fn register_account(&self, account: Account) -> Result<(Account, bool), StoreError> {
        if self.accounts.put_if_absent(&account).await? {
            tracing::debug!("[store] registered account {}", account.id);
            return Ok((account, true));
        }
        let existing = self.get_account(&account.id).await?;
        Ok((existing, false))
    }

    pub async fn get_account(&self, id: &str) -> Result<Account, StoreError> {
        self.accounts
            .get(id)
            .await?
            .ok_or(StoreError::NotFound(RecordKind::Account))
    }
}
