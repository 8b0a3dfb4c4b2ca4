// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Collection, Record, StoreError};

struct Inner<R> {
    records: HashMap<String, R>,
    /// owner id -> record ids
    owners: HashMap<String, BTreeSet<String>>,
}

/// In-process collection with an owner index.
///
/// Uses [`RwLock`] so concurrent readers do not block each other.
pub struct MemoryCollection<R> {
    inner: RwLock<Inner<R>>,
}

impl<R: Record> Default for MemoryCollection<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> MemoryCollection<R> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: HashMap::new(),
                owners: HashMap::new(),
            }),
        }
    }
}

impl<R> Inner<R> {
    fn unindex(&mut self, owner_id: &str, id: &str) {
        if let Some(ids) = self.owners.get_mut(owner_id) {
            ids.remove(id);
            if ids.is_empty() {
                self.owners.remove(owner_id);
            }
        }
    }
}

#[async_trait]
impl<R: Record> Collection<R> for MemoryCollection<R> {
    async fn get(&self, id: &str) -> Result<Option<R>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.records.get(id).cloned())
    }

    async fn put(&self, record: &R) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        if let Some(previous) = inner.records.get(record.id()) {
            let previous_owner = previous.owner_id().to_string();
            inner.unindex(&previous_owner, record.id());
        }

        inner
            .owners
            .entry(record.owner_id().to_string())
            .or_default()
            .insert(record.id().to_string());
        inner
            .records
            .insert(record.id().to_string(), record.clone());

        Ok(())
    }

    async fn put_if_absent(&self, record: &R) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;

        if inner.records.contains_key(record.id()) {
            return Ok(false);
        }

        inner
            .owners
            .entry(record.owner_id().to_string())
            .or_default()
            .insert(record.id().to_string());
        inner
            .records
            .insert(record.id().to_string(), record.clone());

        Ok(true)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        if let Some(removed) = inner.records.remove(id) {
            inner.unindex(removed.owner_id(), id);
        }

        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<R>, StoreError> {
        let inner = self.inner.read().await;

        let records = inner
            .owners
            .get(owner_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.records.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();

        Ok(records)
    }
}
