//! In-memory storage for tests and local development.
//!
//! Writes made through a `MemoryTransaction` are buffered and applied only on
//! commit, so rollback (or dropping the transaction) leaves no trace. Failure
//! injection hooks let tests interrupt a commit or a `published_at` write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::capability::{Capability, CapabilityRepository};
use crate::error::OutboxError;
use crate::outbox::{Envelope, PendingEvents};
use super::{EnvelopeStore, Storage};

#[derive(Debug, Clone)]
struct StoredCapability {
    id: Uuid,
    name: String,
    description: String,
    members: Vec<String>,
}

impl StoredCapability {
    fn snapshot(capability: &Capability) -> Self {
        Self {
            id: capability.id(),
            name: capability.name().to_string(),
            description: capability.description().to_string(),
            members: capability.members().to_vec(),
        }
    }

    fn restore(&self) -> Capability {
        Capability::restore(self.id, &self.name, &self.description, self.members.clone())
    }
}

#[derive(Default)]
struct MemoryState {
    capabilities: HashMap<Uuid, StoredCapability>,
    envelopes: Vec<Envelope>,
    fail_next_commit: bool,
    failing_fetches: u32,
    failing_marks: u32,
}

/// Buffered writes of one in-memory transaction.
#[derive(Debug, Default)]
pub struct MemoryTransaction {
    capabilities: Vec<StoredCapability>,
    envelopes: Vec<Envelope>,
}

#[derive(Clone, Default)]
pub struct InMemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// All committed envelopes in insertion order.
    pub async fn envelopes(&self) -> Vec<Envelope> {
        self.state.lock().await.envelopes.clone()
    }

    pub async fn envelope(&self, envelope_id: Uuid) -> Option<Envelope> {
        self.state
            .lock()
            .await
            .envelopes
            .iter()
            .find(|e| e.envelope_id == envelope_id)
            .cloned()
    }

    pub async fn capability_count(&self) -> usize {
        self.state.lock().await.capabilities.len()
    }

    /// Make the next commit fail without applying anything.
    pub async fn fail_next_commit(&self) {
        self.state.lock().await.fail_next_commit = true;
    }

    /// Make the next `times` unpublished-envelope queries fail.
    pub async fn fail_fetches(&self, times: u32) {
        self.state.lock().await.failing_fetches = times;
    }

    /// Make the next `times` `published_at` writes fail.
    pub async fn fail_marks(&self, times: u32) {
        self.state.lock().await.failing_marks = times;
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, OutboxError> {
        Ok(MemoryTransaction::default())
    }

    async fn commit(&self, tx: MemoryTransaction) -> Result<(), OutboxError> {
        let mut state = self.state.lock().await;

        if state.fail_next_commit {
            state.fail_next_commit = false;
            return Err(OutboxError::TransactionFailure(
                "commit interrupted".to_string(),
            ));
        }

        for capability in tx.capabilities {
            state.capabilities.insert(capability.id, capability);
        }
        state.envelopes.extend(tx.envelopes);

        Ok(())
    }

    async fn rollback(&self, tx: MemoryTransaction) -> Result<(), OutboxError> {
        tracing::debug!(
            discarded_envelopes = tx.envelopes.len(),
            discarded_capabilities = tx.capabilities.len(),
            "Rolled back in-memory transaction"
        );
        Ok(())
    }
}

#[async_trait]
impl EnvelopeStore for InMemoryStorage {
    async fn insert_envelope(&self, tx: &mut MemoryTransaction, envelope: &Envelope) -> Result<(), OutboxError> {
        tx.envelopes.push(envelope.clone());
        Ok(())
    }

    async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<Envelope>, OutboxError> {
        let mut state = self.state.lock().await;

        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(OutboxError::Unavailable("envelope query failed".to_string()));
        }

        let mut pending: Vec<Envelope> = state
            .envelopes
            .iter()
            .filter(|e| !e.is_published())
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.envelope_id.cmp(&b.envelope_id))
        });
        pending.truncate(limit.max(0) as usize);

        Ok(pending)
    }

    async fn mark_published(
        &self,
        envelope_id: Uuid,
        published_at: DateTime<Utc>,
    ) -> Result<(), OutboxError> {
        let mut state = self.state.lock().await;

        if state.failing_marks > 0 {
            state.failing_marks -= 1;
            return Err(OutboxError::Unavailable(format!(
                "could not mark envelope {} as published",
                envelope_id
            )));
        }

        if let Some(envelope) = state
            .envelopes
            .iter_mut()
            .find(|e| e.envelope_id == envelope_id)
        {
            envelope.mark_published(published_at);
        }

        Ok(())
    }
}

/// Capability repository over `InMemoryStorage`.
#[derive(Clone)]
pub struct InMemoryCapabilityRepository {
    storage: InMemoryStorage,
}

impl InMemoryCapabilityRepository {
    pub fn new(storage: InMemoryStorage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl CapabilityRepository<MemoryTransaction> for InMemoryCapabilityRepository {
    async fn get_by_id(&self, tx: &mut MemoryTransaction, id: Uuid) -> Result<Option<Capability>, OutboxError> {
        if let Some(stored) = tx.capabilities.iter().rev().find(|c| c.id == id) {
            return Ok(Some(stored.restore()));
        }

        let state = self.storage.state.lock().await;
        Ok(state.capabilities.get(&id).map(StoredCapability::restore))
    }

    async fn exists(&self, tx: &mut MemoryTransaction, id: Uuid) -> Result<bool, OutboxError> {
        Ok(self.get_by_id(tx, id).await?.is_some())
    }

    async fn save(&self, tx: &mut MemoryTransaction, capability: &mut Capability) -> Result<PendingEvents, OutboxError> {
        tx.capabilities.retain(|c| c.id != capability.id());
        tx.capabilities.push(StoredCapability::snapshot(capability));
        Ok(capability.take_pending_events())
    }
}
