use async_trait::async_trait;
use uuid::Uuid;

use crate::error::OutboxError;
use crate::outbox::PendingEvents;
use super::aggregate::Capability;

/// Persistence for capabilities, always inside a caller-owned transaction.
#[async_trait]
pub trait CapabilityRepository<Tx: Send>: Send + Sync {
    async fn get_by_id(&self, tx: &mut Tx, id: Uuid) -> Result<Option<Capability>, OutboxError>;

    async fn exists(&self, tx: &mut Tx, id: Uuid) -> Result<bool, OutboxError>;

    /// Write the capability's current state and return the events it raised
    /// since it was loaded.
    async fn save(&self, tx: &mut Tx, capability: &mut Capability) -> Result<PendingEvents, OutboxError>;
}
