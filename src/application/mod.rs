// ============================================================================
// Capability Application Service
// ============================================================================
//
// Two layers over the same operations:
//
// - `CapabilityOperations<Tx>` runs against a transaction it is handed and
//   reports the domain events it produced (`CapabilityService`).
// - `CapabilityApplicationService` is what callers use. Its implementation
//   (`TransactionalCapabilityService`) owns the transaction: it begins it,
//   stages the reported events in the outbox and commits, or rolls back
//   everything on the first error.
//
// ============================================================================

mod service;
mod transactional;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::capability::{Capability, CapabilityError};
use crate::error::OutboxError;
use crate::outbox::PendingEvents;

pub use service::CapabilityService;
pub use transactional::TransactionalCapabilityService;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Outbox(#[from] OutboxError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("capability {0} not found")]
    CapabilityNotFound(Uuid),
}

/// Result of an operation together with the events it raised.
pub struct Recorded<T> {
    pub value: T,
    pub events: PendingEvents,
}

impl<T> Recorded<T> {
    pub fn new(value: T, events: PendingEvents) -> Self {
        Self { value, events }
    }
}

#[async_trait]
pub trait CapabilityApplicationService: Send + Sync {
    async fn create_capability(&self, name: &str, description: &str) -> Result<Capability, ServiceError>;

    async fn join_capability(&self, capability_id: Uuid, member_email: &str) -> Result<(), ServiceError>;

    async fn leave_capability(&self, capability_id: Uuid, member_email: &str) -> Result<(), ServiceError>;

    async fn get_capability(&self, capability_id: Uuid) -> Result<Option<Capability>, ServiceError>;
}

#[async_trait]
pub trait CapabilityOperations<Tx: Send>: Send + Sync {
    async fn create_capability(
        &self,
        tx: &mut Tx,
        name: &str,
        description: &str,
    ) -> Result<Recorded<Capability>, ServiceError>;

    async fn join_capability(
        &self,
        tx: &mut Tx,
        capability_id: Uuid,
        member_email: &str,
    ) -> Result<Recorded<()>, ServiceError>;

    async fn leave_capability(
        &self,
        tx: &mut Tx,
        capability_id: Uuid,
        member_email: &str,
    ) -> Result<Recorded<()>, ServiceError>;

    async fn get_capability(&self, tx: &mut Tx, capability_id: Uuid) -> Result<Option<Capability>, ServiceError>;
}
