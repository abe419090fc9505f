use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::capability::Capability;
use crate::outbox::Outbox;
use crate::storage::EnvelopeStore;
use super::{CapabilityApplicationService, CapabilityOperations, Recorded, ServiceError};

/// Runs every capability operation in one storage transaction together with
/// the outbox writes for the events it raised.
pub struct TransactionalCapabilityService<S: EnvelopeStore, I> {
    storage: Arc<S>,
    outbox: Outbox<S>,
    inner: I,
}

impl<S, I> TransactionalCapabilityService<S, I>
where
    S: EnvelopeStore + 'static,
    I: CapabilityOperations<S::Tx>,
{
    pub fn new(storage: Arc<S>, outbox: Outbox<S>, inner: I) -> Self {
        Self {
            storage,
            outbox,
            inner,
        }
    }

    /// Stage the recorded events and commit, or roll back on the first error.
    async fn complete<T: Send>(
        &self,
        mut tx: S::Tx,
        operation: &'static str,
        result: Result<Recorded<T>, ServiceError>,
    ) -> Result<T, ServiceError> {
        let recorded = match result {
            Ok(recorded) => recorded,
            Err(e) => return Err(self.abort(tx, operation, e).await),
        };

        for event in &recorded.events {
            if let Err(e) = self.outbox.stage(&mut tx, event.as_ref()).await {
                return Err(self.abort(tx, operation, e.into()).await);
            }
        }

        if let Err(e) = self.storage.commit(tx).await {
            tracing::error!(operation = operation, error = %e, "Commit failed");
            return Err(e.into());
        }

        tracing::info!(
            operation = operation,
            staged = recorded.events.len(),
            "Committed capability operation"
        );
        Ok(recorded.value)
    }

    /// Roll back and hand back `error` untouched.
    async fn abort(&self, tx: S::Tx, operation: &'static str, error: ServiceError) -> ServiceError {
        if let Err(rollback_error) = self.storage.rollback(tx).await {
            tracing::error!(
                operation = operation,
                error = %rollback_error,
                "Rollback failed"
            );
        }

        tracing::warn!(operation = operation, error = %error, "Rolled back capability operation");
        error
    }
}

#[async_trait]
impl<S, I> CapabilityApplicationService for TransactionalCapabilityService<S, I>
where
    S: EnvelopeStore + 'static,
    I: CapabilityOperations<S::Tx> + 'static,
{
    async fn create_capability(&self, name: &str, description: &str) -> Result<Capability, ServiceError> {
        let mut tx = self.storage.begin().await?;
        let result = self.inner.create_capability(&mut tx, name, description).await;
        self.complete(tx, "create_capability", result).await
    }

    async fn join_capability(&self, capability_id: Uuid, member_email: &str) -> Result<(), ServiceError> {
        let mut tx = self.storage.begin().await?;
        let result = self.inner.join_capability(&mut tx, capability_id, member_email).await;
        self.complete(tx, "join_capability", result).await
    }

    async fn leave_capability(&self, capability_id: Uuid, member_email: &str) -> Result<(), ServiceError> {
        let mut tx = self.storage.begin().await?;
        let result = self.inner.leave_capability(&mut tx, capability_id, member_email).await;
        self.complete(tx, "leave_capability", result).await
    }

    async fn get_capability(&self, capability_id: Uuid) -> Result<Option<Capability>, ServiceError> {
        let mut tx = self.storage.begin().await?;
        let result = self.inner.get_capability(&mut tx, capability_id).await;

        // Read only, nothing to keep.
        if let Err(e) = self.storage.rollback(tx).await {
            tracing::warn!(error = %e, "Rollback after read failed");
        }
        result
    }
}
