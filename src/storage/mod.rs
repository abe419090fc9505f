// ============================================================================
// Storage
// ============================================================================
//
// `Storage` is the transaction boundary shared by aggregate repositories and
// the outbox. `EnvelopeStore` adds the envelope table on top of it: inserts
// go through an open transaction, while the publisher's reads and
// `published_at` updates run on their own short-lived connections.
//
// ============================================================================

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::OutboxError;
use crate::outbox::Envelope;

pub use memory::{InMemoryCapabilityRepository, InMemoryStorage, MemoryTransaction};
pub use postgres::{PgCapabilityRepository, PgStorage};

#[async_trait]
pub trait Storage: Send + Sync {
    type Tx: Send + 'static;

    async fn begin(&self) -> Result<Self::Tx, OutboxError>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), OutboxError>;

    async fn rollback(&self, tx: Self::Tx) -> Result<(), OutboxError>;
}

#[async_trait]
pub trait EnvelopeStore: Storage {
    /// Queue `envelope` as part of `tx`. Visible to readers only after commit.
    async fn insert_envelope(&self, tx: &mut Self::Tx, envelope: &Envelope) -> Result<(), OutboxError>;

    /// Unpublished envelopes, oldest `created_at` first, at most `limit`.
    async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<Envelope>, OutboxError>;

    /// Set `published_at` on one envelope if it is still unset.
    async fn mark_published(
        &self,
        envelope_id: Uuid,
        published_at: DateTime<Utc>,
    ) -> Result<(), OutboxError>;
}
