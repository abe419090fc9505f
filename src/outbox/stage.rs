use std::sync::Arc;

use crate::error::OutboxError;
use crate::metrics::Metrics;
use crate::storage::EnvelopeStore;
use super::envelope::Envelope;
use super::event::DomainEvent;
use super::registry::EventRegistry;

/// Stages domain events into the envelope table of an open transaction.
pub struct Outbox<S: EnvelopeStore> {
    store: Arc<S>,
    registry: Arc<EventRegistry>,
    metrics: Option<Arc<Metrics>>,
}

impl<S: EnvelopeStore> Outbox<S> {
    pub fn new(store: Arc<S>, registry: Arc<EventRegistry>) -> Self {
        Self {
            store,
            registry,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Resolve, serialize and insert `event` through `tx`.
    ///
    /// Any error leaves `tx` in a state the caller must roll back.
    pub async fn stage(&self, tx: &mut S::Tx, event: &dyn DomainEvent) -> Result<Envelope, OutboxError> {
        let kind_tag = self.registry.kind_tag_for(event)?;
        let topic = self.registry.topic_for(kind_tag)?;
        let payload = event.to_payload()?;

        let envelope = Envelope::new(
            kind_tag,
            topic,
            event.aggregate_id().to_string(),
            payload,
        );

        self.store.insert_envelope(tx, &envelope).await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_staged(kind_tag);
        }

        tracing::debug!(
            envelope_id = %envelope.envelope_id,
            event_id = %event.event_id(),
            kind_tag = %envelope.kind_tag,
            topic = %envelope.topic,
            "Staged event in outbox"
        );

        Ok(envelope)
    }
}
