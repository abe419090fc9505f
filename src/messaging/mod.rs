mod kafka;
mod recording;

use async_trait::async_trait;

use crate::error::OutboxError;

pub use kafka::{KafkaConfiguration, KafkaPublisher, KafkaPublisherFactory, KEY_PREFIX, REQUEST_TIMEOUT_MS};
pub use recording::{RecordingBroker, SentRecord};

/// Topic-addressed broker transport. `Ok` means the broker acknowledged the
/// record; anything else is a `PublishFailure`.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn send(&self, topic: &str, key: &str, payload: &str) -> Result<(), OutboxError>;
}
