use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable record of one staged domain event.
///
/// `topic` is resolved when the event is staged and kept as-is; the publisher
/// never consults the registry again. `published_at` stays `None` until the
/// broker acknowledged the record and is never cleared afterwards.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Envelope {
    pub envelope_id: Uuid,
    pub kind_tag: String,
    pub topic: String,
    pub partition_key: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Envelope {
    pub fn new(
        kind_tag: impl Into<String>,
        topic: impl Into<String>,
        partition_key: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            envelope_id: Uuid::now_v7(),
            kind_tag: kind_tag.into(),
            topic: topic.into(),
            partition_key: partition_key.into(),
            payload: payload.into(),
            created_at: Utc::now(),
            published_at: None,
        }
    }

    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }

    /// Record delivery. A second call keeps the first timestamp.
    pub fn mark_published(&mut self, at: DateTime<Utc>) {
        if self.published_at.is_none() {
            self.published_at = Some(at);
        }
    }
}
