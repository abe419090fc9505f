use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::OutboxError;
use super::BrokerClient;

/// One record as the broker received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    pub topic: String,
    pub key: String,
    pub payload: String,
}

/// Broker client that keeps every acknowledged record in memory.
///
/// Outcomes can be scripted: each queued `false` makes one send fail before
/// anything is recorded.
#[derive(Default)]
pub struct RecordingBroker {
    sent: Mutex<Vec<SentRecord>>,
    script: Mutex<VecDeque<bool>>,
    attempts: Mutex<usize>,
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` sends.
    pub fn fail_next(&self, times: usize) {
        if let Ok(mut script) = self.script.lock() {
            script.extend(std::iter::repeat(false).take(times));
        }
    }

    pub fn sent(&self) -> Vec<SentRecord> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Every send call, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.lock().map(|a| *a).unwrap_or_default()
    }
}

#[async_trait]
impl BrokerClient for RecordingBroker {
    async fn send(&self, topic: &str, key: &str, payload: &str) -> Result<(), OutboxError> {
        *self.attempts.lock().map_err(|_| poisoned(topic))? += 1;

        let succeed = self
            .script
            .lock()
            .map_err(|_| poisoned(topic))?
            .pop_front()
            .unwrap_or(true);
        if !succeed {
            return Err(OutboxError::PublishFailure {
                topic: topic.to_string(),
                reason: "broker unavailable".to_string(),
            });
        }

        self.sent.lock().map_err(|_| poisoned(topic))?.push(SentRecord {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}

fn poisoned(topic: &str) -> OutboxError {
    OutboxError::PublishFailure {
        topic: topic.to_string(),
        reason: "recording broker lock poisoned".to_string(),
    }
}
