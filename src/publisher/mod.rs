use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::OutboxError;
use crate::messaging::BrokerClient;
use crate::metrics::Metrics;
use crate::outbox::Envelope;
use crate::storage::EnvelopeStore;
use crate::utils::{Backoff, BackoffConfig};

// ============================================================================
// Outbox Publisher
// ============================================================================
//
// Background task that drains the envelope table to the broker:
//
//   Idle -> Polling -> Publishing -> Idle -> ...   until shutdown -> Stopped
//
// Envelopes are sent one at a time in `created_at` order. The first failure
// ends the cycle; the failed envelope stays unpublished and is picked up
// again after a backoff delay. `published_at` is written only after the
// broker acknowledged the record, so delivery is at-least-once.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct PublisherConfig {
    /// Sleep between cycles that found less than a full batch
    pub poll_interval: Duration,
    /// Maximum envelopes fetched per cycle
    pub batch_size: i64,
    /// Delay schedule after failed cycles
    pub backoff: BackoffConfig,
    /// How long `stop` waits for the task before aborting it
    pub shutdown_grace: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            batch_size: 100,
            backoff: BackoffConfig::default(),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherState {
    Idle,
    Polling,
    Publishing,
    Stopped,
}

/// Outcome of one polling cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub fetched: usize,
    pub published: usize,
    pub failure: Option<OutboxError>,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct Publisher<S: EnvelopeStore, B: BrokerClient> {
    store: Arc<S>,
    broker: Arc<B>,
    config: PublisherConfig,
    metrics: Option<Arc<Metrics>>,
    state: watch::Sender<PublisherState>,
    shutdown: watch::Receiver<bool>,
}

impl<S, B> Publisher<S, B>
where
    S: EnvelopeStore + 'static,
    B: BrokerClient + 'static,
{
    pub fn new(store: Arc<S>, broker: Arc<B>, config: PublisherConfig) -> Self {
        let (state, _) = watch::channel(PublisherState::Idle);
        // Replaced in `start`; until then nobody can request a shutdown.
        let (_, shutdown) = watch::channel(false);

        Self {
            store,
            broker,
            config,
            metrics: None,
            state,
            shutdown,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> PublisherState {
        *self.state.borrow()
    }

    fn set_state(&self, state: PublisherState) {
        self.state.send_replace(state);
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run a single poll-and-publish cycle.
    pub async fn run_cycle(&self) -> CycleReport {
        self.set_state(PublisherState::Polling);

        let batch = match self.store.fetch_unpublished(self.config.batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to query unpublished envelopes");
                self.set_state(PublisherState::Idle);
                return CycleReport {
                    fetched: 0,
                    published: 0,
                    failure: Some(e),
                };
            }
        };

        let fetched = batch.len();
        let mut published = 0;
        let mut failure = None;

        if fetched > 0 {
            self.set_state(PublisherState::Publishing);
            tracing::debug!(count = fetched, "Publishing outbox batch");
        }

        for envelope in &batch {
            if self.shutdown_requested() {
                tracing::debug!(
                    remaining = fetched - published,
                    "Shutdown requested, leaving remaining envelopes for the next run"
                );
                break;
            }

            if let Err(e) = self.publish(envelope).await {
                failure = Some(e);
                break;
            }
            published += 1;
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_cycle();
        }
        self.set_state(PublisherState::Idle);

        CycleReport {
            fetched,
            published,
            failure,
        }
    }

    async fn publish(&self, envelope: &Envelope) -> Result<(), OutboxError> {
        let started = Instant::now();

        if let Err(e) = self
            .broker
            .send(&envelope.topic, &envelope.partition_key, &envelope.payload)
            .await
        {
            if let Some(metrics) = &self.metrics {
                metrics.record_publish_failure(&envelope.topic);
            }
            tracing::warn!(
                envelope_id = %envelope.envelope_id,
                topic = %envelope.topic,
                error = %e,
                "Failed to publish envelope"
            );
            return Err(e);
        }

        let send_secs = started.elapsed().as_secs_f64();

        if let Err(e) = self
            .store
            .mark_published(envelope.envelope_id, Utc::now())
            .await
        {
            tracing::warn!(
                envelope_id = %envelope.envelope_id,
                error = %e,
                "Envelope was delivered but could not be marked; it will be sent again"
            );
            return Err(e);
        }

        // Counted once per envelope, after the mark sticks.
        if let Some(metrics) = &self.metrics {
            metrics.record_published(&envelope.topic, send_secs);
        }

        tracing::info!(
            envelope_id = %envelope.envelope_id,
            kind_tag = %envelope.kind_tag,
            topic = %envelope.topic,
            key = %envelope.partition_key,
            "Published envelope"
        );
        Ok(())
    }

    /// Spawn the publishing loop.
    pub fn start(mut self) -> PublisherHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown = shutdown_rx.clone();

        let state = self.state.subscribe();
        let grace = self.config.shutdown_grace;
        let task = tokio::spawn(self.run(shutdown_rx));

        PublisherHandle {
            shutdown: shutdown_tx,
            state,
            task,
            grace,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = Backoff::new(self.config.backoff.clone());

        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Outbox publisher started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.run_cycle().await;

            let delay = match &report.failure {
                Some(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        published = report.published,
                        failures = backoff.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Publish cycle failed, backing off"
                    );
                    delay
                }
                None => {
                    backoff.reset();
                    if report.published > 0 && report.fetched as i64 >= self.config.batch_size {
                        // Full batch, there is probably more waiting.
                        continue;
                    }
                    self.config.poll_interval
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        tracing::warn!("Publisher handle dropped without stop, shutting down");
                    }
                    break;
                }
            }
        }

        self.set_state(PublisherState::Stopped);
        tracing::info!("Outbox publisher stopped");
    }
}

/// Control handle for a running publisher.
///
/// Hold it for as long as the publisher should run: dropping it closes the
/// shutdown channel and the loop stops after its current cycle.
pub struct PublisherHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<PublisherState>,
    task: JoinHandle<()>,
    grace: Duration,
}

impl PublisherHandle {
    pub fn state(&self) -> PublisherState {
        *self.state.borrow()
    }

    /// Follow state changes, including the final `Stopped`.
    pub fn subscribe(&self) -> watch::Receiver<PublisherState> {
        self.state.clone()
    }

    /// Request shutdown and wait for the loop to finish. An in-flight send
    /// completes; no new one is started. After the grace period the task is
    /// aborted.
    pub async fn stop(mut self) {
        self.shutdown.send_replace(true);

        match tokio::time::timeout(self.grace, &mut self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Outbox publisher task failed"),
            Err(_) => {
                tracing::warn!(
                    grace_ms = self.grace.as_millis() as u64,
                    "Outbox publisher did not stop within the grace period, aborting"
                );
                self.task.abort();
            }
        }
    }
}
