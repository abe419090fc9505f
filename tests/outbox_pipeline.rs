use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use capability_outbox::application::{
    CapabilityApplicationService, CapabilityService, ServiceError, TransactionalCapabilityService,
};
use capability_outbox::domain::capability::{capability_event_registry, CapabilityCreated};
use capability_outbox::messaging::RecordingBroker;
use capability_outbox::outbox::{DomainEvent, Envelope, EventRegistry, Outbox};
use capability_outbox::publisher::{Publisher, PublisherConfig, PublisherState};
use capability_outbox::storage::{EnvelopeStore, InMemoryCapabilityRepository, InMemoryStorage, Storage};
use capability_outbox::utils::BackoffConfig;
use capability_outbox::OutboxError;

type MemoryService =
    TransactionalCapabilityService<InMemoryStorage, CapabilityService<InMemoryCapabilityRepository>>;

fn capability_service(storage: &Arc<InMemoryStorage>, registry: EventRegistry) -> MemoryService {
    let outbox = Outbox::new(storage.clone(), Arc::new(registry));
    let repository = InMemoryCapabilityRepository::new((**storage).clone());
    TransactionalCapabilityService::new(storage.clone(), outbox, CapabilityService::new(repository))
}

fn publisher_config() -> PublisherConfig {
    PublisherConfig {
        poll_interval: Duration::from_millis(10),
        batch_size: 50,
        backoff: BackoffConfig {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            multiplier: 2.0,
        },
        shutdown_grace: Duration::from_secs(1),
    }
}

#[tokio::test]
async fn test_created_capability_is_published_once() {
    let storage = Arc::new(InMemoryStorage::new());
    let broker = Arc::new(RecordingBroker::new());
    let service = capability_service(&storage, capability_event_registry().unwrap());

    let capability = service.create_capability("Payments", "").await.unwrap();

    let publisher = Publisher::new(storage.clone(), broker.clone(), publisher_config());
    let report = publisher.run_cycle().await;
    assert_eq!(report.published, 1);

    let sent = broker.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].topic, "build.capabilities");
    assert_eq!(sent[0].key, capability.id().to_string());
    assert!(sent[0].payload.contains(&capability.id().to_string()));

    let envelope = &storage.envelopes().await[0];
    assert!(envelope.published_at.is_some());

    // Nothing left for the next cycle.
    assert_eq!(publisher.run_cycle().await.published, 0);
    assert_eq!(broker.sent().len(), 1);
}

#[tokio::test]
async fn test_broker_outage_delays_but_does_not_undo_the_operation() {
    let storage = Arc::new(InMemoryStorage::new());
    let broker = Arc::new(RecordingBroker::new());
    let service = capability_service(&storage, capability_event_registry().unwrap());
    let capability = service.create_capability("Payments", "").await.unwrap();
    broker.fail_next(2);

    let publisher = Publisher::new(storage.clone(), broker.clone(), publisher_config());

    for _ in 0..2 {
        let report = publisher.run_cycle().await;
        assert!(matches!(report.failure, Some(OutboxError::PublishFailure { .. })));
        assert_eq!(storage.fetch_unpublished(10).await.unwrap().len(), 1);
    }

    assert!(publisher.run_cycle().await.is_success());
    assert!(storage.fetch_unpublished(10).await.unwrap().is_empty());
    assert_eq!(broker.sent().len(), 1);

    assert_eq!(storage.capability_count().await, 1);
    assert_eq!(storage.envelopes().await.len(), 1);
    assert!(service.get_capability(capability.id()).await.unwrap().is_some());
}

#[derive(Debug, Serialize)]
struct CapabilityArchived {
    event_id: Uuid,
    capability_id: Uuid,
}

impl DomainEvent for CapabilityArchived {
    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.capability_id
    }
}

#[tokio::test]
async fn test_unregistered_event_fails_the_whole_operation() {
    let storage = Arc::new(InMemoryStorage::new());
    let registry = EventRegistry::builder()
        .register::<CapabilityArchived>("capabilityarchived", "build.capabilities")
        .unwrap()
        .build();
    let service = capability_service(&storage, registry);

    let err = service.create_capability("Payments", "").await.unwrap_err();

    assert!(matches!(err, ServiceError::Outbox(OutboxError::UnregisteredEventKind(_))));
    assert_eq!(storage.capability_count().await, 0);
    assert!(storage.envelopes().await.is_empty());
}

#[tokio::test]
async fn test_envelopes_are_sent_in_creation_order() {
    let storage = Arc::new(InMemoryStorage::new());
    let broker = Arc::new(RecordingBroker::new());
    let now = Utc::now();

    let mut second = Envelope::new("capabilitycreated", "build.capabilities", "b", "T2");
    second.created_at = now;
    let mut first = Envelope::new("capabilitycreated", "build.capabilities", "a", "T1");
    first.created_at = now - ChronoDuration::milliseconds(5);

    // Committed in reverse on purpose.
    let mut tx = storage.begin().await.unwrap();
    storage.insert_envelope(&mut tx, &second).await.unwrap();
    storage.insert_envelope(&mut tx, &first).await.unwrap();
    storage.commit(tx).await.unwrap();

    let publisher = Publisher::new(storage.clone(), broker.clone(), publisher_config());
    publisher.run_cycle().await;

    let order: Vec<String> = broker.sent().into_iter().map(|r| r.payload).collect();
    assert_eq!(order, vec!["T1", "T2"]);
}

#[tokio::test]
async fn test_interrupted_commit_stages_nothing() {
    let storage = Arc::new(InMemoryStorage::new());
    let service = capability_service(&storage, capability_event_registry().unwrap());
    storage.fail_next_commit().await;

    let err = service.create_capability("Payments", "").await.unwrap_err();

    assert!(matches!(err, ServiceError::Outbox(OutboxError::TransactionFailure(_))));
    assert_eq!(storage.capability_count().await, 0);
    assert!(storage.envelopes().await.is_empty());
}

#[tokio::test]
async fn test_delivery_without_mark_is_repeated() {
    let storage = Arc::new(InMemoryStorage::new());
    let broker = Arc::new(RecordingBroker::new());
    let service = capability_service(&storage, capability_event_registry().unwrap());
    service.create_capability("Payments", "").await.unwrap();
    storage.fail_marks(1).await;

    let publisher = Publisher::new(storage.clone(), broker.clone(), publisher_config());
    assert!(!publisher.run_cycle().await.is_success());
    assert!(publisher.run_cycle().await.is_success());

    let sent = broker.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
}

#[tokio::test]
async fn test_published_payload_round_trips() {
    let storage = Arc::new(InMemoryStorage::new());
    let broker = Arc::new(RecordingBroker::new());
    let service = capability_service(&storage, capability_event_registry().unwrap());
    let capability = service.create_capability("Payments", "").await.unwrap();

    Publisher::new(storage.clone(), broker.clone(), publisher_config())
        .run_cycle()
        .await;

    let sent = broker.sent();
    let raw: serde_json::Value = serde_json::from_str(&sent[0].payload).unwrap();
    assert_eq!(raw["capabilityId"], capability.id().to_string());

    let decoded: CapabilityCreated = serde_json::from_str(&sent[0].payload).unwrap();
    assert_eq!(decoded.capability_id, capability.id());
    assert_eq!(decoded.capability_name, "Payments");
    assert_eq!(decoded.aggregate_id(), capability.id());
}

#[tokio::test]
async fn test_membership_changes_flow_to_the_broker() {
    let storage = Arc::new(InMemoryStorage::new());
    let broker = Arc::new(RecordingBroker::new());
    let service = capability_service(&storage, capability_event_registry().unwrap());
    let id = service.create_capability("Payments", "").await.unwrap().id();

    let handle = Publisher::new(storage.clone(), broker.clone(), publisher_config()).start();

    service.join_capability(id, "jane@dfds.com").await.unwrap();
    service.leave_capability(id, "jane@dfds.com").await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while broker.sent().len() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("events were not published");

    handle.stop().await;

    let kinds: Vec<String> = storage.envelopes().await.into_iter().map(|e| e.kind_tag).collect();
    assert_eq!(kinds, vec!["capabilitycreated", "memberjoinedcapability", "memberleftcapability"]);
    assert!(storage.fetch_unpublished(10).await.unwrap().is_empty());
    assert!(broker.sent().iter().all(|r| r.key == id.to_string()));
}

#[tokio::test]
async fn test_stop_reaches_stopped_state() {
    let storage = Arc::new(InMemoryStorage::new());
    let broker = Arc::new(RecordingBroker::new());

    let handle = Publisher::new(storage, broker, publisher_config()).start();
    let state = handle.subscribe();
    assert_ne!(handle.state(), PublisherState::Stopped);

    tokio::time::timeout(Duration::from_secs(2), handle.stop())
        .await
        .expect("publisher did not stop in time");
    assert_eq!(*state.borrow(), PublisherState::Stopped);
}

#[tokio::test]
async fn test_order_follows_visibility_at_poll_time() {
    let storage = Arc::new(InMemoryStorage::new());
    let broker = Arc::new(RecordingBroker::new());
    let publisher = Publisher::new(storage.clone(), broker.clone(), publisher_config());

    let mut staged_first = Envelope::new("capabilitycreated", "build.capabilities", "a", "A");
    staged_first.created_at = Utc::now() - ChronoDuration::milliseconds(5);
    let staged_second = Envelope::new("capabilitycreated", "build.capabilities", "b", "B");

    let mut tx_a = storage.begin().await.unwrap();
    storage.insert_envelope(&mut tx_a, &staged_first).await.unwrap();
    let mut tx_b = storage.begin().await.unwrap();
    storage.insert_envelope(&mut tx_b, &staged_second).await.unwrap();

    // B commits while A is still open.
    storage.commit(tx_b).await.unwrap();
    publisher.run_cycle().await;
    storage.commit(tx_a).await.unwrap();
    publisher.run_cycle().await;

    let order: Vec<String> = broker.sent().into_iter().map(|r| r.payload).collect();
    assert_eq!(order, vec!["B", "A"]);
}
