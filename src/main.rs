use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use capability_outbox::application::{
    CapabilityApplicationService, CapabilityService, TransactionalCapabilityService,
};
use capability_outbox::config::{EnvironmentSource, Settings};
use capability_outbox::domain::capability::capability_event_registry;
use capability_outbox::messaging::{KafkaConfiguration, KafkaPublisherFactory};
use capability_outbox::metrics::{self, Metrics};
use capability_outbox::outbox::Outbox;
use capability_outbox::publisher::Publisher;
use capability_outbox::storage::{postgres, PgCapabilityRepository, PgStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,capability_outbox=debug")),
        )
        .init();

    tracing::info!("Starting capability service outbox");

    let settings = Settings::from_source(&EnvironmentSource).context("invalid settings")?;
    tracing::debug!(settings = ?settings, "Loaded settings");

    // === 1. Database ===
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(settings.database_connection_string.expose())
        .await
        .context("could not connect to the database")?;
    postgres::migrate(&pool).await?;
    let storage = Arc::new(PgStorage::new(pool));

    // === 2. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = settings.metrics_port;
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        if let Err(e) = system.block_on(metrics::start_metrics_server(metrics_registry, metrics_port)) {
            tracing::error!(error = %e, "Metrics server error");
        }
    });

    // === 3. Event registry ===
    let registry = Arc::new(capability_event_registry()?);
    for registration in registry.registrations() {
        tracing::info!(
            kind_tag = %registration.kind_tag,
            topic = %registration.topic,
            payload_type = ?registration.payload_type,
            "Registered domain event"
        );
    }

    // === 4. Kafka producer and publisher ===
    let producer = KafkaPublisherFactory::new(KafkaConfiguration::from_source(&EnvironmentSource))
        .create()
        .context("could not create Kafka producer")?;
    let publisher = Publisher::new(storage.clone(), Arc::new(producer), settings.publisher.clone())
        .with_metrics(metrics.clone())
        .start();

    // === 5. Capability service ===
    let outbox = Outbox::new(storage.clone(), registry).with_metrics(metrics.clone());
    let service = TransactionalCapabilityService::new(
        storage.clone(),
        outbox,
        CapabilityService::new(PgCapabilityRepository),
    );

    if let Some(name) = &settings.demo_capability_name {
        match service.create_capability(name, "Created at startup").await {
            Ok(capability) => tracing::info!(
                capability_id = %capability.id(),
                name = %capability.name(),
                "Created demo capability"
            ),
            Err(e) => tracing::error!(error = %e, "Could not create demo capability"),
        }
    }

    tracing::info!("Running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down");
    publisher.stop().await;

    Ok(())
}
