use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};
use std::time::Duration;

use crate::config::{environment_key, lookup_setting, ConfigSource};
use crate::error::OutboxError;
use super::BrokerClient;

// ============================================================================
// Kafka Broker Client
// ============================================================================
//
// The producer is configured purely from the environment. Optional settings
// that are not present are left out so librdkafka applies its own defaults;
// only the request timeout is pinned.
//
// ============================================================================

pub const KEY_PREFIX: &str = "CAPABILITY_SERVICE_KAFKA_";

pub const REQUEST_TIMEOUT_MS: u64 = 3000;

const CONFIGURATION_KEYS: &[&str] = &[
    "bootstrap.servers",
    "broker.version.fallback",
    "api.version.fallback.ms",
    "ssl.ca.location",
    "sasl.username",
    "sasl.password",
    "sasl.mechanisms",
    "security.protocol",
];

const MANDATORY_KEYS: &[&str] = &["bootstrap.servers"];

/// Producer settings resolved from a `ConfigSource`.
#[derive(Clone)]
pub struct KafkaConfiguration {
    entries: Vec<(String, String)>,
}

impl KafkaConfiguration {
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        let mut entries: Vec<(String, String)> = CONFIGURATION_KEYS
            .iter()
            .filter_map(|key| {
                lookup_setting(source, KEY_PREFIX, key).map(|value| (key.to_string(), value))
            })
            .collect();

        entries.push(("request.timeout.ms".to_string(), REQUEST_TIMEOUT_MS.to_string()));

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Keys that will be handed to the client. Values are left out since
    /// some of them are credentials.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn client_config(&self) -> Result<ClientConfig, OutboxError> {
        for key in MANDATORY_KEYS {
            if self.get(key).is_none() {
                return Err(OutboxError::missing_setting(&environment_key(KEY_PREFIX, key)));
            }
        }

        let mut config = ClientConfig::new();
        for (key, value) in &self.entries {
            config.set(key, value);
        }
        Ok(config)
    }
}

pub struct KafkaPublisherFactory {
    configuration: KafkaConfiguration,
}

impl KafkaPublisherFactory {
    pub fn new(configuration: KafkaConfiguration) -> Self {
        Self { configuration }
    }

    pub fn create(&self) -> Result<KafkaPublisher, OutboxError> {
        let producer: FutureProducer = self
            .configuration
            .client_config()?
            .create()
            .map_err(|e| OutboxError::Configuration(format!("could not create Kafka producer: {}", e)))?;

        tracing::info!(
            settings = ?self.configuration.keys().collect::<Vec<_>>(),
            "Created Kafka producer"
        );

        Ok(KafkaPublisher { producer })
    }
}

pub struct KafkaPublisher {
    producer: FutureProducer,
}

#[async_trait]
impl BrokerClient for KafkaPublisher {
    async fn send(&self, topic: &str, key: &str, payload: &str) -> Result<(), OutboxError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        self.producer
            .send(record, Timeout::After(Duration::from_millis(REQUEST_TIMEOUT_MS)))
            .await
            .map_err(|(e, _)| OutboxError::PublishFailure {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(topic = %topic, key = %key, "Published to Kafka");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_reads_prefixed_keys_and_omits_missing() {
        let config = KafkaConfiguration::from_source(&source(&[
            ("CAPABILITY_SERVICE_KAFKA_BOOTSTRAP_SERVERS", "kafka:9092"),
            ("CAPABILITY_SERVICE_KAFKA_SASL_USERNAME", "svc"),
            ("CAPABILITY_SERVICE_KAFKA_SECURITY_PROTOCOL", " "),
            ("UNRELATED", "x"),
        ]));

        assert_eq!(config.get("bootstrap.servers"), Some("kafka:9092"));
        assert_eq!(config.get("sasl.username"), Some("svc"));
        assert_eq!(config.get("security.protocol"), None);
        assert_eq!(config.get("sasl.password"), None);
        assert_eq!(
            config.keys().collect::<Vec<_>>(),
            vec!["bootstrap.servers", "sasl.username", "request.timeout.ms"]
        );
    }

    #[test]
    fn test_request_timeout_is_fixed() {
        let config = KafkaConfiguration::from_source(&source(&[
            ("CAPABILITY_SERVICE_KAFKA_BOOTSTRAP_SERVERS", "kafka:9092"),
            ("CAPABILITY_SERVICE_KAFKA_REQUEST_TIMEOUT_MS", "60000"),
        ]));

        assert_eq!(config.get("request.timeout.ms"), Some("3000"));
        let client = config.client_config().unwrap();
        assert_eq!(client.get("request.timeout.ms"), Some("3000"));
        assert_eq!(client.get("bootstrap.servers"), Some("kafka:9092"));
    }

    #[test]
    fn test_missing_bootstrap_servers_is_configuration_error() {
        let config = KafkaConfiguration::from_source(&source(&[]));
        let err = config.client_config().unwrap_err();

        assert!(matches!(err, OutboxError::Configuration(_)));
        assert!(err.to_string().contains("CAPABILITY_SERVICE_KAFKA_BOOTSTRAP_SERVERS"));
        assert!(KafkaPublisherFactory::new(config).create().is_err());
    }
}
