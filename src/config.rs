use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::OutboxError;
use crate::publisher::PublisherConfig;

// ============================================================================
// Configuration
// ============================================================================
//
// Settings are looked up by key through a `ConfigSource`. Keys follow the
// environment convention: `<PREFIX><NAME>` with the name upper-cased and
// dots replaced by underscores. Blank values count as absent.
//
// ============================================================================

pub const APPLICATION_PREFIX: &str = "CAPABILITYSERVICE_";

const DEFAULT_METRICS_PORT: u16 = 8080;

/// Anything settings can be read from.
pub trait ConfigSource: Send + Sync {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentSource;

impl ConfigSource for EnvironmentSource {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Build the environment key for `name` under `prefix`.
pub fn environment_key(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name.to_uppercase().replace('.', "_"))
}

/// Look up `name` under `prefix`, treating blank values as absent.
pub fn lookup_setting(source: &dyn ConfigSource, prefix: &str, name: &str) -> Option<String> {
    source
        .lookup(&environment_key(prefix, name))
        .filter(|value| !value.trim().is_empty())
}

fn parse_setting<T: FromStr>(
    source: &dyn ConfigSource,
    prefix: &str,
    name: &str,
) -> Result<Option<T>, OutboxError> {
    match lookup_setting(source, prefix, name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            OutboxError::Configuration(format!(
                "invalid value `{}` for `{}`",
                raw,
                environment_key(prefix, name)
            ))
        }),
    }
}

/// A string that never shows up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SafeString(String);

impl SafeString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SafeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SafeString(********)")
    }
}

impl fmt::Display for SafeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("********")
    }
}

/// Application settings for the capability service process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_connection_string: SafeString,
    pub metrics_port: u16,
    pub publisher: PublisherConfig,
    /// When set, a capability with this name is created at startup.
    pub demo_capability_name: Option<String>,
}

impl Settings {
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, OutboxError> {
        let prefix = APPLICATION_PREFIX;

        let database_connection_string =
            lookup_setting(source, prefix, "database.connectionstring")
                .map(SafeString::new)
                .ok_or_else(|| {
                    OutboxError::missing_setting(&environment_key(prefix, "database.connectionstring"))
                })?;

        let mut publisher = PublisherConfig::default();
        if let Some(ms) = parse_setting::<u64>(source, prefix, "publisher.poll.interval.ms")? {
            publisher.poll_interval = Duration::from_millis(ms);
        }
        if let Some(size) = parse_setting::<i64>(source, prefix, "publisher.batch.size")? {
            if size <= 0 {
                return Err(OutboxError::Configuration(
                    "publisher batch size must be positive".to_string(),
                ));
            }
            publisher.batch_size = size;
        }
        if let Some(ms) = parse_setting::<u64>(source, prefix, "publisher.shutdown.grace.ms")? {
            publisher.shutdown_grace = Duration::from_millis(ms);
        }

        Ok(Self {
            database_connection_string,
            metrics_port: parse_setting(source, prefix, "metrics.port")?
                .unwrap_or(DEFAULT_METRICS_PORT),
            publisher,
            demo_capability_name: lookup_setting(source, prefix, "demo.capability.name"),
        })
    }
}
