// ============================================================================
// Outbox Errors
// ============================================================================
//
// Everything except `PublishFailure` aborts the business transaction that
// raised it. `PublishFailure` never leaves the publisher.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no event registration found for `{0}`")]
    UnregisteredEventKind(String),

    #[error("duplicate event registration: kind `{kind_tag}` / type `{payload_type}` overlaps an existing entry")]
    DuplicateRegistration {
        kind_tag: String,
        payload_type: &'static str,
    },

    #[error("could not serialize event payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transaction failure: {0}")]
    TransactionFailure(String),

    #[error("failed to publish to topic `{topic}`: {reason}")]
    PublishFailure { topic: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl OutboxError {
    pub fn missing_setting(key: &str) -> Self {
        OutboxError::Configuration(format!("mandatory setting `{}` is missing", key))
    }

    /// Whether this error must roll back the transaction that produced it.
    pub fn aborts_transaction(&self) -> bool {
        !matches!(self, OutboxError::PublishFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_failure_is_contained() {
        let err = OutboxError::PublishFailure {
            topic: "build.capabilities".to_string(),
            reason: "timed out".to_string(),
        };
        assert!(!err.aborts_transaction());
        assert!(err.to_string().contains("build.capabilities"));
    }

    #[test]
    fn test_staging_errors_abort_transaction() {
        assert!(OutboxError::UnregisteredEventKind("x".into()).aborts_transaction());
        assert!(OutboxError::TransactionFailure("commit".into()).aborts_transaction());
        assert!(OutboxError::missing_setting("bootstrap.servers").aborts_transaction());
    }
}
