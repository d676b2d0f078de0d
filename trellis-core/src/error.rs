//! Error types for Trellis.
//!
//! Nothing in the propagation algorithm fails with a recoverable error.
//! Policy violations (writes through read-only handles) are reported as
//! [`Warning`]s on the runtime's warning channel and the write is
//! suppressed. Panics in user bodies propagate to whoever caused the run.

use thiserror::Error;

use crate::state::ObjectId;

/// Errors loading a [`RuntimeConfig`](crate::config::RuntimeConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse runtime config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read runtime config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Non-fatal policy violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    #[error("Set operation on key \"{key}\" failed: target {target} is readonly")]
    ReadonlyWrite {
        target: ObjectId,
        key: String,
    },

    #[error("Delete operation on key \"{key}\" failed: target {target} is readonly")]
    ReadonlyDelete {
        target: ObjectId,
        key: String,
    },

    #[error("Clear operation failed: target {target} is readonly")]
    ReadonlyClear {
        target: ObjectId,
    },
}

impl Warning {
    /// The object the rejected mutation was aimed at.
    pub fn target(&self) -> ObjectId {
        match self {
            Warning::ReadonlyWrite { target, .. }
            | Warning::ReadonlyDelete { target, .. }
            | Warning::ReadonlyClear { target } => *target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RawObject;

    #[test]
    fn warning_messages_name_the_key() {
        let obj = RawObject::record([("a", 1)]);
        let warning = Warning::ReadonlyWrite {
            target: obj.id(),
            key: "a".to_string(),
        };
        let message = warning.to_string();
        assert!(message.contains("\"a\""));
        assert!(message.contains("readonly"));
        assert_eq!(warning.target(), obj.id());
    }

    #[test]
    fn parse_errors_convert() {
        let err: ConfigError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
