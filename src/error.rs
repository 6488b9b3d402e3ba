//! Error types for IWBH.

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Pairing error: {0}")]
    Pairing(#[from] PairingError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised by the local key-value store and the shared document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to watch {collection}/{id}: {reason}")]
    Watch {
        collection: String,
        id: String,
        reason: String,
    },
}

/// Identity source errors.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("No signed-in identity: {0}")]
    Unavailable(String),

    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),
}

/// Errors surfaced by the pairing coordinator.
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error("Pairing code must be exactly 6 digits, got {input:?}")]
    InvalidCodeFormat { input: String },

    #[error("Pairing code {code} is not valid (unknown, expired or already used)")]
    InvalidCode { code: String },

    #[error("Cannot pair with yourself")]
    SelfPairing,

    #[error("Already paired with {partner_id}")]
    AlreadyPaired { partner_id: String },

    #[error("Network failure: {0}")]
    NetworkFailure(#[source] StoreError),

    #[error("Local profile store failed: {0}")]
    LocalStore(#[source] StoreError),

    #[error("Could not draw an unused pairing code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: u32 },

    #[error("Pairing coordinator has stopped")]
    CoordinatorStopped,
}

impl PairingError {
    /// Whether the caller may simply retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PairingError::NetworkFailure(_) | PairingError::CodeSpaceExhausted { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_code_format_mentions_input() {
        let err = PairingError::InvalidCodeFormat {
            input: "12a456".to_string(),
        };
        assert!(err.to_string().contains("12a456"));
    }

    #[test]
    fn test_already_paired_mentions_partner() {
        let err = PairingError::AlreadyPaired {
            partner_id: "user-b".to_string(),
        };
        assert!(err.to_string().contains("user-b"));
    }

    #[test]
    fn test_network_failure_is_retryable() {
        let err = PairingError::NetworkFailure(StoreError::Unavailable("offline".to_string()));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("offline"));
    }

    #[test]
    fn test_validation_errors_are_not_retryable() {
        assert!(!PairingError::SelfPairing.is_retryable());
        assert!(
            !PairingError::InvalidCode {
                code: "123456".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_store_watch_error_display() {
        let err = StoreError::Watch {
            collection: "users".to_string(),
            id: "abc".to_string(),
            reason: "inotify limit".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("users/abc"));
        assert!(msg.contains("inotify limit"));
    }

    // --- From conversions into top-level Error ---

    #[test]
    fn test_error_from_config_error() {
        let inner = ConfigError::MissingRequired {
            key: "IWBH_DATA_DIR".to_string(),
            hint: "set it explicitly".to_string(),
        };
        let err = Error::from(inner);
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_from_pairing_error() {
        let err = Error::from(PairingError::SelfPairing);
        assert!(err.to_string().contains("Pairing error"));
    }

    #[test]
    fn test_store_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = StoreError::from(io);
        assert!(matches!(err, StoreError::Io(_)));
    }
}
