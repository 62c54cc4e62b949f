//! # DTS Error Types
//!
//! Unified error handling for the transfer orchestration engine.
//!
//! Client-initiated errors (validation, lifecycle) are returned synchronously
//! from the dispatcher. Errors raised while a transfer is being advanced are
//! captured into the transfer's status message and surface through status
//! queries; they never break the orchestrator loop.

use thiserror::Error;

/// DTS operation result type
pub type DtsResult<T> = Result<T, DtsError>;

/// Error taxonomy for the transfer orchestration engine
#[derive(Debug, Error)]
pub enum DtsError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No files requested")]
    NoFilesRequested,

    #[error("Payload size {payload_gb:.3} GB exceeds the {max_gb:.3} GB limit")]
    PayloadTooLarge { payload_gb: f64, max_gb: f64 },

    #[error("Unknown source database: {0}")]
    UnknownSource(String),

    #[error("Unknown destination: {0}")]
    UnknownDestination(String),

    #[error("Invalid search parameter: {name} - {reason}")]
    InvalidSearchParameter { name: String, reason: String },

    #[error("Invalid descriptor {id}: {reason}")]
    InvalidDescriptor { id: String, reason: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Incompatible endpoint: cannot transfer from {src} to {destination}")]
    IncompatibleEndpoint { src: String, destination: String },

    #[error("Service is already running")]
    AlreadyRunning,

    #[error("Service is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DtsError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a provider error from any displayable failure
    pub fn provider(message: impl std::fmt::Display) -> Self {
        Self::Provider(message.to_string())
    }

    /// Create a not-found error for a transfer id
    pub fn transfer_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind: "Transfer".to_string(),
            id: id.to_string(),
        }
    }

    /// Create a not-found error for a file id at a source database
    pub fn file_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "File".to_string(),
            id: id.into(),
        }
    }

    /// Create an invalid descriptor error
    pub fn invalid_descriptor(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Check whether the error is a client-side validation or lifecycle error
    ///
    /// Client errors are returned synchronously from the dispatcher and never
    /// recorded into a transfer's status.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DtsError::NoFilesRequested
                | DtsError::PayloadTooLarge { .. }
                | DtsError::UnknownSource(_)
                | DtsError::UnknownDestination(_)
                | DtsError::InvalidSearchParameter { .. }
                | DtsError::AlreadyRunning
                | DtsError::NotRunning
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_constructor() {
        let err = DtsError::configuration("missing endpoint");
        match err {
            DtsError::Configuration(msg) => assert_eq!(msg, "missing endpoint"),
            _ => panic!("Expected Configuration variant"),
        }
    }

    #[test]
    fn test_transfer_not_found_constructor() {
        let id = uuid::Uuid::new_v4();
        let err = DtsError::transfer_not_found(id);
        match err {
            DtsError::NotFound { kind, id: found } => {
                assert_eq!(kind, "Transfer");
                assert_eq!(found, id.to_string());
            }
            _ => panic!("Expected NotFound variant"),
        }
    }

    #[test]
    fn test_file_not_found_constructor() {
        let err = DtsError::file_not_found("JDP:555");
        match err {
            DtsError::NotFound { kind, id } => {
                assert_eq!(kind, "File");
                assert_eq!(id, "JDP:555");
            }
            _ => panic!("Expected NotFound variant"),
        }
    }

    #[test]
    fn test_display_payload_too_large() {
        let err = DtsError::PayloadTooLarge {
            payload_gb: 2.5,
            max_gb: 1.0,
        };
        assert_eq!(
            format!("{err}"),
            "Payload size 2.500 GB exceeds the 1.000 GB limit"
        );
    }

    #[test]
    fn test_display_no_files_requested() {
        assert_eq!(format!("{}", DtsError::NoFilesRequested), "No files requested");
    }

    #[test]
    fn test_display_incompatible_endpoint() {
        let err = DtsError::IncompatibleEndpoint {
            src: "globus".to_string(),
            destination: "local".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Incompatible endpoint: cannot transfer from globus to local"
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(DtsError::NoFilesRequested.is_client_error());
        assert!(DtsError::AlreadyRunning.is_client_error());
        assert!(DtsError::UnknownSource("x".to_string()).is_client_error());
        assert!(!DtsError::provider("network down").is_client_error());
        assert!(!DtsError::transfer_not_found("abc").is_client_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no access");
        let err: DtsError = io_err.into();
        assert!(matches!(err, DtsError::Io(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: DtsError = json_err.into();
        assert!(matches!(err, DtsError::Serialization(_)));
    }
}
