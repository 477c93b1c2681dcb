//! Error types for protocol support operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Stable error codes reported alongside protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The request targets a transport or capability the protocol does not offer
    UnsupportedMessage,
    /// A child-device message chain refers back to itself
    CyclicDependence,
    /// The protocol has already been disposed
    Disposed,
    /// A protocol with the same id already exists
    AlreadyExists,
    /// No protocol with the given id exists
    NotFound,
    /// Message or metadata could not be encoded or decoded
    CodecError,
    /// Anything raised by a collaborator
    SystemError,
}

impl ErrorCode {
    /// Code as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnsupportedMessage => "UNSUPPORTED_MESSAGE",
            ErrorCode::CyclicDependence => "CYCLIC_DEPENDENCE",
            ErrorCode::Disposed => "DISPOSED",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::CodecError => "CODEC_ERROR",
            ErrorCode::SystemError => "SYSTEM_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for protocol support operations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// No authenticator is registered for the request's transport
    #[error("Unsupported authentication transport '{transport}': {request}")]
    UnsupportedAuthentication { transport: String, request: String },

    /// Child-device message chain revisits a device id
    #[error("Cyclic device reference: {}", chain.join(" -> "))]
    CyclicDeviceReference { chain: Vec<String> },

    /// Registration attempted after the protocol was disposed
    #[error("Protocol '{0}' is disposed")]
    Disposed(String),

    /// Protocol id already registered
    #[error("Protocol already registered: {0}")]
    AlreadyRegistered(String),

    /// Protocol id not registered
    #[error("Protocol not found: {0}")]
    ProtocolNotFound(String),

    /// Codec failure
    #[error("Codec error: {0}")]
    Codec(String),

    /// JSON (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("Protocol error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ProtocolError {
    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ProtocolError::UnsupportedAuthentication { .. } => ErrorCode::UnsupportedMessage,
            ProtocolError::CyclicDeviceReference { .. } => ErrorCode::CyclicDependence,
            ProtocolError::Disposed(_) => ErrorCode::Disposed,
            ProtocolError::AlreadyRegistered(_) => ErrorCode::AlreadyExists,
            ProtocolError::ProtocolNotFound(_) => ErrorCode::NotFound,
            ProtocolError::Codec(_) | ProtocolError::Serialization(_) => ErrorCode::CodecError,
            ProtocolError::Other(_) => ErrorCode::SystemError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclic_reference_display() {
        let err = ProtocolError::CyclicDeviceReference {
            chain: vec!["gw-1".into(), "child-1".into(), "gw-1".into()],
        };
        assert_eq!(err.to_string(), "Cyclic device reference: gw-1 -> child-1 -> gw-1");
        assert_eq!(err.code(), ErrorCode::CyclicDependence);
    }

    #[test]
    fn test_error_code_serde() {
        let json = serde_json::to_string(&ErrorCode::UnsupportedMessage).unwrap();
        assert_eq!(json, "\"UNSUPPORTED_MESSAGE\"");
        assert_eq!(ErrorCode::CyclicDependence.to_string(), "CYCLIC_DEPENDENCE");
    }

    #[test]
    fn test_other_from_anyhow() {
        let err: ProtocolError = anyhow::anyhow!("broker unreachable").into();
        assert!(err.to_string().contains("broker unreachable"));
        assert_eq!(err.code(), ErrorCode::SystemError);
    }
}
