//! Error types for remote signing operations.
//! Error handling types and result definitions for the signing pipeline.

use thiserror::Error;

/// Result type for signing operations
pub type SigningResult<T> = Result<T, SigningError>;

/// Comprehensive error types for signing operations
#[derive(Error, Debug, miette::Diagnostic)]
pub enum SigningError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Server certificate rejected: {0}")]
    TrustError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Signing service returned {major}{}", .minor.as_ref().map(|m| format!(" ({m})")).unwrap_or_default())]
    ServiceError {
        major: String,
        minor: Option<String>,
        message: Option<String>,
    },

    #[error("XML error: {0}")]
    XmlError(String),

    #[error("Document error: {0}")]
    DocumentError(String),

    #[error("Signature of {actual} bytes does not fit the reserved {capacity} bytes")]
    SignatureTooLarge { actual: usize, capacity: usize },

    #[error("Document is certified and does not allow further changes")]
    DocumentLocked,

    #[error("Revocation merge failed: {0}")]
    RevocationMergeError(String),

    #[error("Cryptographic error: {0}")]
    CryptographicError(String),

    #[error("Invalid signing state: {0}")]
    StateError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Propagation class of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Detected before any I/O; nothing was sent or written.
    Configuration,
    /// Connection or handshake failure; fatal for the batch.
    Transport,
    /// Malformed or unsuccessful service response; fatal for the batch.
    Protocol,
    /// Failure confined to one document.
    Document,
    /// Failure while embedding validation data; logged and skipped.
    RevocationMerge,
}

impl SigningError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SigningError::ConfigurationError(_) | SigningError::InvalidInput(_) => {
                ErrorKind::Configuration
            }
            SigningError::TransportError(_) | SigningError::TrustError(_) => ErrorKind::Transport,
            SigningError::ProtocolError(_)
            | SigningError::ServiceError { .. }
            | SigningError::XmlError(_)
            | SigningError::StateError(_) => ErrorKind::Protocol,
            SigningError::DocumentError(_)
            | SigningError::SignatureTooLarge { .. }
            | SigningError::DocumentLocked
            | SigningError::CryptographicError(_)
            | SigningError::IoError(_) => ErrorKind::Document,
            SigningError::RevocationMergeError(_) => ErrorKind::RevocationMerge,
        }
    }

    /// Whether this error aborts every document of a batch.
    #[must_use]
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::Transport | ErrorKind::Protocol
        )
    }
}

impl From<std::io::Error> for SigningError {
    fn from(error: std::io::Error) -> Self {
        SigningError::IoError(error.to_string())
    }
}

impl From<openssl::error::ErrorStack> for SigningError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        SigningError::CryptographicError(error.to_string())
    }
}

impl From<reqwest::Error> for SigningError {
    fn from(error: reqwest::Error) -> Self {
        SigningError::TransportError(error.to_string())
    }
}

impl From<quick_xml::Error> for SigningError {
    fn from(error: quick_xml::Error) -> Self {
        SigningError::XmlError(error.to_string())
    }
}

impl From<base64::DecodeError> for SigningError {
    fn from(error: base64::DecodeError) -> Self {
        SigningError::ProtocolError(format!("invalid base64 payload: {error}"))
    }
}
