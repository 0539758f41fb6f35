//! Shared error type across monrelay crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Malformed JSON, envelope, or protocol payload.
    BadRequest,
    /// Payload passed validation but could not be turned into typed arrays.
    ExtractionFailed,
    /// The configured wire protocol has no extractor.
    UnsupportedProtocol,
    /// The model rejected the request, failed, or timed out.
    ModelFailed,
    /// The reply event could not be delivered downstream.
    DeliveryFailed,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::ExtractionFailed => "EXTRACTION_FAILED",
            ClientCode::UnsupportedProtocol => "UNSUPPORTED_PROTOCOL",
            ClientCode::ModelFailed => "MODEL_FAILED",
            ClientCode::DeliveryFailed => "DELIVERY_FAILED",
            ClientCode::Internal => "INTERNAL",
        }
    }

    /// HTTP status the server answers with for this code.
    pub fn http_status(self) -> u16 {
        match self {
            ClientCode::BadRequest => 400,
            _ => 500,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("extraction failed: {0}")]
    Extraction(String),
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),
    #[error("invalid metrics batch: {0}")]
    InvalidMetrics(String),
    #[error("model registration failed: {0}")]
    Registration(String),
    #[error("model failed: {0}")]
    Model(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RelayError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            RelayError::BadRequest(_) => ClientCode::BadRequest,
            RelayError::Extraction(_) => ClientCode::ExtractionFailed,
            RelayError::UnsupportedProtocol(_) => ClientCode::UnsupportedProtocol,
            RelayError::Model(_) => ClientCode::ModelFailed,
            RelayError::Delivery(_) => ClientCode::DeliveryFailed,
            RelayError::InvalidMetrics(_)
            | RelayError::Registration(_)
            | RelayError::Config(_)
            | RelayError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Whether the failure is the caller's fault (4xx) rather than ours.
    pub fn is_client_error(&self) -> bool {
        self.client_code().http_status() < 500
    }
}
