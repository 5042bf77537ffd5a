//! Shared error type across Sentinel crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Missing or malformed caller input.
    BadRequest,
    /// Policy document failed to compile.
    InvalidPolicy,
    /// Configuration failed to parse or validate.
    InvalidConfig,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Persistence backend unavailable.
    Storage,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::InvalidPolicy => "INVALID_POLICY",
            ClientCode::InvalidConfig => "INVALID_CONFIG",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Storage => "STORAGE",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Unified error type used by core and gateway.
///
/// Governance outcomes (rate limited, over budget, denied by policy) are not
/// errors; they are successful evaluations with `allowed == false`.
#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("storage: {0}")]
    Storage(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl SentinelError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            SentinelError::BadRequest(_) => ClientCode::BadRequest,
            SentinelError::InvalidPolicy(_) => ClientCode::InvalidPolicy,
            SentinelError::InvalidConfig(_) => ClientCode::InvalidConfig,
            SentinelError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            SentinelError::Storage(_) => ClientCode::Storage,
            SentinelError::Internal(_) => ClientCode::Internal,
        }
    }
}
