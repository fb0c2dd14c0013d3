//! Unified error classification and recovery.

use serde::{Deserialize, Serialize};

/// Machine-readable provider error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidApiKey,
    PermissionDenied,
    RateLimitExceeded,
    ModelNotFound,
    InvalidRequest,
    ContextLengthExceeded,
    ServerError,
    ServiceUnavailable,
    Timeout,
    NetworkError,
    Unknown,
}

impl ErrorCode {
    /// Map an HTTP status to a code.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::InvalidApiKey,
            403 => Self::PermissionDenied,
            404 => Self::ModelNotFound,
            408 => Self::Timeout,
            413 => Self::ContextLengthExceeded,
            400 | 422 => Self::InvalidRequest,
            429 => Self::RateLimitExceeded,
            502..=504 => Self::ServiceUnavailable,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Whether a request failing with this code may succeed if repeated.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded
                | Self::ServerError
                | Self::ServiceUnavailable
                | Self::Timeout
                | Self::NetworkError
        )
    }
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Canceled,
    Server,
    Provider,
    InvalidRequest,
    Configuration,
    Serialization,
    ToolExecution,
    LoopLimit,
    Validation,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    CheckCredentials,
    CheckConfiguration,
    IncreaseTimeout,
    FixRequest,
    CheckToolImplementation,
    RaiseIterationLimit,
    RelaxSchemaOrRetry,
    ContactSupport,
}
