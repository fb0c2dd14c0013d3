//! Error types for stepwise.

pub mod unified;

pub use unified::{ErrorCategory, ErrorCode, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all stepwise operations.
#[derive(Error, Debug)]
pub enum StepwiseError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid message at index {index}: {message}")]
    InvalidMessage { index: usize, message: String },

    #[error("Model called tools at step {step} but no tools were provided")]
    ToolsNotProvided { step: usize },

    #[error("Tool call to '{tool_name}' at step {step} is missing an id")]
    MissingToolCallId { tool_name: String, step: usize },

    #[error("No such tool '{tool_name}' (call {tool_call_id}, step {step})")]
    NoSuchTool {
        tool_name: String,
        tool_call_id: String,
        step: usize,
    },

    #[error("Invalid input for tool '{tool_name}' (call {tool_call_id}, step {step}): {message}")]
    InvalidToolInput {
        tool_name: String,
        tool_call_id: String,
        step: usize,
        message: String,
    },

    #[error("Tool '{tool_name}' failed (call {tool_call_id}, step {step}): {source}")]
    ToolExecution {
        tool_name: String,
        tool_call_id: String,
        step: usize,
        #[source]
        source: Box<StepwiseError>,
    },

    #[error("Tool loop exceeded max iterations ({max_iterations})")]
    LoopIterationExceeded { max_iterations: usize },

    #[error("Object validation failed: {message}")]
    ObjectValidation { message: String, raw_json: String },

    #[error("Provider error ({provider}): {message}")]
    Provider {
        provider: String,
        message: String,
        status: Option<u16>,
        code: Option<ErrorCode>,
        retryable: bool,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Provider does not support tool calling")]
    ToolsUnsupported,

    #[error("Model override must stay on provider '{expected}', got '{actual}'")]
    ProviderMismatch { expected: String, actual: String },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Request canceled")]
    Canceled,

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl StepwiseError {
    /// Create a provider error classified from an HTTP status.
    pub fn provider(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        let code = ErrorCode::from_status(status);
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            status: Some(status),
            code: Some(code),
            retryable: code.is_transient(),
            source: None,
        }
    }

    /// Create a provider error without an HTTP status (transport failures and the like).
    pub fn provider_message(
        provider: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            status: None,
            code: None,
            retryable,
            source: None,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::InvalidArgument(_) | Self::InvalidMessage { .. } | Self::ProviderMismatch { .. } => {
                ErrorCategory::InvalidRequest
            }
            Self::ToolsNotProvided { .. }
            | Self::MissingToolCallId { .. }
            | Self::NoSuchTool { .. }
            | Self::InvalidToolInput { .. }
            | Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::LoopIterationExceeded { .. } => ErrorCategory::LoopLimit,
            Self::ObjectValidation { .. } => ErrorCategory::Validation,
            Self::Provider { status, code, .. } => match (status, code) {
                (Some(401 | 403), _) | (_, Some(ErrorCode::InvalidApiKey)) => {
                    ErrorCategory::Authentication
                }
                (Some(429), _) | (_, Some(ErrorCode::RateLimitExceeded)) => {
                    ErrorCategory::RateLimit
                }
                (Some(500..=599), _) => ErrorCategory::Server,
                (None, Some(ErrorCode::NetworkError)) => ErrorCategory::Network,
                _ => ErrorCategory::Provider,
            },
            Self::ToolsUnsupported => ErrorCategory::Provider,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Canceled => ErrorCategory::Canceled,
            Self::Serialization(_) => ErrorCategory::Serialization,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { retryable, .. } => *retryable,
            _ => matches!(
                self.category(),
                ErrorCategory::RateLimit
                    | ErrorCategory::Network
                    | ErrorCategory::Timeout
                    | ErrorCategory::Server
            ),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.category() == ErrorCategory::RateLimit
    }

    pub fn is_auth(&self) -> bool {
        self.category() == ErrorCategory::Authentication
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// The step number a tool failure happened at, if any.
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::ToolsNotProvided { step }
            | Self::MissingToolCallId { step, .. }
            | Self::NoSuchTool { step, .. }
            | Self::InvalidToolInput { step, .. }
            | Self::ToolExecution { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Network => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Server => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::InvalidRequest => RecoverySuggestion::FixRequest,
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckToolImplementation,
            ErrorCategory::LoopLimit => RecoverySuggestion::RaiseIterationLimit,
            ErrorCategory::Validation => RecoverySuggestion::RelaxSchemaOrRetry,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, StepwiseError>;
