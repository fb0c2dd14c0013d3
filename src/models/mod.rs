//! Model identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StepwiseError;

/// A model addressed by provider and provider-specific model id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ModelRef {
    pub provider: String,
    pub model_id: String,
}

impl ModelRef {
    pub fn new(provider: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model_id: model_id.into(),
        }
    }

    /// Whether `other` is served by the same provider.
    pub fn same_provider(&self, other: &ModelRef) -> bool {
        self.provider == other.provider
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model_id)
    }
}

impl FromStr for ModelRef {
    type Err = StepwiseError;

    /// Parse "provider:model_id", e.g. "openai:gpt-4o".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (provider, model_id) = s.split_once(':').ok_or_else(|| {
            StepwiseError::InvalidArgument(format!(
                "Invalid model selector '{s}': expected 'provider:model_id'"
            ))
        })?;
        if provider.is_empty() || model_id.is_empty() {
            return Err(StepwiseError::InvalidArgument(format!(
                "Invalid model selector '{s}': provider and model id must be non-empty"
            )));
        }
        Ok(Self::new(provider, model_id))
    }
}
