//! Result and per-turn step records.

use serde::{Deserialize, Serialize};

use super::generation::FinishReason;
use super::message::{AgentToolCall, ModelMessage};
use super::usage::Usage;
use crate::provider::ProviderResponse;

/// One full model turn plus the tool dispatch it triggered.
///
/// Steps are recorded once their turn resolves and never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// 0-based position in the run.
    pub step_number: usize,
    /// The model response for this turn.
    pub response: ProviderResponse,
    /// Assistant text produced this turn.
    pub text: String,
    pub tool_calls: Vec<AgentToolCall>,
    /// Tool-role messages produced by dispatch.
    pub tool_results: Vec<ModelMessage>,
    /// Tool names offered to the model this turn.
    pub active_tools: Vec<String>,
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
}

/// Result of a multi-step text generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateTextResult {
    /// Text of the final response.
    pub text: String,
    /// The last model response.
    pub response: ProviderResponse,
    pub steps: Vec<Step>,
    /// The full conversation, including the caller's base messages.
    pub messages: Vec<ModelMessage>,
    /// Only the messages produced during this run.
    pub response_messages: Vec<ModelMessage>,
    /// Usage summed across every step.
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
}

/// Result of structured output generation.
#[derive(Debug, Clone)]
pub struct GenerateObjectResult<T> {
    /// The decoded object. `None` only when non-strict enforcement failed.
    pub object: Option<T>,
    /// The raw JSON candidate the object was decoded from.
    pub raw_json: String,
    /// The last model response.
    pub response: ProviderResponse,
    pub steps: Vec<Step>,
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
    /// Populated instead of an error when strict mode is off.
    pub validation_error: Option<String>,
}
