//! Model provider boundary: request/response types, the provider trait,
//! and the stream handle built on top of provider frames.

pub mod decoder;
pub mod registry;
pub mod stream;

pub use decoder::DeltaDecoder;
pub use registry::ProviderRegistry;
pub use stream::ProviderStream;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StepwiseError;
use crate::models::ModelRef;
use crate::types::{
    AgentToolCall, ContentPart, FinishReason, GenerationSettings, ModelMessage, TextStreamDelta,
    Usage,
};

/// A request sent to a model provider.
#[derive(Clone)]
pub struct ProviderRequest {
    pub model: ModelRef,
    pub messages: Vec<ModelMessage>,
    /// Tools offered this turn. Empty means tool calling is off.
    pub tools: Vec<ToolDefinition>,
    pub settings: GenerationSettings,
    /// Opaque provider-specific wiring, passed through untouched.
    pub provider_data: Option<Arc<dyn Any + Send + Sync>>,
}

impl fmt::Debug for ProviderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRequest")
            .field("model", &self.model)
            .field("messages", &self.messages)
            .field("tools", &self.tools)
            .field("settings", &self.settings)
            .field("provider_data", &self.provider_data.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Response from a provider: one assistant message for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub message: ModelMessage,
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
}

impl ProviderResponse {
    /// A plain text response.
    pub fn text(text: impl Into<String>, usage: Usage) -> Self {
        Self {
            message: ModelMessage::assistant(text),
            usage,
            finish_reason: Some(FinishReason::Stop),
        }
    }

    /// A response carrying tool calls, with optional leading text.
    pub fn tool_calls(text: impl Into<String>, calls: Vec<AgentToolCall>, usage: Usage) -> Self {
        Self {
            message: ModelMessage::assistant_with_tool_calls(text, calls),
            usage,
            finish_reason: Some(FinishReason::ToolCalls),
        }
    }

    /// Concatenated assistant text.
    pub fn output_text(&self) -> String {
        self.message.text()
    }

    /// Tool calls made this turn, in message order.
    pub fn tool_calls_made(&self) -> Vec<AgentToolCall> {
        self.message.tool_calls().into_iter().cloned().collect()
    }

    /// Canonical assistant content: all text merged into one leading part
    /// (omitted when empty), then the named tool calls in order.
    ///
    /// Streamed and blocking turns both pass through here, so the same turn
    /// records the same message whichever way it arrived.
    pub fn normalized(mut self) -> Self {
        let text = self.message.text();
        let mut content = Vec::with_capacity(self.message.content.len());
        if !text.is_empty() {
            content.push(ContentPart::Text { text });
        }
        for (index, part) in std::mem::take(&mut self.message.content).into_iter().enumerate() {
            match part {
                ContentPart::Text { .. } => {}
                ContentPart::ToolCall(call) if call.name.is_empty() => {
                    warn!(index, tool_call_id = %call.id, "dropping tool call without a name");
                }
                other => content.push(other),
            }
        }
        self.message.content = content;
        self
    }
}

/// Raw stream of provider frames.
pub type FrameStream = BoxStream<'static, Result<TextStreamDelta, StepwiseError>>;

/// Core trait implemented by all model providers.
///
/// Implementations return [`StepwiseError::ToolsUnsupported`] when a request
/// carries tools the model cannot call.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai", "google").
    fn provider_name(&self) -> &str;

    /// Generate one turn (non-streaming).
    async fn generate_text(&self, request: &ProviderRequest)
        -> Result<ProviderResponse, StepwiseError>;

    /// Generate one turn (streaming).
    async fn stream_text(&self, request: &ProviderRequest) -> Result<FrameStream, StepwiseError>;
}
