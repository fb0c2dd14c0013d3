//! Streaming types.

use serde::{Deserialize, Serialize};

use super::generation::FinishReason;
use super::usage::Usage;

/// A provider-native frame emitted while streaming.
///
/// Providers translate their wire events into these frames; the
/// [`DeltaDecoder`](crate::provider::decoder::DeltaDecoder) turns them into
/// [`Delta`]s and a terminal response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextStreamDelta {
    /// The incremental text chunk.
    pub text: String,
    /// Event type.
    pub event_type: StreamEventType,
    /// Tool call fragment, for `ToolCallDelta` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallFragment>,
    /// Finish reason (usually on the final frame).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Usage (usually on the final frame).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl TextStreamDelta {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            event_type: StreamEventType::TextDelta,
            tool_call: None,
            finish_reason: None,
            usage: None,
        }
    }

    pub fn tool_call(fragment: ToolCallFragment) -> Self {
        Self {
            text: String::new(),
            event_type: StreamEventType::ToolCallDelta,
            tool_call: Some(fragment),
            finish_reason: None,
            usage: None,
        }
    }

    pub fn done(finish_reason: Option<FinishReason>, usage: Option<Usage>) -> Self {
        Self {
            text: String::new(),
            event_type: StreamEventType::Done,
            tool_call: None,
            finish_reason,
            usage,
        }
    }
}

/// Type of stream event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventType {
    /// Incremental text content.
    TextDelta,
    /// Tool call being built.
    ToolCallDelta,
    /// Stream started.
    Start,
    /// Stream finished.
    Done,
    /// Error during stream.
    Error,
}

/// One fragment of a tool call, keyed by its position within the turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ToolCallFragment {
    pub index: usize,
    /// Present once the provider has sent it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Present once the provider has sent it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// A substring of the eventual arguments JSON; not parseable on its own.
    #[serde(default)]
    pub arguments: String,
}

/// Uniform incremental output of one streamed turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    pub text: String,
    pub tool_calls: Vec<ToolCallFragment>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.tool_calls.is_empty()
    }
}
