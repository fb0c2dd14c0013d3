//! Accumulates provider stream frames into deltas and one terminal response.

use std::collections::BTreeMap;

use super::ProviderResponse;
use crate::error::StepwiseError;
use crate::types::{
    AgentToolCall, ContentPart, Delta, FinishReason, ModelMessage, Role, StreamEventType,
    TextStreamDelta, ToolCallFragment, Usage,
};

#[derive(Debug, Default)]
struct PendingToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Decodes one streamed turn.
///
/// Tool call fragments are keyed by their index, since the id may arrive
/// before or after the argument fragments. The terminal response is built
/// from the concatenated state only.
#[derive(Debug, Default)]
pub struct DeltaDecoder {
    text: String,
    tool_calls: BTreeMap<usize, PendingToolCall>,
    usage: Option<Usage>,
    finish_reason: Option<FinishReason>,
    done: bool,
}

impl DeltaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one frame, returning the delta it contributes (possibly empty).
    pub fn push(&mut self, frame: TextStreamDelta) -> Result<Delta, StepwiseError> {
        if frame.event_type == StreamEventType::Error {
            return Err(StepwiseError::Stream(frame.text));
        }

        let mut delta = Delta::default();
        if !frame.text.is_empty() {
            self.text.push_str(&frame.text);
            delta.text = frame.text;
        }

        if let Some(fragment) = frame.tool_call {
            let pending = self.tool_calls.entry(fragment.index).or_default();
            if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
                pending.id = Some(id);
            }
            if let Some(name) = fragment.name.filter(|name| !name.is_empty()) {
                pending.name = Some(name);
            }
            pending.arguments.push_str(&fragment.arguments);
            delta.tool_calls.push(ToolCallFragment {
                index: fragment.index,
                id: pending.id.clone(),
                name: pending.name.clone(),
                arguments: fragment.arguments,
            });
        }

        if let Some(usage) = frame.usage {
            self.usage = Some(usage);
        }
        if let Some(reason) = frame.finish_reason {
            self.finish_reason = Some(reason);
        }
        if frame.event_type == StreamEventType::Done {
            self.done = true;
        }
        Ok(delta)
    }

    /// Whether a `Done` frame has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Resolved tool name at `index`, if known yet.
    pub fn tool_name(&self, index: usize) -> Option<&str> {
        self.tool_calls.get(&index)?.name.as_deref()
    }

    /// Arguments accumulated so far at `index`.
    pub fn arguments(&self, index: usize) -> Option<&str> {
        self.tool_calls.get(&index).map(|p| p.arguments.as_str())
    }

    /// Build the terminal response from the accumulated state.
    pub fn finish(&self) -> ProviderResponse {
        let mut content = vec![ContentPart::Text {
            text: self.text.clone(),
        }];
        content.extend(self.tool_calls.values().map(|pending| {
            ContentPart::ToolCall(AgentToolCall {
                id: pending.id.clone().unwrap_or_default(),
                name: pending.name.clone().unwrap_or_default(),
                arguments: pending.arguments.clone(),
            })
        }));

        ProviderResponse {
            message: ModelMessage {
                role: Role::Assistant,
                content,
                name: None,
                tool_call_id: None,
            },
            usage: self.usage.unwrap_or_default(),
            finish_reason: self.finish_reason,
        }
        .normalized()
    }
}
