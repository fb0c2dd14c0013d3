//! Drives the streaming tool input hooks from decoded deltas.

use std::collections::HashMap;
use std::sync::Arc;

use super::tool::{Tool, ToolInputAvailableEvent, ToolInputDeltaEvent, ToolInputStartEvent};
use crate::types::{AgentToolCall, Delta, ToolCallFragment};

#[derive(Debug, Default)]
struct InputState {
    id: String,
    name: String,
    started: bool,
    buffer: String,
}

/// Per-turn tracker of streamed tool inputs.
///
/// Argument fragments that arrive before the tool name is known are buffered
/// and flushed as the first delta once the tool resolves.
pub struct ToolInputLifecycle {
    tools: HashMap<String, Arc<dyn Tool>>,
    by_index: HashMap<usize, InputState>,
    index_by_id: HashMap<String, usize>,
}

impl ToolInputLifecycle {
    pub fn new(tools: &[Arc<dyn Tool>]) -> Self {
        Self {
            tools: tools
                .iter()
                .map(|t| (t.name().to_string(), Arc::clone(t)))
                .collect(),
            by_index: HashMap::new(),
            index_by_id: HashMap::new(),
        }
    }

    /// Forget the previous turn's state.
    pub fn reset(&mut self) {
        self.by_index.clear();
        self.index_by_id.clear();
    }

    pub fn on_delta(&mut self, delta: &Delta) {
        for fragment in &delta.tool_calls {
            self.on_fragment(fragment);
        }
    }

    fn on_fragment(&mut self, fragment: &ToolCallFragment) {
        let state = self.by_index.entry(fragment.index).or_default();
        if let Some(id) = fragment.id.as_deref().filter(|id| !id.is_empty()) {
            state.id = id.to_string();
            self.index_by_id.insert(id.to_string(), fragment.index);
        }
        if let Some(name) = fragment.name.as_deref().filter(|name| !name.is_empty()) {
            state.name = name.to_string();
        }

        let Some(tool) = self.tools.get(&state.name) else {
            if !state.started {
                state.buffer.push_str(&fragment.arguments);
            }
            return;
        };

        if !state.started {
            state.started = true;
            tool.on_input_start(&ToolInputStartEvent {
                tool_name: state.name.clone(),
                tool_call_id: state.id.clone(),
                tool_call_index: fragment.index,
            });
            if !state.buffer.is_empty() {
                tool.on_input_delta(&ToolInputDeltaEvent {
                    tool_name: state.name.clone(),
                    tool_call_id: state.id.clone(),
                    tool_call_index: fragment.index,
                    input_text_delta: std::mem::take(&mut state.buffer),
                });
            }
        }

        if !fragment.arguments.is_empty() {
            tool.on_input_delta(&ToolInputDeltaEvent {
                tool_name: state.name.clone(),
                tool_call_id: state.id.clone(),
                tool_call_index: fragment.index,
                input_text_delta: fragment.arguments.clone(),
            });
        }
    }

    /// Streamed position of the call with `tool_call_id`, if seen.
    pub fn index_of(&self, tool_call_id: &str) -> Option<usize> {
        self.index_by_id.get(tool_call_id).copied()
    }

    pub fn on_input_available(&self, tool: &dyn Tool, call: &AgentToolCall, tool_call_index: usize) {
        tool.on_input_available(&ToolInputAvailableEvent {
            tool_name: tool.name().to_string(),
            tool_call_id: call.id.clone(),
            tool_call_index,
            input: call.arguments.clone(),
        });
    }
}

impl std::fmt::Debug for ToolInputLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolInputLifecycle")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("by_index", &self.by_index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{AgentTool, AgentToolParameters};
    use std::sync::Mutex;

    fn recording_tool(log: Arc<Mutex<Vec<String>>>) -> Arc<dyn Tool> {
        let (l1, l2) = (log.clone(), log.clone());
        Arc::new(
            AgentTool::new("search", "Search", AgentToolParameters::empty(), |_, _| async {
                Ok(serde_json::Value::Null)
            })
            .with_input_start(move |e| l1.lock().unwrap().push(format!("start:{}:{}", e.tool_call_id, e.tool_call_index)))
            .with_input_delta(move |e| l2.lock().unwrap().push(format!("delta:{}", e.input_text_delta))),
        )
    }

    fn fragment(index: usize, id: Option<&str>, name: Option<&str>, args: &str) -> Delta {
        Delta {
            text: String::new(),
            tool_calls: vec![ToolCallFragment {
                index,
                id: id.map(String::from),
                name: name.map(String::from),
                arguments: args.to_string(),
            }],
        }
    }

    #[test]
    fn buffers_until_name_resolves() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut lifecycle = ToolInputLifecycle::new(&[recording_tool(log.clone())]);

        lifecycle.on_delta(&fragment(1, Some("c9"), None, r#"{"q":"#));
        assert!(log.lock().unwrap().is_empty());

        lifecycle.on_delta(&fragment(1, None, Some("search"), r#""rust"}"#));
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "start:c9:1".to_string(),
                r#"delta:{"q":"#.to_string(),
                r#"delta:"rust"}"#.to_string(),
            ]
        );
        assert_eq!(lifecycle.index_of("c9"), Some(1));
    }

    #[test]
    fn unknown_tools_are_ignored() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut lifecycle = ToolInputLifecycle::new(&[recording_tool(log.clone())]);
        lifecycle.on_delta(&fragment(0, Some("c1"), Some("other"), "{}"));
        assert!(log.lock().unwrap().is_empty());

        lifecycle.reset();
        assert_eq!(lifecycle.index_of("c1"), None);
    }
}
