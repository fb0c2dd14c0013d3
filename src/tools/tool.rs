//! Tool trait, execution context, and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::arguments::ToolArguments;
use super::types::AgentToolParameters;
use crate::error::StepwiseError;
use crate::provider::ToolDefinition;

/// Progress reported by a running tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolProgressEvent {
    pub tool_name: String,
    pub tool_call_id: String,
    pub tool_call_index: usize,
    pub data: serde_json::Value,
}

/// Callback receiving tool progress. Runs synchronously on the dispatch path.
pub type ToolProgressCallback = Arc<dyn Fn(ToolProgressEvent) + Send + Sync>;

/// Context available during tool execution.
#[derive(Clone, Default)]
pub struct ToolExecutionContext {
    /// Id of the call being executed.
    pub tool_call_id: String,
    /// Tool name as requested by the model.
    pub tool_name: String,
    /// Position of the call within its turn.
    pub tool_call_index: usize,
    /// Step the call belongs to.
    pub step: usize,
    /// Cancelled when the request is cancelled or times out.
    pub cancel: CancellationToken,
    progress: Option<ToolProgressCallback>,
}

impl ToolExecutionContext {
    pub fn new(tool_call_id: impl Into<String>, tool_name: impl Into<String>, tool_call_index: usize) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            tool_call_index,
            ..Default::default()
        }
    }

    pub fn with_step(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Option<ToolProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Report progress to the caller, if anyone is listening.
    pub fn report(&self, data: serde_json::Value) {
        if let Some(progress) = &self.progress {
            progress(ToolProgressEvent {
                tool_name: self.tool_name.clone(),
                tool_call_id: self.tool_call_id.clone(),
                tool_call_index: self.tool_call_index,
                data,
            });
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for ToolExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutionContext")
            .field("tool_call_id", &self.tool_call_id)
            .field("tool_name", &self.tool_name)
            .field("tool_call_index", &self.tool_call_index)
            .field("step", &self.step)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// The model started streaming input for a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInputStartEvent {
    pub tool_name: String,
    pub tool_call_id: String,
    pub tool_call_index: usize,
}

/// A fragment of streamed tool input.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInputDeltaEvent {
    pub tool_name: String,
    pub tool_call_id: String,
    pub tool_call_index: usize,
    pub input_text_delta: String,
}

/// The complete input of a streamed tool call, right before execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInputAvailableEvent {
    pub tool_name: String,
    pub tool_call_id: String,
    pub tool_call_index: usize,
    pub input: String,
}

/// Core tool trait -- implement to create custom tools.
///
/// The `on_input_*` hooks fire only while streaming and are purely
/// observational.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema parameters.
    fn parameters(&self) -> &AgentToolParameters;

    /// Execute the tool with validated arguments.
    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, StepwiseError>;

    fn on_input_start(&self, _event: &ToolInputStartEvent) {}

    fn on_input_delta(&self, _event: &ToolInputDeltaEvent) {}

    fn on_input_available(&self, _event: &ToolInputAvailableEvent) {}

    /// Definition sent to the provider.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().schema.clone(),
        }
    }
}

/// Type alias for the tool handler function.
type ToolHandler = dyn Fn(
        ToolArguments,
        ToolExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, StepwiseError>> + Send>>
    + Send
    + Sync;

type Hook<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Closure-based tool for quick tool creation.
pub struct AgentTool {
    name: String,
    description: String,
    parameters: AgentToolParameters,
    handler: Arc<ToolHandler>,
    input_start: Option<Hook<ToolInputStartEvent>>,
    input_delta: Option<Hook<ToolInputDeltaEvent>>,
    input_available: Option<Hook<ToolInputAvailableEvent>>,
}

impl AgentTool {
    /// Create a tool from a closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: AgentToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, StepwiseError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
            input_start: None,
            input_delta: None,
            input_available: None,
        }
    }

    pub fn with_input_start(mut self, hook: impl Fn(&ToolInputStartEvent) + Send + Sync + 'static) -> Self {
        self.input_start = Some(Arc::new(hook));
        self
    }

    pub fn with_input_delta(mut self, hook: impl Fn(&ToolInputDeltaEvent) + Send + Sync + 'static) -> Self {
        self.input_delta = Some(Arc::new(hook));
        self
    }

    pub fn with_input_available(
        mut self,
        hook: impl Fn(&ToolInputAvailableEvent) + Send + Sync + 'static,
    ) -> Self {
        self.input_available = Some(Arc::new(hook));
        self
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, StepwiseError> {
        (self.handler)(args.clone(), ctx.clone()).await
    }

    fn on_input_start(&self, event: &ToolInputStartEvent) {
        if let Some(hook) = &self.input_start {
            hook(event);
        }
    }

    fn on_input_delta(&self, event: &ToolInputDeltaEvent) {
        if let Some(hook) = &self.input_delta {
            hook(event);
        }
    }

    fn on_input_available(&self, event: &ToolInputAvailableEvent) {
        if let Some(hook) = &self.input_available {
            hook(event);
        }
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
