//! Executes one turn's tool calls against the declared tool set.

use std::sync::Arc;

use tracing::{debug, warn};

use super::arguments::ToolArguments;
use super::lifecycle::ToolInputLifecycle;
use super::tool::{Tool, ToolExecutionContext, ToolProgressCallback};
use super::validation::validate_arguments;
use crate::error::StepwiseError;
use crate::types::{AgentToolCall, ModelMessage};
use crate::util::timeout::CallGuard;

/// Per-turn inputs to [`ToolDispatcher::dispatch`].
pub struct DispatchContext<'a> {
    /// Step the calls belong to; carried into every error.
    pub step: usize,
    pub guard: &'a CallGuard,
    pub on_progress: Option<ToolProgressCallback>,
    /// Present only while streaming.
    pub lifecycle: Option<&'a ToolInputLifecycle>,
}

/// Name-keyed lookup over a closed set of caller-declared tools.
#[derive(Clone, Copy)]
pub struct ToolDispatcher<'a> {
    tools: &'a [Arc<dyn Tool>],
}

impl<'a> ToolDispatcher<'a> {
    pub fn new(tools: &'a [Arc<dyn Tool>]) -> Self {
        Self { tools }
    }

    pub fn find(&self, name: &str) -> Option<&'a Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Run `calls` in order, producing one tool-result message per call.
    ///
    /// The first failure aborts the whole batch.
    pub async fn dispatch(
        &self,
        calls: &[AgentToolCall],
        ctx: &DispatchContext<'_>,
    ) -> Result<Vec<ModelMessage>, StepwiseError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        if self.tools.is_empty() {
            return Err(StepwiseError::ToolsNotProvided { step: ctx.step });
        }

        let mut results = Vec::with_capacity(calls.len());
        for (position, call) in calls.iter().enumerate() {
            results.push(self.dispatch_one(call, position, ctx).await?);
        }
        Ok(results)
    }

    async fn dispatch_one(
        &self,
        call: &AgentToolCall,
        position: usize,
        ctx: &DispatchContext<'_>,
    ) -> Result<ModelMessage, StepwiseError> {
        let step = ctx.step;
        if call.id.is_empty() {
            return Err(StepwiseError::MissingToolCallId {
                tool_name: call.name.clone(),
                step,
            });
        }

        let tool = self.find(&call.name).ok_or_else(|| StepwiseError::NoSuchTool {
            tool_name: call.name.clone(),
            tool_call_id: call.id.clone(),
            step,
        })?;

        let invalid_input = |message: String| StepwiseError::InvalidToolInput {
            tool_name: call.name.clone(),
            tool_call_id: call.id.clone(),
            step,
            message,
        };
        let args = ToolArguments::parse(&call.arguments)
            .map_err(|e| invalid_input(format!("invalid json: {e}")))?;
        validate_arguments(args.raw(), &tool.parameters().schema).map_err(invalid_input)?;

        let index = ctx
            .lifecycle
            .and_then(|l| l.index_of(&call.id))
            .unwrap_or(position);
        if let Some(lifecycle) = ctx.lifecycle {
            lifecycle.on_input_available(tool.as_ref(), call, index);
        }

        let exec_ctx = ToolExecutionContext::new(&call.id, &call.name, index)
            .with_step(step)
            .with_cancel(ctx.guard.token())
            .with_progress(ctx.on_progress.clone());

        debug!(step, tool = %call.name, tool_call_id = %call.id, "dispatching tool call");
        let value = ctx
            .guard
            .run(async {
                tool.execute(&args, &exec_ctx).await.map_err(|e| {
                    warn!(step, tool = %call.name, error = %e, "tool execution failed");
                    StepwiseError::ToolExecution {
                        tool_name: call.name.clone(),
                        tool_call_id: call.id.clone(),
                        step,
                        source: Box::new(e),
                    }
                })
            })
            .await?;

        Ok(ModelMessage::tool_result(&call.id, &call.name, value))
    }
}
