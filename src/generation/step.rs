//! Per-turn bookkeeping shared by the blocking and streaming engines.
//!
//! Both engines drive the same [`StepLoop`]; they differ only in how a turn's
//! [`ProviderResponse`] is obtained. Everything that decides *what* a run
//! computes lives here.

use std::any::Any;
use std::sync::Arc;

use tracing::debug;

use super::options::{GenerateOptions, PrepareStepEvent, TextRequest, DEFAULT_MAX_ITERATIONS};
use crate::error::StepwiseError;
use crate::models::ModelRef;
use crate::provider::{ProviderRequest, ProviderResponse, ToolDefinition};
use crate::stop::StopWhenEvent;
use crate::tools::{DispatchContext, Tool, ToolDispatcher, ToolInputLifecycle};
use crate::types::message::validate_messages;
use crate::types::{AgentToolCall, GenerateTextResult, GenerationSettings, ModelMessage, Step, Usage};
use crate::util::timeout::CallGuard;

/// A model response accepted into the conversation but not yet recorded.
#[derive(Debug, Clone)]
pub(crate) struct Turn {
    pub response: ProviderResponse,
    pub tool_calls: Vec<AgentToolCall>,
}

pub(crate) struct StepLoop {
    model: ModelRef,
    messages: Vec<ModelMessage>,
    tools: Vec<Arc<dyn Tool>>,
    settings: GenerationSettings,
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
    options: GenerateOptions,
    guard: CallGuard,
    /// Offered every turn regardless of `active_tools`, never dispatched.
    injected: Vec<ToolDefinition>,
    /// Sent after the conversation on the next turn only.
    correction: Option<ModelMessage>,
    turn_tools: Vec<String>,
    steps: Vec<Step>,
    response_messages: Vec<ModelMessage>,
    usage: Usage,
    tool_turns: usize,
}

impl StepLoop {
    pub fn new(request: TextRequest, mut options: GenerateOptions, guard: CallGuard) -> Self {
        if options.max_iterations == 0 {
            options.max_iterations = DEFAULT_MAX_ITERATIONS;
        }
        Self {
            model: request.model,
            messages: request.messages,
            tools: request.tools,
            settings: request.settings,
            provider_data: request.provider_data,
            options,
            guard,
            injected: Vec::new(),
            correction: None,
            turn_tools: Vec::new(),
            steps: Vec::new(),
            response_messages: Vec::new(),
            usage: Usage::default(),
            tool_turns: 0,
        }
    }

    pub fn with_injected_tool(mut self, definition: ToolDefinition) -> Self {
        self.injected.push(definition);
        self
    }

    pub fn guard(&self) -> &CallGuard {
        &self.guard
    }

    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn messages(&self) -> &[ModelMessage] {
        &self.messages
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Apply `prepare_step` and build the request for the next turn.
    pub fn begin_turn(&mut self) -> Result<ProviderRequest, StepwiseError> {
        let step_number = self.steps.len();
        let mut active_tools = Vec::new();

        if let Some(prepare) = &self.options.prepare_step {
            let prepared = prepare(&PrepareStepEvent {
                step_number,
                steps: &self.steps,
                messages: &self.messages,
                model: &self.model,
            })?;
            if let Some(model) = prepared.model {
                if !model.same_provider(&self.model) {
                    return Err(StepwiseError::ProviderMismatch {
                        expected: self.model.provider.clone(),
                        actual: model.provider,
                    });
                }
                self.model = model;
            }
            if let Some(messages) = prepared.messages {
                self.messages = messages;
            }
            if let Some(names) = prepared.active_tools {
                active_tools = names;
            }
        }

        validate_messages(&self.messages)?;

        let tools: Vec<ToolDefinition> = self
            .tools
            .iter()
            .filter(|t| active_tools.is_empty() || active_tools.iter().any(|n| n == t.name()))
            .map(|t| t.definition())
            .chain(self.injected.iter().cloned())
            .collect();
        self.turn_tools = tools.iter().map(|t| t.name.clone()).collect();

        let mut messages = self.messages.clone();
        messages.extend(self.correction.iter().cloned());

        debug!(step = step_number, model = %self.model, tools = tools.len(), "starting turn");
        Ok(ProviderRequest {
            model: self.model.clone(),
            messages,
            tools,
            settings: self.settings.clone(),
            provider_data: self.provider_data.clone(),
        })
    }

    /// Normalize the response, append it to the conversation and add its usage.
    pub fn record_response(&mut self, response: ProviderResponse) -> Turn {
        let response = response.normalized();
        self.usage.merge(&response.usage);
        self.messages.push(response.message.clone());
        self.response_messages.push(response.message.clone());
        let tool_calls = response.tool_calls_made();
        debug!(
            step = self.steps.len(),
            tool_calls = tool_calls.len(),
            "model turn finished"
        );
        Turn {
            response,
            tool_calls,
        }
    }

    /// Record a turn that dispatched nothing and return its response.
    pub fn record_terminal(&mut self, turn: Turn) -> ProviderResponse {
        let response = turn.response.clone();
        self.push_step(turn, Vec::new());
        response
    }

    /// Dispatch the turn's calls, append the results, and record the step.
    pub async fn dispatch_turn(
        &mut self,
        turn: Turn,
        lifecycle: Option<&ToolInputLifecycle>,
    ) -> Result<ProviderResponse, StepwiseError> {
        let ctx = DispatchContext {
            step: self.steps.len(),
            guard: &self.guard,
            on_progress: self.options.on_tool_progress.clone(),
            lifecycle,
        };
        let results = ToolDispatcher::new(&self.tools)
            .dispatch(&turn.tool_calls, &ctx)
            .await?;

        self.messages.extend(results.iter().cloned());
        self.response_messages.extend(results.iter().cloned());
        self.correction = None;
        self.tool_turns += 1;

        let response = turn.response.clone();
        self.push_step(turn, results);
        Ok(response)
    }

    /// Evaluate `stop_when`, then the iteration cap. `Ok(true)` ends the run.
    pub fn should_stop(&self) -> Result<bool, StepwiseError> {
        if let Some(condition) = &self.options.stop_when {
            let event = StopWhenEvent {
                steps: &self.steps,
                messages: &self.messages,
            };
            if condition.should_stop(&event) {
                debug!(steps = self.steps.len(), "stop condition met");
                return Ok(true);
            }
        }
        self.check_iteration_cap()?;
        Ok(false)
    }

    pub fn check_iteration_cap(&self) -> Result<(), StepwiseError> {
        if self.tool_turns >= self.options.max_iterations {
            return Err(StepwiseError::LoopIterationExceeded {
                max_iterations: self.options.max_iterations,
            });
        }
        Ok(())
    }

    /// Send `message` with the next turn only; a tool dispatch clears it.
    pub fn set_correction(&mut self, message: ModelMessage) {
        self.correction = Some(message);
    }

    /// Append `message` to the conversation for good.
    pub fn push_message(&mut self, message: ModelMessage) {
        self.messages.push(message);
    }

    pub fn into_result(self, response: ProviderResponse) -> GenerateTextResult {
        GenerateTextResult {
            text: response.output_text(),
            finish_reason: response.finish_reason,
            response,
            steps: self.steps,
            messages: self.messages,
            response_messages: self.response_messages,
            usage: self.usage,
        }
    }

    /// Split into the recorded steps and summed usage.
    pub fn into_steps(self) -> (Vec<Step>, Usage) {
        (self.steps, self.usage)
    }

    fn push_step(&mut self, turn: Turn, tool_results: Vec<ModelMessage>) {
        let step = Step {
            step_number: self.steps.len(),
            text: turn.response.output_text(),
            usage: turn.response.usage,
            finish_reason: turn.response.finish_reason,
            response: turn.response,
            tool_calls: turn.tool_calls,
            tool_results,
            active_tools: self.turn_tools.clone(),
        };
        if let Some(hook) = &self.options.on_step_finish {
            hook(&step);
        }
        self.steps.push(step);
    }
}
