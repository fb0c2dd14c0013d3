//! Reusable agent: a model, instructions, tools and loop controls bundled
//! once and run against many prompts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::options::{
    GenerateOptions, PrepareStepFn, StepFinishFn, TextRequest, DEFAULT_MAX_ITERATIONS,
};
use super::stream::{stream_text, TextStream};
use super::text::generate_text;
use crate::error::StepwiseError;
use crate::models::ModelRef;
use crate::provider::ModelProvider;
use crate::stop::StopCondition;
use crate::tools::{Tool, ToolProgressCallback};
use crate::types::{GenerateTextResult, GenerationSettings, ModelMessage, Role};

/// Input for one agent run.
///
/// `messages` seed the conversation; a non-empty `prompt` is appended to it
/// as a user message.
#[derive(Debug, Clone, Default)]
pub struct AgentRequest {
    pub prompt: Option<String>,
    pub messages: Vec<ModelMessage>,
}

impl AgentRequest {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            messages: Vec::new(),
        }
    }

    pub fn messages(messages: Vec<ModelMessage>) -> Self {
        Self {
            prompt: None,
            messages,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

impl From<&str> for AgentRequest {
    fn from(prompt: &str) -> Self {
        Self::prompt(prompt)
    }
}

impl From<String> for AgentRequest {
    fn from(prompt: String) -> Self {
        Self::prompt(prompt)
    }
}

/// A tool loop configured once and run many times.
///
/// With neither a tool-turn cap nor a stop condition set, an agent answers
/// in a single tool turn at most; setting only a stop condition uses the
/// default cap.
///
/// ```no_run
/// use std::sync::Arc;
/// use stepwise::prelude::*;
///
/// # async fn example(provider: Arc<dyn ModelProvider>, search: Arc<dyn Tool>) -> stepwise::error::Result<()> {
/// let agent = Agent::new("openai:gpt-4o".parse()?)
///     .with_system_prompt("You answer with citations.")
///     .with_tool(search)
///     .with_max_iterations(4);
/// let result = agent.generate(provider.as_ref(), "Who wrote Dune?").await?;
/// println!("{}", result.text);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Agent {
    model: ModelRef,
    system_prompt: Option<String>,
    tools: Vec<Arc<dyn Tool>>,
    settings: GenerationSettings,
    max_iterations: Option<usize>,
    stop_when: Option<Arc<dyn StopCondition>>,
    timeout: Option<Duration>,
    cancel: CancellationToken,
    prepare_step: Option<PrepareStepFn>,
    on_step_finish: Option<StepFinishFn>,
    on_tool_progress: Option<ToolProgressCallback>,
}

impl Agent {
    pub fn new(model: ModelRef) -> Self {
        Self {
            model,
            system_prompt: None,
            tools: Vec::new(),
            settings: GenerationSettings::default(),
            max_iterations: None,
            stop_when: None,
            timeout: None,
            cancel: CancellationToken::new(),
            prepare_step: None,
            on_step_finish: None,
            on_tool_progress: None,
        }
    }

    /// Set the system prompt, added unless a conversation already opens with one.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Cap tool turns. Zero counts as unset.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_stop_when(mut self, condition: Arc<dyn StopCondition>) -> Self {
        self.stop_when = Some(condition);
        self
    }

    /// Bound every run's wall-clock time.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cancel runs through `cancel`.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_prepare_step(mut self, hook: PrepareStepFn) -> Self {
        self.prepare_step = Some(hook);
        self
    }

    pub fn with_on_step_finish(mut self, hook: StepFinishFn) -> Self {
        self.on_step_finish = Some(hook);
        self
    }

    pub fn with_on_tool_progress(mut self, hook: ToolProgressCallback) -> Self {
        self.on_tool_progress = Some(hook);
        self
    }

    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    /// Run the tool loop to completion.
    pub async fn generate(
        &self,
        provider: &dyn ModelProvider,
        request: impl Into<AgentRequest>,
    ) -> Result<GenerateTextResult, StepwiseError> {
        generate_text(provider, self.text_request(request.into()), self.options()).await
    }

    /// Start a streamed run.
    pub fn stream(
        &self,
        provider: Arc<dyn ModelProvider>,
        request: impl Into<AgentRequest>,
    ) -> TextStream {
        stream_text(provider, self.text_request(request.into()), self.options())
    }

    /// The conversation and tools one run sends.
    pub fn text_request(&self, request: AgentRequest) -> TextRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 2);
        if let Some(system) = self.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            if request.messages.first().map(|m| m.role) != Some(Role::System) {
                messages.push(ModelMessage::system(system));
            }
        }
        messages.extend(request.messages);
        if let Some(prompt) = request.prompt.filter(|p| !p.is_empty()) {
            messages.push(ModelMessage::user(prompt));
        }

        TextRequest {
            model: self.model.clone(),
            messages,
            tools: self.tools.clone(),
            settings: self.settings.clone(),
            provider_data: None,
        }
    }

    /// Loop options for one run.
    pub fn options(&self) -> GenerateOptions {
        let max_iterations = match (self.max_iterations.filter(|n| *n > 0), &self.stop_when) {
            (Some(n), _) => n,
            (None, None) => 1,
            (None, Some(_)) => DEFAULT_MAX_ITERATIONS,
        };
        debug!(model = %self.model, max_iterations, tools = self.tools.len(), "agent run");

        GenerateOptions::builder()
            .max_iterations(max_iterations)
            .maybe_stop_when(self.stop_when.clone())
            .maybe_prepare_step(self.prepare_step.clone())
            .maybe_on_step_finish(self.on_step_finish.clone())
            .maybe_on_tool_progress(self.on_tool_progress.clone())
            .maybe_timeout(self.timeout)
            .cancel(self.cancel.clone())
            .build()
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("max_iterations", &self.max_iterations)
            .field("stop_when", &self.stop_when.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}
