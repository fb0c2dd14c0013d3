//! Request and per-call options for the generation engines.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use tokio_util::sync::CancellationToken;

use crate::config::StepwiseConfig;
use crate::error::StepwiseError;
use crate::models::ModelRef;
use crate::stop::StopCondition;
use crate::tools::{Tool, ToolProgressCallback};
use crate::types::{GenerationSettings, ModelMessage, Step};

/// What the model is asked, and with which tools.
#[derive(Clone, Builder)]
pub struct TextRequest {
    pub model: ModelRef,
    #[builder(default)]
    pub messages: Vec<ModelMessage>,
    /// Caller-declared tools. Names must be unique.
    #[builder(default)]
    pub tools: Vec<Arc<dyn Tool>>,
    #[builder(default)]
    pub settings: GenerationSettings,
    /// Opaque provider wiring, forwarded on every turn.
    pub provider_data: Option<Arc<dyn Any + Send + Sync>>,
}

impl TextRequest {
    pub fn new(model: ModelRef, messages: Vec<ModelMessage>) -> Self {
        Self {
            model,
            messages,
            tools: Vec::new(),
            settings: GenerationSettings::default(),
            provider_data: None,
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }
}

impl fmt::Debug for TextRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextRequest")
            .field("model", &self.model)
            .field("messages", &self.messages)
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Input to the `prepare_step` hook, evaluated before every turn.
#[derive(Debug, Clone, Copy)]
pub struct PrepareStepEvent<'a> {
    pub step_number: usize,
    pub steps: &'a [Step],
    pub messages: &'a [ModelMessage],
    /// Model the previous turn used.
    pub model: &'a ModelRef,
}

/// Overrides returned by `prepare_step`. Every field left `None` keeps the
/// current value.
#[derive(Debug, Clone, Default)]
pub struct PrepareStepResult {
    /// Replaces the model from this turn on. Must share the request's provider.
    pub model: Option<ModelRef>,
    /// Replaces the conversation from this turn on.
    pub messages: Option<Vec<ModelMessage>>,
    /// Restricts the tools offered this turn only. Empty offers every tool.
    pub active_tools: Option<Vec<String>>,
}

pub type PrepareStepFn =
    Arc<dyn Fn(&PrepareStepEvent<'_>) -> Result<PrepareStepResult, StepwiseError> + Send + Sync>;

pub type StepFinishFn = Arc<dyn Fn(&Step) + Send + Sync>;

/// Tool-turn cap used when none (or zero) is given.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Loop control and enforcement knobs shared by every engine.
#[derive(Clone, Builder)]
pub struct GenerateOptions {
    /// Maximum number of tool-dispatching turns. Zero means the default.
    #[builder(default = DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: usize,
    /// Checked after every turn that dispatched tools.
    pub stop_when: Option<Arc<dyn StopCondition>>,
    pub prepare_step: Option<PrepareStepFn>,
    pub on_step_finish: Option<StepFinishFn>,
    pub on_tool_progress: Option<ToolProgressCallback>,
    /// Object enforcement: fail hard instead of returning a validation error.
    #[builder(default = true)]
    pub strict: bool,
    /// Object enforcement: correction turns allowed after the first attempt.
    #[builder(default = 1)]
    pub max_retries: usize,
    /// Wall-clock budget for the whole multi-turn request.
    pub timeout: Option<Duration>,
    #[builder(default)]
    pub cancel: CancellationToken,
}

impl GenerateOptions {
    /// Seed options from resolved configuration.
    pub fn from_config(config: &StepwiseConfig) -> Self {
        Self::builder()
            .max_iterations(config.max_iterations)
            .max_retries(config.max_retries)
            .strict(config.strict)
            .maybe_timeout(config.timeout_ms.map(Duration::from_millis))
            .build()
    }
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for GenerateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerateOptions")
            .field("max_iterations", &self.max_iterations)
            .field("stop_when", &self.stop_when.is_some())
            .field("prepare_step", &self.prepare_step.is_some())
            .field("on_step_finish", &self.on_step_finish.is_some())
            .field("on_tool_progress", &self.on_tool_progress.is_some())
            .field("strict", &self.strict)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .finish()
    }
}
