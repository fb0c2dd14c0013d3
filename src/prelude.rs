//! Convenience re-exports for common use.

pub use crate::config::StepwiseConfig;
pub use crate::error::{Result, StepwiseError};
pub use crate::generation::{
    generate_object, generate_text, stream_object, stream_text, Agent, AgentRequest,
    GenerateOptions, ObjectStream, PrepareStepEvent, PrepareStepResult, TextRequest, TextStream,
};
pub use crate::models::ModelRef;
pub use crate::provider::{ModelProvider, ProviderRegistry, ProviderRequest, ProviderResponse};
pub use crate::stop::{StopCondition, StopWhenEvent};
pub use crate::tools::{
    AgentTool, AgentToolParameters, Tool, ToolArguments, ToolExecutionContext, TypedTool,
};
pub use crate::types::{
    AgentToolCall, ContentPart, FinishReason, GenerateObjectResult, GenerateTextResult,
    GenerationSettings, ModelMessage, Role, Step, TextStreamDelta, Usage,
};
