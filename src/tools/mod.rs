//! Tool system for function calling.

pub mod arguments;
pub mod dispatch;
pub mod lifecycle;
pub mod tool;
pub mod typed;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use dispatch::{DispatchContext, ToolDispatcher};
pub use lifecycle::ToolInputLifecycle;
pub use tool::{
    AgentTool, Tool, ToolExecutionContext, ToolInputAvailableEvent, ToolInputDeltaEvent,
    ToolInputStartEvent, ToolProgressCallback, ToolProgressEvent,
};
pub use typed::TypedTool;
pub use types::{AgentToolParameters, ParameterBuilder};
