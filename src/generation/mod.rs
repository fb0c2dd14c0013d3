//! Text, streaming, and structured output generation.

pub mod agent;
pub mod convenience;
pub mod object;
pub mod object_stream;
pub mod options;
mod step;
pub mod stream;
pub mod text;

pub use agent::{Agent, AgentRequest};
pub use convenience::{analyze, generate};
pub use object::{generate_object, RETURN_TOOL_NAME};
pub use object_stream::{stream_object, ObjectStream};
pub use options::{
    GenerateOptions, PrepareStepEvent, PrepareStepFn, PrepareStepResult, StepFinishFn, TextRequest,
    DEFAULT_MAX_ITERATIONS,
};
pub use stream::{stream_text, TextStream};
pub use text::generate_text;
