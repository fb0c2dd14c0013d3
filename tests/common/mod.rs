//! Shared test helpers and a scripted mock provider.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use stepwise::error::StepwiseError;
use stepwise::models::ModelRef;
use stepwise::provider::{
    DeltaDecoder, FrameStream, ModelProvider, ProviderRequest, ProviderResponse,
};
use stepwise::tools::{AgentTool, AgentToolParameters, Tool};
use stepwise::types::*;

/// One scripted turn.
pub enum Turn {
    Reply(ProviderResponse),
    Fail(StepwiseError),
    /// Streams the given text, then fails mid-stream.
    Broken(String),
    /// Never resolves.
    Hang,
    /// Streams exactly these frames; the blocking call folds them into one reply.
    Frames(Vec<Result<TextStreamDelta, StepwiseError>>),
}

/// A provider that replays a queue of turns and records every request.
///
/// Streaming splits the queued response into text chunks of `chunk_size`
/// characters, then per-call argument fragments, then a `Done` frame.
pub struct ScriptedProvider {
    name: String,
    turns: Mutex<VecDeque<Turn>>,
    requests: Mutex<Vec<ProviderRequest>>,
    calls: AtomicUsize,
    chunk_size: usize,
    rejects_tools: bool,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::named("mock")
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            turns: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            chunk_size: 5,
            rejects_tools: false,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Fail with `ToolsUnsupported` whenever a request offers tools.
    pub fn rejecting_tools(mut self) -> Self {
        self.rejects_tools = true;
        self
    }

    pub fn push(&self, turn: Turn) -> &Self {
        self.turns.lock().unwrap().push_back(turn);
        self
    }

    pub fn reply(&self, response: ProviderResponse) -> &Self {
        self.push(Turn::Reply(response))
    }

    pub fn text(&self, text: &str) -> &Self {
        self.reply(ProviderResponse::text(text, usage()))
    }

    /// A turn calling one tool with `args`.
    pub fn tool_call(&self, id: &str, name: &str, args: Value) -> &Self {
        self.reply(ProviderResponse::tool_calls(
            "",
            vec![AgentToolCall::from_value(id, name, &args)],
            usage(),
        ))
    }

    /// A turn calling one tool with raw argument text.
    pub fn raw_tool_call(&self, id: &str, name: &str, raw: &str) -> &Self {
        self.reply(ProviderResponse::tool_calls(
            "",
            vec![AgentToolCall::new(id, name, raw)],
            usage(),
        ))
    }

    pub fn fail(&self, error: StepwiseError) -> &Self {
        self.push(Turn::Fail(error))
    }

    /// Number of provider calls made so far, streaming included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request(&self, index: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[index].clone()
    }

    fn next(&self, request: &ProviderRequest) -> Result<Turn, StepwiseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.rejects_tools && !request.tools.is_empty() {
            return Err(StepwiseError::ToolsUnsupported);
        }
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| StepwiseError::InvalidState("script exhausted".into()))
    }

    fn frames(&self, response: &ProviderResponse) -> Vec<TextStreamDelta> {
        let mut frames = Vec::new();
        for part in &response.message.content {
            match part {
                ContentPart::Text { text } => {
                    frames.extend(chunks(text, self.chunk_size).into_iter().map(TextStreamDelta::text));
                }
                ContentPart::ToolCall(_) | ContentPart::ToolResult(_) => {}
            }
        }
        for (index, call) in response.message.tool_calls().into_iter().enumerate() {
            let mut pieces = chunks(&call.arguments, self.chunk_size);
            if pieces.is_empty() {
                pieces.push(String::new());
            }
            for (n, arguments) in pieces.into_iter().enumerate() {
                let first = n == 0;
                frames.push(TextStreamDelta::tool_call(ToolCallFragment {
                    index,
                    id: first.then(|| call.id.clone()),
                    name: first.then(|| call.name.clone()),
                    arguments,
                }));
            }
        }
        frames.push(TextStreamDelta::done(response.finish_reason, Some(response.usage)));
        frames
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn generate_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, StepwiseError> {
        match self.next(request)? {
            Turn::Reply(response) => Ok(response),
            Turn::Fail(error) => Err(error),
            Turn::Broken(_) => Err(StepwiseError::Stream("connection reset".into())),
            Turn::Hang => futures::future::pending().await,
            Turn::Frames(frames) => {
                let mut decoder = DeltaDecoder::new();
                for frame in frames {
                    decoder.push(frame?)?;
                }
                Ok(decoder.finish())
            }
        }
    }

    async fn stream_text(&self, request: &ProviderRequest) -> Result<FrameStream, StepwiseError> {
        match self.next(request)? {
            Turn::Reply(response) => {
                let frames = self.frames(&response);
                Ok(futures::stream::iter(frames.into_iter().map(Ok)).boxed())
            }
            Turn::Fail(error) => Err(error),
            Turn::Broken(text) => {
                let frames = async_stream::stream! {
                    yield Ok(TextStreamDelta::text(text));
                    yield Err(StepwiseError::Stream("connection reset".into()));
                };
                Ok(Box::pin(frames))
            }
            Turn::Hang => Ok(futures::stream::pending().boxed()),
            Turn::Frames(frames) => Ok(futures::stream::iter(frames).boxed()),
        }
    }
}

/// Split on character boundaries.
pub fn chunks(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

pub fn usage() -> Usage {
    Usage::new(10, 5)
}

pub fn model() -> ModelRef {
    ModelRef::new("mock", "test-model")
}

/// `add(a, b)`: sums two integers.
pub fn add_tool() -> AgentTool {
    AgentTool::new(
        "add",
        "Add two integers",
        AgentToolParameters::object()
            .integer("a", "left operand", true)
            .integer("b", "right operand", true)
            .build(),
        |args, _ctx| async move { Ok(json!(args.get_i64("a")? + args.get_i64("b")?)) },
    )
}

/// `echo(text)`: returns its input.
pub fn echo_tool() -> AgentTool {
    AgentTool::new(
        "echo",
        "Echo the input",
        AgentToolParameters::object().string("text", "text to echo", true).build(),
        |args, _ctx| async move { Ok(json!(args.get_str("text")?)) },
    )
}

pub fn tools(list: Vec<AgentTool>) -> Vec<Arc<dyn Tool>> {
    list.into_iter().map(|t| Arc::new(t) as Arc<dyn Tool>).collect()
}

pub fn prepare<F>(f: F) -> stepwise::generation::PrepareStepFn
where
    F: Fn(&stepwise::generation::PrepareStepEvent<'_>) -> Result<stepwise::generation::PrepareStepResult, StepwiseError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

pub fn on_step<F>(f: F) -> stepwise::generation::StepFinishFn
where
    F: Fn(&Step) + Send + Sync + 'static,
{
    Arc::new(f)
}
