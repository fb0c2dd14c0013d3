//! Streaming text generation with a tool loop.

use std::sync::Arc;

use futures::stream::BoxStream;
use tracing::{info_span, Instrument, Span};
use uuid::Uuid;

use super::options::{GenerateOptions, TextRequest};
use super::step::StepLoop;
use crate::error::StepwiseError;
use crate::provider::{ModelProvider, ProviderResponse, ProviderStream};
use crate::tools::ToolInputLifecycle;
use crate::types::{GenerateTextResult, ModelMessage, Step, Usage};
use crate::util::timeout::CallGuard;

/// Start a streamed tool loop. Nothing is sent until the first `advance`.
pub fn stream_text(
    provider: Arc<dyn ModelProvider>,
    request: TextRequest,
    options: GenerateOptions,
) -> TextStream {
    let span = info_span!("stream_text", run_id = %Uuid::new_v4(), model = %request.model);
    let lifecycle = ToolInputLifecycle::new(&request.tools);
    let guard = CallGuard::new(&options.cancel, options.timeout);
    TextStream {
        provider,
        state: StepLoop::new(request, options, guard),
        lifecycle,
        current: None,
        text_delta: String::new(),
        response: None,
        failed: false,
        span,
    }
}

/// Pull-based handle over a multi-turn streamed run.
///
/// Each `advance` surfaces the next non-empty text fragment. When a turn's
/// stream ends, its tool calls are dispatched and the next turn is opened
/// transparently; the recorded steps and messages match what
/// [`generate_text`](super::generate_text) computes for the same turns.
/// Tool argument fragments only reach tools' input hooks, never
/// [`text_delta`](Self::text_delta).
pub struct TextStream {
    provider: Arc<dyn ModelProvider>,
    state: StepLoop,
    lifecycle: ToolInputLifecycle,
    current: Option<ProviderStream>,
    text_delta: String,
    response: Option<ProviderResponse>,
    failed: bool,
    span: Span,
}

impl TextStream {
    /// Pull the next text fragment. `Ok(false)` means the run has finished.
    ///
    /// After an error the stream is spent and keeps returning `Ok(false)`.
    pub async fn advance(&mut self) -> Result<bool, StepwiseError> {
        if self.failed || self.response.is_some() {
            return Ok(false);
        }
        self.text_delta.clear();

        let span = self.span.clone();
        let result = self.pump().instrument(span).await;
        if result.is_err() {
            self.failed = true;
            self.current = None;
        }
        result
    }

    async fn pump(&mut self) -> Result<bool, StepwiseError> {
        loop {
            let Some(stream) = self.current.as_mut() else {
                let request = self.state.begin_turn()?;
                let frames = self.state.guard().run(self.provider.stream_text(&request)).await?;
                self.lifecycle.reset();
                self.current = Some(ProviderStream::new(frames));
                continue;
            };

            if self.state.guard().run(stream.advance()).await? {
                let delta = stream.delta();
                self.lifecycle.on_delta(delta);
                if delta.text.is_empty() {
                    continue;
                }
                self.text_delta.push_str(&delta.text);
                return Ok(true);
            }

            let response = stream.take_response().ok_or_else(|| {
                StepwiseError::Stream("stream ended without a final response".into())
            })?;
            self.current = None;

            let turn = self.state.record_response(response);
            if turn.tool_calls.is_empty() {
                self.response = Some(self.state.record_terminal(turn));
                return Ok(false);
            }

            let response = self.state.dispatch_turn(turn, Some(&self.lifecycle)).await?;
            if self.state.should_stop()? {
                self.response = Some(response);
                return Ok(false);
            }
        }
    }

    /// Text surfaced by the last successful `advance`.
    pub fn text_delta(&self) -> &str {
        &self.text_delta
    }

    /// The final model response, once the run has finished.
    pub fn response(&self) -> Option<&ProviderResponse> {
        self.response.as_ref()
    }

    /// Usage summed over every completed turn so far.
    pub fn usage(&self) -> Usage {
        self.state.usage()
    }

    pub fn steps(&self) -> &[Step] {
        self.state.steps()
    }

    pub fn messages(&self) -> &[ModelMessage] {
        self.state.messages()
    }

    /// Drain the stream and return the same result `generate_text` would.
    pub async fn into_result(mut self) -> Result<GenerateTextResult, StepwiseError> {
        while self.advance().await? {}
        match self.response {
            Some(response) => Ok(self.state.into_result(response)),
            None => Err(StepwiseError::InvalidState(
                "stream finished after an earlier error".into(),
            )),
        }
    }

    /// Adapt into a `Stream` of text fragments.
    pub fn into_text_stream(self) -> BoxStream<'static, Result<String, StepwiseError>> {
        let mut this = self;
        let fragments = async_stream::stream! {
            loop {
                match this.advance().await {
                    Ok(true) => yield Ok(this.text_delta().to_string()),
                    Ok(false) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };
        Box::pin(fragments)
    }
}

impl std::fmt::Debug for TextStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextStream")
            .field("steps", &self.state.steps().len())
            .field("streaming", &self.current.is_some())
            .field("finished", &self.response.is_some())
            .field("failed", &self.failed)
            .finish()
    }
}
