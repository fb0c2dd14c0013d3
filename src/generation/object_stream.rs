//! Streaming structured output with a best-effort partial view.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{info_span, warn, Instrument, Span};
use uuid::Uuid;

use super::object::{
    check_object_request, json_only_mode, object_result, tool_mode, unsupported_without_tools,
    Candidate, Enforcer, Mode, Verdict,
};
use super::options::{GenerateOptions, TextRequest};
use super::step::StepLoop;
use crate::error::StepwiseError;
use crate::provider::{ModelProvider, ProviderResponse, ProviderStream};
use crate::types::{GenerateObjectResult, Step, Usage};
use crate::util::timeout::CallGuard;

/// Start streaming a value of type `T` conforming to `schema`.
///
/// Fails immediately when the request is unusable (missing schema, reserved
/// tool name); everything else surfaces from [`ObjectStream::advance`].
pub fn stream_object<T: DeserializeOwned>(
    provider: Arc<dyn ModelProvider>,
    request: TextRequest,
    schema: Value,
    schema_name: impl Into<String>,
    options: GenerateOptions,
) -> Result<ObjectStream<T>, StepwiseError> {
    check_object_request(&request, &schema)?;
    let span = info_span!("stream_object", run_id = %Uuid::new_v4(), model = %request.model);
    let guard = CallGuard::new(&options.cancel, options.timeout);
    let (state, enforcer) = tool_mode(request.clone(), &schema, options.clone(), guard);

    Ok(ObjectStream {
        provider,
        request,
        schema,
        schema_name: schema_name.into(),
        options,
        state,
        enforcer,
        current: None,
        raw: String::new(),
        partial: None,
        outcome: None,
        failed: false,
        span,
    })
}

/// Pull-based handle over a streamed object run.
///
/// `advance` returns `true` each time the candidate JSON grows. After each
/// step, [`partial`](Self::partial) holds the candidate decoded as an untyped
/// object whenever the accumulated text happens to be valid JSON. Invalid
/// candidates are corrected and retried exactly as in
/// [`generate_object`](super::generate_object).
pub struct ObjectStream<T> {
    provider: Arc<dyn ModelProvider>,
    request: TextRequest,
    schema: Value,
    schema_name: String,
    options: GenerateOptions,
    state: StepLoop,
    enforcer: Enforcer,
    current: Option<ProviderStream>,
    raw: String,
    partial: Option<Map<String, Value>>,
    outcome: Option<(ProviderResponse, Candidate<T>)>,
    failed: bool,
    span: Span,
}

impl<T: DeserializeOwned> ObjectStream<T> {
    /// Pull until the candidate grows. `Ok(false)` means the run has finished.
    pub async fn advance(&mut self) -> Result<bool, StepwiseError> {
        if self.failed || self.outcome.is_some() {
            return Ok(false);
        }
        let span = self.span.clone();
        let mut result = self.pump().instrument(span.clone()).await;
        if matches!(result, Err(StepwiseError::ToolsUnsupported)) && self.enforcer.mode() == Mode::Tools {
            self.fall_back_to_json_only();
            result = self.pump().instrument(span).await;
        }
        let result = result.map_err(unsupported_without_tools);
        if result.is_err() {
            self.failed = true;
            self.current = None;
        }
        result
    }

    async fn pump(&mut self) -> Result<bool, StepwiseError> {
        loop {
            let Some(stream) = self.current.as_mut() else {
                self.open_turn().await?;
                continue;
            };

            if self.state.guard().run(stream.advance()).await? {
                match self.enforcer.streamed_candidate(stream) {
                    Some(raw) if raw != self.raw => {
                        self.partial = parse_partial(&raw);
                        self.raw = raw;
                        return Ok(true);
                    }
                    _ => continue,
                }
            }

            let response = stream.take_response().ok_or_else(|| {
                StepwiseError::Stream("stream ended without a final response".into())
            })?;
            self.current = None;

            let turn = self.state.record_response(response);
            match self.enforcer.judge::<T>(&turn, self.state.has_tools())? {
                Verdict::Done(candidate) => {
                    let response = self.state.record_terminal(turn);
                    self.raw = candidate.raw_json.clone();
                    self.partial = parse_partial(&self.raw);
                    self.outcome = Some((response, candidate));
                    return Ok(false);
                }
                Verdict::Retry(correction) => {
                    self.state.record_terminal(turn);
                    self.enforcer.correct(&mut self.state, correction);
                }
                Verdict::Dispatch => {
                    self.state.dispatch_turn(turn, None).await?;
                    self.state.check_iteration_cap()?;
                }
            }
        }
    }

    async fn open_turn(&mut self) -> Result<(), StepwiseError> {
        let request = self.state.begin_turn()?;
        let frames = self.state.guard().run(self.provider.stream_text(&request)).await?;
        self.raw.clear();
        self.partial = None;
        self.current = Some(ProviderStream::new(frames));
        Ok(())
    }

    /// Restart from the caller's request without tools, keeping the deadline.
    fn fall_back_to_json_only(&mut self) {
        warn!("model cannot call tools, falling back to JSON-only output");
        let (state, enforcer) = json_only_mode(
            self.request.clone(),
            &self.schema,
            &self.schema_name,
            self.options.clone(),
            self.state.guard().clone(),
        );
        self.state = state;
        self.enforcer = enforcer;
        self.current = None;
        self.raw.clear();
        self.partial = None;
    }

    /// The candidate decoded as an untyped object, when it currently parses.
    pub fn partial(&self) -> Option<&Map<String, Value>> {
        self.partial.as_ref()
    }

    /// Candidate JSON accumulated so far in the current turn.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The decoded object, once enforcement succeeded.
    pub fn object(&self) -> Option<&T> {
        self.outcome.as_ref().and_then(|(_, c)| c.object.as_ref())
    }

    /// Set instead of an error when strict mode is off.
    pub fn validation_error(&self) -> Option<&str> {
        self.outcome
            .as_ref()
            .and_then(|(_, c)| c.validation_error.as_deref())
    }

    pub fn usage(&self) -> Usage {
        self.state.usage()
    }

    pub fn steps(&self) -> &[Step] {
        self.state.steps()
    }

    /// Drain the stream and return the same result `generate_object` would.
    pub async fn into_result(mut self) -> Result<GenerateObjectResult<T>, StepwiseError> {
        while self.advance().await? {}
        match self.outcome {
            Some((response, candidate)) => Ok(object_result(self.state, response, candidate)),
            None => Err(StepwiseError::InvalidState(
                "stream finished after an earlier error".into(),
            )),
        }
    }
}

fn parse_partial(raw: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

impl<T> std::fmt::Debug for ObjectStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStream")
            .field("mode", &self.enforcer.mode())
            .field("raw", &self.raw)
            .field("streaming", &self.current.is_some())
            .field("finished", &self.outcome.is_some())
            .field("failed", &self.failed)
            .finish()
    }
}
