//! Structured output: force a schema-conforming object out of the model.
//!
//! The caller's schema is offered as a synthetic tool named
//! [`RETURN_TOOL_NAME`]. A call to it is intercepted before dispatch and its
//! arguments become the candidate object, which is validated against the
//! schema and then decoded. Invalid candidates trigger a correction turn
//! while the retry budget lasts. Providers that reject tool calling get a
//! JSON-only conversation instead, where the plain reply text is the
//! candidate.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use super::options::{GenerateOptions, TextRequest};
use super::step::{StepLoop, Turn};
use crate::error::StepwiseError;
use crate::provider::{ModelProvider, ProviderResponse, ProviderStream, ToolDefinition};
use crate::tools::validation::validate_json;
use crate::tools::Tool;
use crate::types::{GenerateObjectResult, ModelMessage, ResponseFormat};
use crate::util::timeout::CallGuard;

/// Reserved name of the synthetic tool that carries the final object.
pub const RETURN_TOOL_NAME: &str = "__return_json";

const RETURN_TOOL_DESCRIPTION: &str = "Return the final JSON object result.";

const TOOL_MODE_INSTRUCTION: &str = "You must return the final result by calling the tool __return_json with arguments matching the provided JSON schema. Do not return the result as plain text.";

const MUST_CALL_INSTRUCTION: &str =
    "You did not call the tool __return_json. Call it with the final JSON object as arguments.";

const JSON_ONLY_INSTRUCTION: &str = "Return ONLY valid JSON matching the provided schema. Do not include backticks, markdown, or any extra text.";

/// Longest slice of a rejected candidate echoed back to the model.
const MAX_ECHOED_JSON: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Candidate arrives as `__return_json` arguments.
    Tools,
    /// No tools; candidate is the reply text.
    JsonOnly,
}

/// Outcome of enforcement that ends the run.
#[derive(Debug)]
pub(crate) struct Candidate<T> {
    pub object: Option<T>,
    pub raw_json: String,
    pub validation_error: Option<String>,
}

pub(crate) enum Verdict<T> {
    Done(Candidate<T>),
    /// Ask again with this correction.
    Retry(ModelMessage),
    /// Only ordinary tool calls this turn; run them and continue.
    Dispatch,
}

/// Retry bookkeeping shared by the blocking and streaming object APIs.
#[derive(Debug)]
pub(crate) struct Enforcer {
    schema: Value,
    mode: Mode,
    strict: bool,
    max_retries: usize,
    retries: usize,
}

impl Enforcer {
    fn new(schema: Value, options: &GenerateOptions, mode: Mode) -> Self {
        Self {
            schema,
            mode,
            strict: options.strict,
            max_retries: options.max_retries,
            retries: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Judge a completed turn.
    ///
    /// A `__return_json` call wins over any other calls in the same turn.
    /// Ordinary calls are dispatched only when the caller declared tools.
    pub fn judge<T: DeserializeOwned>(
        &mut self,
        turn: &Turn,
        can_dispatch: bool,
    ) -> Result<Verdict<T>, StepwiseError> {
        let raw = match self.mode {
            Mode::Tools => turn
                .tool_calls
                .iter()
                .find(|c| c.name == RETURN_TOOL_NAME)
                .map(|c| c.arguments.clone()),
            Mode::JsonOnly => Some(strip_code_fences(&turn.response.output_text())),
        };

        let Some(raw) = raw else {
            if can_dispatch && !turn.tool_calls.is_empty() {
                return Ok(Verdict::Dispatch);
            }
            return self.reject(
                format!("model did not call {RETURN_TOOL_NAME}"),
                String::new(),
                MUST_CALL_INSTRUCTION.to_string(),
            );
        };

        match decode::<T>(&raw, &self.schema) {
            Ok(object) => {
                debug!(retries = self.retries, "object candidate accepted");
                Ok(Verdict::Done(Candidate {
                    object: Some(object),
                    raw_json: raw,
                    validation_error: None,
                }))
            }
            Err(message) => {
                let correction = correction_prompt(&message, &raw);
                self.reject(message, raw, correction)
            }
        }
    }

    fn reject<T>(
        &mut self,
        message: String,
        raw_json: String,
        correction: String,
    ) -> Result<Verdict<T>, StepwiseError> {
        if !self.strict {
            return Ok(Verdict::Done(Candidate {
                object: None,
                raw_json,
                validation_error: Some(message),
            }));
        }
        if self.retries >= self.max_retries {
            return Err(StepwiseError::ObjectValidation { message, raw_json });
        }
        self.retries += 1;
        warn!(attempt = self.retries, error = %message, "object candidate rejected, requesting a correction");
        Ok(Verdict::Retry(ModelMessage::system(correction)))
    }

    /// Queue a correction for the next turn.
    ///
    /// In tool mode it is sent once; in JSON-only mode it joins the conversation.
    pub fn correct(&self, state: &mut StepLoop, correction: ModelMessage) {
        match self.mode {
            Mode::Tools => state.set_correction(correction),
            Mode::JsonOnly => state.push_message(correction),
        }
    }

    /// Candidate text after the delta just surfaced by `stream`, if that
    /// delta touched it. A fragment that only resolves the return tool's
    /// name yields the arguments buffered before it.
    pub fn streamed_candidate(&self, stream: &ProviderStream) -> Option<String> {
        let delta = stream.delta();
        let decoder = stream.decoder();
        match self.mode {
            Mode::Tools => delta
                .tool_calls
                .iter()
                .find(|f| decoder.tool_name(f.index) == Some(RETURN_TOOL_NAME))
                .and_then(|f| decoder.arguments(f.index))
                .map(str::to_string),
            Mode::JsonOnly => {
                (!delta.text.is_empty()).then(|| strip_code_fences(decoder.text()))
            }
        }
    }
}

/// Parse, validate, then decode a candidate.
fn decode<T: DeserializeOwned>(raw: &str, schema: &Value) -> Result<T, String> {
    let value = validate_json(raw, schema)?;
    serde_json::from_value(value).map_err(|e| e.to_string())
}

pub(crate) fn check_object_request(
    request: &TextRequest,
    schema: &Value,
) -> Result<(), StepwiseError> {
    if schema.is_null() {
        return Err(StepwiseError::InvalidArgument("schema is required".into()));
    }
    if request.tools.iter().any(|t| t.name() == RETURN_TOOL_NAME) {
        return Err(StepwiseError::InvalidArgument(format!(
            "tool name collision: {RETURN_TOOL_NAME} is reserved"
        )));
    }
    Ok(())
}

/// Loop state for enforcing through the synthetic return tool.
pub(crate) fn tool_mode(
    mut request: TextRequest,
    schema: &Value,
    options: GenerateOptions,
    guard: CallGuard,
) -> (StepLoop, Enforcer) {
    request
        .messages
        .insert(0, ModelMessage::system(TOOL_MODE_INSTRUCTION));
    let enforcer = Enforcer::new(schema.clone(), &options, Mode::Tools);
    // Termination belongs to the enforcer.
    let options = GenerateOptions {
        stop_when: None,
        ..options
    };
    let state = StepLoop::new(request, options, guard).with_injected_tool(ToolDefinition {
        name: RETURN_TOOL_NAME.to_string(),
        description: RETURN_TOOL_DESCRIPTION.to_string(),
        parameters: schema.clone(),
    });
    (state, enforcer)
}

/// Loop state for the tool-less fallback, with a fresh retry budget.
pub(crate) fn json_only_mode(
    mut request: TextRequest,
    schema: &Value,
    schema_name: &str,
    options: GenerateOptions,
    guard: CallGuard,
) -> (StepLoop, Enforcer) {
    let instruction = format!(
        "{JSON_ONLY_INSTRUCTION}\nJSON schema:\n{}",
        serde_json::to_string_pretty(schema).unwrap_or_default()
    );
    request.messages.insert(0, ModelMessage::system(instruction));
    request.tools.clear();
    request.settings.response_format = Some(ResponseFormat::JsonSchema {
        schema: schema.clone(),
        name: schema_name.to_string(),
    });
    let enforcer = Enforcer::new(schema.clone(), &options, Mode::JsonOnly);
    let options = GenerateOptions {
        stop_when: None,
        ..options
    };
    (StepLoop::new(request, options, guard), enforcer)
}

pub(crate) fn object_result<T>(
    state: StepLoop,
    response: ProviderResponse,
    candidate: Candidate<T>,
) -> GenerateObjectResult<T> {
    let (steps, usage) = state.into_steps();
    GenerateObjectResult {
        object: candidate.object,
        raw_json: candidate.raw_json,
        finish_reason: response.finish_reason,
        response,
        steps,
        usage,
        validation_error: candidate.validation_error,
    }
}

/// A provider that still refuses after tools were dropped is a provider bug.
pub(crate) fn unsupported_without_tools(e: StepwiseError) -> StepwiseError {
    match e {
        StepwiseError::ToolsUnsupported => StepwiseError::InvalidState(
            "provider reported tools unsupported for a request without tools".into(),
        ),
        e => e,
    }
}

/// Generate a value of type `T` conforming to `schema`.
///
/// With `options.strict` (the default) a candidate that still fails after
/// `options.max_retries` correction turns is a
/// [`StepwiseError::ObjectValidation`]. Without it, the first failure is
/// returned as `validation_error` with `object` left empty.
pub async fn generate_object<T: DeserializeOwned>(
    provider: &dyn ModelProvider,
    request: TextRequest,
    schema: Value,
    schema_name: &str,
    options: GenerateOptions,
) -> Result<GenerateObjectResult<T>, StepwiseError> {
    check_object_request(&request, &schema)?;
    let span = info_span!("generate_object", run_id = %Uuid::new_v4(), model = %request.model);

    async move {
        let guard = CallGuard::new(&options.cancel, options.timeout);
        let (state, enforcer) = tool_mode(request.clone(), &schema, options.clone(), guard.clone());
        match enforce(provider, state, enforcer).await {
            Err(StepwiseError::ToolsUnsupported) => {
                warn!("model cannot call tools, falling back to JSON-only output");
                let (state, enforcer) = json_only_mode(request, &schema, schema_name, options, guard);
                enforce(provider, state, enforcer)
                    .await
                    .map_err(unsupported_without_tools)
            }
            other => other,
        }
    }
    .instrument(span)
    .await
}

async fn enforce<T: DeserializeOwned>(
    provider: &dyn ModelProvider,
    mut state: StepLoop,
    mut enforcer: Enforcer,
) -> Result<GenerateObjectResult<T>, StepwiseError> {
    loop {
        let request = state.begin_turn()?;
        let response = state.guard().run(provider.generate_text(&request)).await?;
        let turn = state.record_response(response);

        match enforcer.judge::<T>(&turn, state.has_tools())? {
            Verdict::Done(candidate) => {
                let response = state.record_terminal(turn);
                return Ok(object_result(state, response, candidate));
            }
            Verdict::Retry(correction) => {
                state.record_terminal(turn);
                enforcer.correct(&mut state, correction);
            }
            Verdict::Dispatch => {
                state.dispatch_turn(turn, None).await?;
                state.check_iteration_cap()?;
            }
        }
    }
}

/// Strip a surrounding markdown code fence, tolerating a missing closer.
pub(crate) fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = rest.strip_prefix("json").unwrap_or(rest);
    body.strip_suffix("```").unwrap_or(body).trim().to_string()
}

/// Correction asking the model to fix a rejected candidate.
pub(crate) fn correction_prompt(error: &str, raw: &str) -> String {
    let excerpt = match raw.char_indices().nth(MAX_ECHOED_JSON) {
        Some((cut, _)) => format!("{}…", &raw[..cut]),
        None => raw.to_string(),
    };
    format!(
        "The previous JSON was invalid or did not match the schema.\nError:\n{error}\nPrevious JSON:\n{excerpt}\nReturn ONLY corrected JSON (no extra text)."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelRef;
    use crate::tools::{AgentTool, AgentToolParameters};
    use crate::types::{AgentToolCall, Usage};
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Deserialize, PartialEq)]
    struct FooBar {
        foo: String,
        bar: i64,
    }

    fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "foo": { "type": "string" }, "bar": { "type": "integer" } },
            "required": ["foo", "bar"],
        })
    }

    fn return_turn(args: &str) -> Turn {
        let call = AgentToolCall::new("r1", RETURN_TOOL_NAME, args);
        Turn {
            response: ProviderResponse::tool_calls("", vec![call.clone()], Usage::default()),
            tool_calls: vec![call],
        }
    }

    fn enforcer(strict: bool, max_retries: usize) -> Enforcer {
        let options = GenerateOptions::builder()
            .strict(strict)
            .max_retries(max_retries)
            .build();
        Enforcer::new(schema(), &options, Mode::Tools)
    }

    #[test]
    fn strip_code_fences_variants() {
        assert_eq!(strip_code_fences(r#"{"key": "value"}"#), r#"{"key": "value"}"#);
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), r#"{"a": 1}"#);
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), r#"{"a": 1}"#);
        assert_eq!(strip_code_fences("```json\n{\"a\": 1"), r#"{"a": 1"#);
    }

    #[test]
    fn correction_prompt_truncates_long_json() {
        let raw = "x".repeat(MAX_ECHOED_JSON + 10);
        let prompt = correction_prompt("bad", &raw);
        assert!(prompt.contains(&format!("{}…\n", "x".repeat(MAX_ECHOED_JSON))));
        assert!(!prompt.contains(&"x".repeat(MAX_ECHOED_JSON + 1)));

        let short = correction_prompt("bad", "{}");
        assert!(short.starts_with("The previous JSON was invalid or did not match the schema.\nError:\nbad\n"));
        assert!(short.ends_with("Previous JSON:\n{}\nReturn ONLY corrected JSON (no extra text)."));
    }

    #[test]
    fn return_call_wins_over_other_calls() {
        let mut enforcer = enforcer(true, 1);
        let ret = AgentToolCall::new("r1", RETURN_TOOL_NAME, r#"{"foo":"hi","bar":7}"#);
        let other = AgentToolCall::new("o1", "lookup", "{}");
        let turn = Turn {
            response: ProviderResponse::tool_calls("", vec![other.clone(), ret.clone()], Usage::default()),
            tool_calls: vec![other, ret],
        };
        match enforcer.judge::<FooBar>(&turn, true).unwrap() {
            Verdict::Done(c) => assert_eq!(c.object, Some(FooBar { foo: "hi".into(), bar: 7 })),
            _ => panic!("expected a decoded object"),
        }
    }

    #[test]
    fn strict_budget_then_hard_failure() {
        let mut enforcer = enforcer(true, 1);
        let bad = return_turn(r#"{"foo":"hi","bar":"oops"}"#);
        assert!(matches!(enforcer.judge::<FooBar>(&bad, false), Ok(Verdict::Retry(_))));
        match enforcer.judge::<FooBar>(&bad, false) {
            Err(StepwiseError::ObjectValidation { raw_json, .. }) => {
                assert_eq!(raw_json, r#"{"foo":"hi","bar":"oops"}"#)
            }
            _ => panic!("expected ObjectValidation"),
        }
    }

    #[test]
    fn non_strict_returns_error_as_data() {
        let mut enforcer = enforcer(false, 3);
        match enforcer.judge::<FooBar>(&return_turn(""), false).unwrap() {
            Verdict::Done(c) => {
                assert!(c.object.is_none());
                assert_eq!(c.validation_error.as_deref(), Some("empty json"));
            }
            _ => panic!("expected a data-level failure"),
        }
    }

    #[test]
    fn missing_return_call_asks_for_it_unless_tools_can_run() {
        let plain = Turn {
            response: ProviderResponse::text("here you go", Usage::default()),
            tool_calls: Vec::new(),
        };
        let mut strict = enforcer(true, 1);
        match strict.judge::<FooBar>(&plain, true).unwrap() {
            Verdict::Retry(message) => assert!(message.text().starts_with("You did not call the tool __return_json")),
            _ => panic!("expected a must-call correction"),
        }

        let lookup = AgentToolCall::new("o1", "lookup", "{}");
        let tool_turn = Turn {
            response: ProviderResponse::tool_calls("", vec![lookup.clone()], Usage::default()),
            tool_calls: vec![lookup],
        };
        assert!(matches!(enforcer(true, 1).judge::<FooBar>(&tool_turn, true), Ok(Verdict::Dispatch)));
        assert!(matches!(enforcer(true, 1).judge::<FooBar>(&tool_turn, false), Ok(Verdict::Retry(_))));
    }

    #[test]
    fn reserved_tool_name_is_rejected() {
        let reserved: Arc<dyn Tool> = Arc::new(AgentTool::new(
            RETURN_TOOL_NAME,
            "mine",
            AgentToolParameters::empty(),
            |_, _| async { Ok(Value::Null) },
        ));
        let request = TextRequest::new(ModelRef::new("mock", "m"), Vec::new()).with_tool(reserved);
        assert!(matches!(
            check_object_request(&request, &schema()),
            Err(StepwiseError::InvalidArgument(_))
        ));
    }

    #[test]
    fn json_only_mode_drops_tools_and_requests_schema_format() {
        let tool: Arc<dyn Tool> = Arc::new(AgentTool::new("lookup", "", AgentToolParameters::empty(), |_, _| async {
            Ok(Value::Null)
        }));
        let request = TextRequest::new(ModelRef::new("mock", "m"), vec![ModelMessage::user("hi")]).with_tool(tool);
        let (mut state, enforcer) =
            json_only_mode(request, &schema(), "foo_bar", GenerateOptions::default(), CallGuard::default());
        let req = state.begin_turn().unwrap();
        assert_eq!(enforcer.mode(), Mode::JsonOnly);
        assert!(req.tools.is_empty());
        assert!(req.messages[0].text().starts_with(JSON_ONLY_INSTRUCTION));
        assert!(matches!(
            req.settings.response_format,
            Some(ResponseFormat::JsonSchema { ref name, .. }) if name == "foo_bar"
        ));
    }
}
