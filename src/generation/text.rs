//! Blocking text generation with a tool loop.

use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::options::{GenerateOptions, TextRequest};
use super::step::StepLoop;
use crate::error::StepwiseError;
use crate::provider::ModelProvider;
use crate::types::GenerateTextResult;
use crate::util::timeout::CallGuard;

/// Generate text, dispatching tool calls until the model answers without any.
///
/// Every turn's usage is summed into the result. The run fails with
/// [`StepwiseError::LoopIterationExceeded`] once `options.max_iterations`
/// tool-dispatching turns have passed without a final answer, unless
/// `options.stop_when` ended it first.
pub async fn generate_text(
    provider: &dyn ModelProvider,
    request: TextRequest,
    options: GenerateOptions,
) -> Result<GenerateTextResult, StepwiseError> {
    let span = info_span!("generate_text", run_id = %Uuid::new_v4(), model = %request.model);
    let guard = CallGuard::new(&options.cancel, options.timeout);
    let mut state = StepLoop::new(request, options, guard);

    async move {
        loop {
            let request = state.begin_turn()?;
            let response = state.guard().run(provider.generate_text(&request)).await?;
            let turn = state.record_response(response);

            if turn.tool_calls.is_empty() {
                let response = state.record_terminal(turn);
                return Ok(state.into_result(response));
            }

            let response = state.dispatch_turn(turn, None).await?;
            if state.should_stop()? {
                return Ok(state.into_result(response));
            }
        }
    }
    .instrument(span)
    .await
}
