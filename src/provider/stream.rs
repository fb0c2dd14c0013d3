//! Pull-based handle over one streamed provider turn.

use futures::StreamExt;

use super::decoder::DeltaDecoder;
use super::{FrameStream, ProviderResponse};
use crate::error::StepwiseError;
use crate::types::Delta;

/// Wraps a provider frame stream and decodes it turn by turn.
///
/// `advance` returns `true` for each non-empty delta and `false` once the
/// underlying stream has ended, at which point `final_response` is set.
pub struct ProviderStream {
    frames: Option<FrameStream>,
    decoder: DeltaDecoder,
    current: Delta,
    response: Option<ProviderResponse>,
}

impl ProviderStream {
    pub fn new(frames: FrameStream) -> Self {
        Self {
            frames: Some(frames),
            decoder: DeltaDecoder::new(),
            current: Delta::default(),
            response: None,
        }
    }

    /// Pull the next non-empty delta.
    pub async fn advance(&mut self) -> Result<bool, StepwiseError> {
        while !self.decoder.is_done() {
            let next = match self.frames.as_mut() {
                Some(frames) => frames.next().await,
                None => return Ok(false),
            };
            match next {
                Some(Ok(frame)) => {
                    let delta = match self.decoder.push(frame) {
                        Ok(delta) => delta,
                        Err(e) => {
                            self.close();
                            return Err(e);
                        }
                    };
                    if !delta.is_empty() {
                        self.current = delta;
                        return Ok(true);
                    }
                }
                Some(Err(e)) => {
                    self.close();
                    return Err(e);
                }
                None => break,
            }
        }

        if self.frames.take().is_some() {
            self.response = Some(self.decoder.finish());
        }
        self.current = Delta::default();
        Ok(false)
    }

    /// The delta surfaced by the last successful `advance`.
    pub fn delta(&self) -> &Delta {
        &self.current
    }

    /// The decoder state, for inspecting partially streamed tool calls.
    pub fn decoder(&self) -> &DeltaDecoder {
        &self.decoder
    }

    /// The terminal response, once the stream has ended.
    pub fn final_response(&self) -> Option<&ProviderResponse> {
        self.response.as_ref()
    }

    pub fn take_response(&mut self) -> Option<ProviderResponse> {
        self.response.take()
    }

    /// Drop the underlying stream without producing a response.
    pub fn close(&mut self) {
        self.frames = None;
    }
}

impl std::fmt::Debug for ProviderStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderStream")
            .field("open", &self.frames.is_some())
            .field("current", &self.current)
            .field("finished", &self.response.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FinishReason, TextStreamDelta, ToolCallFragment, Usage};

    #[tokio::test]
    async fn surfaces_only_non_empty_deltas_then_finishes() {
        let frames: FrameStream = Box::pin(futures::stream::iter(vec![
            Ok(TextStreamDelta::text("")),
            Ok(TextStreamDelta::text("hi")),
            Ok(TextStreamDelta::tool_call(ToolCallFragment {
                index: 0,
                id: Some("c1".into()),
                name: Some("echo".into()),
                arguments: "{}".into(),
            })),
            Ok(TextStreamDelta::done(Some(FinishReason::ToolCalls), Some(Usage::new(1, 1)))),
        ]));
        let mut stream = ProviderStream::new(frames);

        assert!(stream.advance().await.unwrap());
        assert_eq!(stream.delta().text, "hi");
        assert!(stream.advance().await.unwrap());
        assert_eq!(stream.delta().tool_calls.len(), 1);
        assert!(!stream.advance().await.unwrap());
        assert!(!stream.advance().await.unwrap());

        let response = stream.final_response().unwrap();
        assert_eq!(response.output_text(), "hi");
        assert_eq!(response.tool_calls_made()[0].name, "echo");
    }

    #[tokio::test]
    async fn stream_errors_propagate() {
        let frames: FrameStream = Box::pin(futures::stream::iter(vec![
            Ok(TextStreamDelta::text("a")),
            Err(StepwiseError::Stream("reset".into())),
        ]));
        let mut stream = ProviderStream::new(frames);
        assert!(stream.advance().await.unwrap());
        assert!(stream.advance().await.is_err());
        assert!(stream.final_response().is_none());
        assert!(!stream.advance().await.unwrap());
    }
}
