//! Cancellation and request deadline handling.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::StepwiseError;

/// Races awaits against caller cancellation and an optional request deadline.
///
/// Holds a child of the caller's token, so hitting the deadline cancels work
/// started under this guard (tool handlers see it through their context)
/// without touching the caller's token.
#[derive(Debug, Clone, Default)]
pub struct CallGuard {
    cancel: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl CallGuard {
    pub fn new(cancel: &CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            cancel: cancel.child_token(),
            deadline: timeout.map(|budget| (Instant::now() + budget, budget)),
        }
    }

    /// Token handed to tool handlers.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `future` unless cancellation or the deadline wins first.
    pub async fn run<T>(
        &self,
        future: impl Future<Output = Result<T, StepwiseError>>,
    ) -> Result<T, StepwiseError> {
        if self.cancel.is_cancelled() {
            return Err(StepwiseError::Canceled);
        }
        match self.deadline {
            Some((at, budget)) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(StepwiseError::Canceled),
                    result = tokio::time::timeout_at(at, future) => match result {
                        Ok(result) => result,
                        Err(_) => {
                            self.cancel.cancel();
                            Err(StepwiseError::Timeout(budget.as_millis() as u64))
                        }
                    },
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(StepwiseError::Canceled),
                    result = future => result,
                }
            }
        }
    }
}
