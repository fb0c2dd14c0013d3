//! Stop conditions for the step loop.
//!
//! A stop condition is checked after every turn that dispatched tools. When
//! it returns `true` the loop ends and the last model response becomes the
//! final one, even though it called tools.

use std::sync::Arc;

use crate::types::{ModelMessage, Step};

/// What a stop condition gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct StopWhenEvent<'a> {
    /// Steps recorded so far, oldest first.
    pub steps: &'a [Step],
    /// The conversation so far.
    pub messages: &'a [ModelMessage],
}

/// Trait for conditions that end a tool loop early.
pub trait StopCondition: Send + Sync {
    fn should_stop(&self, event: &StopWhenEvent<'_>) -> bool;
}

/// Stop once at least `n` steps have been recorded.
#[derive(Debug, Clone, Copy)]
pub struct StepCountIs {
    max_steps: usize,
}

impl StepCountIs {
    pub fn new(max_steps: usize) -> Self {
        Self { max_steps }
    }
}

impl StopCondition for StepCountIs {
    fn should_stop(&self, event: &StopWhenEvent<'_>) -> bool {
        event.steps.len() >= self.max_steps
    }
}

/// Stop once any step has called the named tool.
#[derive(Debug, Clone)]
pub struct HasToolCall {
    tool_name: String,
}

impl HasToolCall {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
        }
    }
}

impl StopCondition for HasToolCall {
    fn should_stop(&self, event: &StopWhenEvent<'_>) -> bool {
        event
            .steps
            .iter()
            .flat_map(|s| s.tool_calls.iter())
            .any(|tc| tc.name == self.tool_name)
    }
}

/// Stop when the latest step's text matches a regex.
pub struct TextMatches {
    regex: regex::Regex,
}

impl TextMatches {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: regex::Regex::new(pattern)?,
        })
    }
}

impl StopCondition for TextMatches {
    fn should_stop(&self, event: &StopWhenEvent<'_>) -> bool {
        event
            .steps
            .last()
            .is_some_and(|step| self.regex.is_match(&step.text))
    }
}

/// Stop when a custom predicate returns true.
pub struct PredicateStop<F: Fn(&StopWhenEvent<'_>) -> bool + Send + Sync> {
    predicate: F,
}

impl<F: Fn(&StopWhenEvent<'_>) -> bool + Send + Sync> PredicateStop<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F: Fn(&StopWhenEvent<'_>) -> bool + Send + Sync> StopCondition for PredicateStop<F> {
    fn should_stop(&self, event: &StopWhenEvent<'_>) -> bool {
        (self.predicate)(event)
    }
}

/// Stop when any of the inner conditions fires.
pub struct AnyOf {
    conditions: Vec<Arc<dyn StopCondition>>,
}

impl StopCondition for AnyOf {
    fn should_stop(&self, event: &StopWhenEvent<'_>) -> bool {
        self.conditions.iter().any(|c| c.should_stop(event))
    }
}

pub fn step_count_is(max_steps: usize) -> Arc<dyn StopCondition> {
    Arc::new(StepCountIs::new(max_steps))
}

pub fn has_tool_call(tool_name: impl Into<String>) -> Arc<dyn StopCondition> {
    Arc::new(HasToolCall::new(tool_name))
}

pub fn text_matches(pattern: &str) -> Result<Arc<dyn StopCondition>, regex::Error> {
    Ok(Arc::new(TextMatches::new(pattern)?))
}

pub fn predicate<F>(predicate: F) -> Arc<dyn StopCondition>
where
    F: Fn(&StopWhenEvent<'_>) -> bool + Send + Sync + 'static,
{
    Arc::new(PredicateStop::new(predicate))
}

pub fn any_of(conditions: Vec<Arc<dyn StopCondition>>) -> Arc<dyn StopCondition> {
    Arc::new(AnyOf { conditions })
}
