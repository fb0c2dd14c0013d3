//! Convenience functions for common generation patterns.

use crate::config::StepwiseConfig;
use crate::error::StepwiseError;
use crate::models::ModelRef;
use crate::provider::ProviderRegistry;
use crate::types::ModelMessage;

use super::options::{GenerateOptions, TextRequest};

/// Simple text generation: model + prompt → text.
///
/// Resolves the provider from `registry` and uses the global config.
pub async fn generate(
    registry: &ProviderRegistry,
    model: &ModelRef,
    prompt: impl Into<String>,
) -> Result<String, StepwiseError> {
    run(registry, model, vec![ModelMessage::user(prompt)]).await
}

/// Analyze content: model + system prompt + content → text.
pub async fn analyze(
    registry: &ProviderRegistry,
    model: &ModelRef,
    system: impl Into<String>,
    content: impl Into<String>,
) -> Result<String, StepwiseError> {
    let messages = vec![ModelMessage::system(system), ModelMessage::user(content)];
    run(registry, model, messages).await
}

async fn run(
    registry: &ProviderRegistry,
    model: &ModelRef,
    messages: Vec<ModelMessage>,
) -> Result<String, StepwiseError> {
    let provider = registry.resolve(model)?;
    let options = GenerateOptions::from_config(StepwiseConfig::global());
    let request = TextRequest::new(model.clone(), messages);
    let result = super::text::generate_text(provider.as_ref(), request, options).await?;
    Ok(result.text)
}
