//! Provider registry for resolving a model's provider by name.

use std::collections::HashMap;
use std::sync::Arc;

use super::ModelProvider;
use crate::error::StepwiseError;
use crate::models::ModelRef;

/// Maps provider names to provider instances.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ModelProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own `provider_name`.
    pub fn register(&mut self, provider: Arc<dyn ModelProvider>) {
        self.providers
            .insert(provider.provider_name().to_string(), provider);
    }

    /// Look up the provider serving `model`.
    pub fn resolve(&self, model: &ModelRef) -> Result<Arc<dyn ModelProvider>, StepwiseError> {
        self.get(&model.provider).ok_or_else(|| {
            StepwiseError::Configuration(format!(
                "No provider registered for '{}'",
                model.provider
            ))
        })
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ModelProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// List all registered provider names.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.provider_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{FrameStream, ProviderRequest, ProviderResponse};
    use crate::types::Usage;
    use async_trait::async_trait;

    struct StubProvider;

    #[async_trait]
    impl ModelProvider for StubProvider {
        fn provider_name(&self) -> &str {
            "stub"
        }

        async fn generate_text(
            &self,
            _request: &ProviderRequest,
        ) -> Result<ProviderResponse, StepwiseError> {
            Ok(ProviderResponse::text("ok", Usage::default()))
        }

        async fn stream_text(&self, _request: &ProviderRequest) -> Result<FrameStream, StepwiseError> {
            Ok(Box::pin(futures::stream::empty()))
        }
    }

    #[test]
    fn resolves_registered_provider_by_model() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubProvider));

        assert!(registry.has_provider("stub"));
        let model = ModelRef::new("stub", "m1");
        assert_eq!(registry.resolve(&model).unwrap().provider_name(), "stub");

        let missing = ModelRef::new("other", "m1");
        assert!(matches!(
            registry.resolve(&missing),
            Err(StepwiseError::Configuration(_))
        ));
    }
}
