//! Provider factory pattern for backend-family registration.
//!
//! Each backend family has a factory that builds a provider from a resolved
//! [`BackendConfig`]. The resolver looks factories up in a
//! [`ProviderRegistry`], so a family can be served by a different
//! implementation (a proxy, a mock) without touching the resolver.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let provider = registry.create(&backend_config)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{LlmProvider, ProviderError};
use crate::resolver::{BackendConfig, BackendFamily};

/// Factory for creating LLM providers from a resolved backend configuration.
pub trait ProviderFactory: Send + Sync {
    /// The backend family this factory serves.
    fn family(&self) -> BackendFamily;

    /// Create a provider instance.
    ///
    /// Must not perform network I/O.
    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Human-readable description of this provider.
    fn description(&self) -> &'static str {
        "LLM Provider"
    }
}

/// Registry of provider factories, one per backend family.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<BackendFamily, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider factory.
    ///
    /// If a factory for the same family already exists, it will be replaced.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories.insert(factory.family(), factory);
    }

    /// Create the provider serving `config.family`.
    pub fn create(&self, config: &BackendConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.factories
            .get(&config.family)
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "No provider registered for backend family '{}'. Available: {:?}",
                    config.family,
                    self.available_families()
                ))
            })?
            .create(config)
    }

    /// List registered families.
    pub fn available_families(&self) -> Vec<BackendFamily> {
        self.factories.keys().copied().collect()
    }

    /// Check if a family has a registered factory.
    pub fn has_family(&self, family: BackendFamily) -> bool {
        self.factories.contains_key(&family)
    }

    /// Get the factory for a family.
    pub fn get_factory(&self, family: BackendFamily) -> Option<&Arc<dyn ProviderFactory>> {
        self.factories.get(&family)
    }

    /// Create a registry with all built-in providers registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::OpenAiProviderFactory));
        registry.register(Arc::new(super::AnthropicProviderFactory));
        registry.register(Arc::new(super::HuggingFaceProviderFactory));
        registry
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("families", &self.available_families())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, CompletionConfig, CompletionResponse, TokenUsage};
    use async_trait::async_trait;

    // Mock provider for testing
    struct MockProvider {
        name: String,
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                content: "mock response".to_string(),
                usage: TokenUsage::default(),
                model: "mock".to_string(),
                stop_reason: Some("stop".to_string()),
            })
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    // Mock factory for testing
    struct MockProviderFactory;

    impl ProviderFactory for MockProviderFactory {
        fn family(&self) -> BackendFamily {
            BackendFamily::OpenAi
        }

        fn create(&self, config: &BackendConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
            Ok(Arc::new(MockProvider {
                name: format!("mock:{}", config.model),
            }))
        }

        fn description(&self) -> &'static str {
            "Mock provider for testing"
        }
    }

    fn config(family: BackendFamily, model: &str) -> BackendConfig {
        BackendConfig {
            family,
            model: model.to_string(),
            temperature: 0.1,
            max_tokens: None,
            timeout: None,
            credential: None,
            base_url: None,
        }
    }

    #[test]
    fn test_registry_register_and_create() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockProviderFactory));

        assert!(registry.has_family(BackendFamily::OpenAi));
        assert!(!registry.has_family(BackendFamily::Anthropic));

        let provider = registry
            .create(&config(BackendFamily::OpenAi, "gpt-3.5-turbo"))
            .unwrap();
        assert_eq!(provider.name(), "mock:gpt-3.5-turbo");
    }

    #[test]
    fn test_registry_unregistered_family() {
        let registry = ProviderRegistry::new();

        let result = registry.create(&config(BackendFamily::HuggingFace, "google/gemma-2b-it"));
        match result {
            Err(ProviderError::NotConfigured(msg)) => {
                assert!(msg.contains("huggingface"));
            }
            _ => panic!("Expected NotConfigured error"),
        }
    }

    #[test]
    fn test_registry_replaces_factory() {
        let mut registry = ProviderRegistry::with_defaults();
        assert_eq!(registry.available_families().len(), 3);

        registry.register(Arc::new(MockProviderFactory));
        assert_eq!(registry.available_families().len(), 3);
        assert_eq!(
            registry
                .get_factory(BackendFamily::OpenAi)
                .unwrap()
                .description(),
            "Mock provider for testing"
        );
    }
}
