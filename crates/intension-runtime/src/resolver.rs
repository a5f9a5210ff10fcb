//! Model name to backend resolution.
//!
//! Each supported model belongs to exactly one [`BackendFamily`] through a
//! fixed allow-list; matching is exact. Resolution looks up the family's
//! credential and builds a provider handle, but never touches the network.
//!
//! | Family | Credential | Timeout |
//! |---|---|---|
//! | OpenAI | `OPENAI_API_KEY`, optional | none |
//! | Anthropic | `ANTHROPIC_API_KEY`, required | none |
//! | Hugging Face | `HUGGINGFACEHUB_API_TOKEN`, required | 300 s |

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ClassifierError;
use crate::providers::{
    ApiCredential, CompletionConfig, CredentialProvider, EnvCredentials, LlmProvider,
    ProviderError, ProviderRegistry, ANTHROPIC_API_KEY_ENV, HUGGINGFACEHUB_API_TOKEN_ENV, HUGGINGFACE_TIMEOUT,
    OPENAI_API_KEY_ENV,
};

const OPENAI_MODELS: &[&str] = &[
    "gpt-3.5-turbo",
    "gpt-4-1106-preview",
    "gpt-4-0125-preview",
    "gpt-4o-2024-05-13",
    "gpt-4o-mini-2024-07-18",
];

const ANTHROPIC_MODELS: &[&str] = &[
    "claude-3-opus-20240229",
    "claude-3-5-sonnet-20240620",
    "claude-3-haiku-20240307",
];

const HUGGINGFACE_MODELS: &[&str] = &[
    "meta-llama/Llama-2-70b-chat-hf",
    "mistralai/Mixtral-8x7B-Instruct-v0.1",
    "mistralai/Mistral-7B-Instruct-v0.3",
    "google/gemma-2-9b-it",
    "google/gemma-7b-it",
    "google/gemma-2b-it",
    "meta-llama/Meta-Llama-3-70B-Instruct",
    "microsoft/Phi-3-mini-128k-instruct",
];

/// The inference service integrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendFamily {
    /// OpenAI chat completions
    OpenAi,
    /// Anthropic messages
    Anthropic,
    /// Hugging Face hosted inference for open-weight models
    HuggingFace,
}

impl BackendFamily {
    pub const ALL: [BackendFamily; 3] = [
        BackendFamily::OpenAi,
        BackendFamily::Anthropic,
        BackendFamily::HuggingFace,
    ];

    /// The family serving `model`, if any. Exact match only.
    pub fn for_model(model: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|family| family.supported_models().contains(&model))
    }

    /// The allow-list for this family.
    pub fn supported_models(self) -> &'static [&'static str] {
        match self {
            BackendFamily::OpenAi => OPENAI_MODELS,
            BackendFamily::Anthropic => ANTHROPIC_MODELS,
            BackendFamily::HuggingFace => HUGGINGFACE_MODELS,
        }
    }

    /// Environment variable holding this family's credential.
    pub fn credential_env(self) -> &'static str {
        match self {
            BackendFamily::OpenAi => OPENAI_API_KEY_ENV,
            BackendFamily::Anthropic => ANTHROPIC_API_KEY_ENV,
            BackendFamily::HuggingFace => HUGGINGFACEHUB_API_TOKEN_ENV,
        }
    }

    /// Human-readable credential name for error messages.
    pub fn credential_name(self) -> &'static str {
        match self {
            BackendFamily::OpenAi => "OpenAI API key",
            BackendFamily::Anthropic => "Anthropic API key",
            BackendFamily::HuggingFace => "Hugging Face hub token",
        }
    }

    /// Whether resolution fails when the credential is absent.
    ///
    /// The OpenAI key is picked up from the environment when present and
    /// otherwise left for the API to reject.
    pub fn requires_credential(self) -> bool {
        match self {
            BackendFamily::OpenAi => false,
            BackendFamily::Anthropic | BackendFamily::HuggingFace => true,
        }
    }

    /// Fixed request timeout, if the family has one.
    pub fn timeout(self) -> Option<Duration> {
        match self {
            BackendFamily::HuggingFace => Some(HUGGINGFACE_TIMEOUT),
            BackendFamily::OpenAi | BackendFamily::Anthropic => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendFamily::OpenAi => "openai",
            BackendFamily::Anthropic => "anthropic",
            BackendFamily::HuggingFace => "huggingface",
        }
    }
}

impl fmt::Display for BackendFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to build a provider for one model.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub family: BackendFamily,

    /// Model name, or hub repository id for Hugging Face
    pub model: String,

    pub temperature: f32,

    pub max_tokens: Option<u32>,

    pub timeout: Option<Duration>,

    /// Required for Anthropic and Hugging Face; optional for OpenAI
    pub credential: Option<ApiCredential>,

    /// Overrides the family's default API base URL
    pub base_url: Option<String>,
}

impl BackendConfig {
    /// Per-request settings for this backend.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
        }
    }
}

/// A provider handle plus the settings to call it with.
#[derive(Clone)]
pub struct ResolvedBackend {
    pub family: BackendFamily,
    pub provider: Arc<dyn LlmProvider>,
    pub completion: CompletionConfig,
}

impl fmt::Debug for ResolvedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedBackend")
            .field("family", &self.family)
            .field("provider", &self.provider.name())
            .field("completion", &self.completion)
            .finish()
    }
}

/// Maps model names to ready-to-use providers.
pub struct Resolver {
    registry: ProviderRegistry,
    credentials: Arc<dyn CredentialProvider>,
    base_urls: BTreeMap<BackendFamily, String>,
    max_tokens: Option<u32>,
}

impl Resolver {
    /// Resolver with the built-in providers and the given credential source.
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            registry: ProviderRegistry::with_defaults(),
            credentials,
            base_urls: BTreeMap::new(),
            max_tokens: None,
        }
    }

    /// Resolver reading credentials from the process environment.
    pub fn from_env() -> Self {
        Self::new(Arc::new(EnvCredentials))
    }

    /// Replace the provider registry.
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Override the API base URL for one family.
    pub fn with_base_url(
        mut self,
        family: BackendFamily,
        url: impl Into<String>,
    ) -> Result<Self, ClassifierError> {
        let url = url.into();
        validate_base_url(&url)?;
        self.base_urls.insert(family, url);
        Ok(self)
    }

    /// Cap generated tokens for every backend.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Work out the backend configuration for `model` without building a client.
    pub fn describe(&self, model: &str, temperature: f32) -> Result<BackendConfig, ClassifierError> {
        let family = BackendFamily::for_model(model)
            .ok_or_else(|| ClassifierError::UnsupportedModel(model.to_string()))?;

        let credential = if family.requires_credential() {
            Some(ApiCredential::require(
                self.credentials.as_ref(),
                family.credential_env(),
                family.credential_name(),
            )?)
        } else {
            ApiCredential::optional(
                self.credentials.as_ref(),
                family.credential_env(),
                family.credential_name(),
            )
        };

        Ok(BackendConfig {
            family,
            model: model.to_string(),
            temperature,
            max_tokens: self.max_tokens,
            timeout: family.timeout(),
            credential,
            base_url: self.base_urls.get(&family).cloned(),
        })
    }

    /// Resolve `model` into a provider handle.
    pub fn resolve(&self, model: &str, temperature: f32) -> Result<ResolvedBackend, ClassifierError> {
        let config = self.describe(model, temperature)?;
        self.build(config)
    }

    /// Build a provider handle from an already described backend.
    pub fn build(&self, config: BackendConfig) -> Result<ResolvedBackend, ClassifierError> {
        // Client construction is offline; a missing factory is misconfiguration
        let provider = self.registry.create(&config).map_err(|e| match e {
            ProviderError::NotConfigured(message) => ClassifierError::InvalidConfig(message),
            other => ClassifierError::InferenceTransport(other),
        })?;

        tracing::debug!(
            family = %config.family,
            model = %config.model,
            temperature = config.temperature,
            timeout = ?config.timeout,
            has_credential = config.credential.is_some(),
            "Resolved inference backend"
        );

        Ok(ResolvedBackend {
            family: config.family,
            provider,
            completion: config.completion_config(),
        })
    }
}

/// Base URLs must carry an explicit http or https scheme.
pub(crate) fn validate_base_url(url: &str) -> Result<(), ClassifierError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ClassifierError::InvalidConfig(format!(
            "base_url must start with http:// or https://, got '{}'",
            url
        )))
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("registry", &self.registry)
            .field("base_urls", &self.base_urls)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
