//! Hugging Face hosted inference provider for open-weight models.
//!
//! The model name is the hub repository id (`org/name`). Hosted models can
//! take minutes to load, so requests carry a fixed [`HUGGINGFACE_TIMEOUT`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{
    factory::ProviderFactory, http, secrets::ApiCredential, ChatMessage, CompletionConfig,
    CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use crate::resolver::{BackendConfig, BackendFamily};

/// Environment variable name for the Hugging Face hub token.
pub const HUGGINGFACEHUB_API_TOKEN_ENV: &str = "HUGGINGFACEHUB_API_TOKEN";

/// Request timeout for hosted open-weight models.
pub const HUGGINGFACE_TIMEOUT: Duration = Duration::from_secs(300);

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";

/// Hugging Face inference endpoint provider.
pub struct HuggingFaceProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HuggingFaceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HuggingFaceProvider {
    /// Create a new provider with the given hub token.
    pub fn new(credential: ApiCredential) -> Result<Self, ProviderError> {
        Ok(Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: http::build_client()?,
        })
    }

    /// Set custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn endpoint(&self, repo_id: &str) -> String {
        format!("{}/models/{}", self.base_url.trim_end_matches('/'), repo_id)
    }

    fn request_body(messages: &[ChatMessage], config: &CompletionConfig) -> GenerationRequest {
        // Text-generation endpoints take a single prompt string
        let inputs = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        GenerationRequest {
            inputs,
            parameters: GenerationParameters {
                temperature: config.temperature,
                max_new_tokens: config.max_tokens,
                return_full_text: false,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerationRequest {
    inputs: String,
    parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_new_tokens: Option<u32>,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: String,
}

/// Endpoints answer with either a list of generations or a single one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerationResponse {
    Many(Vec<Generation>),
    One(Generation),
}

impl GenerationResponse {
    fn into_text(self) -> Option<String> {
        match self {
            GenerationResponse::Many(items) => items.into_iter().next().map(|g| g.generated_text),
            GenerationResponse::One(item) => Some(item.generated_text),
        }
    }
}

#[async_trait]
impl LlmProvider for HuggingFaceProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = Self::request_body(&messages, config);

        // SECURITY: Only expose the credential here, at the point of use
        let request = self
            .client
            .post(self.endpoint(&config.model))
            .bearer_auth(self.credential.expose())
            .json(&body);

        let response: GenerationResponse = http::execute(request, config.timeout).await?;
        let content = response
            .into_text()
            .ok_or_else(|| ProviderError::EmptyCompletion(config.model.clone()))?;

        Ok(CompletionResponse {
            content,
            usage: TokenUsage::default(),
            model: config.model.clone(),
            stop_reason: None,
        })
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

/// Factory for Hugging Face providers.
pub struct HuggingFaceProviderFactory;

impl ProviderFactory for HuggingFaceProviderFactory {
    fn family(&self) -> BackendFamily {
        BackendFamily::HuggingFace
    }

    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let credential = config.credential.clone().ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Hugging Face hub token required: set {}",
                HUGGINGFACEHUB_API_TOKEN_ENV
            ))
        })?;

        let mut provider = HuggingFaceProvider::new(credential)?;
        if let Some(url) = &config.base_url {
            provider = provider.with_base_url(url);
        }
        Ok(Arc::new(provider))
    }

    fn description(&self) -> &'static str {
        "Hugging Face hosted inference for open-weight models"
    }
}
