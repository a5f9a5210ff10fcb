//! OpenAI chat-completions provider.
//!
//! The API key is optional at construction: when `OPENAI_API_KEY` is not set
//! the request is sent without an `Authorization` header and the API's own
//! rejection comes back as [`ProviderError::AuthError`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{
    factory::ProviderFactory, http, secrets::ApiCredential, ChatMessage, CompletionConfig,
    CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use crate::resolver::{BackendConfig, BackendFamily};

/// Environment variable name for the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat-completions provider.
pub struct OpenAiProvider {
    credential: Option<ApiCredential>,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiProvider {
    /// Create a new OpenAI provider.
    pub fn new(credential: Option<ApiCredential>) -> Result<Self, ProviderError> {
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

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn request_body<'a>(
        messages: &'a [ChatMessage],
        config: &'a CompletionConfig,
    ) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &config.model,
            messages: messages
                .iter()
                .map(|m| RequestMessage {
                    role: &m.role,
                    content: &m.content,
                })
                .collect(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// OpenAI API request format.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    model: String,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl ChatCompletionResponse {
    fn into_completion(self) -> Result<CompletionResponse, ProviderError> {
        let usage = self
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::EmptyCompletion("openai".to_string()))?;

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
            model: self.model,
            stop_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = Self::request_body(&messages, config);

        let mut request = self
            .client
            .post(self.endpoint())
            .json(&body);

        // SECURITY: Only expose the credential here, at the point of use
        if let Some(credential) = &self.credential {
            request = request.bearer_auth(credential.expose());
        }

        let response: ChatCompletionResponse = http::execute(request, config.timeout).await?;
        response.into_completion()
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Factory for OpenAI providers.
pub struct OpenAiProviderFactory;

impl ProviderFactory for OpenAiProviderFactory {
    fn family(&self) -> BackendFamily {
        BackendFamily::OpenAi
    }

    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let mut provider = OpenAiProvider::new(config.credential.clone())?;
        if let Some(url) = &config.base_url {
            provider = provider.with_base_url(url);
        }
        Ok(Arc::new(provider))
    }

    fn description(&self) -> &'static str {
        "OpenAI chat completions"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::secrets::CredentialSource;

    #[test]
    fn test_request_body_shape() {
        let messages = vec![ChatMessage::user("Is ex:A ex:B ex:C true?")];
        let config = CompletionConfig {
            model: "gpt-4o-2024-05-13".to_string(),
            temperature: 0.1,
            ..Default::default()
        };

        let body = serde_json::to_value(OpenAiProvider::request_body(&messages, &config)).unwrap();
        assert_eq!(body["model"], "gpt-4o-2024-05-13");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Is ex:A ex:B ex:C true?");
        assert!((body["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_endpoint_ignores_trailing_slash() {
        let provider = OpenAiProvider::new(None)
            .unwrap()
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/chat/completions");

        let provider = OpenAiProvider::new(None).unwrap();
        assert_eq!(provider.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_response_extracts_first_choice() {
        let raw = r#"{
            "model": "gpt-4o-2024-05-13",
            "choices": [
                {"message": {"role": "assistant", "content": "Rationale: ok. Answer: 1"}, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
        }"#;
        let response: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let completion = response.into_completion().unwrap();

        assert_eq!(completion.content, "Rationale: ok. Answer: 1");
        assert_eq!(completion.usage.total(), 19);
        assert_eq!(completion.stop_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_response_without_choices_is_error() {
        let raw = r#"{"model": "gpt-3.5-turbo", "choices": []}"#;
        let response: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            response.into_completion(),
            Err(ProviderError::EmptyCompletion(_))
        ));
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "sk-openai-super-secret";
        let provider = OpenAiProvider::new(Some(ApiCredential::new(
            secret_key,
            CredentialSource::Programmatic,
            "OpenAI API key",
        )))
        .unwrap();

        let debug_output = format!("{:?}", provider);
        assert!(!debug_output.contains(secret_key));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_factory_applies_base_url() {
        let config = BackendConfig {
            family: BackendFamily::OpenAi,
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.1,
            max_tokens: None,
            timeout: None,
            credential: None,
            base_url: Some("http://localhost:8080/v1".to_string()),
        };
        let provider = OpenAiProviderFactory.create(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }
}
