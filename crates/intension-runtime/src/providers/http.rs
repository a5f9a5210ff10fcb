//! Shared request execution for the HTTP-backed providers.

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;

use super::ProviderError;

/// Build the HTTP client used by a provider.
pub(super) fn build_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .build()
        .map_err(|e| ProviderError::HttpError(e.to_string()))
}

/// Send `request` and decode a JSON body, mapping failures to [`ProviderError`].
pub(super) async fn execute<T: DeserializeOwned>(
    request: RequestBuilder,
    timeout: Option<Duration>,
) -> Result<T, ProviderError> {
    let request = match timeout {
        Some(timeout) => request.timeout(timeout),
        None => request,
    };

    let response = request.send().await.map_err(|e| match timeout {
        Some(timeout) if e.is_timeout() => ProviderError::Timeout(timeout),
        _ => ProviderError::HttpError(e.to_string()),
    })?;

    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(ProviderError::RateLimited { retry_after });
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::AuthError(message));
        }
        return Err(ProviderError::ApiError {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::ParseError(e.to_string()))
}

/// Pull a human-readable message out of an error body.
///
/// Handles `{"error": {"message": ...}}` (OpenAI, Anthropic) and
/// `{"error": "..."}` (Hugging Face); anything else is returned verbatim.
pub(super) fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<JsonValue>(body) else {
        return body.trim().to_string();
    };

    match &value["error"] {
        JsonValue::String(message) => message.clone(),
        JsonValue::Object(detail) => detail
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.trim().to_string()),
        _ => body.trim().to_string(),
    }
}
