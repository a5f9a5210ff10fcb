use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;
use crate::providers::{DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::resolver::validate_base_url;

/// Default cap on generated tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Configuration for the classifier façades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Model name; must be on one of the supported allow-lists
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// API endpoint (optional, uses default for the model's family)
    pub base_url: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            base_url: None,
        }
    }
}

impl ClassifierConfig {
    /// Create a new config with the specified model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Reject values no backend accepts.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(ClassifierError::InvalidConfig(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == Some(0) {
            return Err(ClassifierError::InvalidConfig(
                "max_tokens must be positive".to_string(),
            ));
        }
        if let Some(url) = &self.base_url {
            validate_base_url(url)?;
        }
        Ok(())
    }
}
