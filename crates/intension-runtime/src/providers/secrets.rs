//! Credential handling for LLM providers.
//!
//! Credentials are looked up through a [`CredentialProvider`] instead of
//! reading the process environment directly, so the resolver can be driven
//! from tests or embedding code without touching real environment state.
//!
//! Once loaded, a credential is wrapped in [`ApiCredential`]:
//!
//! - **No accidental logging**: credentials never appear in Debug/Display output
//! - **Memory hygiene**: values are zeroed on drop via `secrecy`
//! - **Explicit use**: the raw value is only reachable through `.expose()`
//!
//! ## Usage
//!
//! ```ignore
//! use crate::providers::secrets::{ApiCredential, EnvCredentials};
//!
//! let cred = ApiCredential::require(&EnvCredentials, "ANTHROPIC_API_KEY", "Anthropic API key")?;
//! request.header("x-api-key", cred.expose());
//! ```

use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors from credential lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("{name} not set: configure '{env_var}' environment variable")]
    Missing { name: &'static str, env_var: String },
}

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from an environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// Source of credential values, keyed by environment variable name.
pub trait CredentialProvider: Send + Sync {
    /// Look up the value for `key`, if set.
    fn lookup(&self, key: &str) -> Option<SecretString>;

    /// Where values from this provider come from.
    fn source(&self) -> CredentialSource;
}

/// Reads credentials from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialProvider for EnvCredentials {
    fn lookup(&self, key: &str) -> Option<SecretString> {
        std::env::var(key).ok().map(SecretString::from)
    }

    fn source(&self) -> CredentialSource {
        CredentialSource::Environment
    }
}

/// In-memory credentials.
#[derive(Default)]
pub struct StaticCredentials {
    values: BTreeMap<String, SecretString>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values
            .insert(key.into(), SecretString::from(value.into()));
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn lookup(&self, key: &str) -> Option<SecretString> {
        self.values
            .get(key)
            .map(|v| SecretString::from(v.expose_secret().to_string()))
    }

    fn source(&self) -> CredentialSource {
        CredentialSource::Programmatic
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A securely-stored API credential.
///
/// # Example
///
/// ```ignore
/// let cred = ApiCredential::new("sk-secret-key", CredentialSource::Programmatic, "Test key");
///
/// // Safe to log/debug - shows [REDACTED]
/// println!("Provider credential: {:?}", cred);
///
/// // Explicit exposure for API calls
/// let key = cred.expose();
/// ```
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Create a new credential from a string value.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load a required credential.
    ///
    /// # Arguments
    /// * `provider` - Where to look the value up
    /// * `env_var` - Name of the environment variable
    /// * `name` - Human-readable name for error messages (e.g., "Anthropic API key")
    pub fn require(
        provider: &dyn CredentialProvider,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, CredentialError> {
        Self::optional(provider, env_var, name).ok_or_else(|| CredentialError::Missing {
            name,
            env_var: env_var.to_string(),
        })
    }

    /// Load a credential that may legitimately be absent.
    pub fn optional(
        provider: &dyn CredentialProvider,
        env_var: &str,
        name: &'static str,
    ) -> Option<Self> {
        provider.lookup(env_var).map(|value| Self {
            value,
            source: provider.source(),
            name,
        })
    }

    /// Expose the credential value for use in API calls.
    ///
    /// Only call this at the point where the credential is actually needed
    /// (e.g., setting an HTTP header). Never store the exposed value.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// Check if the credential is empty.
    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    /// Get the source of this credential.
    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Get the human-readable name of this credential.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Clone for ApiCredential {
    fn clone(&self) -> Self {
        Self {
            value: SecretString::from(self.expose().to_string()),
            source: self.source,
            name: self.name,
        }
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}
