use intension_core::TemplateError;
use thiserror::Error;

use crate::providers::{CredentialError, ProviderError};

/// Errors from classifier construction and invocation.
///
/// Everything except `InferenceTransport` is raised before a request is
/// sent. Responses that do not match the expected labels are not errors;
/// they produce a result with `matched == false`.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Model {0} not supported")]
    UnsupportedModel(String),

    #[error("{name} not set: configure '{env_var}' environment variable")]
    MissingCredential { name: &'static str, env_var: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Inference call failed: {0}")]
    InferenceTransport(#[from] ProviderError),
}

impl From<CredentialError> for ClassifierError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Missing { name, env_var } => {
                ClassifierError::MissingCredential { name, env_var }
            }
        }
    }
}
