//! # intension-runtime
//!
//! LLM-backed truth classification of knowledge-graph triples.
//!
//! This crate resolves a model name to one of three inference services,
//! sends the prompts built by `intension-core`, and parses the replies.
//!
//! - [`Resolver`] maps a model name to a provider handle, reading the
//!   family's credential from a [`CredentialProvider`].
//! - [`TripleClassifier`] judges a triple against a hypothetical world.
//! - [`RationaleReviser`] rewrites a rationale that wrongly judged a true
//!   triple false.
//!
//! ## Example
//!
//! ```rust,ignore
//! use intension_runtime::{ClassifierConfig, Resolver, TripleClassifier};
//! use intension_core::{Triple, WorldContext};
//!
//! let classifier = TripleClassifier::new(&ClassifierConfig::default(), &Resolver::from_env())?;
//! let result = classifier
//!     .classify(
//!         &Triple::new("vrd:skateOn", "rdfs:domain", "vrd:Person"),
//!         &WorldContext::new("vrd:skateOn rdfs:domain vrd:Person ."),
//!     )
//!     .await?;
//! if result.matched {
//!     println!("{:?}: {}", result.truth_value(), result.rationale);
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod providers;
pub mod resolver;

pub use classifier::{PromptChain, RationaleReviser, TripleClassifier};
pub use config::ClassifierConfig;
pub use error::ClassifierError;
pub use providers::{
    CompletionConfig, CredentialProvider, EnvCredentials, LlmProvider, ProviderError,
    ProviderRegistry, StaticCredentials,
};
pub use resolver::{BackendConfig, BackendFamily, ResolvedBackend, Resolver};
