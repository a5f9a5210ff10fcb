//! # intension-core
//!
//! Prompt construction and response parsing for LLM-based truth
//! classification of knowledge-graph triples.
//!
//! This crate never talks to a model. It turns a triple and a description of
//! a hypothetical world into a prompt, and turns the model's free-text reply
//! back into a rationale and a `0`/`1` answer. Network access lives in
//! `intension-runtime`.
//!
//! ## Example
//!
//! ```rust
//! use intension_core::{prompts, ClassificationResult, Triple, WorldContext};
//!
//! let triple = Triple::new("ex:A", "ex:B", "ex:C");
//! let graph = WorldContext::new("ex:A ex:B ex:C .");
//! let prompt = prompts::classification_template()
//!     .unwrap()
//!     .render(&prompts::classification_fields(&triple, &graph))
//!     .unwrap();
//! assert!(prompt.contains("Subject: <ex:A>"));
//!
//! let result = ClassificationResult::parse("Rationale: Stated directly. Answer: 1");
//! assert_eq!(result.truth_value(), Some(true));
//! ```

pub mod parser;
pub mod prompts;
pub mod result;
pub mod template;
pub mod triple;

pub use parser::{OutputParser, ParseError, ParsedOutput};
pub use prompts::FewShotExample;
pub use result::{ClassificationResult, RevisionResult};
pub use template::{PromptTemplate, TemplateError};
pub use triple::{PriorRationale, Triple, WorldContext};
