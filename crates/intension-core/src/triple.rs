//! Inputs to a classification: the triple under test and the text it is
//! judged against.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A subject-predicate-object statement from a knowledge graph.
///
/// Terms are opaque identifiers, conventionally namespaced
/// (`prefix:LocalName`). No validation is performed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    subject: String,
    predicate: String,
    object: String,
}

impl Triple {
    /// Create a triple from its three terms.
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn object(&self) -> &str {
        &self.object
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> <{}> <{}>", self.subject, self.predicate, self.object)
    }
}

/// Background facts the model is told to assume true ("graph").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldContext(String);

impl WorldContext {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorldContext {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for WorldContext {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// A rationale previously produced for a triple and judged incorrect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorRationale(String);

impl PriorRationale {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PriorRationale {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for PriorRationale {
    fn from(text: String) -> Self {
        Self(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triple_accessors() {
        let triple = Triple::new("vrd:skateOn", "rdfs:domain", "vrd:PullCapableThing");
        assert_eq!(triple.subject(), "vrd:skateOn");
        assert_eq!(triple.predicate(), "rdfs:domain");
        assert_eq!(triple.object(), "vrd:PullCapableThing");
    }

    #[test]
    fn test_triple_display() {
        let triple = Triple::new("ex:A", "ex:B", "ex:C");
        assert_eq!(triple.to_string(), "<ex:A> <ex:B> <ex:C>");
    }

    #[test]
    fn test_any_string_is_accepted() {
        let triple = Triple::new("", "has space", "{braces}");
        assert_eq!(triple.subject(), "");
        assert_eq!(triple.object(), "{braces}");
    }

    #[test]
    fn test_context_serializes_as_plain_string() {
        let graph = WorldContext::new("ex:A ex:B ex:C .");
        let json = serde_json::to_string(&graph).unwrap();
        assert_eq!(json, "\"ex:A ex:B ex:C .\"");
    }
}
