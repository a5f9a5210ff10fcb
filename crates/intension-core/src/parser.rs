//! Extraction of labelled fields from free-text model completions.
//!
//! The model is asked to answer in the layout
//!
//! ```text
//! Rationale: <free text>
//! Answer: <0 or 1>
//! ```
//!
//! Labels are matched case-insensitively, may be wrapped in `*` emphasis,
//! and the text may span lines. The rationale capture is lazy: it ends at
//! the first `Answer:` that is followed by a `0` or `1`.
//!
//! A completion that does not match is not an error when the parser has a
//! fallback key. The whole completion becomes the value of that key and the
//! output is marked unmatched, so a batch run survives one malformed reply.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const KEY_RATIONALE: &str = "rationale";
pub const KEY_ANSWER: &str = "answer";
pub const KEY_REVISION: &str = "revision";

lazy_static! {
    /// `Rationale:` ... `Answer:` 0|1, shortest rationale first.
    pub static ref CLASSIFICATION_PATTERN: Regex = Regex::new(
        r"(?is)\**Rationale:\**\s*(?P<rationale>.*?)\**Answer:\**\s*(?P<answer>[01])"
    ).unwrap();

    /// `Rationale:` followed by everything after it.
    pub static ref REVISION_PATTERN: Regex = Regex::new(
        r"(?is)\**Rationale:\**\s*(?P<revision>.*)"
    ).unwrap();
}

/// Errors from output parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Completion did not match the expected pattern")]
    NoMatch,

    #[error("Invalid parser pattern: {0}")]
    InvalidPattern(String),

    #[error("Output key '{0}' is not a named group of the pattern")]
    UnknownKey(String),
}

/// Fields extracted from a completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedOutput {
    /// Field name to extracted text.
    pub fields: BTreeMap<String, String>,

    /// False when the pattern did not match and the fallback key was used.
    pub matched: bool,
}

impl ParsedOutput {
    /// Output for a completion the pattern did not match.
    pub fn degraded(fallback_key: &str, text: &str) -> Self {
        Self {
            fields: BTreeMap::from([(fallback_key.to_string(), text.to_string())]),
            matched: false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|s| s.as_str())
    }

    pub fn is_degraded(&self) -> bool {
        !self.matched
    }
}

/// A regex-driven parser mapping named capture groups to output keys.
#[derive(Debug, Clone)]
pub struct OutputParser {
    pattern: Regex,
    output_keys: Vec<String>,
    fallback_key: Option<String>,
}

impl OutputParser {
    /// Build a parser from a pattern string.
    ///
    /// Every output key must be a named capture group in `pattern`.
    pub fn new(
        pattern: &str,
        output_keys: &[&str],
        fallback_key: Option<&str>,
    ) -> Result<Self, ParseError> {
        let pattern = Regex::new(pattern).map_err(|e| ParseError::InvalidPattern(e.to_string()))?;
        Self::from_regex(pattern, output_keys, fallback_key)
    }

    /// Build a parser from a compiled pattern.
    pub fn from_regex(
        pattern: Regex,
        output_keys: &[&str],
        fallback_key: Option<&str>,
    ) -> Result<Self, ParseError> {
        for key in output_keys {
            if !pattern.capture_names().flatten().any(|name| name == *key) {
                return Err(ParseError::UnknownKey(key.to_string()));
            }
        }

        Ok(Self {
            pattern,
            output_keys: output_keys.iter().map(|k| k.to_string()).collect(),
            fallback_key: fallback_key.map(str::to_string),
        })
    }

    /// Parser for classification completions (`rationale`, `answer`).
    pub fn classification() -> Self {
        Self {
            pattern: CLASSIFICATION_PATTERN.clone(),
            output_keys: vec![KEY_RATIONALE.to_string(), KEY_ANSWER.to_string()],
            fallback_key: Some(KEY_RATIONALE.to_string()),
        }
    }

    /// Parser for revision completions (`revision`).
    pub fn revision() -> Self {
        Self {
            pattern: REVISION_PATTERN.clone(),
            output_keys: vec![KEY_REVISION.to_string()],
            fallback_key: Some(KEY_REVISION.to_string()),
        }
    }

    pub fn output_keys(&self) -> &[String] {
        &self.output_keys
    }

    pub fn fallback_key(&self) -> Option<&str> {
        self.fallback_key.as_deref()
    }

    /// Extract fields from `text`.
    ///
    /// Only fails with [`ParseError::NoMatch`] when the pattern does not match
    /// and no fallback key is configured.
    pub fn parse(&self, text: &str) -> Result<ParsedOutput, ParseError> {
        let Some(captures) = self.pattern.captures(text) else {
            return match &self.fallback_key {
                Some(key) => {
                    tracing::warn!(
                        fallback_key = %key,
                        completion_len = text.len(),
                        "Completion did not match the expected labels, using fallback"
                    );
                    Ok(ParsedOutput::degraded(key, text))
                }
                None => Err(ParseError::NoMatch),
            };
        };

        let fields = self
            .output_keys
            .iter()
            .filter_map(|key| {
                captures
                    .name(key)
                    .map(|m| (key.clone(), clean_capture(m.as_str()).to_string()))
            })
            .collect();

        Ok(ParsedOutput {
            fields,
            matched: true,
        })
    }
}

/// Strip surrounding whitespace and emphasis markers from a capture.
fn clean_capture(text: &str) -> &str {
    text.trim().trim_matches('*').trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parses_rationale_and_answer() {
        let parsed = OutputParser::classification()
            .parse("...Rationale: It is true because X. Answer: 1")
            .unwrap();
        assert!(parsed.matched);
        assert_eq!(parsed.get(KEY_RATIONALE), Some("It is true because X."));
        assert_eq!(parsed.get(KEY_ANSWER), Some("1"));
    }

    #[test]
    fn test_multiline_and_case_insensitive() {
        let text = "Let me think.\nRATIONALE:\nFirst line.\nSecond line.\nanswer: 0\n";
        let parsed = OutputParser::classification().parse(text).unwrap();
        assert_eq!(parsed.get(KEY_RATIONALE), Some("First line.\nSecond line."));
        assert_eq!(parsed.get(KEY_ANSWER), Some("0"));
    }

    #[test]
    fn test_emphasis_markup_around_labels() {
        let text = "**Rationale:** The domain is Person.\n\n**Answer:** 1";
        let parsed = OutputParser::classification().parse(text).unwrap();
        assert_eq!(parsed.get(KEY_RATIONALE), Some("The domain is Person."));
        assert_eq!(parsed.get(KEY_ANSWER), Some("1"));
    }

    #[test]
    fn test_rationale_stops_at_first_qualifying_answer() {
        let text = "Rationale: A holds. Answer: 1\nRationale: B holds. Answer: 0";
        let parsed = OutputParser::classification().parse(text).unwrap();
        assert_eq!(parsed.get(KEY_RATIONALE), Some("A holds."));
        assert_eq!(parsed.get(KEY_ANSWER), Some("1"));
    }

    #[test]
    fn test_non_digit_answer_is_skipped() {
        let text = "Rationale: The Answer: maybe, on reflection. Answer: 0";
        let parsed = OutputParser::classification().parse(text).unwrap();
        assert_eq!(
            parsed.get(KEY_RATIONALE),
            Some("The Answer: maybe, on reflection.")
        );
        assert_eq!(parsed.get(KEY_ANSWER), Some("0"));
    }

    #[test]
    fn test_missing_answer_degrades_to_whole_text() {
        let text = "Rationale: I cannot decide.";
        let parsed = OutputParser::classification().parse(text).unwrap();
        assert!(parsed.is_degraded());
        assert_eq!(parsed.get(KEY_RATIONALE), Some(text));
        assert_eq!(parsed.get(KEY_ANSWER), None);
        assert_eq!(parsed.fields.len(), 1);
    }

    #[test]
    fn test_out_of_range_answer_degrades() {
        let text = "Rationale: Unsure. Answer: 2";
        let parsed = OutputParser::classification().parse(text).unwrap();
        assert!(parsed.is_degraded());
        assert_eq!(parsed.get(KEY_RATIONALE), Some(text));
    }

    #[test]
    fn test_reparse_is_idempotent() {
        let parser = OutputParser::classification();
        let first = parser.parse("Rationale: X. Answer: 0").unwrap();
        let rebuilt = format!(
            "Rationale: {} Answer: {}",
            first.get(KEY_RATIONALE).unwrap(),
            first.get(KEY_ANSWER).unwrap()
        );
        let second = parser.parse(&rebuilt).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.get(KEY_RATIONALE), Some("X."));
    }

    #[test]
    fn test_revision_takes_remaining_text() {
        let text = "Sure.\nRationale: Person is a subclass of PullCapableThing.\nSo it holds.";
        let parsed = OutputParser::revision().parse(text).unwrap();
        assert!(parsed.matched);
        assert_eq!(
            parsed.get(KEY_REVISION),
            Some("Person is a subclass of PullCapableThing.\nSo it holds.")
        );
    }

    #[test]
    fn test_revision_without_label_degrades() {
        let text = "Person is a subclass of PullCapableThing.";
        let parsed = OutputParser::revision().parse(text).unwrap();
        assert!(parsed.is_degraded());
        assert_eq!(parsed.get(KEY_REVISION), Some(text));
    }

    #[test]
    fn test_no_fallback_key_is_an_error() {
        let parser = OutputParser::new(r"(?i)verdict:\s*(?P<verdict>yes|no)", &["verdict"], None)
            .unwrap();
        assert_eq!(parser.parse("nothing here"), Err(ParseError::NoMatch));
        assert_eq!(
            parser.parse("Verdict: yes").unwrap().get("verdict"),
            Some("yes")
        );
    }

    #[test]
    fn test_unknown_output_key_rejected() {
        let err = OutputParser::new(r"(?P<a>x)", &["b"], None).unwrap_err();
        assert_eq!(err, ParseError::UnknownKey("b".to_string()));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(matches!(
            OutputParser::new(r"(unclosed", &[], None),
            Err(ParseError::InvalidPattern(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_parse_never_fails_with_fallback(text in "\\PC{0,200}") {
            let parsed = OutputParser::classification().parse(&text).unwrap();
            if parsed.is_degraded() {
                prop_assert_eq!(parsed.get(KEY_RATIONALE), Some(text.as_str()));
            } else {
                let answer = parsed.get(KEY_ANSWER).unwrap();
                prop_assert!(answer == "0" || answer == "1");
            }
        }

        #[test]
        fn prop_extracted_pair_reparses_identically(
            rationale in "[A-Za-z0-9 ,.]{1,80}",
            answer in "[01]",
        ) {
            let parser = OutputParser::classification();
            let first = parser.parse(&format!("Rationale: {} Answer: {}", rationale, answer)).unwrap();
            prop_assume!(first.matched);
            let rebuilt = format!(
                "Rationale: {} Answer: {}",
                first.get(KEY_RATIONALE).unwrap(),
                first.get(KEY_ANSWER).unwrap()
            );
            let second = parser.parse(&rebuilt).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
