//! Typed views over parsed completions.

use serde::{Deserialize, Serialize};

use crate::parser::{OutputParser, ParsedOutput, KEY_ANSWER, KEY_RATIONALE, KEY_REVISION};

/// Outcome of classifying a triple.
///
/// `answer` is the raw `"0"`/`"1"` string the model produced. It is `None`
/// when the completion did not match the expected labels; in that case
/// `rationale` holds the whole completion and `matched` is false. Check
/// `matched` before trusting the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub rationale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub matched: bool,
}

impl ClassificationResult {
    /// Parse a raw classification completion. Never fails.
    pub fn parse(completion: &str) -> Self {
        let parsed = OutputParser::classification()
            .parse(completion)
            .unwrap_or_else(|_| ParsedOutput::degraded(KEY_RATIONALE, completion));
        Self::from(parsed)
    }

    /// Interpret the answer: `Some(true)` for `"1"`, `Some(false)` for `"0"`.
    pub fn truth_value(&self) -> Option<bool> {
        match self.answer.as_deref() {
            Some("1") => Some(true),
            Some("0") => Some(false),
            _ => None,
        }
    }
}

impl From<ParsedOutput> for ClassificationResult {
    fn from(mut parsed: ParsedOutput) -> Self {
        Self {
            rationale: parsed.fields.remove(KEY_RATIONALE).unwrap_or_default(),
            answer: parsed.fields.remove(KEY_ANSWER),
            matched: parsed.matched,
        }
    }
}

/// Outcome of revising a rationale for a triple known to be true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionResult {
    pub revision: String,
    pub matched: bool,
}

impl RevisionResult {
    /// Parse a raw revision completion. Never fails.
    pub fn parse(completion: &str) -> Self {
        let parsed = OutputParser::revision()
            .parse(completion)
            .unwrap_or_else(|_| ParsedOutput::degraded(KEY_REVISION, completion));
        Self::from(parsed)
    }
}

impl From<ParsedOutput> for RevisionResult {
    fn from(mut parsed: ParsedOutput) -> Self {
        Self {
            revision: parsed.fields.remove(KEY_REVISION).unwrap_or_default(),
            matched: parsed.matched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_truth_value() {
        let result = ClassificationResult::parse("Rationale: Holds. Answer: 1");
        assert_eq!(result.truth_value(), Some(true));

        let result = ClassificationResult::parse("Rationale: Fails. Answer: 0");
        assert_eq!(result.truth_value(), Some(false));
        assert_eq!(result.rationale, "Fails.");
    }

    #[test]
    fn test_degraded_classification_has_no_answer() {
        let completion = "I would say yes.";
        let result = ClassificationResult::parse(completion);
        assert!(!result.matched);
        assert_eq!(result.answer, None);
        assert_eq!(result.truth_value(), None);
        assert_eq!(result.rationale, completion);
    }

    #[test]
    fn test_degraded_result_omits_answer_in_json() {
        let result = ClassificationResult::parse("no labels");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["rationale"], "no labels");
        assert_eq!(json["matched"], false);
        assert!(json.get("answer").is_none());
    }

    #[test]
    fn test_revision_parse() {
        let result = RevisionResult::parse("Rationale: Persons can pull things.");
        assert!(result.matched);
        assert_eq!(result.revision, "Persons can pull things.");
    }
}
