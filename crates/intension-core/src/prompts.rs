//! Prompts for triple classification and rationale revision.
//!
//! Both prompts end with the response labels the parsers look for
//! (`Rationale:` and, for classification, `Answer:`), so the model continues
//! in the same layout.
//!
//! Template fields:
//! - `s`, `p`, `o`: the triple
//! - `graph`: the hypothetical world
//! - `rationale`: the prior rationale (revision only)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::template::{escape_braces, PromptTemplate, TemplateError};
use crate::triple::{PriorRationale, Triple, WorldContext};

pub const FIELD_SUBJECT: &str = "s";
pub const FIELD_PREDICATE: &str = "p";
pub const FIELD_OBJECT: &str = "o";
pub const FIELD_GRAPH: &str = "graph";
pub const FIELD_RATIONALE: &str = "rationale";

/// Input variables of the classification prompt.
pub const CLASSIFICATION_VARIABLES: &[&str] =
    &[FIELD_SUBJECT, FIELD_PREDICATE, FIELD_OBJECT, FIELD_GRAPH];

/// Input variables of the revision prompt.
pub const REVISION_VARIABLES: &[&str] = &[
    FIELD_SUBJECT,
    FIELD_PREDICATE,
    FIELD_OBJECT,
    FIELD_GRAPH,
    FIELD_RATIONALE,
];

/// Instructions of the classification prompt, up to the exemplar separator.
pub const CLASSIFICATION_INSTRUCTIONS: &str = r#"
Determine the truth value of following knowledge graph triple
in a hypothetical world where the following is true:
{graph}

Let's think step by step. Provide a rationale for
your decision, then based on that rationale,
provide an answer of 1 if true, otherwise
provide an answer of 0.
###
"#;

/// Open slot of the classification prompt. The model fills in the labels.
pub const CLASSIFICATION_SLOT: &str = r#"Subject: <{s}>
Predicate: <{p}>
Object: <{o}>
Rationale: {{rationale}}
Answer: {{answer}}
"#;

/// Revision prompt: the triple was judged false and the rationale is wrong.
pub const REVISION_PROMPT: &str = r#"
Consider the following knowledge graph triple:
Subject: <{s}>
Predicate: <{p}>
Object: <{o}>

Given a hypothetical world where the following is true:
{graph}

This triple was assigned an incorrect truth value of false
with the following rationale:
{rationale}

Generate a new rationale explaining why the truth value
of the triple is true.
###
Rationale: {{revision}}
"#;

/// A worked example shown to the model before the open slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub rationale: String,
    /// `"0"` or `"1"`.
    pub answer: String,
}

impl FewShotExample {
    pub fn new(triple: &Triple, rationale: impl Into<String>, truth: bool) -> Self {
        Self {
            subject: triple.subject().to_string(),
            predicate: triple.predicate().to_string(),
            object: triple.object().to_string(),
            rationale: rationale.into(),
            answer: if truth { "1" } else { "0" }.to_string(),
        }
    }

    /// Render in the slot layout, escaped for inclusion in a template.
    fn to_template_text(&self) -> String {
        format!(
            "Subject: <{}>\nPredicate: <{}>\nObject: <{}>\nRationale: {}\nAnswer: {}\n###\n",
            escape_braces(&self.subject),
            escape_braces(&self.predicate),
            escape_braces(&self.object),
            escape_braces(self.rationale.trim()),
            escape_braces(self.answer.trim()),
        )
    }
}

/// Zero-shot classification template.
pub fn classification_template() -> Result<PromptTemplate, TemplateError> {
    few_shot_classification_template(&[])
}

/// Classification template with worked examples before the open slot.
pub fn few_shot_classification_template(
    examples: &[FewShotExample],
) -> Result<PromptTemplate, TemplateError> {
    let mut text = String::from(CLASSIFICATION_INSTRUCTIONS);
    for example in examples {
        text.push_str(&example.to_template_text());
    }
    text.push_str(CLASSIFICATION_SLOT);
    PromptTemplate::new(text, CLASSIFICATION_VARIABLES)
}

/// Rationale revision template.
pub fn revision_template() -> Result<PromptTemplate, TemplateError> {
    PromptTemplate::new(REVISION_PROMPT, REVISION_VARIABLES)
}

/// Field mapping for the classification prompt.
pub fn classification_fields<'a>(
    triple: &'a Triple,
    graph: &'a WorldContext,
) -> BTreeMap<&'static str, &'a str> {
    BTreeMap::from([
        (FIELD_SUBJECT, triple.subject()),
        (FIELD_PREDICATE, triple.predicate()),
        (FIELD_OBJECT, triple.object()),
        (FIELD_GRAPH, graph.as_str()),
    ])
}

/// Field mapping for the revision prompt.
pub fn revision_fields<'a>(
    triple: &'a Triple,
    graph: &'a WorldContext,
    prior: &'a PriorRationale,
) -> BTreeMap<&'static str, &'a str> {
    let mut fields = classification_fields(triple, graph);
    fields.insert(FIELD_RATIONALE, prior.as_str());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn example_triple() -> Triple {
        Triple::new("ex:A", "ex:B", "ex:C")
    }

    #[test]
    fn test_classification_prompt_contains_triple_and_labels() {
        let triple = example_triple();
        let graph = WorldContext::new("ex:A ex:B ex:C .");
        let prompt = classification_template()
            .unwrap()
            .render(&classification_fields(&triple, &graph))
            .unwrap();

        assert!(prompt.contains("ex:A"));
        assert!(prompt.contains("ex:B"));
        assert!(prompt.contains("ex:C"));
        assert!(prompt.contains("ex:A ex:B ex:C ."));
        assert!(prompt.contains("Rationale:"));
        assert!(prompt.contains("Answer:"));
        assert!(prompt.contains("Subject: <ex:A>"));
        assert!(prompt.trim_end().ends_with("Answer: {answer}"));
    }

    #[test]
    fn test_revision_prompt_frames_prior_rationale() {
        let triple = example_triple();
        let graph = WorldContext::new("ex:A ex:B ex:C .");
        let prior = PriorRationale::new("There is no evidence for it.");
        let prompt = revision_template()
            .unwrap()
            .render(&revision_fields(&triple, &graph, &prior))
            .unwrap();

        assert!(prompt.contains("incorrect truth value of false"));
        assert!(prompt.contains("There is no evidence for it."));
        assert!(prompt.trim_end().ends_with("Rationale: {revision}"));
        assert!(!prompt.contains("Answer:"));
    }

    #[test]
    fn test_revision_requires_prior_rationale() {
        let triple = example_triple();
        let graph = WorldContext::new("g");
        let err = revision_template()
            .unwrap()
            .render(&classification_fields(&triple, &graph))
            .unwrap_err();
        assert_eq!(err, TemplateError::MissingField("rationale".to_string()));
    }

    #[test]
    fn test_few_shot_examples_precede_open_slot() {
        let examples = vec![
            FewShotExample::new(
                &Triple::new("owl:Nothing", "rdfs:subClassOf", "vrd:Thing"),
                "The empty class is a subclass of every class.",
                true,
            ),
            FewShotExample::new(
                &Triple::new("vrd:Person", "rdfs:subClassOf", "vrd:Vehicle"),
                "Persons are not vehicles.",
                false,
            ),
        ];
        let triple = example_triple();
        let graph = WorldContext::new("g");
        let prompt = few_shot_classification_template(&examples)
            .unwrap()
            .render(&classification_fields(&triple, &graph))
            .unwrap();

        let first = prompt.find("Subject: <owl:Nothing>").unwrap();
        let second = prompt.find("Subject: <vrd:Person>").unwrap();
        let slot = prompt.find("Subject: <ex:A>").unwrap();
        assert!(first < second && second < slot);
        assert!(prompt.contains("Persons are not vehicles.\nAnswer: 0\n###\n"));
    }

    #[test]
    fn test_few_shot_example_braces_survive() {
        let examples = vec![FewShotExample::new(
            &example_triple(),
            "The set {a, b} is closed.",
            true,
        )];
        let triple = example_triple();
        let graph = WorldContext::new("g");
        let prompt = few_shot_classification_template(&examples)
            .unwrap()
            .render(&classification_fields(&triple, &graph))
            .unwrap();
        assert!(prompt.contains("The set {a, b} is closed."));
    }

    proptest! {
        #[test]
        fn prop_classification_prompt_contains_inputs_verbatim(
            s in "[a-z]{1,8}:[A-Za-z]{1,12}",
            p in "[a-z]{1,8}:[A-Za-z]{1,12}",
            o in "[a-z]{1,8}:[A-Za-z]{1,12}",
            graph in "\\PC{1,80}",
        ) {
            let triple = Triple::new(s.clone(), p.clone(), o.clone());
            let context = WorldContext::new(graph.clone());
            let prompt = classification_template()
                .unwrap()
                .render(&classification_fields(&triple, &context))
                .unwrap();
            for term in [&s, &p, &o] {
                let bracketed = format!("<{}>", term);
                prop_assert!(prompt.contains(&bracketed));
            }
            prop_assert!(prompt.contains(&graph));
        }
    }
}
