//! Named-placeholder prompt templates.
//!
//! Syntax:
//! - `{name}` is replaced by the value of field `name`
//! - `{{` and `}}` produce literal braces
//!
//! Field values are inserted verbatim. They are never escaped and never
//! re-scanned for placeholders, so a value containing `{x}` comes out as
//! `{x}`.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from template construction and rendering.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Missing template field: {0}")]
    MissingField(String),

    #[error("Placeholder '{0}' is not a declared input variable")]
    UnknownPlaceholder(String),

    #[error("Malformed template at byte {position}: {reason}")]
    Malformed { position: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A parsed prompt template with a fixed set of input variables.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
    input_variables: Vec<String>,
}

impl PromptTemplate {
    /// Parse `template` and check every placeholder against `input_variables`.
    pub fn new(
        template: impl Into<String>,
        input_variables: &[&str],
    ) -> Result<Self, TemplateError> {
        let source = template.into();
        let segments = parse_segments(&source)?;

        for segment in &segments {
            if let Segment::Field(name) = segment {
                if !input_variables.contains(&name.as_str()) {
                    return Err(TemplateError::UnknownPlaceholder(name.clone()));
                }
            }
        }

        Ok(Self {
            source,
            segments,
            input_variables: input_variables.iter().map(|v| v.to_string()).collect(),
        })
    }

    /// Declared input variables, in declaration order.
    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    /// The unrendered template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render the template.
    ///
    /// Every declared input variable must be present in `fields`; the first
    /// absent one (in declaration order) is reported. Extra fields are ignored.
    pub fn render<K, V>(&self, fields: &BTreeMap<K, V>) -> Result<String, TemplateError>
    where
        K: Borrow<str> + Ord,
        V: AsRef<str>,
    {
        if let Some(missing) = self
            .input_variables
            .iter()
            .find(|name| !fields.contains_key(name.as_str()))
        {
            return Err(TemplateError::MissingField(missing.clone()));
        }

        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => {
                    let value = fields
                        .get(name.as_str())
                        .ok_or_else(|| TemplateError::MissingField(name.clone()))?;
                    out.push_str(value.as_ref());
                }
            }
        }

        tracing::trace!(length = out.len(), "Rendered prompt template");
        Ok(out)
    }
}

/// Escape literal text so it survives as-is inside a template.
pub fn escape_braces(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

fn parse_segments(template: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    literal.push('{');
                    continue;
                }

                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, ch)) if ch.is_alphanumeric() || ch == '_' => name.push(ch),
                        Some((_, ch)) => {
                            return Err(TemplateError::Malformed {
                                position,
                                reason: format!("invalid character '{}' in placeholder", ch),
                            })
                        }
                        None => {
                            return Err(TemplateError::Malformed {
                                position,
                                reason: "unclosed '{'".to_string(),
                            })
                        }
                    }
                }

                if name.is_empty() {
                    return Err(TemplateError::Malformed {
                        position,
                        reason: "empty placeholder".to_string(),
                    });
                }

                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Field(name));
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    literal.push('}');
                } else {
                    return Err(TemplateError::Malformed {
                        position,
                        reason: "single '}' outside a placeholder".to_string(),
                    });
                }
            }
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fields<'a>(pairs: &[(&'a str, &'a str)]) -> BTreeMap<&'a str, &'a str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_render_substitutes_fields() {
        let template = PromptTemplate::new("Subject: <{s}> in {graph}", &["s", "graph"]).unwrap();
        let rendered = template
            .render(&fields(&[("s", "ex:A"), ("graph", "world")]))
            .unwrap();
        assert_eq!(rendered, "Subject: <ex:A> in world");
    }

    #[test]
    fn test_double_braces_are_literal() {
        let template = PromptTemplate::new("Rationale: {{rationale}}", &[]).unwrap();
        let rendered = template.render(&BTreeMap::<&str, &str>::new()).unwrap();
        assert_eq!(rendered, "Rationale: {rationale}");
    }

    #[test]
    fn test_missing_field_is_reported() {
        let template = PromptTemplate::new("{s} {p} {o}", &["s", "p", "o"]).unwrap();
        let err = template
            .render(&fields(&[("s", "ex:A"), ("o", "ex:C")]))
            .unwrap_err();
        assert_eq!(err, TemplateError::MissingField("p".to_string()));
    }

    #[test]
    fn test_declared_but_unused_field_still_required() {
        let template = PromptTemplate::new("no placeholders", &["graph"]).unwrap();
        let err = template.render(&BTreeMap::<&str, &str>::new()).unwrap_err();
        assert_eq!(err, TemplateError::MissingField("graph".to_string()));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let template = PromptTemplate::new("{s}", &["s"]).unwrap();
        let rendered = template
            .render(&fields(&[("s", "x"), ("unused", "y")]))
            .unwrap();
        assert_eq!(rendered, "x");
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let err = PromptTemplate::new("{s} {q}", &["s"]).unwrap_err();
        assert_eq!(err, TemplateError::UnknownPlaceholder("q".to_string()));
    }

    #[test]
    fn test_malformed_templates_rejected() {
        assert!(matches!(
            PromptTemplate::new("open {s", &["s"]),
            Err(TemplateError::Malformed { .. })
        ));
        assert!(matches!(
            PromptTemplate::new("stray } brace", &[]),
            Err(TemplateError::Malformed { .. })
        ));
        assert!(matches!(
            PromptTemplate::new("empty {}", &[]),
            Err(TemplateError::Malformed { .. })
        ));
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let template = PromptTemplate::new("{s}|{p}", &["s", "p"]).unwrap();
        let rendered = template
            .render(&fields(&[("s", "{p}"), ("p", "Answer: {{x}}")]))
            .unwrap();
        assert_eq!(rendered, "{p}|Answer: {{x}}");
    }

    #[test]
    fn test_escape_braces_round_trip() {
        let text = "set {a, b} and }{";
        let template = PromptTemplate::new(escape_braces(text), &[]).unwrap();
        assert_eq!(template.render(&BTreeMap::<&str, &str>::new()).unwrap(), text);
    }

    proptest! {
        #[test]
        fn prop_rendered_output_contains_values_verbatim(
            s in ".{1,40}",
            p in ".{1,40}",
            o in ".{1,40}",
        ) {
            let template = PromptTemplate::new("S=<{s}> P=<{p}> O=<{o}>", &["s", "p", "o"]).unwrap();
            let rendered = template.render(&fields(&[("s", s.as_str()), ("p", p.as_str()), ("o", o.as_str())])).unwrap();
            prop_assert!(rendered.contains(&s));
            prop_assert!(rendered.contains(&p));
            prop_assert!(rendered.contains(&o));
            prop_assert_eq!(rendered, format!("S=<{}> P=<{}> O=<{}>", s, p, o));
        }
    }
}
