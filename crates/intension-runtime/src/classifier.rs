//! Classifier façades: render a prompt, call the model, parse the reply.
//!
//! - [`TripleClassifier`] asks whether a triple holds in a given world and
//!   returns a rationale plus a `0`/`1` answer.
//! - [`RationaleReviser`] takes a triple known to be true and a rationale
//!   that wrongly judged it false, and asks for a replacement rationale.
//!
//! Both hold only immutable configuration and a shared provider handle, so a
//! single instance can serve many calls.

use intension_core::{
    prompts, ClassificationResult, FewShotExample, OutputParser, ParsedOutput, PriorRationale,
    PromptTemplate, RevisionResult, Triple, WorldContext,
};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::ClassifierConfig;
use crate::error::ClassifierError;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider};
use crate::resolver::{BackendFamily, ResolvedBackend, Resolver};

/// Template, model call and parser composed into one operation.
#[derive(Clone)]
pub struct PromptChain {
    template: PromptTemplate,
    parser: OutputParser,
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
}

impl PromptChain {
    pub fn new(
        template: PromptTemplate,
        parser: OutputParser,
        provider: Arc<dyn LlmProvider>,
        completion: CompletionConfig,
    ) -> Self {
        Self {
            template,
            parser,
            provider,
            completion,
        }
    }

    /// Render the prompt for `fields`.
    pub fn render<K, V>(&self, fields: &BTreeMap<K, V>) -> Result<String, ClassifierError>
    where
        K: Borrow<str> + Ord,
        V: AsRef<str>,
    {
        Ok(self.template.render(fields)?)
    }

    /// Render, call and parse.
    ///
    /// Render and transport failures are errors; a reply that does not match
    /// the parser's pattern comes back as an unmatched [`ParsedOutput`].
    pub async fn run<K, V>(&self, fields: &BTreeMap<K, V>) -> Result<ParsedOutput, ClassifierError>
    where
        K: Borrow<str> + Ord,
        V: AsRef<str>,
    {
        let prompt = self.render(fields)?;

        tracing::debug!(
            provider = self.provider.name(),
            model = %self.completion.model,
            prompt_len = prompt.len(),
            estimated_tokens = self.provider.estimate_tokens(&prompt),
            "Sending prompt"
        );

        let response = self
            .provider
            .complete(vec![ChatMessage::user(prompt)], &self.completion)
            .await?;

        tracing::info!(
            provider = self.provider.name(),
            model = %response.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            stop_reason = ?response.stop_reason,
            "Completion received"
        );

        let parsed = match self.parser.parse(&response.content) {
            Ok(parsed) => parsed,
            Err(e) => {
                // Only reachable for parsers built without a fallback key
                tracing::warn!(error = %e, "Completion could not be parsed");
                let key = self
                    .parser
                    .output_keys()
                    .first()
                    .map(String::as_str)
                    .unwrap_or(intension_core::parser::KEY_RATIONALE);
                ParsedOutput::degraded(key, &response.content)
            }
        };

        Ok(parsed)
    }

    pub fn completion_config(&self) -> &CompletionConfig {
        &self.completion
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }
}

impl std::fmt::Debug for PromptChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptChain")
            .field("provider", &self.provider.name())
            .field("completion", &self.completion)
            .field("input_variables", &self.template.input_variables())
            .finish()
    }
}

/// Resolve the configured model, applying the config's per-call overrides.
fn resolve(config: &ClassifierConfig, resolver: &Resolver) -> Result<ResolvedBackend, ClassifierError> {
    config.validate()?;
    let mut backend = resolver.describe(&config.model, config.temperature)?;
    if config.max_tokens.is_some() {
        backend.max_tokens = config.max_tokens;
    }
    if let Some(url) = &config.base_url {
        backend.base_url = Some(url.clone());
    }
    resolver.build(backend)
}

/// Per-request settings for a caller-supplied provider.
///
/// Models on an allow-list keep their family's fixed timeout.
fn completion_for(config: &ClassifierConfig) -> Result<CompletionConfig, ClassifierError> {
    config.validate()?;
    Ok(CompletionConfig {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        timeout: BackendFamily::for_model(&config.model).and_then(BackendFamily::timeout),
    })
}

/// Judges whether a triple is true in a hypothetical world.
#[derive(Debug, Clone)]
pub struct TripleClassifier {
    chain: PromptChain,
}

impl TripleClassifier {
    /// Build a zero-shot classifier, resolving the model through `resolver`.
    pub fn new(config: &ClassifierConfig, resolver: &Resolver) -> Result<Self, ClassifierError> {
        Self::with_examples(config, resolver, &[])
    }

    /// Build a few-shot classifier.
    pub fn with_examples(
        config: &ClassifierConfig,
        resolver: &Resolver,
        examples: &[FewShotExample],
    ) -> Result<Self, ClassifierError> {
        let backend = resolve(config, resolver)?;
        Self::from_parts(backend.provider, backend.completion, examples)
    }

    /// Build a classifier over an existing provider, skipping resolution.
    pub fn with_provider(
        provider: Arc<dyn LlmProvider>,
        config: &ClassifierConfig,
    ) -> Result<Self, ClassifierError> {
        Self::from_parts(provider, completion_for(config)?, &[])
    }

    fn from_parts(
        provider: Arc<dyn LlmProvider>,
        completion: CompletionConfig,
        examples: &[FewShotExample],
    ) -> Result<Self, ClassifierError> {
        let template = prompts::few_shot_classification_template(examples)?;
        Ok(Self {
            chain: PromptChain::new(template, OutputParser::classification(), provider, completion),
        })
    }

    /// The prompt that [`classify`](Self::classify) would send.
    pub fn prompt(&self, triple: &Triple, graph: &WorldContext) -> Result<String, ClassifierError> {
        self.chain.render(&prompts::classification_fields(triple, graph))
    }

    /// Classify `triple` against `graph`.
    ///
    /// Check [`ClassificationResult::matched`] before trusting the answer.
    pub async fn classify(
        &self,
        triple: &Triple,
        graph: &WorldContext,
    ) -> Result<ClassificationResult, ClassifierError> {
        let parsed = self
            .chain
            .run(&prompts::classification_fields(triple, graph))
            .await?;
        Ok(ClassificationResult::from(parsed))
    }

    pub fn chain(&self) -> &PromptChain {
        &self.chain
    }
}

/// Regenerates a rationale for a triple that was wrongly judged false.
#[derive(Debug, Clone)]
pub struct RationaleReviser {
    chain: PromptChain,
}

impl RationaleReviser {
    /// Build a reviser, resolving the model through `resolver`.
    pub fn new(config: &ClassifierConfig, resolver: &Resolver) -> Result<Self, ClassifierError> {
        let backend = resolve(config, resolver)?;
        Self::from_parts(backend.provider, backend.completion)
    }

    /// Build a reviser over an existing provider, skipping resolution.
    pub fn with_provider(
        provider: Arc<dyn LlmProvider>,
        config: &ClassifierConfig,
    ) -> Result<Self, ClassifierError> {
        Self::from_parts(provider, completion_for(config)?)
    }

    fn from_parts(
        provider: Arc<dyn LlmProvider>,
        completion: CompletionConfig,
    ) -> Result<Self, ClassifierError> {
        let template = prompts::revision_template()?;
        Ok(Self {
            chain: PromptChain::new(template, OutputParser::revision(), provider, completion),
        })
    }

    /// The prompt that [`revise`](Self::revise) would send.
    pub fn prompt(
        &self,
        triple: &Triple,
        graph: &WorldContext,
        prior: &PriorRationale,
    ) -> Result<String, ClassifierError> {
        self.chain
            .render(&prompts::revision_fields(triple, graph, prior))
    }

    /// Produce a replacement rationale explaining why `triple` is true.
    pub async fn revise(
        &self,
        triple: &Triple,
        graph: &WorldContext,
        prior: &PriorRationale,
    ) -> Result<RevisionResult, ClassifierError> {
        let parsed = self
            .chain
            .run(&prompts::revision_fields(triple, graph, prior))
            .await?;
        Ok(RevisionResult::from(parsed))
    }

    pub fn chain(&self) -> &PromptChain {
        &self.chain
    }
}
