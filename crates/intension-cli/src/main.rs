use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use intension_core::{FewShotExample, PriorRationale, Triple, WorldContext};
use intension_runtime::{
    BackendFamily, ClassifierConfig, RationaleReviser, Resolver, TripleClassifier,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "intension",
    version,
    about = "Classify knowledge-graph triples with an LLM",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Judge whether a triple is true in a hypothetical world
    Classify {
        #[command(flatten)]
        input: TripleArgs,
        #[command(flatten)]
        model: ModelArgs,
        /// Worked examples (YAML, or JSON by .json extension)
        #[arg(long)]
        examples: Option<PathBuf>,
    },
    /// Rewrite a rationale that wrongly judged a true triple false
    Revise {
        #[command(flatten)]
        input: TripleArgs,
        #[command(flatten)]
        model: ModelArgs,
        #[arg(long, conflicts_with = "rationale_file", required_unless_present = "rationale_file")]
        rationale: Option<String>,
        #[arg(long)]
        rationale_file: Option<PathBuf>,
    },
    /// List supported models per backend family
    Models,
}

#[derive(Args)]
struct TripleArgs {
    #[arg(long)]
    subject: String,
    #[arg(long)]
    predicate: String,
    #[arg(long)]
    object: String,
    /// Description of the hypothetical world
    #[arg(long, conflicts_with = "graph_file", required_unless_present = "graph_file")]
    graph: Option<String>,
    #[arg(long)]
    graph_file: Option<PathBuf>,
}

#[derive(Args)]
struct ModelArgs {
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    temperature: Option<f32>,
    #[arg(long)]
    max_tokens: Option<u32>,
    #[arg(long)]
    base_url: Option<String>,
    /// YAML file with model settings; flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Contents of a `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    base_url: Option<String>,
    examples: Option<PathBuf>,
}

#[derive(Serialize)]
struct Output<'a, R: Serialize> {
    model: &'a str,
    triple: &'a Triple,
    #[serde(flatten)]
    result: R,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_text(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {} from {}", what, path.display()))
}

fn load_file_config(path: Option<&Path>) -> Result<FileConfig> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let raw = read_text(path, "config")?;
    serde_yaml::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
}

fn load_examples(path: &Path) -> Result<Vec<FewShotExample>> {
    let raw = read_text(path, "examples")?;
    let examples = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid examples file {}", path.display()))?
    } else {
        serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid examples file {}", path.display()))?
    };
    Ok(examples)
}

/// Merge flags over the config file over the defaults.
fn classifier_config(args: &ModelArgs, file: &FileConfig) -> ClassifierConfig {
    let mut config = ClassifierConfig::default();
    if let Some(model) = args.model.as_ref().or(file.model.as_ref()) {
        config.model = model.clone();
    }
    if let Some(temperature) = args.temperature.or(file.temperature) {
        config.temperature = temperature;
    }
    if let Some(max_tokens) = args.max_tokens.or(file.max_tokens) {
        config.max_tokens = Some(max_tokens);
    }
    config.base_url = args.base_url.clone().or_else(|| file.base_url.clone());
    config
}

fn read_input(input: &TripleArgs) -> Result<(Triple, WorldContext)> {
    let triple = Triple::new(&input.subject, &input.predicate, &input.object);
    let graph = match (&input.graph, &input.graph_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => read_text(path, "graph")?,
        (None, None) => anyhow::bail!("one of --graph or --graph-file is required"),
    };
    Ok((triple, WorldContext::new(graph)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Classify {
            input,
            model,
            examples,
        } => {
            let file = load_file_config(model.config.as_deref())?;
            let config = classifier_config(&model, &file);
            let examples = match examples.or(file.examples) {
                Some(path) => load_examples(&path)?,
                None => Vec::new(),
            };
            let (triple, graph) = read_input(&input)?;

            let classifier =
                TripleClassifier::with_examples(&config, &Resolver::from_env(), &examples)?;
            let result = classifier.classify(&triple, &graph).await?;
            info!(triple = %triple, matched = result.matched, answer = ?result.answer, "Classified");

            print_json(&Output {
                model: &config.model,
                triple: &triple,
                result,
            })?;
        }
        Commands::Revise {
            input,
            model,
            rationale,
            rationale_file,
        } => {
            let file = load_file_config(model.config.as_deref())?;
            let config = classifier_config(&model, &file);
            let (triple, graph) = read_input(&input)?;
            let prior = match (rationale, rationale_file) {
                (Some(text), _) => text,
                (None, Some(path)) => read_text(&path, "rationale")?,
                (None, None) => anyhow::bail!("one of --rationale or --rationale-file is required"),
            };

            let reviser = RationaleReviser::new(&config, &Resolver::from_env())?;
            let result = reviser
                .revise(&triple, &graph, &PriorRationale::new(prior))
                .await?;
            info!(triple = %triple, matched = result.matched, "Revised rationale");

            print_json(&Output {
                model: &config.model,
                triple: &triple,
                result,
            })?;
        }
        Commands::Models => {
            let models: BTreeMap<&str, &[&str]> = BackendFamily::ALL
                .into_iter()
                .map(|family| (family.as_str(), family.supported_models()))
                .collect();
            print_json(&models)?;
        }
    }

    Ok(())
}
