//! `echoes`: generate, store and query how a concept's meaning drifts across eras.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use echoes_embeddings::{EmbeddingProvider, EmbeddingRequest};
use echoes_etymology::{EvolutionGenerator, EvolutionResult};
use echoes_retrieval::{
    CorpusBuilder, EchoesConfig, EmbeddingStoreWriter, EraLookup, EraStore, EvolutionPipeline,
    TimelineBuilder,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "echoes", version, about = "Track how a word's meaning shifts across eras")]
struct Cli {
    /// Root of the `<concept>/<era>.json` tree (overrides EMBEDDINGS_DIR)
    #[arg(long, global = true)]
    embeddings_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask the language model for example sentences per era
    Generate {
        #[arg(long)]
        word: String,

        /// Comma-separated era labels, e.g. 1900s,1960s,2020s
        #[arg(long, value_delimiter = ',', required = true)]
        eras: Vec<String>,

        #[arg(long)]
        num_examples: Option<usize>,
    },

    /// Generate examples, embed them and store one record per era
    Build {
        #[arg(long)]
        word: String,

        #[arg(long, value_delimiter = ',', required = true)]
        eras: Vec<String>,

        #[arg(long)]
        num_examples: Option<usize>,
    },

    /// Embed `<data-dir>/<era>_<concept>.csv` files and store them
    BuildCorpus {
        #[arg(long)]
        concept: String,

        #[arg(long, value_delimiter = ',', required = true)]
        eras: Vec<String>,

        /// Corpus directory (overrides DATA_DIR)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Show top examples and drift for every stored era of a concept
    Timeline {
        #[arg(long)]
        concept: String,

        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Show top examples for one era
    Era {
        #[arg(long)]
        concept: String,

        #[arg(long)]
        era: String,

        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Print the embedding of a piece of text
    Embed {
        #[arg(long)]
        text: String,
    },
}

impl Command {
    fn needs_llm(&self) -> bool {
        matches!(self, Command::Generate { .. } | Command::Build { .. })
    }
}

#[derive(Serialize)]
struct GenerateOutput<'a> {
    word: &'a str,
    eras: &'a [String],
    evolution: EvolutionResult,
    total_examples: usize,
    model: &'a str,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging();

    let mut config = EchoesConfig::from_env(cli.command.needs_llm())
        .context("failed to load configuration")?;
    if let Some(dir) = cli.embeddings_dir {
        config.embeddings_dir = dir;
    }

    run(cli.command, config).await
}

fn init_logging() {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the JSON results
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .init();
}

async fn run(command: Command, config: EchoesConfig) -> Result<()> {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(config.embedding.provider());
    let store = EraStore::new(&config.embeddings_dir);

    match command {
        Command::Generate {
            word,
            eras,
            num_examples,
        } => {
            let generator = EvolutionGenerator::from_config(&config.etymology)?;
            let num_examples = num_examples.unwrap_or(config.etymology.default_examples_per_era);
            let evolution = generator.generate(&word, &eras, num_examples).await?;
            print_json(&GenerateOutput {
                word: &word,
                eras: &eras,
                total_examples: evolution.values().map(Vec::len).sum(),
                evolution,
                model: generator.model(),
            })
        }
        Command::Build {
            word,
            eras,
            num_examples,
        } => {
            let generator = Arc::new(EvolutionGenerator::from_config(&config.etymology)?);
            let writer = EmbeddingStoreWriter::new(provider, store);
            let num_examples = num_examples.unwrap_or(config.etymology.default_examples_per_era);
            let report = EvolutionPipeline::new(generator, writer)
                .build(&word, &eras, num_examples)
                .await?;
            info!("{}", report.message());
            print_json(&report)
        }
        Command::BuildCorpus {
            concept,
            eras,
            data_dir,
        } => {
            let writer = EmbeddingStoreWriter::new(provider, store);
            let data_dir = data_dir.unwrap_or(config.data_dir);
            let report = CorpusBuilder::new(data_dir, writer).build(&concept, &eras).await?;
            info!("{}", report.message());
            print_json(&report)
        }
        Command::Timeline { concept, top_n } => {
            let top_n = config.top_n(top_n)?;
            let timeline = TimelineBuilder::new(store, provider)
                .query_timeline(&concept, top_n)
                .await?;
            print_json(&timeline)?;
            if timeline.error.is_some() {
                bail!("Concept '{concept}' not found. Build embeddings for it first.");
            }
            Ok(())
        }
        Command::Era {
            concept,
            era,
            top_n,
        } => {
            let top_n = config.era_top_n(top_n)?;
            let lookup = TimelineBuilder::new(store, provider)
                .query_era_view(&concept, &era, top_n)
                .await?;
            match lookup {
                EraLookup::Found(view) => print_json(&view),
                other => {
                    print_json(&other)?;
                    bail!("Era '{era}' not available for concept '{concept}'");
                }
            }
        }
        Command::Embed { text } => {
            let response = provider.embed(EmbeddingRequest::new(text)).await?;
            print_json(&response)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
