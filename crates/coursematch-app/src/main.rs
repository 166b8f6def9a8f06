//! coursematch binary - composition root.
//!
//! 1. Load configuration from TOML and apply CLI overrides
//! 2. Load the course catalog (JSON file or the built-in demo catalog)
//! 3. Build the embedding provider and the retrying embedder
//! 4. Embed the catalog into an index
//! 5. Answer the query from the command line, or read queries from stdin

mod catalog;
mod cli;

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use coursematch_core::config::{CourseMatchConfig, ProviderKind};
use coursematch_core::corpus::CorpusStore;
use coursematch_core::error::{CourseMatchError, EmbeddingError};
use coursematch_core::types::MatchResult;
use coursematch_vector::{
    MockEmbedding, OpenAiProvider, Recommender, RetryPolicy, Session, TextEmbedder,
};

use crate::cli::CliArgs;

fn build_embedder(config: &CourseMatchConfig) -> Result<TextEmbedder, CourseMatchError> {
    let embedder = match config.provider.kind {
        ProviderKind::Openai => TextEmbedder::new(OpenAiProvider::from_config(&config.provider)?),
        ProviderKind::Mock => {
            TextEmbedder::new(MockEmbedding::with_dimensions(config.provider.mock_dimensions))
        }
    };
    Ok(embedder
        .with_retry_policy(RetryPolicy::from_config(&config.retry))
        .with_attempt_timeout(Duration::from_secs(config.provider.timeout_secs)))
}

fn load_corpus(config: &CourseMatchConfig) -> Result<CorpusStore, CourseMatchError> {
    if config.corpus.path.trim().is_empty() {
        tracing::info!("Using built-in course catalog");
        catalog::builtin()
    } else {
        CorpusStore::from_json_file(Path::new(&config.corpus.path))
    }
}

/// Short explanation of a failed query for the person at the terminal.
fn user_message(err: &CourseMatchError) -> String {
    match err {
        CourseMatchError::InvalidQuery(_) => {
            "Please describe what you want to learn.".to_string()
        }
        CourseMatchError::Embedding(EmbeddingError::RetriesExhausted { .. }) => {
            "The embedding service is busy right now. Please try again shortly.".to_string()
        }
        CourseMatchError::Embedding(e) => format!("Could not process the request: {}", e),
        CourseMatchError::NotReady => "The course index is not ready yet.".to_string(),
        other => format!("Unexpected error: {}", other),
    }
}

fn print_results(results: &[MatchResult], json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    for (rank, m) in results.iter().enumerate() {
        let label = if m.metric.higher_is_better() {
            "similarity"
        } else {
            "distance"
        };
        if rank == 0 {
            println!("We recommend: {}", m.course.title);
        } else {
            println!("{}. {}", rank + 1, m.course.title);
        }
        println!("   {}", m.course.text);
        if let Some(link) = m.course.link() {
            println!("   {}", link);
        }
        println!("   {} ({}): {:.4}", label, m.metric, m.score);
    }
    Ok(())
}

async fn answer(
    recommender: &Recommender,
    session: &Session,
    query: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match recommender.recommend_for(session, query).await {
        Ok(results) => print_results(&results, json),
        Err(e) if e.is_recoverable() => {
            tracing::warn!(error = %e, "Query failed");
            eprintln!("{}", user_message(&e));
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn interactive(
    recommender: &Recommender,
    session: &Session,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("What do you want to learn? ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            return Ok(());
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        answer(recommender, session, query, json).await?;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing starts so its log level can apply.
    let config_file = args.resolve_config_path();
    let (mut config, load_error) = match CourseMatchConfig::load(&config_file) {
        Ok(config) => (config, None),
        Err(e) => (CourseMatchConfig::default(), Some(e)),
    };
    args.apply_overrides(&mut config);

    // Tracing goes to stderr so stdout stays clean for results.
    let level = args.resolve_log_level(&config);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    tracing::info!("Starting coursematch v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        None => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
    }
    config.validate()?;

    let corpus = load_corpus(&config)?;
    let embedder = build_embedder(&config)?;
    tracing::info!(provider = embedder.provider_name(), "Embedding provider ready");

    let recommender = Recommender::from_config(embedder, &config.index);
    if let Err(e) = recommender.build(corpus, &config.provider.model).await {
        tracing::error!(error = %e, "Failed to build course index");
        eprintln!("{}", user_message(&e));
        return Err(e.into());
    }

    let session = Session {
        model: Some(config.provider.model.clone()),
        top_k: config.index.default_top_k,
    };

    match args.query_text() {
        Some(query) => answer(&recommender, &session, &query, args.json).await,
        None => interactive(&recommender, &session, args.json).await,
    }
}
