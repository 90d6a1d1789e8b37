use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ctx_sys::config::{self, Config};
use ctx_sys::engine::ContextEngine;
use ctx_sys::providers::ollama::OllamaProvider;
use ctx_sys::providers::openai::OpenAiProvider;
use ctx_sys::sqlite_store::SqliteStore;
use ctx_sys::{db, kb, migrate, stats};
use ctx_sys_core::api::QueryContextOptions;
use ctx_sys_core::project::ProjectHandle;
use ctx_sys_core::providers::{Embedder, Generator, Summarizer};
use ctx_sys_core::store::Store;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ctx-sys", about = "Project-scoped context retrieval for AI coding assistants", version)]
struct Cli {
    #[arg(long, global = true, default_value = ".ctx-sys/config.toml")]
    config: PathBuf,

    #[arg(long, global = true, default_value = "default")]
    project: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the project's tables if they don't exist yet
    Init,

    /// Run a context query against the indexed project
    Query {
        query: String,
        #[arg(long)]
        max_tokens: Option<usize>,
        #[arg(long, value_delimiter = ',')]
        strategies: Option<Vec<String>>,
        #[arg(long)]
        expand: bool,
        #[arg(long)]
        decompose: bool,
        #[arg(long)]
        hyde: bool,
    },

    /// Print entity/relationship/vector/session counts for the project
    Stats,

    /// Start the HTTP server (MCP streamable-HTTP at `/mcp`, REST mirror at `/tools`)
    Serve {
        #[arg(long, default_value = "127.0.0.1:8420")]
        bind: String,
    },

    /// Knowledge-base bundle import/export
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },
}

#[derive(Subcommand)]
enum KbAction {
    /// Write a `.ctx-kb` bundle for the project to `path`
    Export { path: PathBuf },
    /// Load a `.ctx-kb` bundle into the project
    Import { path: PathBuf },
}

fn build_embedder(cfg: &Config) -> anyhow::Result<Arc<dyn Embedder>> {
    match cfg.embeddings.provider.as_str() {
        "ollama" => {
            let url = cfg.embeddings.url.clone().unwrap_or_else(|| "http://localhost:11434".to_string());
            let provider = OllamaProvider::new(
                url,
                cfg.embeddings.model.clone(),
                cfg.embeddings.dims,
                cfg.summarization.model.clone(),
                cfg.embeddings.timeout_secs,
                cfg.embeddings.max_retries,
            )?;
            Ok(Arc::new(provider))
        }
        "openai" => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY must be set to use the openai provider"))?;
            let provider = OpenAiProvider::new(
                api_key,
                cfg.embeddings.model.clone(),
                cfg.embeddings.dims,
                cfg.summarization.model.clone(),
                cfg.embeddings.timeout_secs,
                cfg.embeddings.max_retries,
            )?;
            Ok(Arc::new(provider))
        }
        other => anyhow::bail!("unknown embeddings provider: '{other}'"),
    }
}

fn build_generation(cfg: &Config) -> anyhow::Result<(Arc<dyn Summarizer>, Arc<dyn Generator>)> {
    match cfg.summarization.provider.as_str() {
        "ollama" => {
            let url = cfg.summarization.url.clone().unwrap_or_else(|| "http://localhost:11434".to_string());
            let provider = Arc::new(OllamaProvider::new(
                url,
                cfg.embeddings.model.clone(),
                cfg.embeddings.dims,
                cfg.summarization.model.clone(),
                cfg.embeddings.timeout_secs,
                cfg.embeddings.max_retries,
            )?);
            Ok((provider.clone(), provider))
        }
        "openai" => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY must be set to use the openai provider"))?;
            let provider = Arc::new(OpenAiProvider::new(
                api_key,
                cfg.embeddings.model.clone(),
                cfg.embeddings.dims,
                cfg.summarization.model.clone(),
                cfg.embeddings.timeout_secs,
                cfg.embeddings.max_retries,
            )?);
            Ok((provider.clone(), provider))
        }
        other => anyhow::bail!("unknown summarization provider: '{other}'"),
    }
}

async fn build_engine(
    cfg: &Config,
    pool: &sqlx::SqlitePool,
    project: &ProjectHandle,
) -> anyhow::Result<Arc<ContextEngine>> {
    let embedder = build_embedder(cfg)?;
    let (summarizer, generator) = build_generation(cfg)?;
    let store = Arc::new(SqliteStore::new(pool.clone()));
    store.create_project(project, embedder.model_id(), embedder.dims()).await?;
    let weights: HashMap<String, f64> = cfg.retrieval.weights.clone();
    let decision_keywords = cfg.retrieval.decision_keywords.clone();
    Ok(Arc::new(ContextEngine::new(
        store,
        embedder,
        Some(summarizer),
        Some(generator),
        weights,
        decision_keywords,
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let project = ProjectHandle::new(cli.project.clone());

    let pool = db::connect(&cfg).await?;
    migrate::open(&pool).await?;

    match cli.command {
        Commands::Init => {
            let embedder = build_embedder(&cfg)?;
            let store = SqliteStore::new(pool.clone());
            store.create_project(&project, embedder.model_id(), embedder.dims()).await?;
            println!("Project '{}' initialized.", project.id());
        }

        Commands::Query { query, max_tokens, strategies, expand, decompose, hyde } => {
            let engine = build_engine(&cfg, &pool, &project).await?;

            let opts = QueryContextOptions {
                project: project.id().to_string(),
                query,
                max_tokens: max_tokens.unwrap_or(cfg.retrieval.default_max_tokens),
                strategies: strategies.unwrap_or_else(|| cfg.retrieval.strategies.clone()),
                include_types: None,
                include_sources: true,
                min_score: None,
                expand,
                expand_tokens: cfg.retrieval.expand_tokens,
                decompose,
                gate: true,
                hyde,
                format: Default::default(),
            };

            let result = engine.query_context(&project, opts, CancellationToken::new()).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Stats => {
            migrate::create_project_schema(&pool, &project).await?;
            let s = stats::project_stats(&pool, &project).await?;
            println!("{}", serde_json::to_string_pretty(&s)?);
        }

        Commands::Serve { bind } => {
            let engine = build_engine(&cfg, &pool, &project).await?;
            ctx_sys::server::run_server(&bind, engine, project).await?;
        }

        Commands::Kb { action } => match action {
            KbAction::Export { path } => {
                let bundle = kb::export_kb(&pool, &project).await?;
                std::fs::write(&path, bundle)?;
                println!("Wrote {} bytes to {}", std::fs::metadata(&path)?.len(), path.display());
            }
            KbAction::Import { path } => {
                migrate::create_project_schema(&pool, &project).await?;
                let bundle = std::fs::read(&path)?;
                kb::import_kb(&pool, &project, &bundle).await?;
                println!("Imported bundle from {}", path.display());
            }
        },
    }

    Ok(())
}
