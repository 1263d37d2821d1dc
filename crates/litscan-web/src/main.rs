//! litscan web server and batch runner
//!
//! Run with: cargo run -p litscan-web -- [serve | run --topic ...]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use litscan_config::Config;
use litscan_ingestion::sources::pubmed::PubMedClient;
use litscan_llm::{build_backend, EnrichmentClient};
use litscan_tasks::{Orchestrator, OrchestratorSettings, TaskParams};
use litscan_web::{batch::run_once, router::build_router, state::AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "litscan")]
#[command(about = "PubMed literature scan with LLM summaries and review")]
#[command(version)]
struct Cli {
    /// Config file path (overrides LITSCAN_CONFIG and ./litscan.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server (the default)
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:5000
        #[arg(long, env = "LITSCAN_BIND")]
        bind: Option<String>,
    },

    /// Run one search to completion and write its report files
    Run {
        /// Research topic in free text
        #[arg(short, long)]
        topic: String,
        /// First publication date, YYYY/MM/DD
        #[arg(long)]
        start: Option<String>,
        /// Last publication date, YYYY/MM/DD (default: today)
        #[arg(long)]
        end: Option<String>,
        /// Maximum number of PubMed records to fetch
        #[arg(long)]
        max_results: Option<usize>,
        /// Concurrent summary requests
        #[arg(short, long)]
        workers: Option<usize>,
        /// Keep articles from every venue
        #[arg(long)]
        no_filter: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("litscan=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load_from(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve { bind: None }) {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            serve(config).await
        }
        Commands::Run { topic, start, end, max_results, workers, no_filter } => {
            let params = TaskParams {
                start_date: start,
                end_date: end,
                max_results,
                max_workers: workers,
                filter_venues: !no_filter,
                ..TaskParams::new(topic)
            };
            run(config, params).await
        }
    }
}

async fn build_orchestrator(config: &Config) -> anyhow::Result<Arc<Orchestrator>> {
    let backend = build_backend(&config.llm)?;
    if !backend.is_local() && config.llm.api_key.is_none() {
        warn!("No LLM API key configured; set llm.api_key or LITSCAN_LLM_API_KEY");
    }
    info!(model = %backend.model_id(), "LLM backend ready");
    let enrichment = EnrichmentClient::from_config(backend, config);
    let source = Arc::new(PubMedClient::new(&config.pubmed)?);

    tokio::fs::create_dir_all(&config.output.dir).await?;

    Ok(Arc::new(Orchestrator::new(
        source,
        enrichment,
        OrchestratorSettings::from_config(config),
    )))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("Starting litscan...");
    let orchestrator = build_orchestrator(&config).await?;
    let reaper = orchestrator.registry().spawn_reaper(
        Duration::from_secs(config.tasks.reap_interval_secs.max(1)),
        Duration::from_secs(config.tasks.ttl_secs),
    );

    let app = build_router(AppState::new(orchestrator, &config));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reaper.abort();
    info!("Server stopped");
    Ok(())
}

async fn run(config: Config, params: TaskParams) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(&config).await?;
    let results = run_once(&orchestrator, params, shutdown_signal()).await?;

    println!("Articles: {}", results.results.len());
    if !results.polished_topic.is_empty() {
        println!("Title:    {}", results.polished_topic);
    }
    if let Some(files) = results.files {
        let dir = PathBuf::from(&config.output.dir);
        for name in files.names() {
            println!("Wrote    {}", dir.join(name).display());
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
