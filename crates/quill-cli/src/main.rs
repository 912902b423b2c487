//! quill – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables, then CLI flags.
//! 2. Initialise tracing (JSON when `QUILL_LOG_JSON` is set).
//! 3. Open the task store and build the orchestrator.
//! 4. Recover tasks left behind by a previous run.
//! 5. `serve`: run the HTTP API until Ctrl-C / SIGTERM.
//!    `run`: submit one report, wait for it and print the snapshot.

mod config;
mod error;
mod routes;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use quill_core::domain::ReportDocument;
use quill_core::impls::{OpenAiGateway, ScriptedGateway, SqliteTaskStore, TtlResultCache};
use quill_core::ports::{GenerationGateway, TaskStore};
use quill_core::{AppBuilder, Orchestrator};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "quill", version, about = "Asynchronous LLM report service")]
struct Cli {
    /// SQLite database file (`:memory:` for a throwaway store)
    #[arg(long, global = true, env = "QUILL_DATABASE")]
    database: Option<PathBuf>,

    /// Answer every request locally instead of calling the model
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Address to bind
        #[arg(long, env = "QUILL_BIND")]
        bind: Option<String>,
    },
    /// Generate a single report and print it
    Run {
        /// Text to analyse
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cli = Cli::parse();
    let mut cfg = Config::from_env();
    if let Some(database) = cli.database {
        cfg.database = database;
    }
    if let Command::Serve { bind: Some(bind) } = &cli.command {
        cfg.bind_address = bind.clone();
    }
    cfg.validate()?;

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    init_tracing(&cfg);
    info!(version = env!("CARGO_PKG_VERSION"), "quill starting");

    // ── 3. Store, cache, gateway ───────────────────────────────────────────────
    let store: Arc<dyn TaskStore> = if cfg.is_in_memory() {
        Arc::new(SqliteTaskStore::in_memory()?)
    } else {
        Arc::new(
            SqliteTaskStore::open(&cfg.database)
                .with_context(|| format!("opening {}", cfg.database.display()))?,
        )
    };
    info!(database = %cfg.database.display(), "task store ready");

    let gateway: Arc<dyn GenerationGateway> = if cli.offline {
        info!("offline mode: reports are generated locally");
        Arc::new(ScriptedGateway::echo())
    } else {
        if cfg.openai_api_key.is_none() {
            warn!("OPENAI_API_KEY is not set; reports will fail until it is provided");
        }
        Arc::new(OpenAiGateway::new(cfg.openai())?)
    };

    let cache = Arc::new(TtlResultCache::new(cfg.cache_ttl));
    let orchestrator = Arc::new(
        AppBuilder::new()
            .task_store(store)
            .result_cache(cache.clone())
            .gateway(gateway)
            .generation_timeout(cfg.generation_timeout)
            .build()?,
    );

    let (sweeper_tx, sweeper_rx) = watch::channel(false);
    let sweeper = cache.spawn_sweeper(sweeper_every(cfg.cache_ttl), sweeper_rx);

    // ── 4. Recovery ────────────────────────────────────────────────────────────
    orchestrator.recover().await?;

    // ── 5. Command ─────────────────────────────────────────────────────────────
    let outcome = match cli.command {
        Command::Serve { .. } => serve(&cfg, Arc::clone(&orchestrator)).await,
        Command::Run { text } => run_once(&orchestrator, text).await,
    };

    orchestrator.shutdown().await;
    match sweeper_tx.send(true) {
        Ok(()) => {
            if let Err(e) = sweeper.await {
                warn!(error = %e, "cache sweeper did not stop cleanly");
            }
        }
        Err(_) => warn!("cache sweeper already exited before shutdown"),
    }

    info!("quill stopped");
    outcome
}

fn init_tracing(cfg: &Config) {
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: QUILL_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Sweep a few times per TTL, but not more often than once a second.
fn sweeper_every(ttl: Duration) -> Duration {
    (ttl / 4).max(Duration::from_secs(1))
}

async fn serve(cfg: &Config, orchestrator: Arc<Orchestrator>) -> anyhow::Result<()> {
    let app = routes::build(orchestrator);
    let addr: SocketAddr = cfg
        .bind_address
        .parse()
        .with_context(|| format!("invalid bind address {}", cfg.bind_address))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn run_once(orchestrator: &Orchestrator, text: String) -> anyhow::Result<()> {
    let submitted = orchestrator.submit(text).await?;
    info!(report_id = %submitted.id, "waiting for report");
    orchestrator.wait_idle().await;

    let snapshot = orchestrator.get_status(submitted.id).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    if let Ok(document) = serde_json::from_str::<ReportDocument>(&snapshot.report_result) {
        for point in &document.key_points {
            info!(report_id = %snapshot.id, point = %point, "key point");
        }
    }
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; draining in-flight reports");
}
