//! CLI command definitions, routing, and tracing setup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use explainer_core::{Collaborators, Orchestrator, ProgressReporter};
use explainer_llm::{OllamaClient, TieredModelSelector};
use explainer_retrieval::DocIndex;
use explainer_search::DdgSearch;
use explainer_shared::{AppConfig, FinalAnswer, init_config, load_config, load_config_from};
use explainer_tools::{PythonComplexity, PythonValidator};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::net::TcpListener;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Explainer: structured answers to programming questions.
#[derive(Parser)]
#[command(
    name = "explainer",
    version,
    about = "Answer programming questions with an explanation, example code and sources.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.explainer/explainer.toml).
    #[arg(long, global = true, env = "EXPLAINER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Start the HTTP API.
    Serve {
        /// Bind address (overrides `server.host`).
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides `server.port`).
        #[arg(long)]
        port: Option<u16>,
    },

    /// Answer one question and print the result as JSON.
    Ask {
        /// The question to answer.
        query: String,
    },

    /// Build (or load) the documentation index and report its size.
    Index,

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "explainer=info",
        1 => "explainer=debug",
        _ => "explainer=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Serve { host, port } => cmd_serve(config_path, host, port).await,
        Command::Ask { query } => cmd_ask(config_path, &query).await,
        Command::Index => cmd_index(config_path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Wire the concrete backends into an orchestrator. The doc index is
/// returned too so callers can warm it.
fn build_pipeline(config: &AppConfig) -> Result<(Arc<Orchestrator>, Arc<DocIndex>)> {
    let docs = Arc::new(DocIndex::new(&config.retrieval));
    let orchestrator = Orchestrator::from_collaborators(Collaborators {
        generator: Arc::new(OllamaClient::new(&config.ollama)?),
        selector: Arc::new(TieredModelSelector::new(&config.models)),
        docs: docs.clone(),
        web: Arc::new(DdgSearch::new(&config.search)?),
        validator: Arc::new(PythonValidator),
        complexity: Arc::new(PythonComplexity),
    });
    Ok((Arc::new(orchestrator), docs))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;

    let (orchestrator, docs) = build_pipeline(&config)?;
    let index = docs.ensure_ready().await?;

    let (host, port) = (&config.server.host, config.server.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| eyre!("invalid bind address {host}:{port}: {e}"))?;
    let listener = TcpListener::bind(addr).await?;

    info!(
        %addr,
        api_prefix = %config.server.api_prefix,
        fast_model = %config.models.fast_model,
        powerful_model = %config.models.powerful_model,
        ollama = %config.ollama.base_url,
        documents = %config.retrieval.documents_path.display(),
        indexed_chunks = index.chunks,
        chunk_size = config.retrieval.chunk_size,
        chunk_overlap = config.retrieval.chunk_overlap,
        top_k = config.retrieval.top_k,
        "explainer listening"
    );

    let app = crate::http::router(orchestrator, &config.server.api_prefix);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn cmd_ask(config_path: Option<&Path>, query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(eyre!("query must not be empty"));
    }
    let config = resolve_config(config_path)?;
    let (orchestrator, _) = build_pipeline(&config)?;

    let progress = CliProgress::new();
    let answer = orchestrator.process_query_with(query, &progress).await;
    if answer.is_err() {
        progress.spinner.finish_and_clear();
    }

    println!("{}", serde_json::to_string_pretty(&answer?)?);
    Ok(())
}

async fn cmd_index(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let index = DocIndex::new(&config.retrieval);
    let stats = index.ensure_ready().await?;

    let origin = if stats.rebuilt {
        "rebuilt"
    } else {
        "loaded from store"
    };
    println!(
        "Indexed {} chunks from {} documents ({origin}) at {}",
        stats.chunks,
        stats.documents,
        config.retrieval.index_path.display()
    );
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Spinner showing the current pipeline stage.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(style.tick_strings(SPINNER_TICKS));
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _answer: &FinalAnswer) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["explainer", "serve", "--port", "9000", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.log_format, LogFormat::Text));
        match cli.command {
            Command::Serve { host, port } => {
                assert_eq!(host, None);
                assert_eq!(port, Some(9000));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn ask_takes_the_query() {
        let cli = Cli::try_parse_from(["explainer", "ask", "How do Dependencies work?"]).unwrap();
        let Command::Ask { query } = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(query, "How do Dependencies work?");
    }

    #[test]
    fn log_format_accepts_json() {
        let cli = Cli::try_parse_from(["explainer", "index", "--log-format", "json"]).unwrap();
        assert!(matches!(cli.log_format, LogFormat::Json));
        assert!(matches!(cli.command, Command::Index));
    }

    #[test]
    fn explicit_config_file_is_used() {
        let path = std::env::temp_dir().join(format!("explainer_cli_{}.toml", std::process::id()));
        std::fs::write(&path, "[server]\nport = 9100\n").unwrap();
        let config = resolve_config(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.retrieval.top_k, 3);
    }
}
