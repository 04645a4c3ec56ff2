//! SearchSphere CLI: gateway server and terminal client for the SearchSphere demo.
//!
//! Runs the forwarding gateway, drives the search/chat/eval operations from a
//! terminal, and offers an interactive mode where a new query supersedes the
//! one still in flight.

mod commands;
mod render;
mod repl;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// SearchSphere: search, chat and evaluation gateway
#[derive(Parser, Debug)]
#[command(name = "searchsphere", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gateway base URL used by client commands
    #[arg(short, long, global = true)]
    gateway: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Subcommand (starts interactive mode if omitted)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the forwarding gateway
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Backend origin (takes precedence over every configured source)
        #[arg(long)]
        origin: Option<String>,
    },
    /// Search the corpus
    Search {
        /// Query text (an empty query matches everything)
        #[arg(default_value = "")]
        query: String,
        /// Number of results
        #[arg(short, long)]
        k: Option<u32>,
        /// Restrict to a team (repeatable)
        #[arg(long)]
        team: Vec<String>,
        /// Restrict to a document type (repeatable)
        #[arg(long)]
        doc_type: Vec<String>,
        /// Only documents updated since this ISO date
        #[arg(long)]
        since: Option<String>,
        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
    /// Ask the retrieval-augmented assistant
    Chat {
        /// Question
        query: String,
        /// Number of passages to ground on
        #[arg(short, long)]
        k: Option<u32>,
        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
    /// Show latency and evaluation metrics
    Metrics {
        /// Keep polling and print a rolling latency series
        #[arg(long)]
        watch: bool,
    },
    /// Run a precision@k evaluation from a ground-truth file
    Eval {
        /// Ground-truth JSON file, or `-` for stdin
        file: PathBuf,
        /// Override the precision cutoff
        #[arg(short, long)]
        k: Option<u32>,
    },
    /// Fetch labeling candidates for a query
    LabelAssist {
        /// Query to label
        query: String,
        /// Number of candidates
        #[arg(short, long, default_value = "20")]
        k: u32,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "searchsphere", "searchsphere")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "searchsphere.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut config =
        searchsphere_core::config::load_config(Some(&workspace), cli.config.as_deref(), None)
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    if let Some(gateway) = &cli.gateway {
        config.client.gateway_url = Some(gateway.clone());
    }

    match cli.command {
        Some(command) => commands::handle_command(command, config, &workspace).await,
        None => repl::run_interactive(config).await,
    }
}
