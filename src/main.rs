use clap::{ArgGroup, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;

use cli::commands;
use cli::AppContext;

#[derive(Parser)]
#[command(name = "packycost")]
#[command(version)]
#[command(about = "Per-session cost, token and latency accounting for PackyCode-billed agent sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// State file to use instead of the configured one
    #[arg(long, global = true)]
    state: Option<String>,

    /// Account API key
    #[arg(long, global = true, env = "PACKYCOST_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Account info endpoint
    #[arg(long, global = true, env = "PACKYCOST_ENDPOINT")]
    endpoint: Option<String>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Read host events as JSON lines from stdin and write notifications to stdout
    Watch,

    /// Poll the account and print a usage report
    Report {
        /// Session to report on (defaults to the last active session)
        #[arg(short, long)]
        session: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clear accounted usage
    #[command(group(ArgGroup::new("target").required(true).args(["session", "all"])))]
    Clear {
        /// Clear a single session; aggregates are kept
        #[arg(short, long)]
        session: Option<String>,

        /// Clear every session and aggregate
        #[arg(long)]
        all: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the resolved configuration
    Config {
        /// Only print the config file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout carries the host protocol.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = AppContext::load(
        cli.config.as_deref(),
        cli.state,
        cli.api_key,
        cli.endpoint,
    );

    match cli.command {
        Commands::Watch => commands::watch::run(&ctx).await,
        Commands::Report { session, json } => {
            commands::report::run(&ctx, session.as_deref(), json).await
        }
        Commands::Clear { session, all, yes } => {
            commands::clear::run(&ctx, session.as_deref(), all, yes).await
        }
        Commands::Config { path } => commands::config::run(&ctx, path),
    }
}
