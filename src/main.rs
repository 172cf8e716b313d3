//! Token Sentry CLI
//!
//! `screen` runs a batch of token records through the pipeline and prints
//! the survivors as JSON on stdout. `blacklist` edits the blacklist file.
//! Logs and the stats report go to stderr.

use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use token_sentry::utils::constants::{APP_NAME, APP_VERSION};
use token_sentry::{
    AnalysisMode, AnalyzedToken, BlacklistStore, BlockingPipeline, ScreenerConfig,
    ScreeningTelemetry, TokenAnalysisPipeline,
};

#[derive(Parser)]
#[command(name = "token_sentry", version)]
#[command(
    about = "Fail-closed token screening: volume, contract risk, blacklist",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Screen a JSON array of token records
    Screen {
        /// Input file, or `-` for stdin
        #[arg(short, long)]
        input: String,
        /// hard_cutoff or advisory (overrides ANALYSIS_MODE)
        #[arg(long)]
        mode: Option<AnalysisMode>,
        /// Blacklist file (overrides BLACKLIST_FILE)
        #[arg(long)]
        blacklist: Option<PathBuf>,
        /// Tokens in flight at once (overrides SCREENER_CONCURRENCY)
        #[arg(short, long)]
        concurrency: Option<usize>,
        /// Screen sequentially on a single-threaded runtime
        #[arg(long)]
        blocking: bool,
    },
    /// Inspect or edit the blacklist
    Blacklist {
        #[command(subcommand)]
        action: BlacklistAction,
        /// Blacklist file (overrides BLACKLIST_FILE)
        #[arg(long, global = true)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum BlacklistAction {
    Add { category: String, address: String },
    Remove { category: String, address: String },
    Contains { category: String, address: String },
    List { category: String },
    Clear { category: String },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let mut config = ScreenerConfig::from_env().wrap_err("Invalid configuration")?;

    match cli.command {
        Command::Screen {
            input,
            mode,
            blacklist,
            concurrency,
            blocking,
        } => {
            if let Some(mode) = mode {
                config.mode = mode;
            }
            if let Some(path) = blacklist {
                config.blacklist_path = path;
            }
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            screen(&config, &input, blocking)
        }
        Command::Blacklist { action, file } => {
            if let Some(path) = file {
                config.blacklist_path = path;
            }
            edit_blacklist(&config, action)
        }
    }
}

fn screen(config: &ScreenerConfig, input: &str, blocking: bool) -> Result<()> {
    let tokens = read_tokens(input)?;
    info!("🛡️ {} v{} screening {} tokens", APP_NAME, APP_VERSION, tokens.len());

    let telemetry = Arc::new(ScreeningTelemetry::new());
    let pipeline = TokenAnalysisPipeline::from_config(config)
        .wrap_err("Failed to build pipeline")?
        .with_telemetry(telemetry.clone());

    let accepted: Vec<AnalyzedToken> = if blocking {
        BlockingPipeline::new(pipeline)?.analyze_many(&tokens)
    } else {
        let runtime = tokio::runtime::Runtime::new().wrap_err("Failed to start runtime")?;
        runtime.block_on(pipeline.analyze_many_concurrent(&tokens, config.concurrency))
    };

    println!("{}", serde_json::to_string_pretty(&accepted)?);
    eprintln!("{}", telemetry.summary());
    Ok(())
}

fn read_tokens(input: &str) -> Result<Vec<Value>> {
    let raw = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .wrap_err("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).wrap_err_with(|| format!("Failed to read {}", input))?
    };

    match serde_json::from_str(&raw).wrap_err("Input is not valid JSON")? {
        Value::Array(tokens) => Ok(tokens),
        single @ Value::Object(_) => Ok(vec![single]),
        _ => Err(eyre::eyre!("Input must be a JSON array of token records")),
    }
}

fn edit_blacklist(config: &ScreenerConfig, action: BlacklistAction) -> Result<()> {
    let store = BlacklistStore::open(config.blacklist_path.clone());

    match action {
        BlacklistAction::Add { category, address } => store.add(&category, &address),
        BlacklistAction::Remove { category, address } => store.remove(&category, &address),
        BlacklistAction::Contains { category, address } => {
            println!("{}", store.contains(&category, &address));
        }
        BlacklistAction::List { category } => {
            println!("{}", serde_json::to_string_pretty(&store.get(&category))?);
        }
        BlacklistAction::Clear { category } => store.clear(&category),
    }
    Ok(())
}
