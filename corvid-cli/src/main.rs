//! Corvid CLI - Command line interface for the corvid pull-request reviewer
//!
//! Automated code review: deterministic linter evidence merged with LLM
//! analysis, published back to the pull request.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use corvid_core::ReviewConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{CacheArgs, ReviewArgs};

/// Corvid: AI-assisted pull-request review with linter verification
#[derive(Parser, Debug)]
#[command(name = "corvid")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a config file (overrides the default lookup)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model to use (overrides config and env)
    #[arg(long, global = true, env = "CORVID_MODEL")]
    model: Option<String>,

    /// Cache directory (overrides config and env)
    #[arg(long, global = true, env = "CORVID_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Review a pull request
    #[command(visible_alias = "r")]
    Review(ReviewArgs),

    /// Manage the review cache
    Cache(CacheArgs),

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = ReviewConfig::load_with_overrides(
        cli.config.as_deref(),
        cli.model.clone(),
        cli.cache_dir.clone(),
    )?;

    if cli.verbose {
        tracing::info!(
            model = %config.model.name,
            cache = %config.cache.location.display(),
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("corvid {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Review(args)) => {
            args.execute(cli.verbose, config).await?;
        }
        Some(Commands::Cache(args)) => {
            args.execute(&config)?;
        }
        Some(Commands::Config) => {
            println!("Corvid Configuration");
            println!("====================");
            println!();
            println!("Model:");
            println!("  name: {}", config.model.name);
            println!("  max_tokens: {}", config.model.max_tokens);
            println!("  temperature: {}", config.model.temperature);
            println!();
            println!("Review:");
            println!("  severity_threshold: {}", config.review.severity_threshold);
            println!(
                "  max_comments_per_file: {}",
                config.review.max_comments_per_file
            );
            println!(
                "  corroboration_window: {}",
                config.review.corroboration_window
            );
            println!();
            println!("Cache:");
            println!("  enabled: {}", config.cache.enabled);
            println!("  location: {}", config.cache.location.display());
            println!("  ttl: {:?}", config.cache.ttl);
            println!();
            println!("Limits:");
            println!("  max_files: {}", config.limits.max_files);
            println!("  max_api_calls: {}", config.limits.max_api_calls);
            println!("  workers: {}", config.limits.workers);
        }
        None => {
            println!("Corvid - AI-assisted pull-request review");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
