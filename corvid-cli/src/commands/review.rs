//! Review command - run a full review against one pull request

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;

use corvid_core::cache::CacheStore;
use corvid_core::comment::Severity;
use corvid_core::provider::OpenRouterProvider;
use corvid_core::{ReviewConfig, ReviewOrchestrator};
use corvid_github::{GitHubAdapter, GitHubClient};

/// Environment variable holding the model API key
const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Arguments for the review command
#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// Pull request number to review
    #[arg(required = true)]
    pub pr: u64,

    /// Repository (owner/repo or URL; defaults to GITHUB_REPOSITORY)
    #[arg(short, long, env = "GITHUB_REPOSITORY")]
    pub repo: String,

    /// Repository checkout the analyzers run against
    #[arg(long, default_value = ".")]
    pub repo_root: PathBuf,

    /// Fetch and report without posting anything to the platform
    #[arg(long)]
    pub dry_run: bool,
}

impl ReviewArgs {
    /// Execute the review command
    pub async fn execute(&self, verbose: bool, config: ReviewConfig) -> anyhow::Result<()> {
        if !config.enabled {
            println!("Reviewer is disabled in configuration");
            return Ok(());
        }

        if verbose {
            tracing::info!(pr = self.pr, repo = %self.repo, "Starting review");
        }

        println!("Corvid Review");
        println!("=============");
        println!();
        println!("Repository: {}", self.repo);
        println!("Pull request: #{}", self.pr);
        println!("Model: {}", config.model.name);
        println!();

        let client = GitHubClient::from_repo(&self.repo)
            .context("failed to create GitHub client")?;
        let platform = Arc::new(GitHubAdapter::new(client));

        let api_key = std::env::var(API_KEY_ENV)
            .with_context(|| format!("{} is not set", API_KEY_ENV))?;
        let provider = Arc::new(
            OpenRouterProvider::new(api_key, &config.model)
                .context("failed to create model client")?,
        );

        let cache = CacheStore::open(&config.cache.location, config.cache.ttl)
            .context("failed to open review cache")?;

        if self.dry_run {
            println!("[Dry run] Would review PR #{} with the above configuration", self.pr);
            return Ok(());
        }

        let orchestrator = ReviewOrchestrator::new(
            platform,
            provider,
            cache,
            config,
            self.repo_root.clone(),
        )?;
        let stats = orchestrator.run_review(self.pr).await?;

        println!("Review complete");
        println!("---------------");
        println!("Files reviewed:  {}", stats.files_reviewed);
        println!("Files excluded:  {}", stats.files_excluded);
        println!("Files skipped:   {}", stats.files_skipped);
        println!("Files failed:    {}", stats.files_failed);
        println!("Comments posted: {}", stats.comments_published);
        println!(
            "Cache:           {} hits, {} misses",
            stats.cache_hits, stats.cache_misses
        );

        if stats.comments_published > 0 {
            println!();
            for severity in Severity::ALL {
                let count = stats.severity_count(severity);
                if count > 0 {
                    println!("  {}: {}", severity, count);
                }
            }
        }

        if stats.has_failures() {
            println!();
            println!("Failed files:");
            for failure in &stats.failures {
                println!("  {} - {}", failure.path, failure.reason);
            }
        }

        Ok(())
    }
}
