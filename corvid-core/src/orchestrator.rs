//! Review orchestrator: drives the per-file pipelines across a change set
//!
//! Per-file pipelines are independent and run concurrently under a bounded
//! worker count. The cache store is the only state shared between workers;
//! statistics flow as per-file outcome messages into a single accumulator
//! owned by the run. A file failure never aborts the run; only
//! authentication and configuration errors do.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;

use crate::cache::{CacheStore, Fingerprint};
use crate::changeset::FileChange;
use crate::comment::VerifiedComment;
use crate::config::ReviewConfig;
use crate::context::ContextAssembler;
use crate::filter::{Admission, ExclusionFilter};
use crate::linter::LinterRunner;
use crate::merge::{merge_findings, MergeSettings};
use crate::platform::PlatformAdapter;
use crate::provider::AiProvider;
use crate::stats::RunStatistics;
use crate::{Error, Result};

/// Phases of one review run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Init,
    Fetching,
    Reviewing,
    Publishing,
    Done,
    /// Authentication failed before any file was processed
    AuthFailed,
    /// One or more files failed; results for the rest were published
    PartialFailure,
}

impl RunPhase {
    pub fn description(&self) -> &'static str {
        match self {
            RunPhase::Init => "initializing",
            RunPhase::Fetching => "fetching change set",
            RunPhase::Reviewing => "reviewing files",
            RunPhase::Publishing => "publishing results",
            RunPhase::Done => "run complete",
            RunPhase::AuthFailed => "authentication failed",
            RunPhase::PartialFailure => "completed with file failures",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunPhase::Done | RunPhase::AuthFailed | RunPhase::PartialFailure
        )
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Outcome of one file's pipeline, sent to the accumulator
#[derive(Debug)]
enum FileOutcome {
    Reviewed {
        comments: Vec<VerifiedComment>,
        cache_hit: bool,
        duplicates_suppressed: usize,
        below_threshold: usize,
    },
    Excluded {
        path: String,
        reason: String,
    },
    Skipped {
        path: String,
        reason: String,
    },
    Failed {
        path: String,
        reason: String,
    },
}

/// Everything a worker pipeline needs, shared immutably
struct PipelineContext {
    platform: Arc<dyn PlatformAdapter>,
    provider: Arc<dyn AiProvider>,
    cache: CacheStore,
    config: ReviewConfig,
    filter: ExclusionFilter,
    linter: LinterRunner,
    assembler: ContextAssembler,
    merge_settings: MergeSettings,
}

/// Drives a full review run end to end
pub struct ReviewOrchestrator {
    ctx: Arc<PipelineContext>,
}

impl ReviewOrchestrator {
    /// Wire up an orchestrator for one run
    ///
    /// The cache store is opened by the caller (explicit lifecycle) and
    /// handed in; the repository root is where analyzers execute.
    pub fn new(
        platform: Arc<dyn PlatformAdapter>,
        provider: Arc<dyn AiProvider>,
        cache: CacheStore,
        config: ReviewConfig,
        repo_root: impl Into<std::path::PathBuf>,
    ) -> Result<Self> {
        let filter = ExclusionFilter::new(&config.exclusions)?;
        let linter = LinterRunner::new(repo_root, config.limits.linter_timeout);
        let assembler = ContextAssembler::new(Arc::clone(&platform), config.review.clone());
        let merge_settings = MergeSettings::from(&config.review);

        Ok(Self {
            ctx: Arc::new(PipelineContext {
                platform,
                provider,
                cache,
                config,
                filter,
                linter,
                assembler,
                merge_settings,
            }),
        })
    }

    /// Review one pull request and return the run statistics
    pub async fn run_review(&self, change_id: u64) -> Result<RunStatistics> {
        let ctx = &self.ctx;

        if !ctx.config.enabled {
            tracing::info!("Reviewer disabled in configuration, nothing to do");
            return Ok(RunStatistics::default());
        }

        tracing::info!(change_id, phase = %RunPhase::Fetching, "Starting review run");
        let changeset = ctx.platform.get_changes(change_id).await?;
        let mut stats = RunStatistics::new(changeset.len());

        tracing::info!(
            change_id,
            files = changeset.len(),
            phase = %RunPhase::Reviewing,
            "Change set fetched"
        );

        let deadline = Instant::now() + ctx.config.limits.wall_clock;
        let api_budget = Arc::new(AtomicU32::new(ctx.config.limits.max_api_calls));
        let semaphore = Arc::new(Semaphore::new(ctx.config.limits.workers));
        let (tx, mut rx) = mpsc::channel::<(usize, FileOutcome)>(changeset.len().max(1));

        let file_count = changeset.len();
        for (idx, change) in changeset.files.into_iter().enumerate() {
            let tx = tx.clone();

            if idx >= ctx.config.limits.max_files {
                let outcome = FileOutcome::Skipped {
                    path: change.path,
                    reason: "max files per run reached".into(),
                };
                let _ = tx.send((idx, outcome)).await;
                continue;
            }

            let ctx = Arc::clone(ctx);
            let semaphore = Arc::clone(&semaphore);
            let api_budget = Arc::clone(&api_budget);
            tokio::spawn(async move {
                // Bounded workers; queued files re-check the deadline when
                // their turn comes so an exhausted budget starts no new work.
                let _permit = semaphore.acquire().await;
                let outcome = if Instant::now() >= deadline {
                    FileOutcome::Skipped {
                        path: change.path.clone(),
                        reason: "wall-clock budget exhausted".into(),
                    }
                } else {
                    review_file(&ctx, &change, &api_budget).await
                };
                let _ = tx.send((idx, outcome)).await;
            });
        }
        drop(tx);

        // Single-owner accumulator: workers message, this loop merges.
        let mut outcomes: Vec<Option<FileOutcome>> = Vec::new();
        outcomes.resize_with(file_count, || None);
        while let Some((idx, outcome)) = rx.recv().await {
            outcomes[idx] = Some(outcome);
        }

        let mut all_comments: Vec<VerifiedComment> = Vec::new();
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                FileOutcome::Reviewed {
                    comments,
                    cache_hit,
                    duplicates_suppressed,
                    below_threshold,
                } => {
                    if cache_hit {
                        stats.cache_hits += 1;
                    } else {
                        stats.cache_misses += 1;
                    }
                    stats.duplicates_suppressed += duplicates_suppressed;
                    stats.below_threshold += below_threshold;
                    stats.record_reviewed(&comments);
                    all_comments.extend(comments);
                }
                FileOutcome::Excluded { path, reason } => {
                    tracing::info!(path = %path, reason = %reason, "File excluded");
                    stats.record_excluded(path, reason);
                }
                FileOutcome::Skipped { path, reason } => {
                    tracing::info!(path = %path, reason = %reason, "File skipped");
                    stats.record_skipped();
                }
                FileOutcome::Failed { path, reason } => {
                    tracing::warn!(path = %path, reason = %reason, "File failed");
                    stats.record_failed(path, reason);
                }
            }
        }

        tracing::info!(
            change_id,
            comments = all_comments.len(),
            phase = %RunPhase::Publishing,
            "Publishing results"
        );
        if !all_comments.is_empty() {
            ctx.platform.post_comments(change_id, &all_comments).await?;
        }
        if let Err(e) = ctx.platform.post_summary(change_id, &stats).await {
            tracing::warn!(error = %e, "Failed to post run summary");
        }

        let phase = if stats.has_failures() {
            RunPhase::PartialFailure
        } else {
            RunPhase::Done
        };
        tracing::info!(
            change_id,
            reviewed = stats.files_reviewed,
            failed = stats.files_failed,
            phase = %phase,
            "Review run finished"
        );

        Ok(stats)
    }
}

/// One file's pipeline: filter, cache check, context, lint, AI, merge,
/// cache write
///
/// Every error is converted into a `FileOutcome` here; nothing escapes to
/// abort the run.
async fn review_file(
    ctx: &PipelineContext,
    change: &FileChange,
    api_budget: &AtomicU32,
) -> FileOutcome {
    if let Admission::Reject { reason } = ctx.filter.check(change) {
        return FileOutcome::Excluded {
            path: change.path.clone(),
            reason,
        };
    }

    let mut tool_ids = Vec::new();
    if let Some(language) = change.language {
        if let Some(id) = ctx.linter.tool_identifier(language).await {
            tool_ids.push(id);
        }
    }
    let fingerprint = Fingerprint::compute(change, &tool_ids, &ctx.config.fingerprint_inputs());

    if ctx.config.cache.enabled {
        if let Some(entry) = ctx.cache.get(&fingerprint) {
            tracing::info!(path = %change.path, "Using cached review");
            return FileOutcome::Reviewed {
                comments: entry.comments,
                cache_hit: true,
                duplicates_suppressed: 0,
                below_threshold: 0,
            };
        }
    }

    match review_file_uncached(ctx, change, api_budget, &fingerprint).await {
        Ok(outcome) => outcome,
        Err(e) => FileOutcome::Failed {
            path: change.path.clone(),
            reason: e.to_string(),
        },
    }
}

async fn review_file_uncached(
    ctx: &PipelineContext,
    change: &FileChange,
    api_budget: &AtomicU32,
    fingerprint: &Fingerprint,
) -> Result<FileOutcome> {
    let payload = ctx.assembler.assemble(change).await?;
    let lint_findings = ctx.linter.run(change).await;
    let payload = payload.with_lint_findings(lint_findings.clone());

    // Global API-call budget: decrement or stop starting model calls.
    let granted = api_budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if !granted {
        return Ok(FileOutcome::Skipped {
            path: change.path.clone(),
            reason: "API call budget exhausted".into(),
        });
    }

    let ai_findings = ctx.provider.review(&payload).await.map_err(Error::Provider)?;

    let outcome = merge_findings(
        &change.path,
        &change.changed_lines,
        &lint_findings,
        &ai_findings,
        &ctx.merge_settings,
    );

    let threshold = ctx.config.review.severity_threshold;
    let total = outcome.comments.len();
    let comments: Vec<VerifiedComment> = outcome
        .comments
        .into_iter()
        .filter(|c| c.severity >= threshold)
        .collect();
    let below_threshold = total - comments.len();

    if ctx.config.cache.enabled {
        if let Err(e) = ctx.cache.put(fingerprint, comments.clone()) {
            tracing::warn!(path = %change.path, error = %e, "Failed to write cache entry");
        }
    }

    Ok(FileOutcome::Reviewed {
        comments,
        cache_hit: false,
        duplicates_suppressed: outcome.duplicates_suppressed,
        below_threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_descriptions() {
        assert_eq!(RunPhase::Init.description(), "initializing");
        assert!(RunPhase::Done.is_terminal());
        assert!(RunPhase::AuthFailed.is_terminal());
        assert!(RunPhase::PartialFailure.is_terminal());
        assert!(!RunPhase::Reviewing.is_terminal());
    }
}
