//! Sync Engine - Orchestrates incremental commit synchronization
//!
//! This module provides the pipeline that brings stored commit history up to
//! date with the external source: walk the active repositories, fetch
//! candidates newer than each repository's checkpoint, deduplicate against
//! the store by content hash, persist new commits, and advance checkpoints.
//! Each repository is processed in isolation so a single outage never blocks
//! the rest of the fleet.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::checkpoint::CheckpointManager;
use crate::config::SyncConfig;
use crate::github::{CommitDetail, CommitSource, FetchError};
use crate::store::{NewCommit, Repository, Store};

/// When a repository's checkpoint advances after a sync pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckpointPolicy {
    /// Advance even after a partially failed pass. Bounds the lookback
    /// window at the cost of possibly skipping a commit whose detail fetch
    /// failed transiently.
    #[default]
    AdvanceAlways,
    /// Advance only when every candidate processed cleanly; failed passes
    /// are retried from the old window next time.
    OnFullSuccess,
}

/// Engine tuning, derived from [`SyncConfig`]
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Lookback window for repositories with no checkpoint
    pub bootstrap_lookback: ChronoDuration,
    /// Timeout applied to each outbound fetch
    pub request_timeout: Duration,
    pub checkpoint_policy: CheckpointPolicy,
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            bootstrap_lookback: ChronoDuration::days(config.lookback_days),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            checkpoint_policy: config.checkpoint_policy,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            bootstrap_lookback: ChronoDuration::days(7),
            request_timeout: Duration::from_secs(30),
            checkpoint_policy: CheckpointPolicy::default(),
        }
    }
}

/// A per-repository failure captured during a sync pass
#[derive(Debug, Clone, Serialize)]
pub struct RepoSyncError {
    pub repository: String,
    pub message: String,
}

/// Aggregate result of one sync invocation
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub new_commits: usize,
    pub repositories_processed: usize,
    pub errors: Vec<RepoSyncError>,
    pub duration_ms: u64,
}

/// Failure of the sync call as a whole
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Another invocation holds the run guard; the dedup check would race
    #[error("a sync is already running")]
    AlreadyRunning,

    /// Loading the repository list or other setup failed
    #[error(transparent)]
    Setup(#[from] anyhow::Error),
}

/// The sync orchestrator
pub struct SyncEngine {
    store: Arc<Store>,
    checkpoints: CheckpointManager,
    source: Arc<dyn CommitSource>,
    settings: SyncSettings,
    run_guard: tokio::sync::Mutex<()>,
}

impl SyncEngine {
    pub fn new(store: Arc<Store>, source: Arc<dyn CommitSource>, settings: SyncSettings) -> Self {
        let checkpoints = CheckpointManager::new(Arc::clone(&store));
        Self {
            store,
            checkpoints,
            source,
            settings,
            run_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Run a complete sync pass over every active repository
    pub async fn run_sync(&self) -> Result<SyncReport, SyncError> {
        // Reject overlapping invocations instead of letting two passes race
        // the dedup check into double inserts.
        let _guard = self
            .run_guard
            .try_lock()
            .map_err(|_| SyncError::AlreadyRunning)?;

        let start_time = Instant::now();
        info!("Starting commit synchronization");

        let repositories = self
            .store
            .get_active_repositories()
            .context("Failed to load active repositories")?;

        info!("Syncing {} active repositories", repositories.len());

        let mut new_commits = 0usize;
        let mut errors = Vec::new();

        for repo in &repositories {
            let now = Utc::now();

            match self.sync_repository(repo, now).await {
                Ok(inserted) => {
                    debug!("{}: {} new commits", repo.full_name(), inserted);
                    new_commits += inserted;
                    self.checkpoints
                        .advance_repository(repo.id, now)
                        .map_err(SyncError::Setup)?;
                }
                Err(err) => {
                    warn!("Sync failed for {}: {:#}", repo.full_name(), err);
                    errors.push(RepoSyncError {
                        repository: repo.full_name(),
                        message: format!("{:#}", err),
                    });
                    if self.settings.checkpoint_policy == CheckpointPolicy::AdvanceAlways {
                        self.checkpoints
                            .advance_repository(repo.id, now)
                            .map_err(SyncError::Setup)?;
                    }
                }
            }
        }

        // The global checkpoint is display-only and advances regardless of
        // per-repository failures.
        self.checkpoints
            .advance_global(Utc::now())
            .map_err(SyncError::Setup)?;

        let report = SyncReport {
            new_commits,
            repositories_processed: repositories.len(),
            errors,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        info!(
            "Sync completed in {}ms: {} new commits across {} repositories, {} failures",
            report.duration_ms,
            report.new_commits,
            report.repositories_processed,
            report.errors.len()
        );

        Ok(report)
    }

    /// Fetch, deduplicate and persist one repository's new commits.
    /// Returns the number of commits inserted.
    async fn sync_repository(&self, repo: &Repository, now: DateTime<Utc>) -> Result<usize> {
        let since = repo
            .last_sync_at
            .unwrap_or_else(|| now - self.settings.bootstrap_lookback);

        debug!("Fetching {} since {}", repo.full_name(), since);

        let candidates = timeout(
            self.settings.request_timeout,
            self.source.list_commits_since(&repo.owner, &repo.name, since),
        )
        .await
        .map_err(|_| FetchError::Timeout)?
        .with_context(|| format!("Failed to list commits for {}", repo.full_name()))?;

        let mut inserted = 0usize;

        for candidate in candidates {
            // The dedup gate: overlapping fetch windows are expected, a known
            // hash means the commit is already stored.
            if self
                .store
                .get_commit_by_sha(&candidate.sha)?
                .is_some()
            {
                debug!("Skipping known commit {}", candidate.sha);
                continue;
            }

            let detail = timeout(
                self.settings.request_timeout,
                self.source
                    .commit_detail(&repo.owner, &repo.name, &candidate.sha),
            )
            .await
            .map_err(|_| FetchError::Timeout)?
            .with_context(|| format!("Failed to fetch detail for {}", candidate.sha))?;

            self.store
                .create_commit(new_commit_from_detail(repo.id, detail))?;
            inserted += 1;
        }

        Ok(inserted)
    }
}

/// Boundary conversion from the fetcher's detail shape to the storage shape
fn new_commit_from_detail(repository_id: i64, detail: CommitDetail) -> NewCommit {
    NewCommit {
        repository_id: Some(repository_id),
        sha: detail.sha,
        message: detail.message,
        author_name: detail.author_name,
        author_email: detail.author_email,
        authored_at: detail.authored_at,
        additions: detail.additions,
        deletions: detail.deletions,
        changed_files: detail.changed_files,
        url: detail.url,
    }
}
