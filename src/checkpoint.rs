//! Checkpoint Manager - per-repository and global sync checkpoints
//!
//! Two independent last-write-wins checkpoints, no history retained:
//! the per-repository `last_sync_at` column (the lower bound of the next
//! fetch window) and a single global timestamp in the bot_config table
//! (display-only, never gates a fetch).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::store::{RepositoryPatch, Store};

/// Bot-config key holding the global checkpoint
pub const GLOBAL_SYNC_KEY: &str = "last_sync_time";

/// Checkpoint access, layered over the store
pub struct CheckpointManager {
    store: Arc<Store>,
}

impl CheckpointManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// A repository's checkpoint, if it has ever synced
    pub fn repository(&self, repository_id: i64) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .store
            .get_repository(repository_id)?
            .and_then(|repo| repo.last_sync_at))
    }

    /// Advance a repository's checkpoint. Last write wins; the caller decides
    /// whether a partially failed pass still advances (checkpoint policy).
    pub fn advance_repository(&self, repository_id: i64, at: DateTime<Utc>) -> Result<()> {
        self.store
            .update_repository(
                repository_id,
                RepositoryPatch {
                    last_sync_at: Some(at),
                    ..Default::default()
                },
            )
            .context("Failed to advance repository checkpoint")?;

        debug!("Repository {} checkpoint -> {}", repository_id, at);
        Ok(())
    }

    /// The global checkpoint ("last checked"), if any sync has completed
    pub fn global(&self) -> Result<Option<DateTime<Utc>>> {
        let entry = self.store.get_config_value(GLOBAL_SYNC_KEY)?;
        Ok(entry.and_then(|e| {
            DateTime::parse_from_rfc3339(&e.value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }))
    }

    /// Advance the global checkpoint; once per sync invocation, after every
    /// repository has been attempted
    pub fn advance_global(&self, at: DateTime<Utc>) -> Result<()> {
        self.store
            .set_config_value(GLOBAL_SYNC_KEY, &at.to_rfc3339())
            .context("Failed to advance global checkpoint")?;

        debug!("Global checkpoint -> {}", at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewRepository;

    fn manager_with_repo() -> (CheckpointManager, i64) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let repo = store
            .create_repository(NewRepository {
                owner: "acme".to_string(),
                name: "widgets".to_string(),
                description: None,
                is_active: None,
            })
            .unwrap();
        (CheckpointManager::new(store), repo.id)
    }

    #[test]
    fn test_repository_checkpoint_roundtrip() {
        let (manager, repo_id) = manager_with_repo();

        assert!(manager.repository(repo_id).unwrap().is_none());

        let at = Utc::now();
        manager.advance_repository(repo_id, at).unwrap();

        let stored = manager.repository(repo_id).unwrap().unwrap();
        assert_eq!(stored.timestamp(), at.timestamp());
    }

    #[test]
    fn test_repository_checkpoint_last_write_wins() {
        let (manager, repo_id) = manager_with_repo();

        let first = Utc::now();
        let second = first + chrono::Duration::minutes(5);
        manager.advance_repository(repo_id, first).unwrap();
        manager.advance_repository(repo_id, second).unwrap();

        let stored = manager.repository(repo_id).unwrap().unwrap();
        assert_eq!(stored.timestamp(), second.timestamp());
    }

    #[test]
    fn test_global_checkpoint_roundtrip() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let manager = CheckpointManager::new(store);

        assert!(manager.global().unwrap().is_none());

        let at = Utc::now();
        manager.advance_global(at).unwrap();

        let stored = manager.global().unwrap().unwrap();
        assert_eq!(stored.timestamp(), at.timestamp());
    }

    #[test]
    fn test_global_checkpoint_ignores_malformed_value() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .set_config_value(GLOBAL_SYNC_KEY, "not-a-timestamp")
            .unwrap();

        let manager = CheckpointManager::new(store);
        assert!(manager.global().unwrap().is_none());
    }
}
