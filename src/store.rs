//! Commit Store - SQLite-based persistence for repositories, commits and posts
//!
//! This module provides the durable storage that everything else reads and
//! writes through:
//! - Registered repositories and their per-repository sync checkpoints
//! - Commits fetched from the external source (dedup keyed by content hash)
//! - Generated blog posts and their publication state
//! - Key/value bot configuration, including the global sync checkpoint
//!
//! The database is stored at the configured path (XDG data dir by default).
//! A single connection guarded by a mutex serializes all writes, so callers
//! never need to coordinate among themselves.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Publication status of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Editable, not yet sent to the publishing network
    Draft,
    /// Sent to the publishing network; never regresses
    Published,
    /// Queued for a later publish
    Scheduled,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Scheduled => "scheduled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "published" => PostStatus::Published,
            "scheduled" => PostStatus::Scheduled,
            _ => PostStatus::Draft,
        }
    }
}

/// A registered repository
#[derive(Debug, Clone, Serialize)]
pub struct Repository {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    /// Per-repository checkpoint: lower bound of the next fetch window
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Repository {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Fields for registering a repository
#[derive(Debug, Clone, Deserialize)]
pub struct NewRepository {
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// Partial update for a repository; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct RepositoryPatch {
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// A stored commit
#[derive(Debug, Clone, Serialize)]
pub struct Commit {
    pub id: i64,
    /// Owning repository; orphaned commits are tolerated
    pub repository_id: Option<i64>,
    /// External VCS content hash, the dedup key
    pub sha: String,
    pub message: String,
    pub author_name: String,
    pub author_email: Option<String>,
    pub authored_at: DateTime<Utc>,
    pub additions: i64,
    pub deletions: i64,
    pub changed_files: i64,
    pub url: Option<String>,
    /// True once included in a published post
    pub processed: bool,
}

/// Fields for inserting a commit
#[derive(Debug, Clone)]
pub struct NewCommit {
    pub repository_id: Option<i64>,
    pub sha: String,
    pub message: String,
    pub author_name: String,
    pub author_email: Option<String>,
    pub authored_at: DateTime<Utc>,
    pub additions: i64,
    pub deletions: i64,
    pub changed_files: i64,
    pub url: Option<String>,
}

/// A generated blog post
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub external_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Commits this post summarizes, marked processed after publication
    pub commit_ids: Vec<i64>,
    pub tokens_used: i64,
}

/// Fields for creating a draft post
#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub commit_ids: Vec<i64>,
    #[serde(default)]
    pub tokens_used: i64,
}

/// Partial update for a post; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(skip)]
    pub status: Option<PostStatus>,
    #[serde(skip)]
    pub external_id: Option<String>,
    #[serde(skip)]
    pub published_at: Option<DateTime<Utc>>,
}

/// A bot configuration entry (key/value, last write wins)
#[derive(Debug, Clone, Serialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Read-only dashboard projection
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub active_repositories: i64,
    pub commits_last_week: i64,
    pub published_posts: i64,
    pub total_tokens_used: i64,
}

/// Durable storage handle
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database at a specific path
    pub fn open_at(path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;

        info!("Commit store opened at {}", path.display());
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize(&self) -> Result<()> {
        self.conn
            .lock()
            .execute_batch(
                r#"
                -- Registered repositories
                CREATE TABLE IF NOT EXISTS repositories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    owner TEXT NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    last_sync_at TEXT,
                    created_at TEXT NOT NULL
                );

                -- Fetched commits; sha uniqueness is orchestrator discipline
                CREATE TABLE IF NOT EXISTS commits (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    repository_id INTEGER,
                    sha TEXT NOT NULL,
                    message TEXT NOT NULL,
                    author_name TEXT NOT NULL,
                    author_email TEXT,
                    authored_at TEXT NOT NULL,
                    additions INTEGER NOT NULL DEFAULT 0,
                    deletions INTEGER NOT NULL DEFAULT 0,
                    changed_files INTEGER NOT NULL DEFAULT 0,
                    url TEXT,
                    processed INTEGER NOT NULL DEFAULT 0
                );

                -- Generated posts
                CREATE TABLE IF NOT EXISTS posts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL,
                    summary TEXT,
                    tags TEXT,
                    status TEXT NOT NULL DEFAULT 'draft',
                    external_id TEXT,
                    published_at TEXT,
                    created_at TEXT NOT NULL,
                    commit_ids TEXT,
                    tokens_used INTEGER NOT NULL DEFAULT 0
                );

                -- Key/value bot configuration (global checkpoint lives here)
                CREATE TABLE IF NOT EXISTS bot_config (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                -- Indexes for efficient queries
                CREATE INDEX IF NOT EXISTS idx_repos_owner_name ON repositories(owner, name);
                CREATE INDEX IF NOT EXISTS idx_commits_sha ON commits(sha);
                CREATE INDEX IF NOT EXISTS idx_commits_repo ON commits(repository_id, authored_at);
                CREATE INDEX IF NOT EXISTS idx_commits_authored ON commits(authored_at);
                CREATE INDEX IF NOT EXISTS idx_posts_status ON posts(status);
                "#,
            )
            .context("Failed to initialize database schema")?;

        debug!("Database schema initialized");
        Ok(())
    }

    // =========================================================================
    // Repository Operations
    // =========================================================================

    /// Register a repository
    pub fn create_repository(&self, new: NewRepository) -> Result<Repository> {
        let now = Utc::now();
        let is_active = new.is_active.unwrap_or(true);

        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO repositories (owner, name, description, is_active, last_sync_at, created_at)
            VALUES (?1, ?2, ?3, ?4, NULL, ?5)
            "#,
            params![
                new.owner,
                new.name,
                new.description,
                is_active as i32,
                now.to_rfc3339(),
            ],
        )
        .context("Failed to insert repository")?;

        let id = conn.last_insert_rowid();
        debug!("Registered repository {}/{} (id {})", new.owner, new.name, id);

        Ok(Repository {
            id,
            owner: new.owner,
            name: new.name,
            description: new.description,
            is_active,
            last_sync_at: None,
            created_at: now,
        })
    }

    /// Get a repository by id
    pub fn get_repository(&self, id: i64) -> Result<Option<Repository>> {
        let conn = self.conn.lock();
        conn.query_row(
            r#"
            SELECT id, owner, name, description, is_active, last_sync_at, created_at
            FROM repositories
            WHERE id = ?1
            "#,
            params![id],
            repo_from_row,
        )
        .optional()
        .context("Failed to query repository")
    }

    /// Get a repository by its natural owner/name key
    pub fn get_repository_by_owner_name(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<Repository>> {
        let conn = self.conn.lock();
        conn.query_row(
            r#"
            SELECT id, owner, name, description, is_active, last_sync_at, created_at
            FROM repositories
            WHERE owner = ?1 AND name = ?2
            "#,
            params![owner, name],
            repo_from_row,
        )
        .optional()
        .context("Failed to query repository by owner/name")
    }

    /// List every registered repository
    pub fn list_repositories(&self) -> Result<Vec<Repository>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, owner, name, description, is_active, last_sync_at, created_at
            FROM repositories
            ORDER BY owner, name
            "#,
        )?;

        let repos = stmt
            .query_map([], repo_from_row)
            .context("Failed to query repositories")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect repositories")?;

        Ok(repos)
    }

    /// Repositories with the monitoring flag set
    pub fn get_active_repositories(&self) -> Result<Vec<Repository>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, owner, name, description, is_active, last_sync_at, created_at
            FROM repositories
            WHERE is_active = 1
            ORDER BY owner, name
            "#,
        )?;

        let repos = stmt
            .query_map([], repo_from_row)
            .context("Failed to query active repositories")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect active repositories")?;

        Ok(repos)
    }

    /// Merge a partial update into a repository, returning the updated row
    pub fn update_repository(
        &self,
        id: i64,
        patch: RepositoryPatch,
    ) -> Result<Option<Repository>> {
        {
            let conn = self.conn.lock();
            let updated = conn
                .execute(
                    r#"
                    UPDATE repositories SET
                        description = COALESCE(?2, description),
                        is_active = COALESCE(?3, is_active),
                        last_sync_at = COALESCE(?4, last_sync_at)
                    WHERE id = ?1
                    "#,
                    params![
                        id,
                        patch.description,
                        patch.is_active.map(|b| b as i32),
                        patch.last_sync_at.map(|t| t.to_rfc3339()),
                    ],
                )
                .context("Failed to update repository")?;

            if updated == 0 {
                return Ok(None);
            }
        }

        self.get_repository(id)
    }

    /// Remove a repository (admin operation; stored commits keep their rows)
    pub fn delete_repository(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute("DELETE FROM repositories WHERE id = ?1", params![id])
            .context("Failed to delete repository")?;
        Ok(deleted > 0)
    }

    // =========================================================================
    // Commit Operations
    // =========================================================================

    /// Look up a stored commit by content hash. This is the dedup gate: the
    /// orchestrator checks here before every insert.
    pub fn get_commit_by_sha(&self, sha: &str) -> Result<Option<Commit>> {
        let conn = self.conn.lock();
        conn.query_row(
            r#"
            SELECT id, repository_id, sha, message, author_name, author_email,
                   authored_at, additions, deletions, changed_files, url, processed
            FROM commits
            WHERE sha = ?1
            "#,
            params![sha],
            commit_from_row,
        )
        .optional()
        .context("Failed to query commit by sha")
    }

    /// Insert one commit. Hash uniqueness is caller discipline, not enforced
    /// here.
    pub fn create_commit(&self, new: NewCommit) -> Result<Commit> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO commits (repository_id, sha, message, author_name, author_email,
                                 authored_at, additions, deletions, changed_files, url, processed)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)
            "#,
            params![
                new.repository_id,
                new.sha,
                new.message,
                new.author_name,
                new.author_email,
                new.authored_at.to_rfc3339(),
                new.additions,
                new.deletions,
                new.changed_files,
                new.url,
            ],
        )
        .context("Failed to insert commit")?;

        let id = conn.last_insert_rowid();
        debug!("Stored commit {} (id {})", new.sha, id);

        Ok(Commit {
            id,
            repository_id: new.repository_id,
            sha: new.sha,
            message: new.message,
            author_name: new.author_name,
            author_email: new.author_email,
            authored_at: new.authored_at,
            additions: new.additions,
            deletions: new.deletions,
            changed_files: new.changed_files,
            url: new.url,
            processed: false,
        })
    }

    /// All commits authored at or after the timestamp, optionally filtered to
    /// one repository, newest first
    pub fn get_commits_since(
        &self,
        since: DateTime<Utc>,
        repository_id: Option<i64>,
    ) -> Result<Vec<Commit>> {
        let conn = self.conn.lock();

        let mut sql = String::from(
            r#"
            SELECT id, repository_id, sha, message, author_name, author_email,
                   authored_at, additions, deletions, changed_files, url, processed
            FROM commits
            WHERE authored_at >= ?1
            "#,
        );
        if repository_id.is_some() {
            sql.push_str(" AND repository_id = ?2");
        }
        sql.push_str(" ORDER BY authored_at DESC");

        let mut stmt = conn.prepare(&sql)?;

        let commits = if let Some(repo_id) = repository_id {
            stmt.query_map(params![since.to_rfc3339(), repo_id], commit_from_row)
                .context("Failed to query commits since")?
                .collect::<Result<Vec<_>, _>>()
        } else {
            stmt.query_map(params![since.to_rfc3339()], commit_from_row)
                .context("Failed to query commits since")?
                .collect::<Result<Vec<_>, _>>()
        }
        .context("Failed to collect commits")?;

        Ok(commits)
    }

    /// Most recently authored commits, for the dashboard feed
    pub fn list_recent_commits(&self, limit: u32) -> Result<Vec<Commit>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, repository_id, sha, message, author_name, author_email,
                   authored_at, additions, deletions, changed_files, url, processed
            FROM commits
            ORDER BY authored_at DESC
            LIMIT ?1
            "#,
        )?;

        let commits = stmt
            .query_map(params![limit], commit_from_row)
            .context("Failed to query recent commits")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect recent commits")?;

        Ok(commits)
    }

    /// Idempotent bulk flip of the processed flag; missing ids are ignored
    pub fn mark_commits_processed(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = ids
            .iter()
            .enumerate()
            .map(|(i, _)| format!("?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE commits SET processed = 1 WHERE id IN ({})",
            placeholders
        );

        let conn = self.conn.lock();
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let updated = conn
            .execute(&sql, param_refs.as_slice())
            .context("Failed to mark commits processed")?;

        debug!("Marked {} commits as processed", updated);
        Ok(updated)
    }

    // =========================================================================
    // Post Operations
    // =========================================================================

    /// Create a draft post
    pub fn create_post(&self, new: NewPost) -> Result<Post> {
        let now = Utc::now();
        let tags_json = serde_json::to_string(&new.tags).context("Failed to encode tags")?;
        let ids_json =
            serde_json::to_string(&new.commit_ids).context("Failed to encode commit ids")?;

        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO posts (title, content, summary, tags, status, external_id,
                               published_at, created_at, commit_ids, tokens_used)
            VALUES (?1, ?2, ?3, ?4, 'draft', NULL, NULL, ?5, ?6, ?7)
            "#,
            params![
                new.title,
                new.content,
                new.summary,
                tags_json,
                now.to_rfc3339(),
                ids_json,
                new.tokens_used,
            ],
        )
        .context("Failed to insert post")?;

        let id = conn.last_insert_rowid();
        debug!("Created draft post {} (id {})", new.title, id);

        Ok(Post {
            id,
            title: new.title,
            content: new.content,
            summary: new.summary,
            tags: new.tags,
            status: PostStatus::Draft,
            external_id: None,
            published_at: None,
            created_at: now,
            commit_ids: new.commit_ids,
            tokens_used: new.tokens_used,
        })
    }

    /// Get a post by id
    pub fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let conn = self.conn.lock();
        conn.query_row(
            r#"
            SELECT id, title, content, summary, tags, status, external_id,
                   published_at, created_at, commit_ids, tokens_used
            FROM posts
            WHERE id = ?1
            "#,
            params![id],
            post_from_row,
        )
        .optional()
        .context("Failed to query post")
    }

    /// List all posts, newest first
    pub fn list_posts(&self) -> Result<Vec<Post>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, title, content, summary, tags, status, external_id,
                   published_at, created_at, commit_ids, tokens_used
            FROM posts
            ORDER BY created_at DESC
            "#,
        )?;

        let posts = stmt
            .query_map([], post_from_row)
            .context("Failed to query posts")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect posts")?;

        Ok(posts)
    }

    /// Merge a partial update into a post, returning the updated row
    pub fn update_post(&self, id: i64, patch: PostPatch) -> Result<Option<Post>> {
        {
            let tags_json = match &patch.tags {
                Some(tags) => Some(serde_json::to_string(tags).context("Failed to encode tags")?),
                None => None,
            };

            let conn = self.conn.lock();
            let updated = conn
                .execute(
                    r#"
                    UPDATE posts SET
                        title = COALESCE(?2, title),
                        content = COALESCE(?3, content),
                        summary = COALESCE(?4, summary),
                        tags = COALESCE(?5, tags),
                        status = COALESCE(?6, status),
                        external_id = COALESCE(?7, external_id),
                        published_at = COALESCE(?8, published_at)
                    WHERE id = ?1
                    "#,
                    params![
                        id,
                        patch.title,
                        patch.content,
                        patch.summary,
                        tags_json,
                        patch.status.map(|s| s.as_str()),
                        patch.external_id,
                        patch.published_at.map(|t| t.to_rfc3339()),
                    ],
                )
                .context("Failed to update post")?;

            if updated == 0 {
                return Ok(None);
            }
        }

        self.get_post(id)
    }

    // =========================================================================
    // Bot Config Operations
    // =========================================================================

    /// Read a configuration entry
    pub fn get_config_value(&self, key: &str) -> Result<Option<ConfigEntry>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT key, value, updated_at FROM bot_config WHERE key = ?1",
            params![key],
            |row| {
                Ok(ConfigEntry {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    updated_at: parse_timestamp(row.get::<_, String>(2).ok()),
                })
            },
        )
        .optional()
        .context("Failed to query config value")
    }

    /// Upsert a configuration entry; last write wins
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO bot_config (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = ?2,
                updated_at = ?3
            "#,
            params![key, value, now],
        )
        .context("Failed to upsert config value")?;

        debug!("Set config {} = {}", key, value);
        Ok(())
    }

    /// List every configuration entry
    pub fn list_config_values(&self) -> Result<Vec<ConfigEntry>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT key, value, updated_at FROM bot_config ORDER BY key")?;

        let entries = stmt
            .query_map([], |row| {
                Ok(ConfigEntry {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    updated_at: parse_timestamp(row.get::<_, String>(2).ok()),
                })
            })
            .context("Failed to query config values")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect config values")?;

        Ok(entries)
    }

    // =========================================================================
    // Dashboard Projection
    // =========================================================================

    /// Derived aggregate for the dashboard; nothing here is persisted state
    pub fn dashboard_stats(&self) -> Result<DashboardStats> {
        let week_ago = (Utc::now() - Duration::days(7)).to_rfc3339();
        let conn = self.conn.lock();

        let active_repositories: i64 = conn.query_row(
            "SELECT COUNT(*) FROM repositories WHERE is_active = 1",
            [],
            |row| row.get(0),
        )?;
        let commits_last_week: i64 = conn.query_row(
            "SELECT COUNT(*) FROM commits WHERE authored_at >= ?1",
            params![week_ago],
            |row| row.get(0),
        )?;
        let published_posts: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE status = 'published'",
            [],
            |row| row.get(0),
        )?;
        let total_tokens_used: i64 = conn.query_row(
            "SELECT COALESCE(SUM(tokens_used), 0) FROM posts",
            [],
            |row| row.get(0),
        )?;

        Ok(DashboardStats {
            active_repositories,
            commits_last_week,
            published_posts,
            total_tokens_used,
        })
    }
}

// Row mapping helpers

fn parse_timestamp(raw: Option<String>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

fn parse_optional_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn repo_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Repository> {
    Ok(Repository {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        is_active: row.get::<_, i32>(4)? != 0,
        last_sync_at: parse_optional_timestamp(row.get::<_, Option<String>>(5)?),
        created_at: parse_timestamp(row.get::<_, String>(6).ok()),
    })
}

fn commit_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Commit> {
    Ok(Commit {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        sha: row.get(2)?,
        message: row.get(3)?,
        author_name: row.get(4)?,
        author_email: row.get(5)?,
        authored_at: parse_timestamp(row.get::<_, String>(6).ok()),
        additions: row.get(7)?,
        deletions: row.get(8)?,
        changed_files: row.get(9)?,
        url: row.get(10)?,
        processed: row.get::<_, i32>(11)? != 0,
    })
}

fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let tags: Vec<String> = row
        .get::<_, Option<String>>(4)?
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default();
    let commit_ids: Vec<i64> = row
        .get::<_, Option<String>>(9)?
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default();

    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        summary: row.get(3)?,
        tags,
        status: PostStatus::parse(&row.get::<_, String>(5).unwrap_or_default()),
        external_id: row.get(6)?,
        published_at: parse_optional_timestamp(row.get::<_, Option<String>>(7)?),
        created_at: parse_timestamp(row.get::<_, String>(8).ok()),
        commit_ids,
        tokens_used: row.get(10)?,
    })
}
