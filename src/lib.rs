//! Commitpress - Commit Monitoring and AI Dev-Blogging Assistant
//!
//! Commitpress polls registered source repositories for new commits, stores
//! them durably, asks a language model to synthesize a human-readable
//! development summary, and optionally publishes that summary as a post to
//! an external social network. A small HTTP API drives the dashboard.
//!
//! ## Core Features
//!
//! - **Incremental Sync**: Per-repository checkpoints bound each fetch
//!   window; content hashes deduplicate overlapping windows
//! - **Partial-Failure Isolation**: One repository's outage never blocks
//!   the rest of a sync pass
//! - **AI Summaries**: Commit windows become draft blog posts via a
//!   language-model provider
//! - **Publishing**: Drafts go out to the configured network with
//!   collision-safe permalinks
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`store`]: Durable storage for repositories, commits and posts
//! - [`sync`]: The synchronization and deduplication pipeline
//! - [`github`]: Commit-history provider boundary
//! - [`web`]: Dashboard HTTP API

pub mod checkpoint;
pub mod config;
pub mod github;
pub mod health;
pub mod publisher;
pub mod store;
pub mod summarizer;
pub mod sync;
pub mod web;

pub use checkpoint::CheckpointManager;
pub use config::Config;
pub use github::{CommitSource, FetchError, GitHubCommitSource};
pub use health::HealthCheck;
pub use publisher::{NetworkPublisher, Publisher, PublishOutcome};
pub use store::Store;
pub use summarizer::{ChatSummarizer, Summarizer};
pub use sync::{CheckpointPolicy, SyncEngine, SyncReport, SyncSettings};
