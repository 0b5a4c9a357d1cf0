//! Request handlers for the HTTP API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use super::error::WebError;
use super::AppState;
use crate::publisher::{PostSubmission, PublishOutcome};
use crate::store::{
    Commit, ConfigEntry, DashboardStats, NewPost, NewRepository, Post, PostPatch, PostStatus,
    Repository,
};
use crate::summarizer::{RepoCommits, TimeRange};
use crate::sync::{SyncError, SyncReport};

// ---------------------------------------------------------------------------
// Health and stats
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    stats: DashboardStats,
    /// Global checkpoint; display-only
    last_checked: Option<DateTime<Utc>>,
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, WebError> {
    let stats = state.store.dashboard_stats()?;
    let last_checked = state.checkpoints.global()?;

    Ok(Json(StatsResponse {
        stats,
        last_checked,
    }))
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ListRepositoriesResponse {
    repositories: Vec<Repository>,
}

pub async fn list_repositories(
    State(state): State<AppState>,
) -> Result<Json<ListRepositoriesResponse>, WebError> {
    let repositories = state.store.list_repositories()?;
    Ok(Json(ListRepositoriesResponse { repositories }))
}

pub async fn create_repository(
    State(state): State<AppState>,
    Json(req): Json<NewRepository>,
) -> Result<(StatusCode, Json<Repository>), WebError> {
    if req.owner.is_empty() || req.name.is_empty() {
        return Err(WebError::BadRequest(
            "Repository owner and name are required".to_string(),
        ));
    }

    if state
        .store
        .get_repository_by_owner_name(&req.owner, &req.name)?
        .is_some()
    {
        return Err(WebError::Conflict(format!(
            "Repository {}/{} is already registered",
            req.owner, req.name
        )));
    }

    // Validate upstream existence once, at registration time
    let exists = state
        .source
        .repository_exists(&req.owner, &req.name)
        .await
        .map_err(|e| WebError::Upstream(e.to_string()))?;
    if !exists {
        return Err(WebError::BadRequest(format!(
            "Repository {}/{} does not exist on the source",
            req.owner, req.name
        )));
    }

    let repo = state.store.create_repository(req)?;
    info!("Registered repository {}", repo.full_name());

    Ok((StatusCode::CREATED, Json(repo)))
}

pub async fn delete_repository(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, WebError> {
    if state.store.delete_repository(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(WebError::NotFound(format!("Repository {} not found", id)))
    }
}

// ---------------------------------------------------------------------------
// Commits
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CommitsQuery {
    limit: Option<u32>,
}

#[derive(Serialize)]
pub struct ListCommitsResponse {
    commits: Vec<Commit>,
}

pub async fn list_commits(
    State(state): State<AppState>,
    Query(query): Query<CommitsQuery>,
) -> Result<Json<ListCommitsResponse>, WebError> {
    let limit = query.limit.unwrap_or(50).min(500);
    let commits = state.store.list_recent_commits(limit)?;
    Ok(Json(ListCommitsResponse { commits }))
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

pub async fn trigger_sync(State(state): State<AppState>) -> Result<Json<SyncReport>, WebError> {
    match state.engine.run_sync().await {
        Ok(report) => Ok(Json(report)),
        Err(SyncError::AlreadyRunning) => {
            Err(WebError::Conflict("A sync is already running".to_string()))
        }
        Err(SyncError::Setup(err)) => Err(WebError::Internal(format!("{:#}", err))),
    }
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct GenerateSummaryRequest {
    #[serde(alias = "sinceDate")]
    since_date: DateTime<Utc>,
}

pub async fn generate_summary(
    State(state): State<AppState>,
    Json(req): Json<GenerateSummaryRequest>,
) -> Result<(StatusCode, Json<Post>), WebError> {
    let summarizer = state
        .summarizer
        .as_ref()
        .ok_or_else(|| WebError::BadRequest("Summarizer is not configured".to_string()))?;

    let commits = state.store.get_commits_since(req.since_date, None)?;
    if commits.is_empty() {
        return Err(WebError::BadRequest(
            "No commits in the requested window".to_string(),
        ));
    }

    let commit_ids: Vec<i64> = commits.iter().map(|c| c.id).collect();
    let groups = group_by_repository(&state, commits)?;
    let range = TimeRange {
        start: req.since_date,
        end: Utc::now(),
    };

    let summary = summarizer
        .generate(&groups, range)
        .await
        .map_err(|e| WebError::Upstream(format!("{:#}", e)))?;

    let post = state.store.create_post(NewPost {
        title: summary.title,
        content: summary.content,
        summary: summary.summary,
        tags: summary.tags,
        commit_ids,
        tokens_used: summary.tokens_used,
    })?;

    info!("Generated draft post {} ({} tokens)", post.id, post.tokens_used);
    Ok((StatusCode::CREATED, Json(post)))
}

#[derive(Deserialize)]
pub struct EnhanceContentRequest {
    content: String,
    instructions: String,
}

#[derive(Serialize)]
pub struct EnhanceContentResponse {
    content: String,
    tokens_used: i64,
}

pub async fn enhance_content(
    State(state): State<AppState>,
    Json(req): Json<EnhanceContentRequest>,
) -> Result<Json<EnhanceContentResponse>, WebError> {
    let summarizer = state
        .summarizer
        .as_ref()
        .ok_or_else(|| WebError::BadRequest("Summarizer is not configured".to_string()))?;

    let enhanced = summarizer
        .enhance(&req.content, &req.instructions)
        .await
        .map_err(|e| WebError::Upstream(format!("{:#}", e)))?;

    Ok(Json(EnhanceContentResponse {
        content: enhanced.content,
        tokens_used: enhanced.tokens_used,
    }))
}

/// Group a commit window by owning repository for the prompt
fn group_by_repository(
    state: &AppState,
    commits: Vec<Commit>,
) -> Result<Vec<RepoCommits>, WebError> {
    let names: HashMap<i64, String> = state
        .store
        .list_repositories()?
        .into_iter()
        .map(|r| (r.id, r.full_name()))
        .collect();

    let mut grouped: HashMap<String, Vec<Commit>> = HashMap::new();
    for commit in commits {
        let key = commit
            .repository_id
            .and_then(|id| names.get(&id).cloned())
            .unwrap_or_else(|| "unknown".to_string());
        grouped.entry(key).or_default().push(commit);
    }

    let mut groups: Vec<RepoCommits> = grouped
        .into_iter()
        .map(|(repository, commits)| RepoCommits {
            repository,
            commits,
        })
        .collect();
    groups.sort_by(|a, b| a.repository.cmp(&b.repository));

    Ok(groups)
}

// ---------------------------------------------------------------------------
// Blog posts
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ListPostsResponse {
    posts: Vec<Post>,
}

pub async fn list_posts(State(state): State<AppState>) -> Result<Json<ListPostsResponse>, WebError> {
    let posts = state.store.list_posts()?;
    Ok(Json(ListPostsResponse { posts }))
}

pub async fn create_post(
    State(state): State<AppState>,
    Json(req): Json<NewPost>,
) -> Result<(StatusCode, Json<Post>), WebError> {
    if req.title.is_empty() {
        return Err(WebError::BadRequest("Post title is required".to_string()));
    }

    let post = state.store.create_post(req)?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<PostPatch>,
) -> Result<Json<Post>, WebError> {
    let post = state
        .store
        .update_post(id, patch)?
        .ok_or_else(|| WebError::NotFound(format!("Post {} not found", id)))?;
    Ok(Json(post))
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

pub async fn publish_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PublishOutcome>, WebError> {
    let publisher = state
        .publisher
        .as_ref()
        .ok_or_else(|| WebError::BadRequest("Publishing is not configured".to_string()))?;

    let post = state
        .store
        .get_post(id)?
        .ok_or_else(|| WebError::NotFound(format!("Post {} not found", id)))?;

    // draft -> published happens exactly once
    if post.status == PostStatus::Published {
        return Err(WebError::Conflict(format!(
            "Post {} is already published",
            id
        )));
    }

    let outcome = publisher
        .publish(&PostSubmission {
            title: post.title.clone(),
            content: post.content.clone(),
            tags: post.tags.clone(),
        })
        .await;

    if outcome.success {
        state.store.update_post(
            id,
            PostPatch {
                status: Some(PostStatus::Published),
                external_id: outcome.post_id.clone(),
                published_at: Some(Utc::now()),
                ..Default::default()
            },
        )?;
        state.store.mark_commits_processed(&post.commit_ids)?;
        info!("Published post {} as {:?}", id, outcome.post_id);
    } else {
        // The draft is untouched; the caller sees the specific reason
        info!("Publish failed for post {}: {:?}", id, outcome.error);
    }

    Ok(Json(outcome))
}

// ---------------------------------------------------------------------------
// Bot config
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ListConfigResponse {
    entries: Vec<ConfigEntry>,
}

pub async fn list_config(
    State(state): State<AppState>,
) -> Result<Json<ListConfigResponse>, WebError> {
    let entries = state.store.list_config_values()?;
    Ok(Json(ListConfigResponse { entries }))
}

#[derive(Deserialize)]
pub struct SetConfigRequest {
    key: String,
    value: String,
}

pub async fn set_config(
    State(state): State<AppState>,
    Json(req): Json<SetConfigRequest>,
) -> Result<Json<ConfigEntry>, WebError> {
    if req.key.is_empty() {
        return Err(WebError::BadRequest("Config key is required".to_string()));
    }

    state.store.set_config_value(&req.key, &req.value)?;
    let entry = state
        .store
        .get_config_value(&req.key)?
        .ok_or_else(|| WebError::Internal("Config entry vanished after write".to_string()))?;

    Ok(Json(entry))
}
