//! HTTP API for the dashboard
//!
//! A thin axum layer over the store, the sync engine and the external
//! collaborator traits. All endpoints speak JSON; errors are rendered as
//! `{"error": "..."}` with a non-2xx status. A sync that partially failed is
//! still a 200 with an `errors` array; callers must check it.

pub mod error;
pub mod handlers;

use anyhow::Result;
use axum::{
    http::{header, Method},
    routing::{delete, get, patch, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::checkpoint::CheckpointManager;
use crate::github::CommitSource;
use crate::publisher::Publisher;
use crate::store::Store;
use crate::summarizer::Summarizer;
use crate::sync::SyncEngine;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub engine: Arc<SyncEngine>,
    pub source: Arc<dyn CommitSource>,
    pub checkpoints: Arc<CheckpointManager>,
    /// Absent when the language-model provider is not configured
    pub summarizer: Option<Arc<dyn Summarizer>>,
    /// Absent when publishing is disabled
    pub publisher: Option<Arc<dyn Publisher>>,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        engine: Arc<SyncEngine>,
        source: Arc<dyn CommitSource>,
        summarizer: Option<Arc<dyn Summarizer>>,
        publisher: Option<Arc<dyn Publisher>>,
    ) -> Self {
        let checkpoints = Arc::new(CheckpointManager::new(Arc::clone(&store)));
        Self {
            store,
            engine,
            source,
            checkpoints,
            summarizer,
            publisher,
        }
    }
}

/// Build the axum router with all routes
pub fn build_router(state: AppState, cors_permissive: bool) -> Router {
    let cors = if cors_permissive {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
    };

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        .route("/repositories", get(handlers::list_repositories))
        .route("/repositories", post(handlers::create_repository))
        .route("/repositories/{id}", delete(handlers::delete_repository))
        .route("/commits", get(handlers::list_commits))
        .route("/sync", post(handlers::trigger_sync))
        .route("/generate-summary", post(handlers::generate_summary))
        .route("/enhance-content", post(handlers::enhance_content))
        .route("/blog-posts", get(handlers::list_posts))
        .route("/blog-posts", post(handlers::create_post))
        .route("/blog-posts/{id}", patch(handlers::update_post))
        .route("/publish/{id}", post(handlers::publish_post))
        .route("/config", get(handlers::list_config))
        .route("/config", post(handlers::set_config));

    Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the web server; blocks until shutdown
pub async fn run_server(state: AppState, host: &str, port: u16, cors_permissive: bool) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let app = build_router(state, cors_permissive);

    tracing::info!("Dashboard API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{CommitSummary, MockCommitSource};
    use crate::publisher::{MockPublisher, PublishOutcome};
    use crate::store::{NewPost, NewRepository, PostStatus, Store};
    use crate::summarizer::{DevSummary, MockSummarizer};
    use crate::sync::SyncSettings;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use chrono::Utc;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn state_with(
        source: MockCommitSource,
        summarizer: Option<MockSummarizer>,
        publisher: Option<MockPublisher>,
    ) -> AppState {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let source: Arc<dyn CommitSource> = Arc::new(source);
        let engine = Arc::new(SyncEngine::new(
            Arc::clone(&store),
            Arc::clone(&source),
            SyncSettings::default(),
        ));
        AppState::new(
            store,
            engine,
            source,
            summarizer.map(|s| Arc::new(s) as Arc<dyn Summarizer>),
            publisher.map(|p| Arc::new(p) as Arc<dyn Publisher>),
        )
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let state = state_with(MockCommitSource::new(), None, None);
        let app = build_router(state, true);

        let response = app.oneshot(get("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json.get("status").and_then(|v| v.as_str()), Some("ok"));
    }

    #[tokio::test]
    async fn test_create_repository_validates_upstream() {
        let mut source = MockCommitSource::new();
        source
            .expect_repository_exists()
            .returning(|_, name| Ok(name == "widgets"));

        let state = state_with(source, None, None);
        let app = build_router(state, true);

        // Known upstream: created
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/repositories",
                serde_json::json!({ "owner": "acme", "name": "widgets" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json.get("owner").and_then(|v| v.as_str()), Some("acme"));
        assert!(json.get("id").is_some());

        // Duplicate registration rejected
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/repositories",
                serde_json::json!({ "owner": "acme", "name": "widgets" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        // Unknown upstream rejected
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/repositories",
                serde_json::json!({ "owner": "acme", "name": "ghost" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json.get("error").is_some());
    }

    #[tokio::test]
    async fn test_create_repository_requires_owner_and_name() {
        let state = state_with(MockCommitSource::new(), None, None);
        let app = build_router(state, true);

        let response = app
            .oneshot(post_json(
                "/api/repositories",
                serde_json::json!({ "owner": "", "name": "" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_repository() {
        let state = state_with(MockCommitSource::new(), None, None);
        let repo = state
            .store
            .create_repository(NewRepository {
                owner: "acme".to_string(),
                name: "widgets".to_string(),
                description: None,
                is_active: None,
            })
            .unwrap();
        let app = build_router(state, true);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri(format!("/api/repositories/{}", repo.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/api/repositories/9999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sync_endpoint_reports_partial_failure_as_200() {
        let mut source = MockCommitSource::new();
        source
            .expect_list_commits_since()
            .returning(|_, name, _| match name {
                "broken" => Err(crate::github::FetchError::Api {
                    status: 500,
                    message: "down".to_string(),
                }),
                _ => Ok(vec![CommitSummary {
                    sha: "aaa".to_string(),
                    message: "m".to_string(),
                    author_name: "Dev".to_string(),
                    author_email: None,
                    authored_at: Utc::now(),
                    url: None,
                }]),
            });
        source.expect_commit_detail().returning(|_, _, sha| {
            Ok(crate::github::CommitDetail {
                sha: sha.to_string(),
                message: "m".to_string(),
                author_name: "Dev".to_string(),
                author_email: None,
                authored_at: Utc::now(),
                url: None,
                additions: 1,
                deletions: 0,
                changed_files: 1,
            })
        });

        let state = state_with(source, None, None);
        for name in ["healthy", "broken"] {
            state
                .store
                .create_repository(NewRepository {
                    owner: "acme".to_string(),
                    name: name.to_string(),
                    description: None,
                    is_active: Some(true),
                })
                .unwrap();
        }
        let app = build_router(state, true);

        let response = app
            .oneshot(post_json("/api/sync", serde_json::json!({})))
            .await
            .unwrap();

        // Partial failure is still a 200; callers check the errors array
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["new_commits"], 1);
        assert_eq!(json["repositories_processed"], 2);
        assert_eq!(json["errors"].as_array().unwrap().len(), 1);
        assert_eq!(json["errors"][0]["repository"], "acme/broken");
    }

    #[tokio::test]
    async fn test_commits_endpoint_respects_limit() {
        let state = state_with(MockCommitSource::new(), None, None);
        for i in 0..5 {
            state
                .store
                .create_commit(crate::store::NewCommit {
                    repository_id: None,
                    sha: format!("sha{}", i),
                    message: "m".to_string(),
                    author_name: "Dev".to_string(),
                    author_email: None,
                    authored_at: Utc::now(),
                    additions: 0,
                    deletions: 0,
                    changed_files: 0,
                    url: None,
                })
                .unwrap();
        }
        let app = build_router(state, true);

        let response = app.oneshot(get("/api/commits?limit=3")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["commits"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_generate_summary_creates_draft() {
        let mut summarizer = MockSummarizer::new();
        summarizer.expect_generate().returning(|_, _| {
            Ok(DevSummary {
                title: "Widgets week".to_string(),
                content: "We shipped widgets.".to_string(),
                summary: None,
                tags: vec!["dev".to_string()],
                tokens_used: 128,
            })
        });

        let state = state_with(MockCommitSource::new(), Some(summarizer), None);
        state
            .store
            .create_commit(crate::store::NewCommit {
                repository_id: None,
                sha: "aaa".to_string(),
                message: "m".to_string(),
                author_name: "Dev".to_string(),
                author_email: None,
                authored_at: Utc::now(),
                additions: 0,
                deletions: 0,
                changed_files: 0,
                url: None,
            })
            .unwrap();
        let app = build_router(state.clone(), true);

        let since = (Utc::now() - chrono::Duration::days(7)).to_rfc3339();
        let response = app
            .oneshot(post_json(
                "/api/generate-summary",
                serde_json::json!({ "sinceDate": since }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["title"], "Widgets week");
        assert_eq!(json["status"], "draft");
        assert_eq!(json["tokens_used"], 128);

        let posts = state.store.list_posts().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].commit_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_generate_summary_without_commits_is_rejected() {
        let summarizer = MockSummarizer::new();
        let state = state_with(MockCommitSource::new(), Some(summarizer), None);
        let app = build_router(state, true);

        let since = (Utc::now() - chrono::Duration::days(7)).to_rfc3339();
        let response = app
            .oneshot(post_json(
                "/api/generate-summary",
                serde_json::json!({ "since_date": since }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_publish_marks_exactly_included_commits() {
        let mut publisher = MockPublisher::new();
        publisher.expect_publish().returning(|_| {
            PublishOutcome::succeeded("net-123".to_string(), None)
        });

        let state = state_with(MockCommitSource::new(), None, Some(publisher));

        // Four stored commits; the post includes three of them
        let mut ids = Vec::new();
        for i in 0..4 {
            let commit = state
                .store
                .create_commit(crate::store::NewCommit {
                    repository_id: None,
                    sha: format!("sha{}", i),
                    message: "m".to_string(),
                    author_name: "Dev".to_string(),
                    author_email: None,
                    authored_at: Utc::now(),
                    additions: 0,
                    deletions: 0,
                    changed_files: 0,
                    url: None,
                })
                .unwrap();
            ids.push(commit.id);
        }
        let post = state
            .store
            .create_post(NewPost {
                title: "t".to_string(),
                content: "c".to_string(),
                summary: None,
                tags: vec![],
                commit_ids: ids[..3].to_vec(),
                tokens_used: 0,
            })
            .unwrap();

        let app = build_router(state.clone(), true);
        let response = app
            .oneshot(post_json(
                &format!("/api/publish/{}", post.id),
                serde_json::json!({}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["post_id"], "net-123");

        // Exactly the included commits flipped
        for (i, id) in ids.iter().enumerate() {
            let commit = state
                .store
                .get_commit_by_sha(&format!("sha{}", i))
                .unwrap()
                .unwrap();
            assert_eq!(commit.id, *id);
            assert_eq!(commit.processed, i < 3);
        }

        let published = state.store.get_post(post.id).unwrap().unwrap();
        assert_eq!(published.status, PostStatus::Published);
        assert_eq!(published.external_id.as_deref(), Some("net-123"));
        assert!(published.published_at.is_some());
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_draft() {
        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .returning(|_| PublishOutcome::failed("network unavailable"));

        let state = state_with(MockCommitSource::new(), None, Some(publisher));
        let post = state
            .store
            .create_post(NewPost {
                title: "t".to_string(),
                content: "c".to_string(),
                summary: None,
                tags: vec![],
                commit_ids: vec![],
                tokens_used: 0,
            })
            .unwrap();

        let app = build_router(state.clone(), true);
        let response = app
            .oneshot(post_json(
                &format!("/api/publish/{}", post.id),
                serde_json::json!({}),
            ))
            .await
            .unwrap();

        // Failure is a structured result, not an HTTP error
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "network unavailable");

        let draft = state.store.get_post(post.id).unwrap().unwrap();
        assert_eq!(draft.status, PostStatus::Draft);
    }

    #[tokio::test]
    async fn test_publish_never_regresses() {
        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .returning(|_| PublishOutcome::succeeded("net-1".to_string(), None));

        let state = state_with(MockCommitSource::new(), None, Some(publisher));
        let post = state
            .store
            .create_post(NewPost {
                title: "t".to_string(),
                content: "c".to_string(),
                summary: None,
                tags: vec![],
                commit_ids: vec![],
                tokens_used: 0,
            })
            .unwrap();

        let app = build_router(state.clone(), true);
        let first = app
            .clone()
            .oneshot(post_json(
                &format!("/api/publish/{}", post.id),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(post_json(
                &format!("/api/publish/{}", post.id),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_publish_missing_post_is_404() {
        let publisher = MockPublisher::new();
        let state = state_with(MockCommitSource::new(), None, Some(publisher));
        let app = build_router(state, true);

        let response = app
            .oneshot(post_json("/api/publish/9999", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_config_roundtrip() {
        let state = state_with(MockCommitSource::new(), None, None);
        let app = build_router(state, true);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/config",
                serde_json::json!({ "key": "post_frequency", "value": "weekly" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/api/config")).await.unwrap();
        let json = body_json(response).await;
        let entries = json["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["key"], "post_frequency");
        assert_eq!(entries[0]["value"], "weekly");
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let state = state_with(MockCommitSource::new(), None, None);
        let app = build_router(state, true);

        let response = app.oneshot(get("/api/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["active_repositories"], 0);
        assert_eq!(json["published_posts"], 0);
        assert!(json.get("last_checked").is_some());
    }
}
