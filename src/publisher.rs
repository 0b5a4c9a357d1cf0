//! Publisher - writes finished posts to the external publishing network
//!
//! The network is consumed through the [`Publisher`] trait. Publishing never
//! fails the caller with an error: every attempt resolves to a
//! [`PublishOutcome`] value so the dashboard can show the user a specific
//! reason without losing the drafted post.

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PublishingConfig;

/// A finished post, ready for the network
#[derive(Debug, Clone)]
pub struct PostSubmission {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// Result value of a publish attempt
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub success: bool,
    pub post_id: Option<String>,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl PublishOutcome {
    pub fn succeeded(post_id: String, url: Option<String>) -> Self {
        Self {
            success: true,
            post_id: Some(post_id),
            url,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            post_id: None,
            url: None,
            error: Some(error.into()),
        }
    }
}

/// External publishing network contract
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a post. Always resolves to an outcome, never an error.
    async fn publish(&self, post: &PostSubmission) -> PublishOutcome;
}

/// HTTP publisher for the configured network
pub struct NetworkPublisher {
    http: reqwest::Client,
    endpoint: String,
    network: String,
}

// Network wire shapes

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    title: &'a str,
    content: &'a str,
    tags: &'a [String],
    permlink: String,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    id: Option<String>,
    url: Option<String>,
    error: Option<String>,
}

const MAX_SLUG_LEN: usize = 40;
const MAX_SLUG_ATTEMPTS: u32 = 5;

impl NetworkPublisher {
    pub fn from_config(config: &PublishingConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            network: config.network.clone(),
        }
    }

    /// Construct against an explicit endpoint (tests)
    pub fn with_endpoint(endpoint: &str, network: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            network: network.to_string(),
        }
    }

    async fn attempt(&self, post: &PostSubmission, permlink: String) -> Result<PublishOutcome, SlugCollision> {
        let request = PublishRequest {
            title: &post.title,
            content: &post.content,
            tags: &post.tags,
            permlink,
        };

        let response = match self
            .http
            .post(format!("{}/posts", self.endpoint))
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                return Ok(PublishOutcome::failed(format!(
                    "Could not reach {}: {}",
                    self.network, err
                )))
            }
        };

        let status = response.status();
        if status.as_u16() == 409 {
            // Permlink taken on the network: retry with a fresh suffix
            return Err(SlugCollision);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(PublishOutcome::failed(format!(
                "{} returned {}: {}",
                self.network, status, body
            )));
        }

        match response.json::<PublishResponse>().await {
            Ok(parsed) => {
                if let Some(error) = parsed.error {
                    Ok(PublishOutcome::failed(error))
                } else if let Some(id) = parsed.id {
                    Ok(PublishOutcome::succeeded(id, parsed.url))
                } else {
                    Ok(PublishOutcome::failed(format!(
                        "{} accepted the post but returned no identifier",
                        self.network
                    )))
                }
            }
            Err(err) => Ok(PublishOutcome::failed(format!(
                "Unreadable response from {}: {}",
                self.network, err
            ))),
        }
    }
}

struct SlugCollision;

#[async_trait]
impl Publisher for NetworkPublisher {
    async fn publish(&self, post: &PostSubmission) -> PublishOutcome {
        for attempt in 0..MAX_SLUG_ATTEMPTS {
            let permlink = make_permlink(&post.title, attempt);
            debug!("Publishing '{}' as {}", post.title, permlink);

            match self.attempt(post, permlink).await {
                Ok(outcome) => return outcome,
                Err(SlugCollision) => {
                    warn!("Permlink collision for '{}', retrying", post.title);
                    continue;
                }
            }
        }

        PublishOutcome::failed(format!(
            "Could not find a free permlink after {} attempts",
            MAX_SLUG_ATTEMPTS
        ))
    }
}

/// Derive a URL-safe permlink: normalized, truncated title plus a coarse
/// timestamp; the attempt counter keeps retries distinct. The network is the
/// final authority on uniqueness.
fn make_permlink(title: &str, attempt: u32) -> String {
    let non_alnum = Regex::new(r"[^a-z0-9]+").expect("static pattern");

    let mut slug = non_alnum
        .replace_all(&title.to_lowercase(), "-")
        .trim_matches('-')
        .to_string();
    if slug.is_empty() {
        slug = "post".to_string();
    }
    slug.truncate(MAX_SLUG_LEN);
    let slug = slug.trim_end_matches('-');

    let stamp = format!("{:x}", Utc::now().timestamp());
    if attempt == 0 {
        format!("{}-{}", slug, stamp)
    } else {
        format!("{}-{}-{}", slug, stamp, attempt)
    }
}
