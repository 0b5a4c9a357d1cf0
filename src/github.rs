//! GitHub commit-history client with authentication management
//!
//! The external history provider is consumed only through the [`CommitSource`]
//! trait; the GitHub implementation deserializes every response into explicit
//! DTO structs at the boundary and converts them to crate types, defaulting
//! missing fields, so nothing downstream ever branches on loose payloads.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use std::env;
use std::process::Command;
use tracing::{debug, warn};

use crate::config::GitHubConfig;

/// Typed failure of a history-provider call
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

/// One commit as returned by the list endpoint (no diff stats)
#[derive(Debug, Clone, PartialEq)]
pub struct CommitSummary {
    pub sha: String,
    pub message: String,
    pub author_name: String,
    pub author_email: Option<String>,
    pub authored_at: DateTime<Utc>,
    pub url: Option<String>,
}

/// One commit with full detail (diff stats included)
#[derive(Debug, Clone, PartialEq)]
pub struct CommitDetail {
    pub sha: String,
    pub message: String,
    pub author_name: String,
    pub author_email: Option<String>,
    pub authored_at: DateTime<Utc>,
    pub url: Option<String>,
    pub additions: i64,
    pub deletions: i64,
    pub changed_files: i64,
}

/// External commit-history provider contract
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Commits newer than `since`, in the order returned by the source
    async fn list_commits_since(
        &self,
        owner: &str,
        name: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CommitSummary>, FetchError>;

    /// Full detail for one commit, including diff statistics
    async fn commit_detail(
        &self,
        owner: &str,
        name: &str,
        sha: &str,
    ) -> Result<CommitDetail, FetchError>;

    /// Whether the repository exists upstream; checked once at registration
    async fn repository_exists(&self, owner: &str, name: &str) -> Result<bool, FetchError>;
}

/// GitHub authentication strategies
#[derive(Debug, Clone)]
pub enum AuthStrategy {
    /// Token taken from the configuration file
    ConfigToken,
    /// Use GitHub CLI authentication
    GitHubCli,
    /// Use environment variable token
    EnvironmentToken,
}

/// GitHub-backed commit source
pub struct GitHubCommitSource {
    client: Octocrab,
}

// Wire shapes, deserialized verbatim then converted. Field presence varies
// across GitHub deployments, so everything but the sha is optional.

#[derive(Debug, Deserialize)]
struct CommitItemDto {
    sha: String,
    commit: Option<CommitInfoDto>,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommitInfoDto {
    message: Option<String>,
    author: Option<CommitAuthorDto>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthorDto {
    name: Option<String>,
    email: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CommitDetailDto {
    sha: String,
    commit: Option<CommitInfoDto>,
    html_url: Option<String>,
    stats: Option<CommitStatsDto>,
    files: Option<Vec<CommitFileDto>>,
}

#[derive(Debug, Deserialize)]
struct CommitStatsDto {
    additions: Option<i64>,
    deletions: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CommitFileDto {
    #[allow(dead_code)]
    filename: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListCommitsQuery {
    since: String,
    per_page: u32,
    page: u32,
}

const COMMITS_PER_PAGE: u32 = 100;
const MAX_PAGES: u32 = 50;

impl GitHubCommitSource {
    /// Create a new source with automatic authentication
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let (auth_strategy, token) = Self::detect_authentication(config)?;

        debug!("Using authentication strategy: {:?}", auth_strategy);

        let mut builder = Octocrab::builder().personal_token(token);
        if let Some(api_base) = &config.api_base {
            builder = builder
                .base_uri(api_base.clone())
                .context("Invalid GitHub API base URI")?;
        }

        let client = builder.build().context("Failed to create GitHub client")?;

        Ok(Self { client })
    }

    /// Wrap an existing client (tests, custom setups)
    pub fn with_client(client: Octocrab) -> Self {
        Self { client }
    }

    /// Detect and obtain GitHub authentication
    fn detect_authentication(config: &GitHubConfig) -> Result<(AuthStrategy, String)> {
        match config.auth_method.as_str() {
            "auto" => {
                // Config token first, then environment, then GitHub CLI
                if let Some(token) = config.token.clone().filter(|t| !t.is_empty()) {
                    Ok((AuthStrategy::ConfigToken, token))
                } else if let Ok(token) = Self::try_environment_token() {
                    Ok((AuthStrategy::EnvironmentToken, token))
                } else if let Ok(token) = Self::try_github_cli() {
                    Ok((AuthStrategy::GitHubCli, token))
                } else {
                    Err(anyhow!(
                        "No GitHub authentication found. Please either:\n\
                         1. Set github.token in the configuration file\n\
                         2. Set GITHUB_TOKEN environment variable\n\
                         3. Install and authenticate GitHub CLI: gh auth login"
                    ))
                }
            }
            "token" => {
                if let Some(token) = config.token.clone().filter(|t| !t.is_empty()) {
                    Ok((AuthStrategy::ConfigToken, token))
                } else {
                    let token = Self::try_environment_token()
                        .context("GITHUB_TOKEN environment variable not found or invalid")?;
                    Ok((AuthStrategy::EnvironmentToken, token))
                }
            }
            "gh_cli" => {
                let token = Self::try_github_cli()
                    .context("GitHub CLI authentication failed. Run: gh auth login")?;
                Ok((AuthStrategy::GitHubCli, token))
            }
            other => Err(anyhow!("Unknown auth method: {}", other)),
        }
    }

    /// Try to get token from GitHub CLI
    fn try_github_cli() -> Result<String> {
        debug!("Attempting GitHub CLI authentication");

        if !Self::is_command_available("gh") {
            return Err(anyhow!("GitHub CLI (gh) is not installed"));
        }

        let auth_status = Command::new("gh")
            .args(["auth", "status"])
            .output()
            .context("Failed to check GitHub CLI auth status")?;

        if !auth_status.status.success() {
            return Err(anyhow!(
                "GitHub CLI is not authenticated. Run: gh auth login"
            ));
        }

        let token_output = Command::new("gh")
            .args(["auth", "token"])
            .output()
            .context("Failed to get GitHub CLI token")?;

        if !token_output.status.success() {
            return Err(anyhow!(
                "Failed to retrieve token from GitHub CLI: {}",
                String::from_utf8_lossy(&token_output.stderr)
            ));
        }

        let token = String::from_utf8(token_output.stdout)
            .context("GitHub CLI token is not valid UTF-8")?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(anyhow!("GitHub CLI returned empty token"));
        }

        debug!("Successfully obtained token from GitHub CLI");
        Ok(token)
    }

    /// Try to get token from environment variable
    fn try_environment_token() -> Result<String> {
        debug!("Attempting environment variable authentication");

        let token =
            env::var("GITHUB_TOKEN").context("GITHUB_TOKEN environment variable not set")?;

        if token.is_empty() {
            return Err(anyhow!("GITHUB_TOKEN is empty"));
        }

        if !token.starts_with("ghp_") && !token.starts_with("gho_") && !token.starts_with("ghs_") {
            warn!("GITHUB_TOKEN doesn't look like a valid GitHub token (should start with ghp_, gho_, or ghs_)");
        }

        Ok(token)
    }

    /// Check if a command is available in PATH
    fn is_command_available(command: &str) -> bool {
        Command::new("which")
            .arg(command)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl CommitSource for GitHubCommitSource {
    async fn list_commits_since(
        &self,
        owner: &str,
        name: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CommitSummary>, FetchError> {
        debug!("Listing commits for {}/{} since {}", owner, name, since);

        let route = format!("/repos/{}/{}/commits", owner, name);
        let mut commits = Vec::new();
        let mut page = 1u32;

        loop {
            let query = ListCommitsQuery {
                since: since.to_rfc3339(),
                per_page: COMMITS_PER_PAGE,
                page,
            };

            let items: Vec<CommitItemDto> = self
                .client
                .get(&route, Some(&query))
                .await
                .map_err(map_octocrab_error)?;

            let batch_len = items.len();
            commits.extend(items.into_iter().map(convert_summary));

            if batch_len < COMMITS_PER_PAGE as usize {
                break;
            }
            if page >= MAX_PAGES {
                warn!(
                    "Reached maximum pagination limit ({} pages) for {}/{}",
                    MAX_PAGES, owner, name
                );
                break;
            }
            page += 1;
        }

        debug!("Found {} commits for {}/{}", commits.len(), owner, name);
        Ok(commits)
    }

    async fn commit_detail(
        &self,
        owner: &str,
        name: &str,
        sha: &str,
    ) -> Result<CommitDetail, FetchError> {
        let route = format!("/repos/{}/{}/commits/{}", owner, name, sha);

        let dto: CommitDetailDto = self
            .client
            .get(&route, None::<&()>)
            .await
            .map_err(map_octocrab_error)?;

        Ok(convert_detail(dto))
    }

    async fn repository_exists(&self, owner: &str, name: &str) -> Result<bool, FetchError> {
        match self.client.repos(owner, name).get().await {
            Ok(_) => Ok(true),
            Err(octocrab::Error::GitHub { source, .. })
                if source.status_code.as_u16() == 404 =>
            {
                Ok(false)
            }
            Err(err) => Err(map_octocrab_error(err)),
        }
    }
}

fn convert_summary(dto: CommitItemDto) -> CommitSummary {
    let info = dto.commit.unwrap_or(CommitInfoDto {
        message: None,
        author: None,
    });
    let author = info.author.unwrap_or(CommitAuthorDto {
        name: None,
        email: None,
        date: None,
    });

    CommitSummary {
        sha: dto.sha,
        message: info.message.unwrap_or_default(),
        author_name: author.name.unwrap_or_else(|| "unknown".to_string()),
        author_email: author.email,
        authored_at: author.date.unwrap_or_else(Utc::now),
        url: dto.html_url,
    }
}

fn convert_detail(dto: CommitDetailDto) -> CommitDetail {
    let changed_files = dto.files.as_ref().map(|f| f.len() as i64).unwrap_or(0);
    let stats = dto.stats.unwrap_or(CommitStatsDto {
        additions: None,
        deletions: None,
    });
    let summary = convert_summary(CommitItemDto {
        sha: dto.sha,
        commit: dto.commit,
        html_url: dto.html_url,
    });

    CommitDetail {
        sha: summary.sha,
        message: summary.message,
        author_name: summary.author_name,
        author_email: summary.author_email,
        authored_at: summary.authored_at,
        url: summary.url,
        additions: stats.additions.unwrap_or(0),
        deletions: stats.deletions.unwrap_or(0),
        changed_files,
    }
}

fn map_octocrab_error(err: octocrab::Error) -> FetchError {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            let message = source.message.clone();
            match status {
                401 => FetchError::Auth(message),
                403 | 429 if message.to_lowercase().contains("rate limit") => {
                    FetchError::RateLimited(message)
                }
                403 => FetchError::Auth(message),
                404 => FetchError::NotFound(message),
                _ => FetchError::Api { status, message },
            }
        }
        octocrab::Error::Serde { .. } | octocrab::Error::Json { .. } => {
            FetchError::Malformed(err.to_string())
        }
        other => FetchError::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn source_for(server: &MockServer) -> GitHubCommitSource {
        let client = Octocrab::builder()
            .base_uri(server.uri())
            .unwrap()
            .personal_token("test-token".to_string())
            .build()
            .unwrap();
        GitHubCommitSource::with_client(client)
    }

    #[tokio::test]
    async fn test_list_commits_converts_and_defaults() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/commits"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "sha": "aaa",
                    "commit": {
                        "message": "Add widgets",
                        "author": {
                            "name": "Dev",
                            "email": "dev@example.com",
                            "date": "2026-08-01T12:00:00Z"
                        }
                    },
                    "html_url": "https://github.com/acme/widgets/commit/aaa"
                },
                {
                    // Author block entirely absent: fields default
                    "sha": "bbb",
                    "commit": { "message": null, "author": null }
                }
            ])))
            .mount(&server)
            .await;

        let source = source_for(&server).await;
        let since = Utc::now() - chrono::Duration::days(7);
        let commits = source
            .list_commits_since("acme", "widgets", since)
            .await
            .unwrap();

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].sha, "aaa");
        assert_eq!(commits[0].message, "Add widgets");
        assert_eq!(commits[0].author_name, "Dev");
        assert_eq!(
            commits[0].url.as_deref(),
            Some("https://github.com/acme/widgets/commit/aaa")
        );

        assert_eq!(commits[1].sha, "bbb");
        assert_eq!(commits[1].message, "");
        assert_eq!(commits[1].author_name, "unknown");
        assert!(commits[1].author_email.is_none());
    }

    #[tokio::test]
    async fn test_list_commits_passes_since_window() {
        let server = MockServer::start().await;
        let since = DateTime::parse_from_rfc3339("2026-07-30T00:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc);

        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/commits"))
            .and(query_param("since", since.to_rfc3339()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let source = source_for(&server).await;
        let commits = source
            .list_commits_since("acme", "widgets", since)
            .await
            .unwrap();
        assert!(commits.is_empty());
    }

    #[tokio::test]
    async fn test_commit_detail_includes_stats() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/commits/aaa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": "aaa",
                "commit": {
                    "message": "Add widgets",
                    "author": {
                        "name": "Dev",
                        "email": "dev@example.com",
                        "date": "2026-08-01T12:00:00Z"
                    }
                },
                "html_url": "https://github.com/acme/widgets/commit/aaa",
                "stats": { "additions": 12, "deletions": 4, "total": 16 },
                "files": [
                    { "filename": "src/lib.rs" },
                    { "filename": "src/widgets.rs" }
                ]
            })))
            .mount(&server)
            .await;

        let source = source_for(&server).await;
        let detail = source.commit_detail("acme", "widgets", "aaa").await.unwrap();

        assert_eq!(detail.sha, "aaa");
        assert_eq!(detail.additions, 12);
        assert_eq!(detail.deletions, 4);
        assert_eq!(detail.changed_files, 2);
    }

    #[tokio::test]
    async fn test_repository_exists_true_and_false() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "name": "widgets" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/ghost"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "message": "Not Found",
                "documentation_url": "https://docs.github.com/rest"
            })))
            .mount(&server)
            .await;

        let source = source_for(&server).await;
        assert!(source.repository_exists("acme", "widgets").await.unwrap());
        assert!(!source.repository_exists("acme", "ghost").await.unwrap());
    }

    #[test]
    fn test_detect_authentication_prefers_config_token() {
        let config = GitHubConfig {
            auth_method: "auto".to_string(),
            token: Some("ghp_config".to_string()),
            api_base: None,
        };

        let (strategy, token) = GitHubCommitSource::detect_authentication(&config).unwrap();
        assert!(matches!(strategy, AuthStrategy::ConfigToken));
        assert_eq!(token, "ghp_config");
    }

    #[test]
    fn test_detect_authentication_unknown_method() {
        let config = GitHubConfig {
            auth_method: "carrier-pigeon".to_string(),
            token: None,
            api_base: None,
        };

        assert!(GitHubCommitSource::detect_authentication(&config).is_err());
    }
}
