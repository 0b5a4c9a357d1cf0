//! Summary Generator - turns a window of commits into a draft blog post
//!
//! The language-model provider is consumed through the [`Summarizer`] trait.
//! The HTTP implementation talks to an OpenAI-compatible chat-completions
//! endpoint; the model is asked for a JSON document, and a reply that fails
//! to parse falls back to defaulted fields instead of failing the request.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, warn};

use crate::config::AiConfig;
use crate::store::Commit;

/// Commits for one repository, grouped for the prompt
#[derive(Debug, Clone)]
pub struct RepoCommits {
    pub repository: String,
    pub commits: Vec<Commit>,
}

/// The window a summary covers
#[derive(Debug, Clone, Copy)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Structured summary returned by the model
#[derive(Debug, Clone)]
pub struct DevSummary {
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub tokens_used: i64,
}

/// Result of a content-enhancement pass
#[derive(Debug, Clone)]
pub struct EnhancedContent {
    pub content: String,
    pub tokens_used: i64,
}

/// External language-model provider contract
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Synthesize a development summary for the given commit window
    async fn generate(&self, groups: &[RepoCommits], range: TimeRange) -> Result<DevSummary>;

    /// Rework existing post content following freeform instructions
    async fn enhance(&self, content: &str, instructions: &str) -> Result<EnhancedContent>;
}

/// Chat-completions backed summarizer
pub struct ChatSummarizer {
    http: reqwest::Client,
    api_base: String,
    model: String,
    token: String,
    max_prompt_commits: usize,
}

// Chat-completions wire shapes

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: Option<i64>,
}

/// Shape the model is asked to produce
#[derive(Debug, Deserialize)]
struct SummaryDoc {
    title: Option<String>,
    content: Option<String>,
    summary: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

impl ChatSummarizer {
    /// Create a summarizer from configuration; the API key is read from the
    /// configured environment variable
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let token = env::var(&config.token_env)
            .with_context(|| format!("{} environment variable not set", config.token_env))?;
        if token.is_empty() {
            return Err(anyhow!("{} is empty", config.token_env));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            token,
            max_prompt_commits: config.max_prompt_commits,
        })
    }

    /// Construct against an explicit endpoint (tests)
    pub fn with_endpoint(api_base: &str, model: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            token: token.to_string(),
            max_prompt_commits: 50,
        }
    }

    async fn chat(&self, system: String, user: String) -> Result<(String, i64)> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .context("Failed to reach language-model provider")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Language-model provider returned {}: {}",
                status,
                body
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to decode language-model response")?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("Language-model response contained no choices"))?;
        let tokens_used = parsed.usage.and_then(|u| u.total_tokens).unwrap_or(0);

        debug!("Model call used {} tokens", tokens_used);
        Ok((text, tokens_used))
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn generate(&self, groups: &[RepoCommits], range: TimeRange) -> Result<DevSummary> {
        let system = "You are a developer-relations writer. Summarize recent commit \
                      activity as an engaging development update. Respond with a JSON \
                      object: {\"title\", \"content\", \"summary\", \"tags\"}."
            .to_string();
        let user = build_digest_prompt(groups, range, self.max_prompt_commits);

        let (text, tokens_used) = self.chat(system, user).await?;

        // Malformed model output falls back to defaulted fields rather than
        // failing the whole request.
        match serde_json::from_str::<SummaryDoc>(strip_code_fences(&text)) {
            Ok(doc) => Ok(DevSummary {
                title: doc
                    .title
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| default_title(range)),
                content: doc
                    .content
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| text.clone()),
                summary: doc.summary,
                tags: doc.tags,
                tokens_used,
            }),
            Err(err) => {
                warn!("Model reply was not valid JSON ({}), using raw text", err);
                Ok(DevSummary {
                    title: default_title(range),
                    content: text,
                    summary: None,
                    tags: Vec::new(),
                    tokens_used,
                })
            }
        }
    }

    async fn enhance(&self, content: &str, instructions: &str) -> Result<EnhancedContent> {
        let system = "You are an editor. Rewrite the given blog post following the \
                      instructions. Respond with the reworked post only."
            .to_string();
        let user = format!("Instructions: {}\n\nPost:\n{}", instructions, content);

        let (text, tokens_used) = self.chat(system, user).await?;

        Ok(EnhancedContent {
            content: text,
            tokens_used,
        })
    }
}

fn default_title(range: TimeRange) -> String {
    format!(
        "Development update {} to {}",
        range.start.format("%Y-%m-%d"),
        range.end.format("%Y-%m-%d")
    )
}

/// Models wrap JSON in markdown fences often enough to be worth stripping
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn build_digest_prompt(groups: &[RepoCommits], range: TimeRange, max_commits: usize) -> String {
    let mut prompt = format!(
        "Commit activity from {} to {}:\n",
        range.start.format("%Y-%m-%d %H:%M"),
        range.end.format("%Y-%m-%d %H:%M")
    );

    let mut remaining = max_commits;
    for group in groups {
        if remaining == 0 {
            break;
        }
        prompt.push_str(&format!("\n## {}\n", group.repository));
        for commit in group.commits.iter().take(remaining) {
            let first_line = commit.message.lines().next().unwrap_or("");
            prompt.push_str(&format!(
                "- {} by {} (+{} -{}, {} files)\n",
                first_line,
                commit.author_name,
                commit.additions,
                commit.deletions,
                commit.changed_files
            ));
        }
        remaining = remaining.saturating_sub(group.commits.len().min(remaining));
    }

    prompt
}
