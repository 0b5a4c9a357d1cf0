//! System health checks for Commitpress
//!
//! This module provides preflight checks to verify the system is properly
//! configured before running operations.

use crate::config::Config;
use crate::github::GitHubCommitSource;
use crate::store::Store;
use std::path::PathBuf;

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Configuration file status
    pub config_file: CheckResult,
    /// Database status
    pub database: CheckResult,
    /// GitHub authentication status
    pub github_auth: CheckResult,
    /// Language-model credential status (warning only, not required)
    pub ai_credentials: CheckResult,
    /// Publishing configuration status (warning only, not required)
    pub publishing: CheckResult,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
    pub is_warning: bool,
}

#[allow(dead_code)]
impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn ok_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: None,
            is_warning: true,
        }
    }

    fn warning_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: true,
        }
    }
}

impl HealthCheck {
    /// Run all health checks
    pub fn run(config: &Config) -> Self {
        Self {
            config_file: Self::check_config_file(),
            database: Self::check_database(config),
            github_auth: Self::check_github_auth(config),
            ai_credentials: Self::check_ai_credentials(config),
            publishing: Self::check_publishing(config),
        }
    }

    /// Check if all required checks passed (excludes warnings)
    pub fn all_passed(&self) -> bool {
        self.config_file.passed && self.database.passed && self.github_auth.passed
        // AI and publishing are optional, not included in required checks
    }

    /// Get list of failed checks (errors only, not warnings)
    pub fn errors(&self) -> Vec<&CheckResult> {
        [
            &self.config_file,
            &self.database,
            &self.github_auth,
            &self.ai_credentials,
            &self.publishing,
        ]
        .into_iter()
        .filter(|r| !r.passed && !r.is_warning)
        .collect()
    }

    /// Get list of warnings
    pub fn warnings(&self) -> Vec<&CheckResult> {
        [
            &self.config_file,
            &self.database,
            &self.github_auth,
            &self.ai_credentials,
            &self.publishing,
        ]
        .into_iter()
        .filter(|r| r.is_warning)
        .collect()
    }

    /// Check the configuration file location
    fn check_config_file() -> CheckResult {
        match Config::default_config_path() {
            Ok(path) if path.exists() => {
                CheckResult::ok_with_details("Configuration file found", path.display().to_string())
            }
            Ok(path) => CheckResult::warning_with_details(
                "Configuration file not found, defaults in use",
                format!("Run: commitpress init (expected at {})", path.display()),
            ),
            Err(e) => CheckResult::error_with_details("Cannot locate config directory", e.to_string()),
        }
    }

    /// Check the database opens and answers queries
    fn check_database(config: &Config) -> CheckResult {
        let path = PathBuf::from(&config.database.path);
        match Store::open_at(path.clone()) {
            Ok(store) => match store.dashboard_stats() {
                Ok(stats) => CheckResult::ok_with_details(
                    "Database reachable",
                    format!(
                        "{} ({} active repositories, {} published posts)",
                        path.display(),
                        stats.active_repositories,
                        stats.published_posts
                    ),
                ),
                Err(e) => CheckResult::error_with_details("Database query failed", e.to_string()),
            },
            Err(e) => CheckResult::error_with_details(
                "Database cannot be opened",
                format!("{}\n{:#}", path.display(), e),
            ),
        }
    }

    /// Check GitHub authentication can be resolved
    fn check_github_auth(config: &Config) -> CheckResult {
        match GitHubCommitSource::new(&config.github) {
            Ok(_) => CheckResult::ok("GitHub credentials resolved"),
            Err(e) => CheckResult::error_with_details(
                "GitHub authentication failed",
                format!("{:#}\nRun: gh auth login, or set GITHUB_TOKEN", e),
            ),
        }
    }

    /// Check the language-model credential (warning only)
    fn check_ai_credentials(config: &Config) -> CheckResult {
        match std::env::var(&config.ai.token_env) {
            Ok(token) if !token.is_empty() => CheckResult::ok_with_details(
                "Language-model credential present",
                format!("{} is set, model {}", config.ai.token_env, config.ai.model),
            ),
            _ => CheckResult::warning_with_details(
                "Language-model credential missing",
                format!(
                    "Summary generation disabled. Set {} to enable it",
                    config.ai.token_env
                ),
            ),
        }
    }

    /// Check the publishing configuration (warning only)
    fn check_publishing(config: &Config) -> CheckResult {
        if !config.publishing.enabled {
            return CheckResult::warning("Publishing disabled in configuration");
        }
        if config.publishing.endpoint.is_empty() {
            return CheckResult::error_with_details(
                "Publishing enabled but no endpoint configured",
                "Set publishing.endpoint in the configuration file",
            );
        }
        CheckResult::ok_with_details(
            "Publishing configured",
            format!("{} via {}", config.publishing.network, config.publishing.endpoint),
        )
    }

    /// Get all checks as a slice for iteration
    pub fn all_checks(&self) -> [(&'static str, &CheckResult); 5] {
        [
            ("Configuration", &self.config_file),
            ("Database", &self.database),
            ("GitHub Authentication", &self.github_auth),
            ("AI Credentials", &self.ai_credentials),
            ("Publishing", &self.publishing),
        ]
    }
}
