use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = ".fork-migrate.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("GitHub token not found (set github.token, GHEC_TOKEN or GITHUB_TOKEN)")]
    MissingToken,

    #[error("Target organization not found (pass --org, set migration.target_org or TARGET_ORG)")]
    MissingTargetOrg,
}

/// Top-level configuration loaded from .fork-migrate.toml.
///
/// All fields are optional; with GHEC_TOKEN and TARGET_ORG exported the
/// tool runs with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub migration: MigrationConfig,

    #[serde(default)]
    pub fork: ForkConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// API token. If None, falls back to GHEC_TOKEN, then GITHUB_TOKEN.
    pub token: Option<String>,

    /// REST API root, e.g. https://ghe.example.com/api/v3 for GitHub Enterprise Server.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Host used to build clone and push URLs.
    #[serde(default = "default_git_host")]
    pub git_host: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: default_api_base(),
            git_host: default_git_host(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MigrationConfig {
    /// Label marking pull requests that should be migrated
    #[serde(default = "default_label")]
    pub label: String,

    /// Base branch for the recreated pull requests
    #[serde(default = "default_base_branch")]
    pub base_branch: String,

    /// Organization that will own the fork. If None, falls back to TARGET_ORG.
    pub target_org: Option<String>,

    /// Close each original pull request once its replacement exists
    #[serde(default = "default_true")]
    pub close_original: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            label: default_label(),
            base_branch: default_base_branch(),
            target_org: None,
            close_original: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForkConfig {
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for ForkConfig {
    fn default() -> Self {
        Self {
            poll_attempts: default_poll_attempts(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl ForkConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Backoff settings for idempotent GitHub reads.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_git_host() -> String {
    "github.com".to_string()
}

fn default_label() -> String {
    "fork_compare".to_string()
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_true() -> bool {
    true
}

fn default_poll_attempts() -> u32 {
    30
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from `path`, or from .fork-migrate.toml in the
    /// current directory when no path is given.
    /// Returns default config if the default file doesn't exist.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load_from(path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the API token: config file value takes precedence,
    /// then GHEC_TOKEN, then GITHUB_TOKEN.
    pub fn github_token(&self) -> Result<String, ConfigError> {
        self.github_token_with(|key| std::env::var(key).ok())
    }

    /// Resolve the target organization: CLI value, then config, then TARGET_ORG.
    pub fn target_org(&self, cli_org: Option<&str>) -> Result<String, ConfigError> {
        self.target_org_with(cli_org, |key| std::env::var(key).ok())
    }

    fn github_token_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<String, ConfigError> {
        self.github
            .token
            .clone()
            .or_else(|| env("GHEC_TOKEN"))
            .or_else(|| env("GITHUB_TOKEN"))
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingToken)
    }

    fn target_org_with(
        &self,
        cli_org: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<String, ConfigError> {
        cli_org
            .map(str::to_string)
            .or_else(|| self.migration.target_org.clone())
            .or_else(|| env("TARGET_ORG"))
            .filter(|org| !org.trim().is_empty())
            .ok_or(ConfigError::MissingTargetOrg)
    }
}
