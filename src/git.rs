use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::github::RepoSlug;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Runs git subcommands. Implemented by `CommandGit` for real runs and by
/// a recording fake in tests.
#[async_trait]
pub trait Git: Send + Sync {
    async fn run(&self, workdir: &Path, args: &[String]) -> Result<(), GitError>;
}

/// Shells out to the `git` binary on PATH.
pub struct CommandGit {
    secrets: Vec<String>,
}

impl CommandGit {
    /// `secrets` are scrubbed from any error text before it leaves this type.
    pub fn new(secrets: Vec<String>) -> Self {
        Self {
            secrets: secrets.into_iter().filter(|s| !s.is_empty()).collect(),
        }
    }

    fn redact(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), "***"))
    }
}

#[async_trait]
impl Git for CommandGit {
    #[instrument(skip(self, args), fields(command = args.first().map(String::as_str).unwrap_or("")))]
    async fn run(&self, workdir: &Path, args: &[String]) -> Result<(), GitError> {
        debug!(workdir = %workdir.display(), "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }

        Err(GitError::Failed {
            command: self.redact(&args.join(" ")),
            status: output.status.to_string(),
            stderr: self.redact(String::from_utf8_lossy(&output.stderr).trim()),
        })
    }
}

/// HTTPS remote URL carrying the token as credentials.
pub fn authenticated_url(host: &str, token: &str, repo: &RepoSlug) -> String {
    format!("https://x-access-token:{}@{}/{}.git", token, host, repo)
}
