pub mod client;
pub mod types;

pub use client::GitHubClient;
pub use types::{
    ApiIssueComment, ApiLabel, ApiPullRequest, ApiRepository, ApiReview, ApiReviewComment,
    NewPullRequest, NewReview, RepoSlug,
};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("GitHub API returned {status} for {method} {path}: {message}")]
    Status {
        method: String,
        path: String,
        status: u16,
        message: String,
    },

    #[error("GitHub API rate limit exhausted for {path}")]
    RateLimited { path: String },

    #[error("Invalid repository: {0}")]
    InvalidRepo(String),

    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}

/// The slice of the GitHub REST API the migration needs.
/// List operations return every page.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn open_pull_requests(&self, repo: &RepoSlug) -> Result<Vec<ApiPullRequest>, GitHubError>;

    async fn issue_labels(&self, repo: &RepoSlug, number: u64) -> Result<Vec<ApiLabel>, GitHubError>;

    async fn issue_comments(
        &self,
        repo: &RepoSlug,
        number: u64,
    ) -> Result<Vec<ApiIssueComment>, GitHubError>;

    async fn review_comments(
        &self,
        repo: &RepoSlug,
        number: u64,
    ) -> Result<Vec<ApiReviewComment>, GitHubError>;

    async fn review(
        &self,
        repo: &RepoSlug,
        number: u64,
        review_id: u64,
    ) -> Result<ApiReview, GitHubError>;

    async fn create_pull_request(
        &self,
        repo: &RepoSlug,
        request: &NewPullRequest,
    ) -> Result<ApiPullRequest, GitHubError>;

    async fn create_review(
        &self,
        repo: &RepoSlug,
        number: u64,
        review: &NewReview,
    ) -> Result<ApiReview, GitHubError>;

    async fn create_review_reply(
        &self,
        repo: &RepoSlug,
        number: u64,
        parent_comment_id: u64,
        body: &str,
    ) -> Result<ApiReviewComment, GitHubError>;

    async fn close_pull_request(
        &self,
        repo: &RepoSlug,
        number: u64,
    ) -> Result<ApiPullRequest, GitHubError>;

    async fn create_fork(&self, repo: &RepoSlug, organization: &str)
        -> Result<ApiRepository, GitHubError>;

    /// Returns None when the repository does not exist (yet).
    async fn repository(&self, repo: &RepoSlug) -> Result<Option<ApiRepository>, GitHubError>;
}

/// Parse a repository argument into its component parts.
///
/// Accepts `owner/name` or a web URL such as
/// `https://github.com/owner/name` (trailing `.git` allowed).
pub fn parse_repo(input: &str) -> Result<RepoSlug, GitHubError> {
    let input = input.trim();
    let path = if input.contains("://") {
        let parsed =
            reqwest::Url::parse(input).map_err(|_| GitHubError::InvalidRepo(input.to_string()))?;
        parsed.path().to_string()
    } else {
        input.to_string()
    };

    let segments: Vec<_> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.len() != 2 {
        return Err(GitHubError::InvalidRepo(input.to_string()));
    }

    let owner = segments[0];
    let name = segments[1].strip_suffix(".git").unwrap_or(segments[1]);
    if name.is_empty() {
        return Err(GitHubError::InvalidRepo(input.to_string()));
    }

    Ok(RepoSlug::new(owner, name))
}
