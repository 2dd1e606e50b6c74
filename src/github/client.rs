use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, LINK, RETRY_AFTER};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument, warn};

use super::types::{
    ApiIssueComment, ApiLabel, ApiPullRequest, ApiRepository, ApiReview, ApiReviewComment,
    ForkRequest, NewPullRequest, NewReply, NewReview, PullRequestStatePatch, RepoSlug,
};
use super::{GitHubApi, GitHubError};
use crate::config::RetryConfig;

const API_VERSION: &str = "2022-11-28";
const PAGE_SIZE: u32 = 100;

/// Backoff applied to idempotent reads. Writes are sent once.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_secs(config.max_delay_secs),
        }
    }
}

/// GitHub REST client backed by reqwest.
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    retry: RetryPolicy,
}

impl GitHubClient {
    pub fn new(
        token: impl Into<String>,
        api_base: &str,
        retry: RetryPolicy,
    ) -> Result<Self, GitHubError> {
        let api_base = api_base.trim_end_matches('/').to_string();
        reqwest::Url::parse(&api_base).map_err(|_| GitHubError::InvalidBaseUrl(api_base.clone()))?;

        let http = reqwest::Client::builder()
            .user_agent("fork-migrate")
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_base,
            token: token.into(),
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// GET `url`, retrying transient failures and rate limiting.
    async fn get_with_retry(&self, url: &str) -> Result<Response, GitHubError> {
        let mut attempt = 1;
        loop {
            let delay = match self.request(Method::GET, url).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    match retry_delay(status, response.headers(), &self.retry, attempt) {
                        Some(delay) if attempt < self.retry.max_attempts => delay,
                        _ => return Err(status_error(&Method::GET, url, response).await),
                    }
                }
                Err(err) if is_transient(&err) && attempt < self.retry.max_attempts => {
                    self.retry.backoff(attempt)
                }
                Err(err) => return Err(err.into()),
            };

            warn!(url, attempt, delay_ms = delay.as_millis() as u64, "retrying GitHub read");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// GET every page of a list endpoint, following `Link: rel="next"`.
    async fn get_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, GitHubError> {
        let mut items = Vec::new();
        let mut next = Some(with_page_size(&self.url(path)));

        while let Some(url) = next {
            let response = self.get_with_retry(&url).await?;
            next = next_link(response.headers());
            let page: Vec<T> = response.json().await?;
            debug!(url = %url, count = page.len(), "fetched page");
            items.extend(page);
        }

        Ok(items)
    }

    async fn get_one<T: DeserializeOwned>(&self, path: &str) -> Result<T, GitHubError> {
        let response = self.get_with_retry(&self.url(path)).await?;
        Ok(response.json().await?)
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, GitHubError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let response = self.request(method.clone(), &url).json(body).send().await?;
        if !response.status().is_success() {
            return Err(status_error(&method, &url, response).await);
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    #[instrument(skip(self), fields(repo = %repo))]
    async fn open_pull_requests(&self, repo: &RepoSlug) -> Result<Vec<ApiPullRequest>, GitHubError> {
        self.get_all(&format!("/repos/{}/pulls?state=open", repo)).await
    }

    async fn issue_labels(&self, repo: &RepoSlug, number: u64) -> Result<Vec<ApiLabel>, GitHubError> {
        self.get_all(&format!("/repos/{}/issues/{}/labels", repo, number))
            .await
    }

    async fn issue_comments(
        &self,
        repo: &RepoSlug,
        number: u64,
    ) -> Result<Vec<ApiIssueComment>, GitHubError> {
        self.get_all(&format!("/repos/{}/issues/{}/comments", repo, number))
            .await
    }

    async fn review_comments(
        &self,
        repo: &RepoSlug,
        number: u64,
    ) -> Result<Vec<ApiReviewComment>, GitHubError> {
        self.get_all(&format!("/repos/{}/pulls/{}/comments", repo, number))
            .await
    }

    async fn review(
        &self,
        repo: &RepoSlug,
        number: u64,
        review_id: u64,
    ) -> Result<ApiReview, GitHubError> {
        self.get_one(&format!("/repos/{}/pulls/{}/reviews/{}", repo, number, review_id))
            .await
    }

    #[instrument(skip(self, request), fields(repo = %repo, head = %request.head))]
    async fn create_pull_request(
        &self,
        repo: &RepoSlug,
        request: &NewPullRequest,
    ) -> Result<ApiPullRequest, GitHubError> {
        self.send(Method::POST, &format!("/repos/{}/pulls", repo), request)
            .await
    }

    async fn create_review(
        &self,
        repo: &RepoSlug,
        number: u64,
        review: &NewReview,
    ) -> Result<ApiReview, GitHubError> {
        self.send(
            Method::POST,
            &format!("/repos/{}/pulls/{}/reviews", repo, number),
            review,
        )
        .await
    }

    async fn create_review_reply(
        &self,
        repo: &RepoSlug,
        number: u64,
        parent_comment_id: u64,
        body: &str,
    ) -> Result<ApiReviewComment, GitHubError> {
        self.send(
            Method::POST,
            &format!(
                "/repos/{}/pulls/{}/comments/{}/replies",
                repo, number, parent_comment_id
            ),
            &NewReply { body },
        )
        .await
    }

    async fn close_pull_request(
        &self,
        repo: &RepoSlug,
        number: u64,
    ) -> Result<ApiPullRequest, GitHubError> {
        self.send(
            Method::PATCH,
            &format!("/repos/{}/pulls/{}", repo, number),
            &PullRequestStatePatch { state: "closed" },
        )
        .await
    }

    #[instrument(skip(self), fields(repo = %repo))]
    async fn create_fork(
        &self,
        repo: &RepoSlug,
        organization: &str,
    ) -> Result<ApiRepository, GitHubError> {
        self.send(
            Method::POST,
            &format!("/repos/{}/forks", repo),
            &ForkRequest { organization },
        )
        .await
    }

    async fn repository(&self, repo: &RepoSlug) -> Result<Option<ApiRepository>, GitHubError> {
        match self.get_one(&format!("/repos/{}", repo)).await {
            Ok(found) => Ok(Some(found)),
            Err(GitHubError::Status { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

fn with_page_size(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}per_page={}", url, separator, PAGE_SIZE)
}

/// Extract the `rel="next"` target from a Link header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|param| param.trim() == "rel=\"next\"");
        if !is_next {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Some(target.to_string())
    })
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && (header_u64(headers, "x-ratelimit-remaining") == Some(0)
                || headers.contains_key(RETRY_AFTER)))
}

/// How long to wait before retrying a read that failed with `status`,
/// or None when the failure is permanent.
fn retry_delay(
    status: StatusCode,
    headers: &HeaderMap,
    policy: &RetryPolicy,
    attempt: u32,
) -> Option<Duration> {
    if is_rate_limited(status, headers) {
        let delay = if let Some(secs) = header_u64(headers, RETRY_AFTER.as_str()) {
            Duration::from_secs(secs)
        } else if let Some(reset) = header_u64(headers, "x-ratelimit-reset") {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs())
                .unwrap_or(0);
            Duration::from_secs(reset.saturating_sub(now))
        } else {
            policy.backoff(attempt)
        };
        return Some(delay.min(policy.max_delay));
    }

    if status.is_server_error() {
        return Some(policy.backoff(attempt));
    }

    None
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

async fn status_error(method: &Method, url: &str, response: Response) -> GitHubError {
    let status = response.status();
    if is_rate_limited(status, response.headers()) {
        return GitHubError::RateLimited {
            path: url.to_string(),
        };
    }

    #[derive(serde::Deserialize)]
    struct ErrorBody {
        message: String,
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or(text);

    GitHubError::Status {
        method: method.to_string(),
        path: url.to_string(),
        status: status.as_u16(),
        message,
    }
}
