use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A repository identified by `owner/name`.
/// Extracted by parse_repo() in github/mod.rs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRepository {
    pub full_name: String,
}

/// Head or base of a pull request as returned by the pulls endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiBranchRef {
    pub label: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
    /// Null when the head repository has been deleted.
    pub repo: Option<ApiRepository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPullRequest {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub html_url: String,
    pub head: ApiBranchRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiLabel {
    pub name: String,
}

/// Conversation comment from the issues endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiIssueComment {
    pub id: u64,
    pub body: Option<String>,
    pub user: Option<ApiUser>,
    pub reactions: Option<Value>,
}

/// Line-anchored review comment from the pulls comments endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiReviewComment {
    pub id: u64,
    pub pull_request_review_id: Option<u64>,
    pub path: Option<String>,
    pub position: Option<u64>,
    pub body: String,
    pub reactions: Option<Value>,
    pub in_reply_to_id: Option<u64>,
}

/// A pull request review. `state` is the read-side descriptive status
/// (APPROVED, CHANGES_REQUESTED, COMMENTED, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct ApiReview {
    pub id: u64,
    pub state: String,
}

/// Write-side action required by the create-review endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewEvent {
    Approve,
    RequestChanges,
    Comment,
}

impl std::fmt::Display for ReviewEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewEvent::Approve => write!(f, "APPROVE"),
            ReviewEvent::RequestChanges => write!(f, "REQUEST_CHANGES"),
            ReviewEvent::Comment => write!(f, "COMMENT"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// One inline comment attached to a new review. The API rejects explicit
/// nulls, so unset fields are left out of the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftReviewComment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewReview {
    pub event: ReviewEvent,
    pub comments: Vec<DraftReviewComment>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct NewReply<'a> {
    pub body: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ForkRequest<'a> {
    pub organization: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PullRequestStatePatch<'a> {
    pub state: &'a str,
}
