use serde_json::Value;

use crate::github::{ApiIssueComment, ApiPullRequest, ApiReviewComment};

/// Migration-relevant state of one source pull request.
/// Built by the collector and read-only afterwards.
#[derive(Debug, Clone)]
pub struct PullRequestDescriptor {
    /// Source PR number
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    /// Repository owning the head branch; None if it was deleted
    pub head_repo_full_name: Option<String>,
    /// `owner:branch` label of the head
    pub head_label: String,
    /// Head branch name
    pub head_ref: String,
    /// Head commit at collection time
    pub sha: String,
    pub html_link: String,
    pub conversation_comments: Vec<ConversationComment>,
    pub review_comments: Vec<ReviewComment>,
}

impl PullRequestDescriptor {
    pub fn from_api(
        pr: ApiPullRequest,
        comments: Vec<ApiIssueComment>,
        review_comments: Vec<ApiReviewComment>,
    ) -> Self {
        Self {
            number: pr.number,
            title: pr.title,
            body: pr.body,
            head_repo_full_name: pr.head.repo.map(|repo| repo.full_name),
            head_label: pr.head.label,
            head_ref: pr.head.ref_name,
            sha: pr.head.sha,
            html_link: pr.html_url,
            conversation_comments: comments.into_iter().map(ConversationComment::from).collect(),
            review_comments: review_comments.into_iter().map(ReviewComment::from).collect(),
        }
    }
}

/// General (non-review) comment on the PR conversation.
#[derive(Debug, Clone)]
#[allow(dead_code)] // Carried with the descriptor and counted in the report; not replayed
pub struct ConversationComment {
    pub comment_id: u64,
    pub body: Option<String>,
    pub author_login: Option<String>,
    /// Passed through untouched
    pub reactions: Option<Value>,
}

impl From<ApiIssueComment> for ConversationComment {
    fn from(comment: ApiIssueComment) -> Self {
        Self {
            comment_id: comment.id,
            body: comment.body,
            author_login: comment.user.map(|user| user.login),
            reactions: comment.reactions,
        }
    }
}

/// Line-anchored review comment. `in_reply_to_id == None` marks a thread root.
#[derive(Debug, Clone)]
pub struct ReviewComment {
    pub comment_id: u64,
    /// Review this comment was submitted with
    pub review_id: Option<u64>,
    pub path: Option<String>,
    pub position: Option<u64>,
    pub body: String,
    #[allow(dead_code)] // Reactions cannot be recreated on behalf of other users
    pub reactions: Option<Value>,
    pub in_reply_to_id: Option<u64>,
}

impl ReviewComment {
    pub fn is_root(&self) -> bool {
        self.in_reply_to_id.is_none()
    }
}

impl From<ApiReviewComment> for ReviewComment {
    fn from(comment: ApiReviewComment) -> Self {
        Self {
            comment_id: comment.id,
            review_id: comment.pull_request_review_id,
            path: comment.path,
            position: comment.position,
            body: comment.body,
            reactions: comment.reactions,
            in_reply_to_id: comment.in_reply_to_id,
        }
    }
}

/// A branch that now exists in the fork for one source PR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkBranch {
    pub source_number: u64,
    pub head_ref: String,
}
