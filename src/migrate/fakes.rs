//! In-memory stand-ins for GitHub and git used by the pipeline tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::types::{PullRequestDescriptor, ReviewComment};
use super::{ForkPoll, MigrationSettings};
use crate::git::{Git, GitError};
use crate::github::types::{ApiBranchRef, ApiUser, ReviewEvent};
use crate::github::{
    ApiIssueComment, ApiLabel, ApiPullRequest, ApiRepository, ApiReview, ApiReviewComment,
    GitHubApi, GitHubError, NewPullRequest, NewReview, RepoSlug,
};

pub fn test_settings() -> MigrationSettings {
    MigrationSettings {
        label: "fork_compare".to_string(),
        base_branch: "main".to_string(),
        target_org: "acme".to_string(),
        close_original: true,
        dry_run: false,
        fork_poll: ForkPoll {
            attempts: 5,
            interval: Duration::ZERO,
        },
        git_host: "github.com".to_string(),
        token: "test-token".to_string(),
    }
}

pub fn pull(number: u64, head_ref: &str) -> ApiPullRequest {
    ApiPullRequest {
        number,
        title: format!("PR {}", number),
        body: Some(format!("Body of PR {}", number)),
        state: "open".to_string(),
        html_url: format!("https://github.com/org/repo/pull/{}", number),
        head: ApiBranchRef {
            label: format!("contributor:{}", head_ref),
            ref_name: head_ref.to_string(),
            sha: format!("sha{}", number),
            repo: Some(ApiRepository {
                full_name: "contributor/repo".to_string(),
            }),
        },
    }
}

pub fn descriptor(number: u64, head_ref: &str) -> PullRequestDescriptor {
    PullRequestDescriptor::from_api(pull(number, head_ref), Vec::new(), Vec::new())
}

pub fn issue_comment(id: u64, login: &str, body: &str) -> ApiIssueComment {
    ApiIssueComment {
        id,
        body: Some(body.to_string()),
        user: Some(ApiUser {
            login: login.to_string(),
        }),
        reactions: None,
    }
}

/// `add_review_comments` converts these to the API shape.
pub fn review_comment(
    id: u64,
    review_id: Option<u64>,
    in_reply_to_id: Option<u64>,
    path: Option<&str>,
    position: Option<u64>,
    body: &str,
) -> ReviewComment {
    ReviewComment {
        comment_id: id,
        review_id,
        path: path.map(str::to_string),
        position,
        body: body.to_string(),
        reactions: None,
        in_reply_to_id,
    }
}

fn to_api(comment: ReviewComment) -> ApiReviewComment {
    ApiReviewComment {
        id: comment.comment_id,
        pull_request_review_id: comment.review_id,
        path: comment.path,
        position: comment.position,
        body: comment.body,
        reactions: comment.reactions,
        in_reply_to_id: comment.in_reply_to_id,
    }
}

fn api_error(status: u16, message: &str) -> GitHubError {
    GitHubError::Status {
        method: "FAKE".to_string(),
        path: "/fake".to_string(),
        status,
        message: message.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub pulls: Vec<ApiPullRequest>,
    pub labels: HashMap<u64, Vec<String>>,
    pub issue_comments: HashMap<u64, Vec<ApiIssueComment>>,
    /// Keyed by PR number; holds source comments and comments created on new PRs
    pub review_comments: HashMap<u64, Vec<ApiReviewComment>>,
    pub reviews: HashMap<u64, String>,

    pub fail_listing: bool,
    pub fail_labels: HashSet<u64>,
    pub fail_comments: HashSet<u64>,
    pub fail_create_pr: bool,
    pub fail_close: bool,
    pub rejected_events: Vec<ReviewEvent>,
    pub hide_created_comments: bool,
    pub fork_hidden_checks: u32,
    pub fail_fork: bool,
    pub failing_reply_bodies: HashSet<String>,
    pub fail_fork_check: bool,

    pub next_id: u64,
    pub next_number: u64,

    pub created_prs: Vec<(NewPullRequest, u64)>,
    /// (PR number, review, new review id)
    pub created_reviews: Vec<(u64, NewReview, u64)>,
    /// (PR number, parent comment id, body)
    pub replies: Vec<(u64, u64, String)>,
    pub closed: Vec<u64>,
    /// (source full name, organization)
    pub forks: Vec<(String, String)>,
    pub fork_checks: u32,
    pub review_lookups: u32,
}

pub struct FakeGitHub {
    state: Mutex<FakeState>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_id: 10_000,
                next_number: 500,
                ..FakeState::default()
            }),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn add_pull(&self, pr: ApiPullRequest, labels: &[&str]) {
        let mut state = self.state();
        state
            .labels
            .insert(pr.number, labels.iter().map(|l| l.to_string()).collect());
        state.pulls.push(pr);
    }

    pub fn add_issue_comments(&self, number: u64, comments: Vec<ApiIssueComment>) {
        self.state().issue_comments.insert(number, comments);
    }

    pub fn add_review_comments(&self, number: u64, comments: Vec<ReviewComment>) {
        self.state()
            .review_comments
            .insert(number, comments.into_iter().map(to_api).collect());
    }

    pub fn add_review(&self, review_id: u64, state: &str) {
        self.state().reviews.insert(review_id, state.to_string());
    }

    pub fn fail_listing(&self) {
        self.state().fail_listing = true;
    }

    pub fn fail_labels_for(&self, number: u64) {
        self.state().fail_labels.insert(number);
    }

    pub fn fail_comments_for(&self, number: u64) {
        self.state().fail_comments.insert(number);
    }

    pub fn fail_pull_request_creation(&self) {
        self.state().fail_create_pr = true;
    }

    pub fn fail_close(&self) {
        self.state().fail_close = true;
    }

    pub fn reject_event(&self, event: ReviewEvent) {
        self.state().rejected_events.push(event);
    }

    /// Created reviews produce no listable comments.
    pub fn hide_created_review_comments(&self) {
        self.state().hide_created_comments = true;
    }

    pub fn fail_reply(&self, body: &str) {
        self.state().failing_reply_bodies.insert(body.to_string());
    }

    pub fn fail_fork(&self) {
        self.state().fail_fork = true;
    }

    /// Every readiness lookup of the fork errors.
    pub fn fail_fork_check(&self) {
        self.state().fail_fork_check = true;
    }

    /// The fork is reported missing for the first `checks` lookups.
    pub fn fork_visible_after(&self, checks: u32) {
        self.state().fork_hidden_checks = checks;
    }
}

impl FakeState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn open_pull_requests(&self, _repo: &RepoSlug) -> Result<Vec<ApiPullRequest>, GitHubError> {
        let state = self.state();
        if state.fail_listing {
            return Err(api_error(500, "listing failed"));
        }
        Ok(state.pulls.clone())
    }

    async fn issue_labels(&self, _repo: &RepoSlug, number: u64) -> Result<Vec<ApiLabel>, GitHubError> {
        let state = self.state();
        if state.fail_labels.contains(&number) {
            return Err(api_error(502, "labels unavailable"));
        }
        Ok(state
            .labels
            .get(&number)
            .map(|names| names.iter().map(|name| ApiLabel { name: name.clone() }).collect())
            .unwrap_or_default())
    }

    async fn issue_comments(
        &self,
        _repo: &RepoSlug,
        number: u64,
    ) -> Result<Vec<ApiIssueComment>, GitHubError> {
        let state = self.state();
        if state.fail_comments.contains(&number) {
            return Err(api_error(500, "Server Error"));
        }
        Ok(state.issue_comments.get(&number).cloned().unwrap_or_default())
    }

    async fn review_comments(
        &self,
        _repo: &RepoSlug,
        number: u64,
    ) -> Result<Vec<ApiReviewComment>, GitHubError> {
        Ok(self.state().review_comments.get(&number).cloned().unwrap_or_default())
    }

    async fn review(
        &self,
        _repo: &RepoSlug,
        _number: u64,
        review_id: u64,
    ) -> Result<ApiReview, GitHubError> {
        let mut state = self.state();
        state.review_lookups += 1;
        state
            .reviews
            .get(&review_id)
            .map(|review_state| ApiReview {
                id: review_id,
                state: review_state.clone(),
            })
            .ok_or_else(|| api_error(404, "review not found"))
    }

    async fn create_pull_request(
        &self,
        repo: &RepoSlug,
        request: &NewPullRequest,
    ) -> Result<ApiPullRequest, GitHubError> {
        let mut state = self.state();
        if state.fail_create_pr {
            return Err(api_error(422, "Validation Failed"));
        }
        state.next_number += 1;
        let number = state.next_number;
        state.created_prs.push((request.clone(), number));

        let (_, head_ref) = request.head.split_once(':').unwrap_or(("", request.head.as_str()));
        let mut created = pull(number, head_ref);
        created.title = request.title.clone();
        created.body = request.body.clone();
        created.html_url = format!("https://github.com/{}/pull/{}", repo, number);
        Ok(created)
    }

    async fn create_review(
        &self,
        _repo: &RepoSlug,
        number: u64,
        review: &NewReview,
    ) -> Result<ApiReview, GitHubError> {
        let mut state = self.state();
        if state.rejected_events.contains(&review.event) {
            return Err(api_error(422, "Can not approve your own pull request"));
        }
        let review_id = state.allocate_id();
        state.created_reviews.push((number, review.clone(), review_id));

        if !state.hide_created_comments {
            let mut created = Vec::new();
            for draft in &review.comments {
                let id = state.allocate_id();
                created.push(ApiReviewComment {
                    id,
                    pull_request_review_id: Some(review_id),
                    path: draft.path.clone(),
                    position: draft.position,
                    body: draft.body.clone(),
                    reactions: None,
                    in_reply_to_id: None,
                });
            }
            state.review_comments.entry(number).or_default().extend(created);
        }

        let read_state = match review.event {
            ReviewEvent::Approve => "APPROVED",
            ReviewEvent::RequestChanges => "CHANGES_REQUESTED",
            ReviewEvent::Comment => "COMMENTED",
        };
        Ok(ApiReview {
            id: review_id,
            state: read_state.to_string(),
        })
    }

    async fn create_review_reply(
        &self,
        _repo: &RepoSlug,
        number: u64,
        parent_comment_id: u64,
        body: &str,
    ) -> Result<ApiReviewComment, GitHubError> {
        let mut state = self.state();
        if state.failing_reply_bodies.contains(body) {
            return Err(api_error(502, "Bad Gateway"));
        }
        let parent = state
            .review_comments
            .get(&number)
            .and_then(|comments| comments.iter().find(|c| c.id == parent_comment_id))
            .cloned()
            .ok_or_else(|| api_error(404, "parent comment not found"))?;

        let id = state.allocate_id();
        let reply_review_id = state.allocate_id();
        let reply = ApiReviewComment {
            id,
            pull_request_review_id: Some(reply_review_id),
            path: parent.path,
            position: parent.position,
            body: body.to_string(),
            reactions: None,
            in_reply_to_id: Some(parent_comment_id),
        };
        state.review_comments.entry(number).or_default().push(reply.clone());
        state.replies.push((number, parent_comment_id, body.to_string()));
        Ok(reply)
    }

    async fn close_pull_request(
        &self,
        _repo: &RepoSlug,
        number: u64,
    ) -> Result<ApiPullRequest, GitHubError> {
        let mut state = self.state();
        if state.fail_close {
            return Err(api_error(403, "Resource not accessible by integration"));
        }
        state.closed.push(number);
        let mut closed = pull(number, "closed");
        closed.state = "closed".to_string();
        Ok(closed)
    }

    async fn create_fork(
        &self,
        repo: &RepoSlug,
        organization: &str,
    ) -> Result<ApiRepository, GitHubError> {
        let mut state = self.state();
        if state.fail_fork {
            return Err(api_error(403, "Resource not accessible by integration"));
        }
        state
            .forks
            .push((repo.full_name(), organization.to_string()));
        Ok(ApiRepository {
            full_name: format!("{}/{}", organization, repo.name),
        })
    }

    async fn repository(&self, repo: &RepoSlug) -> Result<Option<ApiRepository>, GitHubError> {
        let mut state = self.state();
        state.fork_checks += 1;
        if state.fail_fork_check {
            return Err(api_error(500, "Server Error"));
        }
        if state.fork_checks <= state.fork_hidden_checks {
            return Ok(None);
        }
        Ok(Some(ApiRepository {
            full_name: repo.full_name(),
        }))
    }
}

/// Records every git invocation; fails any whose arguments contain a
/// configured marker.
pub struct FakeGit {
    calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
    fail_marker: Option<String>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_marker: None,
        }
    }

    pub fn failing_on(marker: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_marker: Some(marker.to_string()),
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Branch names pushed to the fork remote, in order.
    pub fn pushed_refs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter(|(_, args)| args.first().map(String::as_str) == Some("push"))
            .filter_map(|(_, args)| args.last()?.split_once(':').map(|(local, _)| local.to_string()))
            .filter_map(|local| local.strip_prefix("refs/heads/").map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Git for FakeGit {
    async fn run(&self, workdir: &Path, args: &[String]) -> Result<(), GitError> {
        self.calls
            .lock()
            .unwrap()
            .push((workdir.to_path_buf(), args.to_vec()));

        let joined = args.join(" ");
        match &self.fail_marker {
            Some(marker) if joined.contains(marker.as_str()) => Err(GitError::Failed {
                command: joined,
                status: "exit status: 1".to_string(),
                stderr: "fatal: simulated failure".to_string(),
            }),
            _ => Ok(()),
        }
    }
}
