use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::types::ReviewComment;
use crate::github::types::{DraftReviewComment, ReviewEvent};
use crate::github::{GitHubApi, GitHubError, NewReview, RepoSlug};
use crate::report::types::ThreadSummary;

#[derive(Debug, Error)]
#[error("unsupported review state {0}")]
pub struct UnsupportedReviewState(pub String);

#[derive(Debug, Error)]
pub enum ThreadError {
    #[error("review comment {comment_id} does not belong to a review")]
    MissingReview { comment_id: u64 },

    #[error("review {review_id}: {source}")]
    UnknownReviewState {
        review_id: u64,
        source: UnsupportedReviewState,
    },

    #[error(transparent)]
    Api(#[from] GitHubError),

    #[error("reply to comment {parent_id} failed after {created} replies: {source}")]
    Reply {
        parent_id: u64,
        created: usize,
        source: GitHubError,
    },
}

/// Map a review's read-side state to the action the create-review endpoint
/// expects. Any state outside the three submitted ones is rejected.
pub fn event_for_state(state: &str) -> Result<ReviewEvent, UnsupportedReviewState> {
    match state {
        "APPROVED" => Ok(ReviewEvent::Approve),
        "CHANGES_REQUESTED" => Ok(ReviewEvent::RequestChanges),
        "COMMENTED" => Ok(ReviewEvent::Comment),
        other => Err(UnsupportedReviewState(other.to_string())),
    }
}

/// Split comments into thread roots and replies, keeping input order.
pub fn partition_threads(comments: &[ReviewComment]) -> (Vec<&ReviewComment>, Vec<&ReviewComment>) {
    comments.iter().partition(|c| c.is_root())
}

/// The single inline comment submitted with a recreated review.
pub fn draft_comment(root: &ReviewComment) -> DraftReviewComment {
    DraftReviewComment {
        path: root.path.clone(),
        position: root.position,
        body: root.body.clone(),
    }
}

#[derive(Debug, Default)]
pub struct ThreadReplay {
    pub summary: ThreadSummary,
    pub errors: Vec<String>,
}

enum RootReplay {
    Threaded { replies_created: usize },
    /// The new review produced no comment we could find; replies were skipped.
    ParentMissing,
}

/// Recreate every review thread of source PR `source_number` on PR
/// `new_number`.
///
/// Each root becomes its own review carrying one comment, and the root's
/// replies are attached under that comment. A failing root is recorded and
/// the remaining roots still run.
#[instrument(skip(api, comments), fields(repo = %repo))]
pub async fn replicate_threads(
    api: &dyn GitHubApi,
    repo: &RepoSlug,
    source_number: u64,
    new_number: u64,
    comments: &[ReviewComment],
) -> ThreadReplay {
    let (roots, replies) = partition_threads(comments);
    let mut replay = ThreadReplay::default();
    replay.summary.roots_total = roots.len();

    let root_ids: HashSet<u64> = roots.iter().map(|r| r.comment_id).collect();
    let unanchored = replies
        .iter()
        .filter(|r| r.in_reply_to_id.map_or(true, |id| !root_ids.contains(&id)))
        .count();
    if unanchored > 0 {
        debug!(unanchored, "replies point at no thread root");
        replay.summary.replies_orphaned += unanchored;
    }

    let mut states: HashMap<u64, String> = HashMap::new();
    for root in roots {
        let thread: Vec<&ReviewComment> = replies
            .iter()
            .copied()
            .filter(|r| r.in_reply_to_id == Some(root.comment_id))
            .collect();

        match replicate_root(api, repo, source_number, new_number, root, &thread, &mut states).await {
            Ok(RootReplay::Threaded { replies_created }) => {
                replay.summary.roots_replicated += 1;
                replay.summary.replies_created += replies_created;
            }
            Ok(RootReplay::ParentMissing) => {
                // Nothing to attach the replies to; counted, not an error.
                debug!(root = root.comment_id, skipped = thread.len(), "new parent comment not found");
                replay.summary.roots_replicated += 1;
                replay.summary.replies_orphaned += thread.len();
            }
            Err(error) => {
                warn!(root = root.comment_id, %error, "failed to replicate review thread");
                replay.summary.roots_failed += 1;
                let created = match &error {
                    ThreadError::Reply { created, .. } => *created,
                    _ => 0,
                };
                replay.summary.replies_created += created;
                replay.summary.replies_orphaned += thread.len() - created;
                replay
                    .errors
                    .push(format!("review comment {}: {}", root.comment_id, error));
            }
        }
    }

    replay
}

async fn replicate_root(
    api: &dyn GitHubApi,
    repo: &RepoSlug,
    source_number: u64,
    new_number: u64,
    root: &ReviewComment,
    thread: &[&ReviewComment],
    states: &mut HashMap<u64, String>,
) -> Result<RootReplay, ThreadError> {
    let review_id = root.review_id.ok_or(ThreadError::MissingReview {
        comment_id: root.comment_id,
    })?;

    let state = match states.get(&review_id) {
        Some(state) => state.clone(),
        None => {
            let review = api.review(repo, source_number, review_id).await?;
            states.insert(review_id, review.state.clone());
            review.state
        }
    };
    let event = event_for_state(&state)
        .map_err(|source| ThreadError::UnknownReviewState { review_id, source })?;

    let review = NewReview {
        event,
        comments: vec![draft_comment(root)],
    };
    let created = api.create_review(repo, new_number, &review).await?;
    debug!(root = root.comment_id, review = created.id, %event, "created review");

    let parent = api
        .review_comments(repo, new_number)
        .await?
        .into_iter()
        .find(|c| c.pull_request_review_id == Some(created.id));
    let Some(parent) = parent else {
        return Ok(RootReplay::ParentMissing);
    };

    let mut replies_created = 0;
    for reply in thread {
        api.create_review_reply(repo, new_number, parent.id, &reply.body)
            .await
            .map_err(|source| ThreadError::Reply {
                parent_id: parent.id,
                created: replies_created,
                source,
            })?;
        replies_created += 1;
    }

    Ok(RootReplay::Threaded { replies_created })
}
