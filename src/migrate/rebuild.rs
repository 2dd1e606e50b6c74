use tracing::{info, instrument, warn};

use super::threads;
use super::types::{ForkBranch, PullRequestDescriptor};
use super::MigrationSettings;
use crate::github::{GitHubApi, NewPullRequest, RepoSlug};
use crate::report::types::{MigrationState, PrOutcome};

/// Pull request that replaces `descriptor`, headed by the fork branch.
pub fn replacement_request(
    descriptor: &PullRequestDescriptor,
    fork: &RepoSlug,
    head_ref: &str,
    base_branch: &str,
) -> NewPullRequest {
    NewPullRequest {
        title: descriptor.title.clone(),
        head: format!("{}:{}", fork.owner, head_ref),
        base: base_branch.to_string(),
        body: descriptor.body.clone(),
    }
}

/// Open the replacement PR, replay its review threads and close the original.
///
/// Never fails as a whole: every problem ends up in the returned outcome.
#[instrument(skip_all, fields(pr = descriptor.number, head_ref = %branch.head_ref))]
pub async fn reconstruct(
    api: &dyn GitHubApi,
    source: &RepoSlug,
    fork: &RepoSlug,
    descriptor: &PullRequestDescriptor,
    branch: &ForkBranch,
    settings: &MigrationSettings,
) -> PrOutcome {
    let mut outcome = PrOutcome::new(
        descriptor.number,
        &descriptor.title,
        MigrationState::ForkBranchPushed,
    );
    outcome.head_ref = Some(branch.head_ref.clone());
    outcome.conversation_comments = descriptor.conversation_comments.len();

    let request = replacement_request(descriptor, fork, &branch.head_ref, &settings.base_branch);
    let created = match api.create_pull_request(source, &request).await {
        Ok(created) => created,
        Err(error) => {
            warn!(%error, "failed to open replacement pull request");
            outcome.state = MigrationState::PrOpenFailed;
            outcome.errors.push(error.to_string());
            return outcome;
        }
    };
    info!(new = created.number, "opened replacement pull request");
    outcome.state = MigrationState::NewPrOpened;
    outcome.new_number = Some(created.number);
    outcome.new_url = Some(created.html_url.clone());

    let replay = threads::replicate_threads(
        api,
        source,
        descriptor.number,
        created.number,
        &descriptor.review_comments,
    )
    .await;
    outcome.state = if replay.summary.roots_failed > 0 {
        MigrationState::ReviewReplicationPartial
    } else {
        MigrationState::ReviewsReplicated
    };
    outcome.threads = replay.summary;
    outcome.errors.extend(replay.errors);

    if settings.close_original {
        close_original(api, source, descriptor.number, &mut outcome).await;
    }

    outcome
}

async fn close_original(api: &dyn GitHubApi, source: &RepoSlug, number: u64, outcome: &mut PrOutcome) {
    match api.close_pull_request(source, number).await {
        Ok(closed) if closed.state == "closed" => {
            info!("closed original pull request");
            outcome.original_closed = true;
            if outcome.state == MigrationState::ReviewsReplicated {
                outcome.state = MigrationState::OriginalClosed;
            }
        }
        Ok(still_open) => {
            warn!(state = %still_open.state, "original pull request did not close");
            outcome
                .errors
                .push(format!("original pull request is still {}", still_open.state));
        }
        Err(error) => {
            warn!(%error, "failed to close original pull request");
            outcome
                .errors
                .push(format!("failed to close original pull request: {}", error));
        }
    }
}
