pub mod branches;
pub mod collect;
pub mod rebuild;
pub mod threads;
pub mod types;

#[cfg(test)]
pub(crate) mod fakes;

pub use types::PullRequestDescriptor;

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::git::{Git, GitError};
use crate::github::{GitHubApi, GitHubError, RepoSlug};
use crate::report::types::{MigrationReport, MigrationState, PrOutcome};

/// Failures that stop the whole run. Per-PR failures land in the report instead.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to list pull requests for {repo}: {source}")]
    ListPullRequests { repo: String, source: GitHubError },

    #[error("Failed to fork {repo} into {organization}: {source}")]
    Fork {
        repo: String,
        organization: String,
        source: GitHubError,
    },

    #[error("Failed to check whether fork {fork} is ready: {source}")]
    ForkCheck { fork: String, source: GitHubError },

    #[error("Fork {fork} was not available after {attempts} checks")]
    ForkNotReady { fork: String, attempts: u32 },

    #[error("Failed to create working directory: {0}")]
    WorkDir(#[from] std::io::Error),

    #[error("Failed to prepare local clone of {repo}: {source}")]
    Clone { repo: String, source: GitError },
}

/// Bounded wait for a freshly requested fork to show up.
#[derive(Debug, Clone)]
pub struct ForkPoll {
    pub attempts: u32,
    pub interval: Duration,
}

/// Everything the pipeline needs besides the two clients.
#[derive(Clone)]
pub struct MigrationSettings {
    pub label: String,
    pub base_branch: String,
    pub target_org: String,
    pub close_original: bool,
    pub dry_run: bool,
    pub fork_poll: ForkPoll,
    pub git_host: String,
    pub token: String,
}

impl fmt::Debug for MigrationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationSettings")
            .field("label", &self.label)
            .field("base_branch", &self.base_branch)
            .field("target_org", &self.target_org)
            .field("close_original", &self.close_original)
            .field("dry_run", &self.dry_run)
            .field("fork_poll", &self.fork_poll)
            .field("git_host", &self.git_host)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Run collection, branch replication and PR reconstruction in sequence.
///
/// Stages run strictly one after another and every remote call completes
/// before the next one starts. Running twice creates a second set of
/// pull requests; nothing here checks for earlier runs.
#[instrument(skip_all, fields(repo = %source))]
pub async fn run(
    api: &dyn GitHubApi,
    git: &dyn Git,
    source: &RepoSlug,
    settings: &MigrationSettings,
) -> Result<MigrationReport, MigrationError> {
    info!(label = %settings.label, "collecting labelled pull requests");
    let collection = collect::collect(api, source, &settings.label).await?;
    info!(
        collected = collection.descriptors.len(),
        unresolved = collection.unresolved.len(),
        "collection complete"
    );

    let mut report = MigrationReport {
        source_repo: source.full_name(),
        fork_full_name: None,
        dry_run: settings.dry_run,
        outcomes: collection.unresolved,
    };

    if settings.dry_run || collection.descriptors.is_empty() {
        if collection.descriptors.is_empty() {
            info!("no pull requests carry the migration label, nothing to fork");
        }
        report
            .outcomes
            .extend(collection.descriptors.iter().map(collected_outcome));
        return Ok(report);
    }

    info!(org = %settings.target_org, "replicating branches into fork");
    let replication =
        branches::replicate(api, git, source, &collection.descriptors, settings).await?;
    report.fork_full_name = Some(replication.fork.full_name());

    info!(fork = %replication.fork, "rebuilding pull requests");
    for (descriptor, push) in collection.descriptors.iter().zip(replication.pushes) {
        let outcome = match push {
            Ok(branch) => {
                debug_assert_eq!(branch.source_number, descriptor.number);
                rebuild::reconstruct(api, source, &replication.fork, descriptor, &branch, settings)
                    .await
            }
            Err(error) => {
                warn!(pr = descriptor.number, %error, "skipping pull request without fork branch");
                let mut outcome = PrOutcome::failed(
                    descriptor.number,
                    &descriptor.title,
                    MigrationState::ForkPushFailed,
                    error,
                );
                outcome.conversation_comments = descriptor.conversation_comments.len();
                outcome
            }
        };
        report.outcomes.push(outcome);
    }

    Ok(report)
}

fn collected_outcome(descriptor: &PullRequestDescriptor) -> PrOutcome {
    let mut outcome = PrOutcome::new(descriptor.number, &descriptor.title, MigrationState::Collected);
    outcome.head_ref = Some(descriptor.head_ref.clone());
    outcome.conversation_comments = descriptor.conversation_comments.len();
    outcome.threads.roots_total = descriptor
        .review_comments
        .iter()
        .filter(|c| c.is_root())
        .count();
    outcome
}
