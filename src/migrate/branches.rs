use std::path::Path;
use tracing::{debug, info, instrument, warn};

use super::types::{ForkBranch, PullRequestDescriptor};
use super::{ForkPoll, MigrationError, MigrationSettings};
use crate::git::{authenticated_url, Git, GitError};
use crate::github::{parse_repo, GitHubApi, RepoSlug};

/// Branches that cannot serve as a PR head against their own repository.
const DEFAULT_BRANCHES: [&str; 2] = ["main", "master"];

const FORK_REMOTE: &str = "fork";

/// Result of pushing every descriptor's head commit into the fork.
#[derive(Debug)]
pub struct ForkReplication {
    pub fork: RepoSlug,
    /// One entry per descriptor, in descriptor order
    pub pushes: Vec<Result<ForkBranch, GitError>>,
}

/// Branch name used in the fork for a PR whose head is `head_ref`.
///
/// Default-branch heads become `main-<fork name>`; everything else keeps
/// its name.
pub fn fork_head_ref(head_ref: &str, fork_name: &str) -> String {
    if DEFAULT_BRANCHES.contains(&head_ref) {
        format!("main-{}", fork_name)
    } else {
        head_ref.to_string()
    }
}

/// Fork `source` into the target organization and push each descriptor's
/// head commit to a branch in the fork.
///
/// The clone lives in a temporary directory that is removed when this
/// returns, on success or failure.
#[instrument(skip_all, fields(repo = %source, org = %settings.target_org))]
pub async fn replicate(
    api: &dyn GitHubApi,
    git: &dyn Git,
    source: &RepoSlug,
    descriptors: &[PullRequestDescriptor],
    settings: &MigrationSettings,
) -> Result<ForkReplication, MigrationError> {
    let fork = create_fork(api, source, &settings.target_org, &settings.fork_poll).await?;

    let workdir = tempfile::Builder::new().prefix("fork-migrate-").tempdir()?;
    let clone_dir = workdir.path().join(&fork.name);
    prepare_clone(git, workdir.path(), &clone_dir, source, &fork, settings)
        .await
        .map_err(|source_err| MigrationError::Clone {
            repo: source.full_name(),
            source: source_err,
        })?;

    let mut pushes = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let head_ref = fork_head_ref(&descriptor.head_ref, &fork.name);
        let result = push_branch(git, &clone_dir, &descriptor.sha, &head_ref).await;
        match &result {
            Ok(()) => info!(pr = descriptor.number, head_ref = %head_ref, "pushed branch to fork"),
            Err(error) => warn!(pr = descriptor.number, head_ref = %head_ref, %error, "failed to push branch"),
        }
        pushes.push(result.map(|()| ForkBranch {
            source_number: descriptor.number,
            head_ref,
        }));
    }

    Ok(ForkReplication { fork, pushes })
}

async fn create_fork(
    api: &dyn GitHubApi,
    source: &RepoSlug,
    organization: &str,
    poll: &ForkPoll,
) -> Result<RepoSlug, MigrationError> {
    let fork_error = |source_err| MigrationError::Fork {
        repo: source.full_name(),
        organization: organization.to_string(),
        source: source_err,
    };

    let created = api.create_fork(source, organization).await.map_err(fork_error)?;
    let fork = parse_repo(&created.full_name).map_err(fork_error)?;
    info!(fork = %fork, "fork requested");

    wait_for_fork(api, &fork, poll).await?;
    Ok(fork)
}

/// Poll until the fork is visible, at most `poll.attempts` times.
async fn wait_for_fork(
    api: &dyn GitHubApi,
    fork: &RepoSlug,
    poll: &ForkPoll,
) -> Result<(), MigrationError> {
    let attempts = poll.attempts.max(1);
    for attempt in 1..=attempts {
        let found = api
            .repository(fork)
            .await
            .map_err(|source| MigrationError::ForkCheck {
                fork: fork.full_name(),
                source,
            })?;
        if found.is_some() {
            debug!(attempt, "fork is available");
            return Ok(());
        }

        debug!(attempt, "fork not visible yet");
        if attempt < attempts {
            tokio::time::sleep(poll.interval).await;
        }
    }

    Err(MigrationError::ForkNotReady {
        fork: fork.full_name(),
        attempts,
    })
}

async fn prepare_clone(
    git: &dyn Git,
    workdir: &Path,
    clone_dir: &Path,
    source: &RepoSlug,
    fork: &RepoSlug,
    settings: &MigrationSettings,
) -> Result<(), GitError> {
    let origin = authenticated_url(&settings.git_host, &settings.token, source);
    let fork_url = authenticated_url(&settings.git_host, &settings.token, fork);

    git.run(
        workdir,
        &[
            "clone".to_string(),
            "--no-checkout".to_string(),
            origin,
            clone_dir.display().to_string(),
        ],
    )
    .await?;

    git.run(
        clone_dir,
        &["remote".to_string(), "add".to_string(), FORK_REMOTE.to_string(), fork_url],
    )
    .await
}

async fn push_branch(git: &dyn Git, clone_dir: &Path, sha: &str, head_ref: &str) -> Result<(), GitError> {
    git.run(clone_dir, &["fetch".to_string(), "origin".to_string(), sha.to_string()])
        .await?;
    git.run(
        clone_dir,
        &["branch".to_string(), head_ref.to_string(), sha.to_string()],
    )
    .await?;
    git.run(
        clone_dir,
        &[
            "push".to_string(),
            FORK_REMOTE.to_string(),
            format!("refs/heads/{0}:refs/heads/{0}", head_ref),
        ],
    )
    .await
}
