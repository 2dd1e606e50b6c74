use tracing::{debug, info, instrument, warn};

use super::types::PullRequestDescriptor;
use super::MigrationError;
use crate::github::{ApiPullRequest, GitHubApi, GitHubError, RepoSlug};
use crate::report::types::{MigrationState, PrOutcome};

/// Labelled pull requests ready for migration, plus outcomes for the ones
/// that could not be read.
#[derive(Debug, Default)]
pub struct Collection {
    pub descriptors: Vec<PullRequestDescriptor>,
    /// `LabelUnverified` or `CollectFailed` outcomes
    pub unresolved: Vec<PrOutcome>,
}

/// Gather every open pull request in `repo` that carries `label`.
///
/// Listing the pull requests is fatal on failure. A PR whose labels cannot
/// be read is reported as unverified, since it may not be labelled at all.
/// A labelled PR whose comments cannot be read is reported as failed.
#[instrument(skip(api), fields(repo = %repo))]
pub async fn collect(
    api: &dyn GitHubApi,
    repo: &RepoSlug,
    label: &str,
) -> Result<Collection, MigrationError> {
    let pulls = api
        .open_pull_requests(repo)
        .await
        .map_err(|source| MigrationError::ListPullRequests {
            repo: repo.full_name(),
            source,
        })?;
    debug!(open = pulls.len(), "listed open pull requests");

    let mut collection = Collection::default();
    for pr in pulls {
        let number = pr.number;
        match has_label(api, repo, number, label).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(pr = number, "label missing, skipping");
                continue;
            }
            Err(error) => {
                warn!(pr = number, %error, "could not read labels");
                let mut outcome = PrOutcome::new(number, &pr.title, MigrationState::LabelUnverified);
                outcome.errors.push(error.to_string());
                collection.unresolved.push(outcome);
                continue;
            }
        }

        let title = pr.title.clone();
        match describe(api, repo, pr).await {
            Ok(descriptor) => {
                info!(
                    pr = number,
                    head = %descriptor.head_label,
                    head_repo = descriptor.head_repo_full_name.as_deref().unwrap_or("<deleted>"),
                    link = %descriptor.html_link,
                    review_comments = descriptor.review_comments.len(),
                    "collected pull request"
                );
                collection.descriptors.push(descriptor);
            }
            Err(error) => {
                warn!(pr = number, %error, "failed to collect pull request");
                collection.unresolved.push(PrOutcome::failed(
                    number,
                    title,
                    MigrationState::CollectFailed,
                    error,
                ));
            }
        }
    }

    Ok(collection)
}

async fn has_label(
    api: &dyn GitHubApi,
    repo: &RepoSlug,
    number: u64,
    label: &str,
) -> Result<bool, GitHubError> {
    let labels = api.issue_labels(repo, number).await?;
    Ok(labels.iter().any(|l| l.name == label))
}

async fn describe(
    api: &dyn GitHubApi,
    repo: &RepoSlug,
    pr: ApiPullRequest,
) -> Result<PullRequestDescriptor, GitHubError> {
    let comments = api.issue_comments(repo, pr.number).await?;
    let review_comments = api.review_comments(repo, pr.number).await?;
    Ok(PullRequestDescriptor::from_api(pr, comments, review_comments))
}
