//! Pull-request creation with ordered head-reference strategies.
use anyhow::{anyhow, Result};

use crate::config::RepoSlug;
use crate::github::{GitHubClient, NewPullRequest, PullRequest};

/// How the pull request's head was expressed, tried in [`HeadStrategy::ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadStrategy {
    /// `<branch>`
    Branch,
    /// `<owner>:<branch>`
    OwnerQualified,
    /// Create `refs/heads/<branch>` at the local head, then retry with `<branch>`.
    CreateRefThenBranch,
}

impl HeadStrategy {
    pub const ORDER: [HeadStrategy; 3] = [
        HeadStrategy::Branch,
        HeadStrategy::OwnerQualified,
        HeadStrategy::CreateRefThenBranch,
    ];

    pub fn label(self) -> &'static str {
        match self {
            HeadStrategy::Branch => "branch",
            HeadStrategy::OwnerQualified => "owner-qualified",
            HeadStrategy::CreateRefThenBranch => "create-ref-then-branch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadAttempt {
    pub strategy: HeadStrategy,
    pub head: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct OpenedPullRequest {
    pub pull: PullRequest,
    pub strategy: HeadStrategy,
    /// Strategies that failed before `strategy` succeeded.
    pub failed: Vec<HeadAttempt>,
}

pub struct PullRequestDraft<'a> {
    pub branch: &'a str,
    pub base: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    /// Local `HEAD`, used when the remote branch ref has to be created.
    pub head_sha: &'a str,
}

pub fn open_pull_request(
    client: &GitHubClient,
    repo: &RepoSlug,
    draft: &PullRequestDraft<'_>,
) -> Result<OpenedPullRequest> {
    let mut failed: Vec<HeadAttempt> = Vec::new();
    for strategy in HeadStrategy::ORDER {
        let head = match strategy {
            HeadStrategy::OwnerQualified => format!("{}:{}", repo.owner, draft.branch),
            HeadStrategy::Branch | HeadStrategy::CreateRefThenBranch => draft.branch.to_string(),
        };
        match attempt(client, repo, draft, strategy, &head) {
            Ok(pull) => {
                tracing::info!(
                    strategy = strategy.label(),
                    number = pull.number,
                    url = %pull.html_url,
                    "pull request created"
                );
                return Ok(OpenedPullRequest {
                    pull,
                    strategy,
                    failed,
                });
            }
            Err(err) => {
                tracing::warn!(
                    strategy = strategy.label(),
                    head = %head,
                    error = %format!("{err:#}"),
                    "pull request attempt failed"
                );
                failed.push(HeadAttempt {
                    strategy,
                    head,
                    error: format!("{err:#}"),
                });
            }
        }
    }
    let summary = failed
        .iter()
        .map(|attempt| {
            format!(
                "{} ({}): {}",
                attempt.strategy.label(),
                attempt.head,
                attempt.error
            )
        })
        .collect::<Vec<_>>()
        .join("; ");
    Err(anyhow!("could not create pull request: {summary}"))
}

fn attempt(
    client: &GitHubClient,
    repo: &RepoSlug,
    draft: &PullRequestDraft<'_>,
    strategy: HeadStrategy,
    head: &str,
) -> Result<PullRequest> {
    if strategy == HeadStrategy::CreateRefThenBranch {
        let reference = format!("heads/{}", draft.branch);
        match client.get_ref(repo, &reference)? {
            Some(existing) => {
                tracing::info!(
                    reference = %existing.name,
                    sha = %existing.object.sha,
                    "remote branch ref exists"
                );
            }
            None => {
                let created =
                    client.create_ref(repo, &format!("refs/{reference}"), draft.head_sha)?;
                tracing::info!(
                    reference = %created.name,
                    sha = %created.object.sha,
                    "created remote branch ref"
                );
            }
        }
    }
    client.create_pull(
        repo,
        &NewPullRequest {
            title: draft.title.to_string(),
            body: draft.body.to_string(),
            head: head.to_string(),
            base: draft.base.to_string(),
        },
    )
}
