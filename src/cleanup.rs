//! Onboarding cleanup: drop the temporary onboarding workflow from a tenant
//! branch and report on its pull request.
use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;

use crate::cli::CleanupArgs;
use crate::config::{process_env, url_host, GitHubSettings, Lookup, RepoSlug};
use crate::git::Git;
use crate::github::GitHubClient;

pub const ONBOARDING_WORKFLOW_PATH: &str = ".github/workflows/onboarding_workflow.yml";
const ORIGIN: &str = "origin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutSource {
    Local,
    /// Tracking branch created from `origin/<b>`.
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Present on disk but never committed; removed without a commit.
    Untracked,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentOutcome {
    Posted { number: u64, url: Option<String> },
    NoPullRequest,
    Disabled,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct CleanupReport {
    pub branch: String,
    pub checkout: CheckoutSource,
    pub deleted: DeleteOutcome,
    pub commit: Option<String>,
    pub comment: CommentOutcome,
}

/// Review-service connection used for the status comment.
pub struct GitHubTarget {
    pub client: GitHubClient,
    pub repo: RepoSlug,
}

pub fn run_cleanup(args: &CleanupArgs) -> Result<()> {
    install_interrupt_handler();
    let branch = args.branch_name.as_str();
    let root = match &args.repo_path {
        Some(path) => path.clone(),
        None => env::current_dir().context("resolve current directory")?,
    };
    tracing::info!(branch, repo = %root.display(), "🚀 Starting onboarding cleanup process...");

    let result = Git::open(&root).and_then(|git| {
        let github = connect_github(&git, &process_env);
        cleanup(&git, branch, github.as_ref())
    });
    match result {
        Ok(report) => {
            tracing::info!(
                branch = %report.branch,
                checkout = ?report.checkout,
                deleted = ?report.deleted,
                commit = report.commit.as_deref().unwrap_or("none"),
                comment = ?report.comment,
                "✅ Onboarding cleanup completed successfully!"
            );
            if let CommentOutcome::Posted {
                number,
                url: Some(url),
            } = &report.comment
            {
                println!("Commented on pull request #{number}: {url}");
            }
            println!("✅ Successfully cleaned up onboarding workflow for branch: {branch}");
            Ok(())
        }
        Err(err) => {
            println!("❌ Cleanup failed for branch: {branch}");
            Err(err)
        }
    }
}

/// Ctrl-C ends the run with status 1 instead of the signal's default.
fn install_interrupt_handler() {
    let installed = ctrlc::set_handler(|| {
        println!("⚠️ Cleanup interrupted by user");
        std::process::exit(1);
    });
    if let Err(err) = installed {
        tracing::warn!(error = %err, "could not install interrupt handler");
    }
}

/// Connect when a token is available; the slug comes from `origin` when it
/// points at the configured server, otherwise from `GITHUB_REPOSITORY`.
pub fn connect_github(git: &Git, lookup: &impl Lookup) -> Option<GitHubTarget> {
    let Some(token) = lookup("GITHUB_TOKEN").filter(|token| !token.trim().is_empty()) else {
        tracing::warn!("GITHUB_TOKEN not found, GitHub operations disabled");
        return None;
    };
    let remote = match git.remote_url(ORIGIN) {
        Ok(remote) => remote,
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "could not read origin remote");
            None
        }
    };
    let server_url = GitHubSettings::server_url_from(lookup);
    let Some(repo) = resolve_repository(
        remote.as_deref(),
        url_host(&server_url),
        lookup("GITHUB_REPOSITORY").as_deref(),
    ) else {
        tracing::warn!("Not a GitHub repository, GitHub operations disabled");
        return None;
    };
    tracing::info!(repository = %repo, "Connected to GitHub repository");
    Some(GitHubTarget {
        client: GitHubClient::new(&GitHubSettings::api_url_from(lookup), &token),
        repo,
    })
}

fn resolve_repository(
    remote_url: Option<&str>,
    host: &str,
    fallback: Option<&str>,
) -> Option<RepoSlug> {
    remote_url
        .and_then(|url| RepoSlug::from_remote_url(url, host))
        .or_else(|| fallback.and_then(|raw| RepoSlug::parse(raw).ok()))
}

pub fn cleanup(git: &Git, branch: &str, github: Option<&GitHubTarget>) -> Result<CleanupReport> {
    let checkout = checkout_branch(git, branch)?;
    tracing::debug!(current = %git.current_branch()?, "on branch");

    let deleted = delete_onboarding_workflow(git)?;
    let commit = match deleted {
        DeleteOutcome::Deleted => {
            let sha = git
                .commit(&commit_message(branch))
                .context("commit onboarding workflow removal")?;
            tracing::info!(sha = %short_sha(&sha), "Committed changes");
            git.push(ORIGIN, branch, false, None)
                .with_context(|| format!("push {branch} to {ORIGIN}"))?;
            tracing::info!(branch, "Successfully pushed changes to remote branch");
            Some(sha)
        }
        DeleteOutcome::Untracked | DeleteOutcome::NotFound => {
            tracing::warn!("⚠️ No onboarding file to delete");
            None
        }
    };

    let comment = match github {
        Some(target) => post_cleanup_comment(target, branch, deleted),
        None => {
            tracing::warn!("GitHub client not available, skipping PR comment");
            CommentOutcome::Disabled
        }
    };

    Ok(CleanupReport {
        branch: branch.to_string(),
        checkout,
        deleted,
        commit,
        comment,
    })
}

fn checkout_branch(git: &Git, branch: &str) -> Result<CheckoutSource> {
    if git.local_branch_exists(branch)? {
        tracing::info!(branch, "Branch found locally");
        git.checkout(branch)?;
        tracing::info!(branch, "Checked out local branch");
        return Ok(CheckoutSource::Local);
    }
    if let Err(err) = git.fetch(ORIGIN) {
        tracing::warn!(error = %format!("{err:#}"), "Could not fetch remote branches");
    }
    if git.remote_branch_exists(ORIGIN, branch)? {
        tracing::info!(branch, "Branch found remotely");
        git.create_tracking_branch(branch, ORIGIN)
            .context("create tracking branch")?;
        tracing::info!(branch, "Created and checked out tracking branch");
        return Ok(CheckoutSource::Remote);
    }
    Err(anyhow!("branch '{branch}' not found locally or remotely"))
}

/// Only a missing index entry or a failed `git rm` is tolerated here; both
/// leave nothing staged.
fn delete_onboarding_workflow(git: &Git) -> Result<DeleteOutcome> {
    let path = git.root().join(ONBOARDING_WORKFLOW_PATH);
    if !path.is_file() {
        tracing::warn!(
            file = ONBOARDING_WORKFLOW_PATH,
            "Onboarding workflow file not found"
        );
        return Ok(DeleteOutcome::NotFound);
    }
    if !git.is_tracked(&path)? {
        match fs::remove_file(&path) {
            Ok(()) => tracing::warn!(
                file = ONBOARDING_WORKFLOW_PATH,
                "Removed untracked onboarding workflow file; nothing to commit"
            ),
            Err(err) => tracing::warn!(
                file = ONBOARDING_WORKFLOW_PATH,
                error = %err,
                "Could not remove untracked onboarding workflow file"
            ),
        }
        return Ok(DeleteOutcome::Untracked);
    }
    if let Err(err) = git.remove(&path) {
        tracing::error!(
            file = ONBOARDING_WORKFLOW_PATH,
            error = %format!("{err:#}"),
            "Error deleting onboarding file"
        );
        return Ok(DeleteOutcome::NotFound);
    }
    tracing::info!(
        file = ONBOARDING_WORKFLOW_PATH,
        "Deleted and staged onboarding workflow file"
    );
    Ok(DeleteOutcome::Deleted)
}

fn post_cleanup_comment(
    target: &GitHubTarget,
    branch: &str,
    deleted: DeleteOutcome,
) -> CommentOutcome {
    let head = format!("{}:{branch}", target.repo.owner);
    let pulls = match target.client.list_open_pulls(&target.repo, &head) {
        Ok(pulls) => pulls,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "Error looking up pull request");
            return CommentOutcome::Failed(format!("{err:#}"));
        }
    };
    let Some(pull) = pulls.first() else {
        tracing::warn!(branch, "No open PR found for branch");
        return CommentOutcome::NoPullRequest;
    };
    match target
        .client
        .create_issue_comment(&target.repo, pull.number, &comment_body(branch, deleted))
    {
        Ok(comment) => {
            tracing::info!(
                number = pull.number,
                comment = comment.id,
                "Added cleanup comment to PR"
            );
            CommentOutcome::Posted {
                number: pull.number,
                url: comment.html_url,
            }
        }
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "Error adding PR comment");
            CommentOutcome::Failed(format!("{err:#}"))
        }
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}

pub fn commit_message(branch: &str) -> String {
    format!(
        "🗑️ Cleanup: Remove temporary onboarding workflow\n\
         \n\
         - Deleted {ONBOARDING_WORKFLOW_PATH}\n\
         - Onboarding process completed successfully\n\
         - Regular GitOps workflow is now active\n\
         \n\
         Branch: {branch}\n"
    )
}

pub fn comment_body(branch: &str, deleted: DeleteOutcome) -> String {
    let (headline, changes) = match deleted {
        DeleteOutcome::Deleted => (
            "✅ **Temporary onboarding workflow removed successfully**",
            format!(
                "- 🗑️ Deleted `{ONBOARDING_WORKFLOW_PATH}`\n\
                 - ✅ Committed cleanup changes to branch: `{branch}`"
            ),
        ),
        DeleteOutcome::Untracked => (
            "✅ **No committed onboarding workflow was present**",
            format!(
                "- ℹ️ `{ONBOARDING_WORKFLOW_PATH}` was untracked on branch: `{branch}`; \
                 removed from the work tree only"
            ),
        ),
        DeleteOutcome::NotFound => (
            "✅ **No temporary onboarding workflow was present**",
            format!("- ℹ️ `{ONBOARDING_WORKFLOW_PATH}` was already absent on branch: `{branch}`"),
        ),
    };
    format!(
        "## 🗑️ Onboarding Cleanup Completed\n\
         \n\
         {headline}\n\
         \n\
         ### Changes Made:\n\
         {changes}\n\
         \n\
         ### Status:\n\
         - 🎉 **Tenant onboarding process completed**\n\
         - 🔄 **Regular GitOps workflow now active**\n\
         - 📦 **Ready for production deployments**\n\
         \n\
         ### Next Steps:\n\
         1. **Merge this PR** to finalize the tenant setup\n\
         2. **Future deployments** will use the standard GitOps process:\n   \
         - Push to main → Dev deployment\n   \
         - Tags (v*.*.*)  → Stage/UAT/Prod deployments\n\
         \n\
         ---\n\
         *Cleanup performed automatically by onboarding cleanup script*\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn target(server: &mockito::Server) -> GitHubTarget {
        GitHubTarget {
            client: GitHubClient::new(&server.url(), "t"),
            repo: RepoSlug {
                owner: "acme-org".into(),
                name: "infra".into(),
            },
        }
    }

    #[test]
    fn repository_prefers_matching_origin() {
        let slug = resolve_repository(
            Some("git@github.com:acme-org/infra.git"),
            "github.com",
            Some("other/repo"),
        )
        .expect("slug");
        assert_eq!(slug.to_string(), "acme-org/infra");

        let slug = resolve_repository(Some("/srv/git/infra.git"), "github.com", Some("other/repo"))
            .expect("fallback slug");
        assert_eq!(slug.to_string(), "other/repo");

        assert!(resolve_repository(None, "github.com", None).is_none());
        assert!(resolve_repository(None, "github.com", Some("bogus")).is_none());
    }

    #[test]
    fn messages_name_the_branch() {
        let commit = commit_message("feature/tenant-acme");
        assert!(commit.starts_with("🗑️ Cleanup: Remove temporary onboarding workflow\n\n"));
        assert!(commit.ends_with("Branch: feature/tenant-acme\n"));

        let body = comment_body("feature/tenant-acme", DeleteOutcome::Deleted);
        assert!(body.contains("Committed cleanup changes to branch: `feature/tenant-acme`"));
        assert!(body.contains("   - Push to main → Dev deployment\n"));
        let absent = comment_body("feature/tenant-acme", DeleteOutcome::NotFound);
        assert!(absent.contains("already absent"));
        let untracked = comment_body("feature/tenant-acme", DeleteOutcome::Untracked);
        assert!(untracked.contains("untracked on branch: `feature/tenant-acme`"));
    }

    #[test]
    fn comments_on_first_open_pull_request() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/repos/acme-org/infra/pulls")
            .match_query(Matcher::UrlEncoded(
                "head".into(),
                "acme-org:feature/tenant-acme".into(),
            ))
            .with_status(200)
            .with_body(r#"[{"number": 9, "html_url": "u9"}, {"number": 4, "html_url": "u4"}]"#)
            .create();
        let comment = server
            .mock("POST", "/repos/acme-org/infra/issues/9/comments")
            .match_body(Matcher::Regex("Onboarding Cleanup Completed".into()))
            .with_status(201)
            .with_body(r#"{"id": 1, "html_url": "https://github.com/c/1"}"#)
            .create();
        let outcome =
            post_cleanup_comment(&target(&server), "feature/tenant-acme", DeleteOutcome::Deleted);
        assert_eq!(
            outcome,
            CommentOutcome::Posted {
                number: 9,
                url: Some("https://github.com/c/1".into())
            }
        );
        comment.assert();
    }

    #[test]
    fn comment_failures_are_values() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/repos/acme-org/infra/pulls")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create();
        assert_eq!(
            post_cleanup_comment(&target(&server), "b", DeleteOutcome::NotFound),
            CommentOutcome::NoPullRequest
        );

        let mut server = mockito::Server::new();
        server
            .mock("GET", "/repos/acme-org/infra/pulls")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body(r#"{"message": "boom"}"#)
            .create();
        match post_cleanup_comment(&target(&server), "b", DeleteOutcome::Deleted) {
            CommentOutcome::Failed(message) => assert!(message.contains("boom")),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
