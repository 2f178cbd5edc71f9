//! Tenant provisioning: render templates onto a feature branch, push it and
//! open a pull request.
use anyhow::{anyhow, Context, Result};
use std::path::Path;

use crate::cli::ProvisionArgs;
use crate::config::{GitHubSettings, ProvisionConfig, RepoSlug};
use crate::git::Git;
use crate::github::GitHubClient;
use crate::placeholders::PlaceholderSet;
use crate::util::display_path;

mod copy;
mod messages;
mod pull_request;

use copy::{WorkflowOutcome, TEMPLATE_TENANT_DIR, TEMPLATE_WORKFLOWS_DIR, TENANTS_DIR};
use pull_request::{open_pull_request, HeadStrategy, PullRequestDraft};

/// Push routes, tried in [`PushStrategy::ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStrategy {
    /// `git push --force origin <b>:<b>`
    Origin,
    /// `git push --force <token url> HEAD:refs/heads/<b>`
    Authenticated,
}

impl PushStrategy {
    pub const ORDER: [PushStrategy; 2] = [PushStrategy::Origin, PushStrategy::Authenticated];

    pub fn label(self) -> &'static str {
        match self {
            PushStrategy::Origin => "origin",
            PushStrategy::Authenticated => "authenticated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushAttempt {
    pub strategy: PushStrategy,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub branch: String,
    pub workflows: WorkflowOutcome,
    pub rendered_files: usize,
    /// `None` when nothing was staged and the existing head was pushed.
    pub commit: Option<String>,
    pub push: PushStrategy,
    pub pull_request_url: String,
    pub head_strategy: HeadStrategy,
}

pub fn run_provision(args: &ProvisionArgs) -> Result<()> {
    let config = ProvisionConfig::from_env(args.repo_path.clone())?;
    let report = provision(&config)?;
    tracing::info!(
        branch = %report.branch,
        rendered = report.rendered_files,
        workflows = report.workflows.status(),
        commit = report.commit.as_deref().unwrap_or("none"),
        push = report.push.label(),
        head = report.head_strategy.label(),
        "tenant provisioned"
    );
    println!("✅ Pull request created: {}", report.pull_request_url);
    Ok(())
}

pub fn provision(config: &ProvisionConfig) -> Result<ProvisionReport> {
    let tenant = &config.tenant;
    let root = config.repo_root.as_path();
    let git = Git::open(root)?;
    println!("{}", messages::input_summary(tenant));

    let branch = tenant.branch_name();
    if git.local_branch_exists(&branch)? {
        tracing::info!(branch = %branch, "checking out existing branch");
        git.checkout(&branch)?;
    } else {
        tracing::info!(branch = %branch, "creating branch");
        git.create_branch(&branch)?;
    }

    let set = PlaceholderSet::for_tenant(tenant);
    let tenant_dir = root.join(TENANTS_DIR).join(&tenant.tenant_name);
    let rendered = copy::copy_tenant_tree(&root.join(TEMPLATE_TENANT_DIR), &tenant_dir, &set)
        .context("copy tenant templates")?;
    for file in &rendered {
        tracing::debug!(
            source = %display_path(&file.source, Some(root)),
            dest = %display_path(&file.dest, Some(root)),
            "rendered"
        );
        warn_unresolved(&set, &file.dest, root);
    }
    tracing::info!(
        count = rendered.len(),
        literal_only = rendered.iter().filter(|file| file.engine_error.is_some()).count(),
        dest = %display_path(&tenant_dir, Some(root)),
        "tenant templates rendered"
    );

    let workflows = copy::copy_workflows(
        &root.join(TEMPLATE_WORKFLOWS_DIR),
        root,
        &tenant_dir,
        &set,
        config.skip_workflows,
    );
    if let WorkflowOutcome::Skipped { reason } = &workflows {
        tracing::warn!(reason = %reason, "workflows skipped");
    }

    git.add_all()?;
    let commit = if git.has_staged_changes()? {
        let sha = git.commit(&messages::commit_message(tenant, &workflows))?;
        tracing::info!(sha = %sha, "committed tenant files");
        Some(sha)
    } else {
        tracing::warn!(branch = %branch, "no changes to commit; pushing existing branch head");
        None
    };

    let push = push_branch(&git, &config.github, &branch)?;

    let client = GitHubClient::new(&config.github.api_url, &config.github.token);
    verify_remote_branch(&client, &config.github.repository, &branch);
    let title = messages::pull_request_title(tenant);
    let body = messages::pull_request_body(tenant, &workflows);
    let head_sha = git.head_sha()?;
    let opened = open_pull_request(
        &client,
        &config.github.repository,
        &PullRequestDraft {
            branch: &branch,
            base: &config.base_branch,
            title: &title,
            body: &body,
            head_sha: &head_sha,
        },
    )?;
    if !opened.failed.is_empty() {
        tracing::info!(
            failed = opened.failed.len(),
            strategy = opened.strategy.label(),
            "pull request needed a fallback head"
        );
    }

    Ok(ProvisionReport {
        branch,
        workflows,
        rendered_files: rendered.len(),
        commit,
        push,
        pull_request_url: opened.pull.html_url,
        head_strategy: opened.strategy,
    })
}

fn push_branch(git: &Git, github: &GitHubSettings, branch: &str) -> Result<PushStrategy> {
    let mut failed: Vec<PushAttempt> = Vec::new();
    for strategy in PushStrategy::ORDER {
        let result = match strategy {
            PushStrategy::Origin => {
                git.push("origin", &format!("{branch}:{branch}"), true, None)
            }
            PushStrategy::Authenticated => git.push(
                &github.authenticated_remote(),
                &format!("HEAD:refs/heads/{branch}"),
                true,
                Some(github.token.as_str()),
            ),
        };
        match result {
            Ok(()) => {
                tracing::info!(strategy = strategy.label(), branch, "pushed branch");
                return Ok(strategy);
            }
            Err(err) => {
                tracing::warn!(
                    strategy = strategy.label(),
                    error = %format!("{err:#}"),
                    "push attempt failed"
                );
                failed.push(PushAttempt {
                    strategy,
                    error: format!("{err:#}"),
                });
            }
        }
    }
    let summary = failed
        .iter()
        .map(|attempt| format!("{}: {}", attempt.strategy.label(), attempt.error))
        .collect::<Vec<_>>()
        .join("; ");
    Err(anyhow!("could not push {branch}: {summary}"))
}

/// Best effort; the pull request is attempted whatever this finds.
fn verify_remote_branch(client: &GitHubClient, repo: &RepoSlug, branch: &str) {
    match client.list_branches(repo) {
        Ok(branches) if branches.iter().any(|remote| remote.name == branch) => {
            tracing::info!(branch, "branch visible on remote");
        }
        Ok(branches) => {
            tracing::warn!(
                branch,
                listed = branches.len(),
                "branch not listed on remote yet"
            );
        }
        Err(err) => {
            tracing::warn!(
                error = %format!("{err:#}"),
                "could not resolve remote branches for verification"
            );
        }
    }
}

fn warn_unresolved(set: &PlaceholderSet, path: &Path, root: &Path) {
    let Ok(content) = std::fs::read_to_string(path) else {
        return;
    };
    let unresolved = set.unresolved(&content);
    if !unresolved.is_empty() {
        tracing::warn!(
            file = %display_path(path, Some(root)),
            tokens = ?unresolved,
            "placeholders left unresolved"
        );
    }
}
