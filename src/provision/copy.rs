//! Template tree and workflow file placement.
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::placeholders::{simple_tokens, PlaceholderSet};
use crate::render::{render_file_name, render_template};
use crate::util::{collect_files_flat, collect_files_recursive, display_path, write_bytes};

pub const TEMPLATE_TENANT_DIR: &str = "template-repo/tenant";
pub const TEMPLATE_WORKFLOWS_DIR: &str = "template-repo/workflows";
pub const TENANTS_DIR: &str = "tenant";
pub const WORKFLOWS_DIR: &str = ".github/workflows";
pub const ONBOARDING_WORKFLOW: &str = "onboarding_workflow.yml";

/// One rendered output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedFile {
    pub source: PathBuf,
    pub dest: PathBuf,
    /// Template engine failure; the file still got literal replacement.
    pub engine_error: Option<String>,
}

/// Where workflow files may be written, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowTarget {
    /// The repository's shared `.github/workflows`.
    Primary,
    /// `tenant/<name>/workflows`, for manual promotion later.
    TenantFallback,
}

impl WorkflowTarget {
    pub const ORDER: [WorkflowTarget; 2] =
        [WorkflowTarget::Primary, WorkflowTarget::TenantFallback];

    pub fn dir(self, repo_root: &Path, tenant_dir: &Path) -> PathBuf {
        match self {
            WorkflowTarget::Primary => repo_root.join(WORKFLOWS_DIR),
            WorkflowTarget::TenantFallback => tenant_dir.join("workflows"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WorkflowTarget::Primary => "primary",
            WorkflowTarget::TenantFallback => "tenant-fallback",
        }
    }
}

/// What happened to the workflow templates during this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Copied {
        dir: String,
        files: Vec<String>,
    },
    Fallback {
        dir: String,
        files: Vec<String>,
        primary_error: String,
    },
    Skipped {
        reason: String,
    },
}

impl WorkflowOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            WorkflowOutcome::Copied { .. } => "copied",
            WorkflowOutcome::Fallback { .. } => "fallback",
            WorkflowOutcome::Skipped { .. } => "skipped",
        }
    }

    pub fn files(&self) -> &[String] {
        match self {
            WorkflowOutcome::Copied { files, .. } | WorkflowOutcome::Fallback { files, .. } => {
                files
            }
            WorkflowOutcome::Skipped { .. } => &[],
        }
    }

    /// True when the temporary onboarding workflow is part of the written set.
    pub fn includes_onboarding(&self) -> bool {
        self.files().iter().any(|file| {
            Path::new(file)
                .file_name()
                .is_some_and(|name| name == ONBOARDING_WORKFLOW)
        })
    }
}

/// Render `template_root` recursively into `dest_root`, substituting tokens in
/// contents and in every path component. A missing template root copies nothing.
pub fn copy_tenant_tree(
    template_root: &Path,
    dest_root: &Path,
    set: &PlaceholderSet,
) -> Result<Vec<CopiedFile>> {
    if !template_root.is_dir() {
        tracing::warn!(
            template = %template_root.display(),
            "template tenant directory does not exist"
        );
        return Ok(Vec::new());
    }
    fs::create_dir_all(dest_root).with_context(|| format!("create {}", dest_root.display()))?;

    let mut copied = Vec::new();
    for source in collect_files_recursive(template_root)? {
        let rel = source
            .strip_prefix(template_root)
            .context("strip template prefix")?;
        let dest = dest_root.join(render_rel_path(rel, set)?);
        copied.push(render_file(&source, &dest, set)?);
    }
    Ok(copied)
}

/// Place the workflow templates, trying each [`WorkflowTarget`] in order.
pub fn copy_workflows(
    template_dir: &Path,
    repo_root: &Path,
    tenant_dir: &Path,
    set: &PlaceholderSet,
    skip: bool,
) -> WorkflowOutcome {
    if skip {
        return WorkflowOutcome::Skipped {
            reason: "SKIP_WORKFLOWS is set".to_string(),
        };
    }
    if !template_dir.is_dir() {
        tracing::warn!(
            template = %template_dir.display(),
            "template workflows directory does not exist"
        );
        return WorkflowOutcome::Skipped {
            reason: format!("{} does not exist", display_path(template_dir, Some(repo_root))),
        };
    }
    let sources = match collect_files_flat(template_dir) {
        Ok(sources) if sources.is_empty() => {
            return WorkflowOutcome::Skipped {
                reason: format!("no templates in {}", display_path(template_dir, Some(repo_root))),
            }
        }
        Ok(sources) => sources,
        Err(err) => {
            return WorkflowOutcome::Skipped {
                reason: format!("{err:#}"),
            }
        }
    };

    let mut errors: Vec<String> = Vec::new();
    for target in WorkflowTarget::ORDER {
        let dir = target.dir(repo_root, tenant_dir);
        match write_workflows(&sources, &dir, set) {
            Ok(written) => {
                let files = written
                    .iter()
                    .map(|copied| display_path(&copied.dest, Some(repo_root)))
                    .collect::<Vec<_>>();
                let dir = display_path(&dir, Some(repo_root));
                tracing::info!(
                    location = target.label(),
                    dir = %dir,
                    count = files.len(),
                    "workflows written"
                );
                return match errors.into_iter().next() {
                    None => WorkflowOutcome::Copied { dir, files },
                    Some(primary_error) => WorkflowOutcome::Fallback {
                        dir,
                        files,
                        primary_error,
                    },
                };
            }
            Err(err) => {
                tracing::warn!(
                    location = target.label(),
                    dir = %dir.display(),
                    error = %format!("{err:#}"),
                    "could not write workflows"
                );
                errors.push(format!("{err:#}"));
            }
        }
    }
    WorkflowOutcome::Skipped {
        reason: format!("no workflow location was writable: {}", errors.join("; ")),
    }
}

/// Write every workflow into `dir`; on failure remove what this call wrote.
fn write_workflows(
    sources: &[PathBuf],
    dir: &Path,
    set: &PlaceholderSet,
) -> Result<Vec<CopiedFile>> {
    let mut written: Vec<CopiedFile> = Vec::new();
    for source in sources {
        let name = source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("workflow template name is not UTF-8: {}", source.display()))?;
        let dest = dir.join(render_file_name(name, set));
        match render_file(source, &dest, set) {
            Ok(copied) => written.push(copied),
            Err(err) => {
                for copied in &written {
                    let _ = fs::remove_file(&copied.dest);
                }
                return Err(err);
            }
        }
    }
    Ok(written)
}

fn render_rel_path(rel: &Path, set: &PlaceholderSet) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| anyhow!("template path is not UTF-8: {}", rel.display()))?;
                out.push(render_file_name(part, set));
            }
            other => return Err(anyhow!("unexpected template path component {other:?}")),
        }
    }
    Ok(out)
}

/// Render one file. Non UTF-8 content is copied byte-for-byte.
fn render_file(source: &Path, dest: &Path, set: &PlaceholderSet) -> Result<CopiedFile> {
    let bytes = fs::read(source).with_context(|| format!("read {}", source.display()))?;
    let (bytes, engine_error) = match String::from_utf8(bytes) {
        Ok(text) => {
            let rendered = render_template(&text, set);
            if let Some(err) = &rendered.engine_error {
                tracing::warn!(
                    file = %source.display(),
                    error = %err,
                    "template engine failed; applied literal placeholders only"
                );
            }
            let leftover = simple_tokens(&rendered.content);
            if !leftover.is_empty() {
                tracing::debug!(
                    file = %source.display(),
                    tokens = ?leftover,
                    "unrecognized tokens left verbatim"
                );
            }
            (rendered.content.into_bytes(), rendered.engine_error)
        }
        Err(err) => {
            tracing::debug!(file = %source.display(), "binary template copied verbatim");
            (err.into_bytes(), None)
        }
    };
    write_bytes(dest, &bytes)?;
    Ok(CopiedFile {
        source: source.to_path_buf(),
        dest: dest.to_path_buf(),
        engine_error,
    })
}

#[cfg(test)]
#[path = "copy_tests.rs"]
mod tests;
