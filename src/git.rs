//! Local git operations, run through the `git` binary.
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Instant;

use crate::util::truncate_string;

const STDERR_LIMIT: usize = 2000;

/// A work tree plus the resolved `git` executable.
#[derive(Debug, Clone)]
pub struct Git {
    root: PathBuf,
    program: PathBuf,
}

impl Git {
    /// Open the work tree at `root`; fails if git is missing or `root` is not a repository.
    pub fn open(root: &Path) -> Result<Self> {
        let program = which::which("git").context("locate git executable")?;
        let git = Self {
            root: root.to_path_buf(),
            program,
        };
        let inside = git
            .run(&["rev-parse", "--is-inside-work-tree"])
            .with_context(|| format!("open git repository at {}", root.display()))?;
        if inside != "true" {
            return Err(anyhow!("{} is not a git work tree", root.display()));
        }
        Ok(git)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn local_branch_exists(&self, branch: &str) -> Result<bool> {
        self.succeeds(&[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/heads/{branch}"),
        ])
    }

    pub fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool> {
        self.succeeds(&[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/remotes/{remote}/{branch}"),
        ])
    }

    pub fn fetch(&self, remote: &str) -> Result<()> {
        self.run(&["fetch", remote]).map(|_| ())
    }

    pub fn checkout(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", branch]).map(|_| ())
    }

    pub fn create_branch(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", "-b", branch]).map(|_| ())
    }

    pub fn create_tracking_branch(&self, branch: &str, remote: &str) -> Result<()> {
        self.run(&[
            "checkout",
            "-b",
            branch,
            "--track",
            &format!("{remote}/{branch}"),
        ])
        .map(|_| ())
    }

    pub fn current_branch(&self) -> Result<String> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub fn add_all(&self) -> Result<()> {
        self.run(&["add", "-A"]).map(|_| ())
    }

    /// Delete `path` from the work tree and stage the removal.
    pub fn remove(&self, path: &Path) -> Result<()> {
        let rel = self.relative(path)?;
        self.run(&["rm", "-f", "--quiet", "--", rel]).map(|_| ())
    }

    /// Whether `path` is in the index.
    pub fn is_tracked(&self, path: &Path) -> Result<bool> {
        let rel = self.relative(path)?;
        self.succeeds(&["ls-files", "--error-unmatch", "--", rel])
    }

    fn relative<'a>(&self, path: &'a Path) -> Result<&'a str> {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.to_str()
            .ok_or_else(|| anyhow!("path is not valid UTF-8: {}", rel.display()))
    }

    pub fn has_staged_changes(&self) -> Result<bool> {
        // `diff --quiet` exits 1 when there are differences.
        let output = self.output(&["diff", "--cached", "--quiet"])?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(command_error(&["diff", "--cached", "--quiet"], &output, None)),
        }
    }

    /// Commit the index and return the new commit sha.
    pub fn commit(&self, message: &str) -> Result<String> {
        self.run(&["commit", "--quiet", "-m", message])?;
        self.head_sha()
    }

    pub fn head_sha(&self) -> Result<String> {
        self.run(&["rev-parse", "HEAD"])
    }

    /// Push `refspec` to `target` (remote name or URL). `secret` is scrubbed
    /// from any error text.
    pub fn push(
        &self,
        target: &str,
        refspec: &str,
        force: bool,
        secret: Option<&str>,
    ) -> Result<()> {
        let mut args = vec!["push"];
        if force {
            args.push("--force");
        }
        args.push(target);
        args.push(refspec);
        self.run_redacted(&args, secret).map(|_| ())
    }

    pub fn remote_url(&self, remote: &str) -> Result<Option<String>> {
        let output = self.output(&["remote", "get-url", remote])?;
        if !output.status.success() {
            return Ok(None);
        }
        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(url).filter(|url| !url.is_empty()))
    }

    fn succeeds(&self, args: &[&str]) -> Result<bool> {
        Ok(self.output(args)?.status.success())
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        self.run_redacted(args, None)
    }

    fn run_redacted(&self, args: &[&str], secret: Option<&str>) -> Result<String> {
        let output = self.output_redacted(args, secret)?;
        if !output.status.success() {
            return Err(command_error(args, &output, secret));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        self.output_redacted(args, None)
    }

    fn output_redacted(&self, args: &[&str], secret: Option<&str>) -> Result<Output> {
        let start = Instant::now();
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("spawn git {}", redact(&args.join(" "), secret)))?;
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            status = output.status.code().unwrap_or(-1),
            "git {}",
            redact(&args.join(" "), secret)
        );
        Ok(output)
    }
}

fn command_error(args: &[&str], output: &Output, secret: Option<&str>) -> anyhow::Error {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let detail = if stderr.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    anyhow!(
        "git {} failed ({}): {}",
        redact(&args.join(" "), secret),
        output.status,
        redact(&truncate_string(&detail, STDERR_LIMIT), secret)
    )
}

fn redact(text: &str, secret: Option<&str>) -> String {
    match secret {
        Some(secret) if !secret.is_empty() => text.replace(secret, "***"),
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_secret_from_text() {
        assert_eq!(
            redact("push https://x-access-token:abc@h/o/r.git", Some("abc")),
            "push https://x-access-token:***@h/o/r.git"
        );
        assert_eq!(redact("plain", None), "plain");
    }

    #[test]
    fn open_rejects_non_repository() {
        if which::which("git").is_err() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(Git::open(dir.path()).is_err());
    }

    #[test]
    fn tracked_paths_are_distinguished_from_untracked() {
        if which::which("git").is_err() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let status = Command::new("git")
            .args(["init", "--quiet"])
            .current_dir(dir.path())
            .status()
            .expect("git init");
        assert!(status.success());
        std::fs::write(dir.path().join("tracked.txt"), "a").expect("write");
        std::fs::write(dir.path().join("loose.txt"), "b").expect("write");
        let git = Git::open(dir.path()).expect("open");
        git.run(&["add", "tracked.txt"]).expect("add");

        assert!(git.is_tracked(&dir.path().join("tracked.txt")).expect("tracked"));
        assert!(!git.is_tracked(&dir.path().join("loose.txt")).expect("loose"));
        assert!(!git.is_tracked(Path::new("missing.txt")).expect("missing"));
    }
}
