//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use tempfile::TempDir;

/// Variables the binary reads; cleared so the host environment never leaks in.
const INHERITED_VARS: &[&str] = &[
    "TENANT_NAME",
    "PROJECT_NAME",
    "DEV_NETWORK_RANGE",
    "STAGE_NETWORK_RANGE",
    "ENABLE_DEPARTURE",
    "ENABLE_AVSCAN",
    "SKIP_WORKFLOWS",
    "BASE_BRANCH",
    "GITHUB_TOKEN",
    "GITHUB_REPOSITORY",
    "GITHUB_API_URL",
    "GITHUB_SERVER_URL",
    "RUST_LOG",
    "metadata_stack",
    "datadog_stack",
    "baseline_stack",
    "networking_stack",
    "tableau_stack",
    "abc_stack",
    "datalake_stack",
];

/// Skip the calling test when `git` is not installed.
pub fn skip_if_git_missing() -> bool {
    if which::which("git").is_err() {
        eprintln!("Skipping: git not found on PATH");
        return true;
    }
    false
}

/// Run the compiled binary with a clean set of tool variables.
pub fn run_tenantops(args: &[&str], envs: &[(&str, &str)], cwd: &Path) -> Output {
    tenantops_command(args, envs, cwd)
        .output()
        .expect("run tenantops")
}

/// Start the binary with piped output and leave it running.
pub fn spawn_tenantops(args: &[&str], envs: &[(&str, &str)], cwd: &Path) -> Child {
    tenantops_command(args, envs, cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn tenantops")
}

fn tenantops_command(args: &[&str], envs: &[(&str, &str)], cwd: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_tenantops"));
    command.args(args).current_dir(cwd);
    for var in INHERITED_VARS {
        command.env_remove(var);
    }
    for (key, value) in envs {
        command.env(key, value);
    }
    command
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// A work tree on `main` with a bare `origin` next to it.
pub struct GitFixture {
    _dir: TempDir,
    pub work: PathBuf,
    pub origin: PathBuf,
}

impl GitFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let work = dir.path().join("work");
        let origin = dir.path().join("origin.git");
        fs::create_dir_all(&work).expect("create work");

        git_in(dir.path(), &["init", "--quiet", "--bare", "origin.git"]);
        git_in(&work, &["init", "--quiet"]);
        git_in(&work, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git_in(&work, &["config", "user.name", "Tenant Bot"]);
        git_in(&work, &["config", "user.email", "tenant-bot@example.com"]);
        git_in(&work, &["config", "commit.gpgsign", "false"]);
        let origin_str = origin.to_str().expect("utf-8 temp path");
        git_in(&work, &["remote", "add", "origin", origin_str]);

        Self {
            _dir: dir,
            work,
            origin,
        }
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.work.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, contents).expect("write file");
    }

    pub fn git(&self, args: &[&str]) -> String {
        git_in(&self.work, args)
    }

    pub fn commit_all(&self, message: &str) {
        self.git(&["add", "-A"]);
        self.git(&["commit", "--quiet", "-m", message]);
    }

    pub fn push(&self, branch: &str) {
        self.git(&["push", "--quiet", "origin", branch]);
    }

    /// `git show <branch>:<path>` against the bare origin.
    pub fn origin_file(&self, branch: &str, path: &str) -> Option<String> {
        let output = self.origin_git(&["show", &format!("{branch}:{path}")]);
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub fn origin_head(&self, branch: &str) -> Option<String> {
        let reference = format!("refs/heads/{branch}");
        let output = self.origin_git(&["rev-parse", "--verify", "--quiet", &reference]);
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn origin_message(&self, branch: &str) -> String {
        let output = self.origin_git(&["log", "-1", "--format=%B", branch]);
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    fn origin_git(&self, args: &[&str]) -> Output {
        Command::new("git")
            .arg("--git-dir")
            .arg(&self.origin)
            .args(args)
            .output()
            .expect("run git against origin")
    }
}

fn git_in(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
