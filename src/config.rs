//! Environment-driven configuration.
//!
//! Values are read through a lookup function so parsing never depends on the
//! live process environment; `from_env` constructors pass `std::env::var`.
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_SERVER_URL: &str = "https://github.com";
pub const DEFAULT_BASE_BRANCH: &str = "main";

/// Lookup used by every parser in this module.
pub trait Lookup: Fn(&str) -> Option<String> {}
impl<F: Fn(&str) -> Option<String>> Lookup for F {}

pub fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Read a variable, treating empty or whitespace-only values as absent.
fn non_empty(lookup: &impl Lookup, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `"true"` in any case is true; anything else, including absence, is false.
pub fn parse_flag(raw: Option<String>) -> bool {
    raw.map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Every required variable that was absent, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingVars(pub Vec<&'static str>);

impl fmt::Display for MissingVars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "missing required environment variables: {}",
            self.0.join(", ")
        )
    }
}

impl std::error::Error for MissingVars {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantParams {
    pub tenant_name: String,
    pub project_name: String,
    pub dev_network_range: String,
    pub stage_network_range: String,
    pub enable_departure: bool,
    pub enable_avscan: bool,
}

impl TenantParams {
    pub const REQUIRED: [&'static str; 4] = [
        "TENANT_NAME",
        "PROJECT_NAME",
        "DEV_NETWORK_RANGE",
        "STAGE_NETWORK_RANGE",
    ];

    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, MissingVars> {
        let values = Self::REQUIRED.map(|key| non_empty(lookup, key));
        let missing: Vec<&'static str> = Self::REQUIRED
            .iter()
            .zip(&values)
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| *key)
            .collect();
        let [
            Some(tenant_name),
            Some(project_name),
            Some(dev_network_range),
            Some(stage_network_range),
        ] = values
        else {
            return Err(MissingVars(missing));
        };
        Ok(Self {
            tenant_name,
            project_name,
            dev_network_range,
            stage_network_range,
            enable_departure: parse_flag(lookup("ENABLE_DEPARTURE")),
            enable_avscan: parse_flag(lookup("ENABLE_AVSCAN")),
        })
    }

    /// Branch naming convention; the tenant name is used as given.
    pub fn branch_name(&self) -> String {
        format!("feature/tenant-{}", self.tenant_name)
    }
}

/// `owner/name` of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_end_matches('/');
        let (owner, name) = trimmed
            .split_once('/')
            .ok_or_else(|| anyhow!("repository must be owner/name, got {raw:?}"))?;
        let name = name.strip_suffix(".git").unwrap_or(name);
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(anyhow!("repository must be owner/name, got {raw:?}"));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// Slug from a remote URL whose host contains `host_hint` (e.g. `github.com`).
    ///
    /// Accepts `https://host/owner/name(.git)`, `ssh://git@host/owner/name`
    /// and scp-style `git@host:owner/name.git`.
    pub fn from_remote_url(url: &str, host_hint: &str) -> Option<Self> {
        static REMOTE: OnceLock<Regex> = OnceLock::new();
        let re = REMOTE.get_or_init(|| {
            Regex::new(
                r"^(?:[a-z+]+://)?(?:[^@/]+@)?(?P<host>[^/:]+)(?::\d+)?[:/](?P<owner>[^/]+)/(?P<name>[^/]+?)(?:\.git)?/?$",
            )
            .expect("remote url regex")
        });
        let caps = re.captures(url.trim())?;
        if !caps["host"].contains(host_hint) {
            return None;
        }
        Some(Self {
            owner: caps["owner"].to_string(),
            name: caps["name"].to_string(),
        })
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// `host[:port]` of an `scheme://host/...` URL.
pub fn url_host(url: &str) -> &str {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    without_scheme.split('/').next().unwrap_or(without_scheme)
}

#[derive(Clone, PartialEq, Eq)]
pub struct GitHubSettings {
    pub token: String,
    pub repository: RepoSlug,
    pub api_url: String,
    pub server_url: String,
}

impl fmt::Debug for GitHubSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubSettings")
            .field("token", &"<redacted>")
            .field("repository", &self.repository)
            .field("api_url", &self.api_url)
            .field("server_url", &self.server_url)
            .finish()
    }
}

impl GitHubSettings {
    pub fn api_url_from(lookup: &impl Lookup) -> String {
        non_empty(lookup, "GITHUB_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn server_url_from(lookup: &impl Lookup) -> String {
        non_empty(lookup, "GITHUB_SERVER_URL")
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// HTTPS clone URL carrying the token; never log the result.
    pub fn authenticated_remote(&self) -> String {
        let (scheme, host) = self
            .server_url
            .split_once("://")
            .unwrap_or(("https", self.server_url.as_str()));
        format!(
            "{scheme}://x-access-token:{}@{host}/{}.git",
            self.token, self.repository
        )
    }
}

#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub tenant: TenantParams,
    pub github: GitHubSettings,
    pub skip_workflows: bool,
    pub base_branch: String,
    pub repo_root: PathBuf,
}

impl ProvisionConfig {
    pub fn from_env(repo_path: Option<PathBuf>) -> Result<Self> {
        let repo_root = match repo_path {
            Some(path) => path,
            None => env::current_dir().context("resolve current directory")?,
        };
        Self::from_lookup(&process_env, repo_root)
    }

    pub fn from_lookup(lookup: &impl Lookup, repo_root: PathBuf) -> Result<Self> {
        let tenant = TenantParams::from_lookup(lookup);
        let token = non_empty(lookup, "GITHUB_TOKEN");
        let repository = non_empty(lookup, "GITHUB_REPOSITORY");

        let (tenant, token, repository) = match (tenant, token, repository) {
            (Ok(tenant), Some(token), Some(repository)) => (tenant, token, repository),
            (tenant, token, repository) => {
                let mut missing = match tenant {
                    Ok(_) => Vec::new(),
                    Err(MissingVars(vars)) => vars,
                };
                if token.is_none() {
                    missing.push("GITHUB_TOKEN");
                }
                if repository.is_none() {
                    missing.push("GITHUB_REPOSITORY");
                }
                return Err(MissingVars(missing).into());
            }
        };
        let repository = RepoSlug::parse(&repository).context("parse GITHUB_REPOSITORY")?;

        Ok(Self {
            tenant,
            github: GitHubSettings {
                token,
                repository,
                api_url: GitHubSettings::api_url_from(lookup),
                server_url: GitHubSettings::server_url_from(lookup),
            },
            skip_workflows: parse_flag(lookup("SKIP_WORKFLOWS")),
            base_branch: non_empty(lookup, "BASE_BRANCH")
                .unwrap_or_else(|| DEFAULT_BASE_BRANCH.to_string()),
            repo_root,
        })
    }
}
