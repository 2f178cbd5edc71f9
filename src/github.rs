//! Minimal GitHub REST client for pull requests, comments and refs.
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use ureq::http::Response;
use ureq::{Agent, Body};

use crate::config::RepoSlug;
use crate::util::truncate_string;

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("tenantops/", env!("CARGO_PKG_VERSION"));
const ERROR_BODY_LIMIT: usize = 1000;
const BRANCH_PAGE_SIZE: &str = "100";

#[derive(Debug, Clone, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    pub name: String,
    pub commit: GitObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub name: String,
    pub object: GitObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitObject {
    pub sha: String,
}

#[derive(Serialize)]
struct NewRef<'a> {
    #[serde(rename = "ref")]
    name: &'a str,
    sha: &'a str,
}

#[derive(Serialize)]
struct NewComment<'a> {
    body: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Error for a non-success API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub method: &'static str,
    pub path: String,
    pub status: u16,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GitHub {} {} returned {}: {}",
            self.method, self.path, self.status, self.message
        )
    }
}

impl std::error::Error for ApiError {}

pub struct GitHubClient {
    agent: Agent,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: &str) -> Self {
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(30)))
            .build()
            .into();
        Self {
            agent,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub fn create_pull(&self, repo: &RepoSlug, pull: &NewPullRequest) -> Result<PullRequest> {
        let path = format!("/repos/{repo}/pulls");
        let response = self
            .with_headers(self.agent.post(self.url(&path)))
            .send_json(pull)
            .with_context(|| format!("POST {path}"))?;
        decode("POST", &path, response)
    }

    /// Open pull requests whose head is `owner:branch`.
    pub fn list_open_pulls(&self, repo: &RepoSlug, head: &str) -> Result<Vec<PullRequest>> {
        let path = format!("/repos/{repo}/pulls");
        let response = self
            .with_headers(self.agent.get(self.url(&path)))
            .query("state", "open")
            .query("head", head)
            .call()
            .with_context(|| format!("GET {path}"))?;
        decode("GET", &path, response)
    }

    /// First page of branches, up to 100 entries.
    pub fn list_branches(&self, repo: &RepoSlug) -> Result<Vec<Branch>> {
        let path = format!("/repos/{repo}/branches");
        let response = self
            .with_headers(self.agent.get(self.url(&path)))
            .query("per_page", BRANCH_PAGE_SIZE)
            .call()
            .with_context(|| format!("GET {path}"))?;
        decode("GET", &path, response)
    }

    pub fn create_issue_comment(
        &self,
        repo: &RepoSlug,
        number: u64,
        body: &str,
    ) -> Result<Comment> {
        let path = format!("/repos/{repo}/issues/{number}/comments");
        let response = self
            .with_headers(self.agent.post(self.url(&path)))
            .send_json(&NewComment { body })
            .with_context(|| format!("POST {path}"))?;
        decode("POST", &path, response)
    }

    /// Look up `heads/<branch>`; a 404 is `None`.
    pub fn get_ref(&self, repo: &RepoSlug, reference: &str) -> Result<Option<GitRef>> {
        let path = format!("/repos/{repo}/git/ref/{reference}");
        let response = self
            .with_headers(self.agent.get(self.url(&path)))
            .call()
            .with_context(|| format!("GET {path}"))?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        decode("GET", &path, response).map(Some)
    }

    pub fn create_ref(&self, repo: &RepoSlug, reference: &str, sha: &str) -> Result<GitRef> {
        let path = format!("/repos/{repo}/git/refs");
        let response = self
            .with_headers(self.agent.post(self.url(&path)))
            .send_json(&NewRef {
                name: reference,
                sha,
            })
            .with_context(|| format!("POST {path}"))?;
        decode("POST", &path, response)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn with_headers<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        request
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
    }
}

fn decode<T: DeserializeOwned>(
    method: &'static str,
    path: &str,
    mut response: Response<Body>,
) -> Result<T> {
    let status = response.status();
    tracing::debug!(method, path, status = status.as_u16(), "github response");
    if !status.is_success() {
        let text = response.body_mut().read_to_string().unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.message)
            .unwrap_or_else(|_| truncate_string(text.trim(), ERROR_BODY_LIMIT));
        return Err(ApiError {
            method,
            path: path.to_string(),
            status: status.as_u16(),
            message,
        }
        .into());
    }
    response
        .body_mut()
        .read_json::<T>()
        .map_err(|err| anyhow!("decode {method} {path} response: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn repo() -> RepoSlug {
        RepoSlug {
            owner: "acme-org".into(),
            name: "infra".into(),
        }
    }

    #[test]
    fn create_pull_sends_payload_and_auth() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/repos/acme-org/infra/pulls")
            .match_header("authorization", "Bearer t0ken")
            .match_header("x-github-api-version", API_VERSION)
            .match_body(Matcher::PartialJson(json!({
                "head": "feature/tenant-acme",
                "base": "main",
                "title": "Add tenant: acme"
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"number": 12, "html_url": "https://github.com/acme-org/infra/pull/12"}"#)
            .create();

        let client = GitHubClient::new(&server.url(), "t0ken");
        let pr = client
            .create_pull(
                &repo(),
                &NewPullRequest {
                    title: "Add tenant: acme".into(),
                    body: "body".into(),
                    head: "feature/tenant-acme".into(),
                    base: "main".into(),
                },
            )
            .expect("create pull");
        assert_eq!(pr.number, 12);
        assert_eq!(pr.html_url, "https://github.com/acme-org/infra/pull/12");
        mock.assert();
    }

    #[test]
    fn api_errors_carry_status_and_message() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/repos/acme-org/infra/pulls")
            .with_status(422)
            .with_body(r#"{"message": "Validation Failed"}"#)
            .create();
        let client = GitHubClient::new(&server.url(), "t");
        let err = client
            .create_pull(
                &repo(),
                &NewPullRequest {
                    title: "t".into(),
                    body: "b".into(),
                    head: "h".into(),
                    base: "main".into(),
                },
            )
            .expect_err("422");
        let api = err.downcast_ref::<ApiError>().expect("ApiError");
        assert_eq!(api.status, 422);
        assert_eq!(api.message, "Validation Failed");
    }

    #[test]
    fn list_open_pulls_filters_by_head() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/repos/acme-org/infra/pulls")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("state".into(), "open".into()),
                Matcher::UrlEncoded("head".into(), "acme-org:feature/tenant-acme".into()),
            ]))
            .with_status(200)
            .with_body(r#"[{"number": 3, "html_url": "https://example/pull/3"}]"#)
            .create();
        let client = GitHubClient::new(&server.url(), "t");
        let pulls = client
            .list_open_pulls(&repo(), "acme-org:feature/tenant-acme")
            .expect("list");
        assert_eq!(pulls.len(), 1);
        assert_eq!(pulls[0].number, 3);
    }

    #[test]
    fn list_branches_reads_names_and_heads() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/repos/acme-org/infra/branches")
            .match_query(Matcher::UrlEncoded("per_page".into(), "100".into()))
            .with_status(200)
            .with_body(
                r#"[{"name": "main", "commit": {"sha": "aaa"}},
                    {"name": "feature/tenant-acme", "commit": {"sha": "bbb"}}]"#,
            )
            .create();
        let client = GitHubClient::new(&server.url(), "t");
        let branches = client.list_branches(&repo()).expect("branches");
        let names: Vec<&str> = branches.iter().map(|branch| branch.name.as_str()).collect();
        assert_eq!(names, ["main", "feature/tenant-acme"]);
        assert_eq!(branches[1].commit.sha, "bbb");
    }

    #[test]
    fn missing_ref_is_none() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/repos/acme-org/infra/git/ref/heads/feature/tenant-acme")
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create();
        let client = GitHubClient::new(&server.url(), "t");
        let found = client
            .get_ref(&repo(), "heads/feature/tenant-acme")
            .expect("lookup");
        assert!(found.is_none());
    }
}
