// FlowCompare — GitHub REST client

pub mod secrets;
pub mod setup;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const API_BASE_ENV: &str = "FLOWCOMPARE_GITHUB_API";

/// Scopes the `FLOW_COMPARE_PAT` token needs.
pub const REQUIRED_SCOPES: [&str; 2] = ["repo", "workflow"];

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitHub API error ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("could not decode GitHub content: {0}")]
    Decode(String),
    #[error("secret encryption failed: {0}")]
    Crypto(String),
    #[error("invalid GitHub API URL: {0}")]
    Url(String),
}

impl GitHubError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GitHubError::Status { status: 404, .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, GitHubError::Status { status: 401, .. })
    }
}

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,
    pub html_url: String,
    pub clone_url: String,
    #[serde(default)]
    pub private: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRepository {
    pub name: String,
    pub description: String,
    pub private: bool,
    pub auto_init: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gitignore_template: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    pub sha: String,
    #[serde(default)]
    pub parents: Vec<CommitRef>,
    #[serde(default)]
    pub files: Vec<CommitFile>,
}

impl Commit {
    pub fn parent_sha(&self) -> Option<&str> {
        self.parents.first().map(|p| p.sha.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitFile {
    pub filename: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentFile {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoPublicKey {
    pub key_id: String,
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Token-authenticated client for the parts of the GitHub API setup needs.
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    api_base: String,
    token: String,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Result<Self, GitHubError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("flowcompare/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let api_base = api_base.into();
        let api_base = if api_base.is_empty() {
            DEFAULT_API_BASE.to_string()
        } else {
            api_base.trim_end_matches('/').to_string()
        };

        Ok(Self {
            client,
            api_base,
            token: token.into(),
        })
    }

    /// Client against `FLOWCOMPARE_GITHUB_API` or api.github.com.
    pub fn from_env(token: impl Into<String>) -> Result<Self, GitHubError> {
        let base = std::env::var(API_BASE_ENV).unwrap_or_default();
        Self::new(token, base)
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, format!("{}{}", self.api_base, path))
    }

    fn request_url(&self, method: Method, url: String) -> RequestBuilder {
        tracing::debug!(method = %method, url = %url, "GitHub request");
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, GitHubError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.message)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or(body);
        Err(GitHubError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, GitHubError> {
        let response = Self::check(builder.send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<StatusCode, GitHubError> {
        let response = Self::check(builder.send().await?).await?;
        Ok(response.status())
    }

    // -- users ---------------------------------------------------------------

    pub async fn authenticated_user(&self) -> Result<User, GitHubError> {
        self.send_json(self.request(Method::GET, "/user")).await
    }

    /// The authenticated user plus the classic-token scopes GitHub reports.
    pub async fn token_scopes(&self) -> Result<(User, Vec<String>), GitHubError> {
        let response = Self::check(self.request(Method::GET, "/user").send().await?).await?;
        let scopes: Vec<String> = response
            .headers()
            .get("x-oauth-scopes")
            .and_then(|v| v.to_str().ok())
            .map(|s| {
                s.split(',')
                    .map(|scope| scope.trim().to_string())
                    .filter(|scope| !scope.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let user = response.json::<User>().await?;
        Ok((user, scopes))
    }

    // -- repositories --------------------------------------------------------

    pub async fn get_repo(&self, owner: &str, repo: &str) -> Result<Repository, GitHubError> {
        self.send_json(self.request(Method::GET, &format!("/repos/{}/{}", owner, repo)))
            .await
    }

    /// Like [`get_repo`](Self::get_repo) but a 404 is `None`.
    pub async fn find_repo(&self, owner: &str, repo: &str) -> Result<Option<Repository>, GitHubError> {
        match self.get_repo(owner, repo).await {
            Ok(r) => Ok(Some(r)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create a repository owned by the authenticated user.
    pub async fn create_repo(&self, new: &NewRepository) -> Result<Repository, GitHubError> {
        self.send_json(self.request(Method::POST, "/user/repos").json(new))
            .await
    }

    // -- commits and contents -----------------------------------------------

    pub async fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> Result<Commit, GitHubError> {
        self.send_json(self.request(
            Method::GET,
            &format!("/repos/{}/{}/commits/{}", owner, repo, sha),
        ))
        .await
    }

    /// `/repos/{owner}/{repo}/contents/{path}` with each path segment percent-encoded.
    pub fn contents_url(&self, owner: &str, repo: &str, path: &str) -> Result<Url, GitHubError> {
        let mut url = Url::parse(&self.api_base).map_err(|e| GitHubError::Url(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| GitHubError::Url(format!("{} cannot be a base", self.api_base)))?
            .pop_if_empty()
            .extend(["repos", owner, repo, "contents"])
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    /// Text of a file at a given ref.
    pub async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<String, GitHubError> {
        let url = self.contents_url(owner, repo, path)?;
        let file: ContentFile = self
            .send_json(
                self.request_url(Method::GET, url.to_string())
                    .query(&[("ref", git_ref)]),
            )
            .await?;

        if file.encoding != "base64" {
            return Err(GitHubError::Decode(format!(
                "unsupported content encoding '{}' for {}",
                file.encoding, path
            )));
        }

        // GitHub wraps base64 content at 60 columns.
        let packed: String = file.content.split_whitespace().collect();
        let bytes = STANDARD
            .decode(packed)
            .map_err(|e| GitHubError::Decode(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| GitHubError::Decode(e.to_string()))
    }

    // -- actions secrets -----------------------------------------------------

    pub async fn repo_public_key(&self, owner: &str, repo: &str) -> Result<RepoPublicKey, GitHubError> {
        self.send_json(self.request(
            Method::GET,
            &format!("/repos/{}/{}/actions/secrets/public-key", owner, repo),
        ))
        .await
    }

    /// Encrypt `value` with the repository key and store it as an Actions secret.
    pub async fn set_secret(
        &self,
        owner: &str,
        repo: &str,
        name: &str,
        value: &str,
    ) -> Result<Upsert, GitHubError> {
        let key = self.repo_public_key(owner, repo).await?;
        let encrypted_value = secrets::seal_secret(&key.key, value)?;
        let status = self
            .send_empty(
                self.request(
                    Method::PUT,
                    &format!("/repos/{}/{}/actions/secrets/{}", owner, repo, name),
                )
                .json(&json!({
                    "encrypted_value": encrypted_value,
                    "key_id": key.key_id,
                })),
            )
            .await?;
        Ok(if status == StatusCode::CREATED {
            Upsert::Created
        } else {
            Upsert::Updated
        })
    }

    // -- actions variables ---------------------------------------------------

    pub async fn get_variable(
        &self,
        owner: &str,
        repo: &str,
        name: &str,
    ) -> Result<Option<Variable>, GitHubError> {
        let res = self
            .send_json(self.request(
                Method::GET,
                &format!("/repos/{}/{}/actions/variables/{}", owner, repo, name),
            ))
            .await;
        match res {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_variable(
        &self,
        owner: &str,
        repo: &str,
        name: &str,
        value: &str,
    ) -> Result<(), GitHubError> {
        self.send_empty(
            self.request(
                Method::POST,
                &format!("/repos/{}/{}/actions/variables", owner, repo),
            )
            .json(&json!({ "name": name, "value": value })),
        )
        .await?;
        Ok(())
    }

    pub async fn update_variable(
        &self,
        owner: &str,
        repo: &str,
        name: &str,
        value: &str,
    ) -> Result<(), GitHubError> {
        self.send_empty(
            self.request(
                Method::PATCH,
                &format!("/repos/{}/{}/actions/variables/{}", owner, repo, name),
            )
            .json(&json!({ "name": name, "value": value })),
        )
        .await?;
        Ok(())
    }

    /// Update the variable when it exists, create it otherwise.
    pub async fn upsert_variable(
        &self,
        owner: &str,
        repo: &str,
        name: &str,
        value: &str,
    ) -> Result<Upsert, GitHubError> {
        if self.get_variable(owner, repo, name).await?.is_some() {
            self.update_variable(owner, repo, name, value).await?;
            Ok(Upsert::Updated)
        } else {
            self.create_variable(owner, repo, name, value).await?;
            Ok(Upsert::Created)
        }
    }
}

/// Scopes from `required` that `granted` lacks.
pub fn missing_scopes<'a>(granted: &[String], required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|r| !granted.iter().any(|g| g == r))
        .collect()
}
