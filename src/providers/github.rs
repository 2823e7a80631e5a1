use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    check_create, check_issue_id, check_repository, check_update, dispatch, endpoint,
    require_credential, IssueProvider,
};
use crate::config::{self, ConfigSource};
use crate::error::{IssueError, Operation};
use crate::model::issue::{
    CreateIssueRequest, IssueDetails, ProviderKind, RepositoryInfo, UpdateIssueRequest,
};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

const DEFAULT_BASE_URL: &str = "https://api.github.com/";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("issue-bridge/", env!("CARGO_PKG_VERSION"));

/// Fields the adapter knows how to map. In strict mode anything else in a
/// response is treated as schema drift.
const KNOWN_FIELDS: &[&str] = &["id", "node_id", "number", "title", "body", "state", "html_url"];

pub struct GitHubProvider {
    transport: Arc<dyn HttpTransport>,
    config: Arc<dyn ConfigSource>,
}

impl GitHubProvider {
    pub fn new(transport: Arc<dyn HttpTransport>, config: Arc<dyn ConfigSource>) -> Self {
        Self { transport, config }
    }

    fn base_url(&self) -> String {
        self.config
            .get(config::GITHUB_BASE_URL)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    fn request(&self, method: Method, url: String, token: &str) -> HttpRequest {
        HttpRequest::new(method, url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
    }

    fn issue_url(&self, repo: &RepositoryInfo, issue_id: &str) -> String {
        endpoint(
            &self.base_url(),
            &["repos", repo.owner(), repo.repository_name(), "issues", issue_id.trim()],
        )
    }

    /// Shared tail of update and close: both PATCH the issue resource.
    async fn patch_issue(
        &self,
        repo: &RepositoryInfo,
        issue_id: &str,
        payload: Value,
        operation: Operation,
        cancel: &CancellationToken,
    ) -> Result<IssueDetails, IssueError> {
        let token =
            require_credential(self.config.as_ref(), ProviderKind::GitHub, config::GITHUB_TOKEN)?;
        let url = self.issue_url(repo, issue_id);
        debug!(provider = "github", method = "PATCH", %url, %operation, "sending request");

        let request = self.request(Method::PATCH, url, &token).json(payload);
        let resp = dispatch(self.transport.as_ref(), request, cancel).await?;
        if !resp.is_success() {
            warn!(provider = "github", status = resp.status, %operation, issue_id, "request rejected");
            let message = if resp.status == 404 {
                format!("issue {} not found in {repo}", issue_id.trim())
            } else {
                "unexpected response".to_string()
            };
            return Err(api_error(operation, resp, message));
        }

        let details = self.parse(repo, &resp.body, operation)?;
        info!(provider = "github", id = %details.id, %operation, "request succeeded");
        Ok(details)
    }

    fn parse(
        &self,
        repo: &RepositoryInfo,
        body: &str,
        operation: Operation,
    ) -> Result<IssueDetails, IssueError> {
        let strict = self.config.flag(config::GITHUB_STRICT_SCHEMA);
        parse_issue(repo, body, operation, strict)
    }
}

#[derive(Deserialize)]
struct GhIssue {
    id: Option<u64>,
    node_id: Option<String>,
    number: Option<u64>,
    title: Option<String>,
    body: Option<String>,
    state: Option<String>,
    html_url: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn parse_issue(
    repo: &RepositoryInfo,
    body: &str,
    operation: Operation,
    strict: bool,
) -> Result<IssueDetails, IssueError> {
    let parse_error = |reason: String| IssueError::ResponseParse {
        provider: ProviderKind::GitHub,
        operation,
        reason,
    };

    let issue: GhIssue = serde_json::from_str(body).map_err(|e| parse_error(e.to_string()))?;

    if strict && !issue.extra.is_empty() {
        let mut unknown: Vec<&str> = issue.extra.keys().map(String::as_str).collect();
        unknown.sort_unstable();
        return Err(parse_error(format!(
            "unrecognized fields {} (expected only {})",
            unknown.join(", "),
            KNOWN_FIELDS.join(", ")
        )));
    }

    let id = issue
        .node_id
        .filter(|id| !id.is_empty())
        .or_else(|| issue.id.map(|id| id.to_string()))
        .ok_or_else(|| parse_error("response has neither node_id nor id".into()))?;

    Ok(IssueDetails {
        id,
        display_id: issue.number.map(|n| n.to_string()),
        title: issue.title.unwrap_or_default(),
        description: issue.body,
        state: issue.state.unwrap_or_default(),
        url: issue.html_url,
        provider: ProviderKind::GitHub,
        repository_name: repo.repository_name().to_string(),
        owner: repo.owner().to_string(),
    })
}

fn api_error(operation: Operation, resp: HttpResponse, message: String) -> IssueError {
    IssueError::ProviderApi {
        provider: ProviderKind::GitHub,
        operation,
        status: resp.status,
        message,
        body: resp.body,
    }
}

fn create_payload(request: &CreateIssueRequest) -> Value {
    json!({
        "title": request.title,
        "body": request.description,
    })
}

/// Only the fields being changed; absent keys mean "leave as is".
fn update_payload(request: &UpdateIssueRequest) -> Value {
    let mut payload = Map::new();
    if let Some(title) = &request.title {
        payload.insert("title".into(), Value::String(title.clone()));
    }
    if let Some(description) = &request.description {
        payload.insert("body".into(), Value::String(description.clone()));
    }
    Value::Object(payload)
}

#[async_trait]
impl IssueProvider for GitHubProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    async fn create_issue(
        &self,
        repo: &RepositoryInfo,
        request: &CreateIssueRequest,
        cancel: &CancellationToken,
    ) -> Result<IssueDetails, IssueError> {
        check_repository(repo, ProviderKind::GitHub)?;
        check_create(request)?;
        let token =
            require_credential(self.config.as_ref(), ProviderKind::GitHub, config::GITHUB_TOKEN)?;

        let url = endpoint(
            &self.base_url(),
            &["repos", repo.owner(), repo.repository_name(), "issues"],
        );
        debug!(provider = "github", method = "POST", %url, "sending create issue request");

        let req = self.request(Method::POST, url, &token).json(create_payload(request));
        let resp = dispatch(self.transport.as_ref(), req, cancel).await?;
        if !resp.is_success() {
            warn!(provider = "github", status = resp.status, %repo, "create issue rejected");
            let message = if resp.status == 404 {
                format!("repository {repo} not found")
            } else {
                "unexpected response".to_string()
            };
            return Err(api_error(Operation::Create, resp, message));
        }

        let details = self.parse(repo, &resp.body, Operation::Create)?;
        info!(provider = "github", id = %details.id, %repo, "issue created");
        Ok(details)
    }

    async fn update_issue(
        &self,
        repo: &RepositoryInfo,
        issue_id: &str,
        request: &UpdateIssueRequest,
        cancel: &CancellationToken,
    ) -> Result<IssueDetails, IssueError> {
        check_repository(repo, ProviderKind::GitHub)?;
        check_update(issue_id, request)?;
        self.patch_issue(repo, issue_id, update_payload(request), Operation::Update, cancel)
            .await
    }

    async fn close_issue(
        &self,
        repo: &RepositoryInfo,
        issue_id: &str,
        cancel: &CancellationToken,
    ) -> Result<IssueDetails, IssueError> {
        check_repository(repo, ProviderKind::GitHub)?;
        check_issue_id(issue_id)?;
        self.patch_issue(repo, issue_id, json!({ "state": "closed" }), Operation::Close, cancel)
            .await
    }
}
