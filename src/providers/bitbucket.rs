use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    check_create, check_repository, check_update, dispatch, endpoint, require_credential,
    IssueProvider,
};
use crate::config::{self, ConfigSource};
use crate::error::{IssueError, Operation};
use crate::model::issue::{
    CreateIssueRequest, IssueDetails, ProviderKind, RepositoryInfo, UpdateIssueRequest,
};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

const DEFAULT_BASE_URL: &str = "https://api.bitbucket.org/2.0/";

pub struct BitbucketProvider {
    transport: Arc<dyn HttpTransport>,
    config: Arc<dyn ConfigSource>,
}

impl BitbucketProvider {
    pub fn new(transport: Arc<dyn HttpTransport>, config: Arc<dyn ConfigSource>) -> Self {
        Self { transport, config }
    }

    fn base_url(&self) -> String {
        self.config
            .get(config::BITBUCKET_BASE_URL)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// `Basic base64(username:app_password)`, read fresh on every call.
    fn auth_header(&self) -> Result<String, IssueError> {
        let source = self.config.as_ref();
        let username =
            require_credential(source, ProviderKind::Bitbucket, config::BITBUCKET_USERNAME)?;
        let password =
            require_credential(source, ProviderKind::Bitbucket, config::BITBUCKET_APP_PASSWORD)?;
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        Ok(format!("Basic {encoded}"))
    }

    fn request(&self, method: Method, url: String, auth_header: String) -> HttpRequest {
        HttpRequest::new(method, url)
            .header("Authorization", auth_header)
            .header("Accept", "application/json")
    }
}

#[derive(Deserialize)]
struct BbIssue {
    id: Option<u64>,
    title: Option<String>,
    content: Option<BbContent>,
    state: Option<String>,
    links: Option<BbLinks>,
}

#[derive(Deserialize)]
struct BbContent {
    raw: Option<String>,
}

#[derive(Deserialize)]
struct BbLinks {
    html: Option<BbLink>,
}

#[derive(Deserialize)]
struct BbLink {
    href: Option<String>,
}

fn parse_issue(
    repo: &RepositoryInfo,
    body: &str,
    operation: Operation,
) -> Result<IssueDetails, IssueError> {
    let parse_error = |reason: String| IssueError::ResponseParse {
        provider: ProviderKind::Bitbucket,
        operation,
        reason,
    };

    let issue: BbIssue = serde_json::from_str(body).map_err(|e| parse_error(e.to_string()))?;
    // Bitbucket has no global identifier separate from the issue number.
    let id = issue
        .id
        .map(|id| id.to_string())
        .ok_or_else(|| parse_error("response has no id".into()))?;

    Ok(IssueDetails {
        id: id.clone(),
        display_id: Some(id),
        title: issue.title.unwrap_or_default(),
        description: issue.content.and_then(|c| c.raw),
        state: issue.state.unwrap_or_default(),
        url: issue.links.and_then(|l| l.html).and_then(|h| h.href),
        provider: ProviderKind::Bitbucket,
        repository_name: repo.repository_name().to_string(),
        owner: repo.owner().to_string(),
    })
}

fn classify_failure(
    operation: Operation,
    repo: &RepositoryInfo,
    issue_id: Option<&str>,
    resp: HttpResponse,
) -> IssueError {
    let HttpResponse { status, body } = resp;
    let auth = |message: &str| IssueError::Authentication {
        provider: ProviderKind::Bitbucket,
        operation,
        status,
        message: message.to_string(),
        body: body.clone(),
    };

    match (operation, status) {
        (Operation::Update, 401 | 403) => auth("authentication/authorization failed"),
        (_, 401) => auth("authentication failed"),
        _ => {
            let message = match (operation, status, issue_id) {
                (Operation::Create, 404, _) => format!("repository {repo} not found"),
                (Operation::Update, 404, Some(id)) => {
                    format!("issue or repository not found (issue {id} in {repo})")
                }
                _ => "unexpected response".to_string(),
            };
            IssueError::ProviderApi {
                provider: ProviderKind::Bitbucket,
                operation,
                status,
                message,
                body,
            }
        }
    }
}

/// `content` is left out entirely when there is no description.
fn create_payload(request: &CreateIssueRequest) -> Value {
    let mut payload = Map::new();
    payload.insert("title".into(), Value::String(request.title.clone()));
    if let Some(description) = &request.description {
        payload.insert("content".into(), json!({ "raw": description }));
    }
    Value::Object(payload)
}

fn update_payload(request: &UpdateIssueRequest) -> Value {
    let mut payload = Map::new();
    if let Some(title) = &request.title {
        payload.insert("title".into(), Value::String(title.clone()));
    }
    if let Some(description) = &request.description {
        payload.insert("content".into(), json!({ "raw": description }));
    }
    Value::Object(payload)
}

#[async_trait]
impl IssueProvider for BitbucketProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Bitbucket
    }

    async fn create_issue(
        &self,
        repo: &RepositoryInfo,
        request: &CreateIssueRequest,
        cancel: &CancellationToken,
    ) -> Result<IssueDetails, IssueError> {
        check_repository(repo, ProviderKind::Bitbucket)?;
        check_create(request)?;
        let auth_header = self.auth_header()?;

        let url = endpoint(
            &self.base_url(),
            &["repositories", repo.owner(), repo.repository_name(), "issues"],
        );
        debug!(provider = "bitbucket", method = "POST", %url, "sending create issue request");

        let req = self
            .request(Method::POST, url, auth_header)
            .json(create_payload(request));
        let resp = dispatch(self.transport.as_ref(), req, cancel).await?;
        if !resp.is_success() {
            warn!(provider = "bitbucket", status = resp.status, %repo, "create issue rejected");
            return Err(classify_failure(Operation::Create, repo, None, resp));
        }

        let details = parse_issue(repo, &resp.body, Operation::Create)?;
        info!(provider = "bitbucket", id = %details.id, %repo, "issue created");
        Ok(details)
    }

    async fn update_issue(
        &self,
        repo: &RepositoryInfo,
        issue_id: &str,
        request: &UpdateIssueRequest,
        cancel: &CancellationToken,
    ) -> Result<IssueDetails, IssueError> {
        check_repository(repo, ProviderKind::Bitbucket)?;
        check_update(issue_id, request)?;
        let auth_header = self.auth_header()?;
        let issue_id = issue_id.trim();

        let url = endpoint(
            &self.base_url(),
            &["repositories", repo.owner(), repo.repository_name(), "issues", issue_id],
        );
        debug!(provider = "bitbucket", method = "PUT", %url, "sending update issue request");

        let req = self
            .request(Method::PUT, url, auth_header)
            .json(update_payload(request));
        let resp = dispatch(self.transport.as_ref(), req, cancel).await?;
        if !resp.is_success() {
            warn!(provider = "bitbucket", status = resp.status, issue_id, "update issue rejected");
            return Err(classify_failure(Operation::Update, repo, Some(issue_id), resp));
        }

        let details = parse_issue(repo, &resp.body, Operation::Update)?;
        info!(provider = "bitbucket", id = %details.id, %repo, "issue updated");
        Ok(details)
    }

    async fn close_issue(
        &self,
        _repo: &RepositoryInfo,
        _issue_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<IssueDetails, IssueError> {
        Err(IssueError::NotSupported {
            provider: ProviderKind::Bitbucket,
            operation: Operation::Close,
        })
    }
}
