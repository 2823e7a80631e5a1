pub mod bitbucket;
pub mod github;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::ConfigSource;
use crate::error::IssueError;
use crate::model::issue::{
    CreateIssueRequest, IssueDetails, ProviderKind, RepositoryInfo, UpdateIssueRequest,
};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// One issue-tracking backend. Each call is a single request/response round
/// trip; `cancel` aborts the in-flight request with [`IssueError::Cancelled`].
#[async_trait]
pub trait IssueProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn create_issue(
        &self,
        repo: &RepositoryInfo,
        request: &CreateIssueRequest,
        cancel: &CancellationToken,
    ) -> Result<IssueDetails, IssueError>;

    async fn update_issue(
        &self,
        repo: &RepositoryInfo,
        issue_id: &str,
        request: &UpdateIssueRequest,
        cancel: &CancellationToken,
    ) -> Result<IssueDetails, IssueError>;

    async fn close_issue(
        &self,
        repo: &RepositoryInfo,
        issue_id: &str,
        cancel: &CancellationToken,
    ) -> Result<IssueDetails, IssueError>;
}

/// Resolves a provider token to its adapter. The adapter set is closed.
pub struct ProviderSelector {
    github: github::GitHubProvider,
    bitbucket: bitbucket::BitbucketProvider,
}

impl ProviderSelector {
    pub fn new(github: github::GitHubProvider, bitbucket: bitbucket::BitbucketProvider) -> Self {
        Self { github, bitbucket }
    }

    pub fn from_config(transport: Arc<dyn HttpTransport>, config: Arc<dyn ConfigSource>) -> Self {
        Self {
            github: github::GitHubProvider::new(transport.clone(), config.clone()),
            bitbucket: bitbucket::BitbucketProvider::new(transport, config),
        }
    }

    pub fn resolve(&self, identifier: &str) -> Result<&dyn IssueProvider, IssueError> {
        let kind: ProviderKind = identifier.parse()?;
        Ok(self.get(kind))
    }

    pub fn get(&self, kind: ProviderKind) -> &dyn IssueProvider {
        match kind {
            ProviderKind::GitHub => &self.github,
            ProviderKind::Bitbucket => &self.bitbucket,
        }
    }
}

/// Read a credential, treating blank values as absent.
fn require_credential(
    config: &dyn ConfigSource,
    provider: ProviderKind,
    key: &'static str,
) -> Result<String, IssueError> {
    config
        .get(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or(IssueError::MissingCredentials { provider, key })
}

fn check_repository(repo: &RepositoryInfo, expected: ProviderKind) -> Result<(), IssueError> {
    if repo.provider() != expected {
        return Err(IssueError::InvalidArgument(format!(
            "repository {repo} belongs to {}, not {expected}",
            repo.provider()
        )));
    }
    if repo.owner().trim().is_empty() {
        return Err(IssueError::MissingArgument("owner"));
    }
    if repo.repository_name().trim().is_empty() {
        return Err(IssueError::MissingArgument("repository_name"));
    }
    Ok(())
}

fn check_create(request: &CreateIssueRequest) -> Result<(), IssueError> {
    if request.title.trim().is_empty() {
        return Err(IssueError::InvalidArgument(
            "issue title cannot be empty".into(),
        ));
    }
    Ok(())
}

fn check_update(issue_id: &str, request: &UpdateIssueRequest) -> Result<(), IssueError> {
    check_issue_id(issue_id)?;
    if request.is_empty() {
        return Err(IssueError::InvalidArgument(
            "an update must set at least one of title or description".into(),
        ));
    }
    if request.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(IssueError::InvalidArgument(
            "issue title cannot be empty".into(),
        ));
    }
    Ok(())
}

fn check_issue_id(issue_id: &str) -> Result<(), IssueError> {
    if issue_id.trim().is_empty() {
        return Err(IssueError::MissingArgument("issue_id"));
    }
    Ok(())
}

/// Join percent-encoded path segments onto a base URL.
fn endpoint(base: &str, segments: &[&str]) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    for segment in segments {
        url.push('/');
        url.push_str(&urlencoding::encode(segment));
    }
    url
}

/// Send through the transport, racing the cancellation token.
async fn dispatch(
    transport: &dyn HttpTransport,
    request: HttpRequest,
    cancel: &CancellationToken,
) -> Result<HttpResponse, IssueError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(IssueError::Cancelled),
        resp = transport.send(request) => Ok(resp?),
    }
}
