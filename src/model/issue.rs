use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::IssueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    GitHub,
    Bitbucket,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::GitHub, ProviderKind::Bitbucket];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::Bitbucket => "bitbucket",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "GitHub",
            ProviderKind::Bitbucket => "Bitbucket",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = IssueError;

    /// Case-insensitive: `GitHub`, `github` and ` GITHUB ` all resolve.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(token))
            .ok_or_else(|| IssueError::UnsupportedProvider(token.to_string()))
    }
}

/// Coordinates of the target repository. For Bitbucket the owner is the
/// workspace, for GitHub the organization or user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    provider: ProviderKind,
    owner: String,
    repository_name: String,
}

impl RepositoryInfo {
    pub fn new(
        provider: ProviderKind,
        owner: impl Into<String>,
        repository_name: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            owner: owner.into(),
            repository_name: repository_name.into(),
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repository_name(&self) -> &str {
        &self.repository_name
    }
}

impl fmt::Display for RepositoryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repository_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIssueRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CreateIssueRequest {
    pub fn new(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            title: title.into(),
            description,
        }
    }
}

/// Partial update. `None` leaves the field untouched on the provider side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateIssueRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UpdateIssueRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

/// Provider-agnostic view of an issue, returned by every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDetails {
    /// Provider's globally unique identifier.
    pub id: String,
    /// Human-facing sequential number, e.g. the `42` in `#42`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_id: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub provider: ProviderKind,
    pub repository_name: String,
    pub owner: String,
}
