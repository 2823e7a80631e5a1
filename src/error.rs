use std::fmt;

use thiserror::Error;

use crate::model::issue::ProviderKind;

/// The issue operation an error was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Close,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create issue",
            Operation::Update => "update issue",
            Operation::Close => "close issue",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network-level failure reported by an [`HttpTransport`](crate::transport::HttpTransport).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Every failure an adapter can report. Nothing is retried or recovered
/// locally; callers decide what each variant means for them.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("{provider} credentials are not configured\n  hint: set '{key}' in the config file or environment")]
    MissingCredentials {
        provider: ProviderKind,
        key: &'static str,
    },

    #[error("{provider} {operation} failed with HTTP {status}: {message}")]
    ProviderApi {
        provider: ProviderKind,
        operation: Operation,
        status: u16,
        message: String,
        body: String,
    },

    #[error("{provider} {operation} failed with HTTP {status}: {message}")]
    Authentication {
        provider: ProviderKind,
        operation: Operation,
        status: u16,
        message: String,
        body: String,
    },

    #[error("failed to parse {provider} {operation} response: {reason}")]
    ResponseParse {
        provider: ProviderKind,
        operation: Operation,
        reason: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("request cancelled")]
    Cancelled,

    #[error("{operation} is not supported by {provider}")]
    NotSupported {
        provider: ProviderKind,
        operation: Operation,
    },

    #[error("unsupported provider '{0}'\n  hint: valid providers are: github, bitbucket")]
    UnsupportedProvider(String),
}

impl IssueError {
    /// HTTP status of a provider-side rejection, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            IssueError::ProviderApi { status, .. } | IssueError::Authentication { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Raw response body of a provider-side rejection.
    pub fn body(&self) -> Option<&str> {
        match self {
            IssueError::ProviderApi { body, .. } | IssueError::Authentication { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }
}
