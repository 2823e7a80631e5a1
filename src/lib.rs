//! Create, update and close issues on GitHub or Bitbucket through one
//! provider-agnostic interface.
//!
//! ```no_run
//! use std::sync::Arc;
//! use issue_bridge::config::load_config;
//! use issue_bridge::model::issue::{CreateIssueRequest, ProviderKind, RepositoryInfo};
//! use issue_bridge::providers::ProviderSelector;
//! use issue_bridge::transport::ReqwestTransport;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let selector = ProviderSelector::from_config(
//!     Arc::new(ReqwestTransport::new()),
//!     Arc::new(load_config()?),
//! );
//! let repo = RepositoryInfo::new(ProviderKind::GitHub, "octocat", "hello-world");
//! let issue = selector
//!     .resolve("github")?
//!     .create_issue(&repo, &CreateIssueRequest::new("Crash on start", None), &CancellationToken::new())
//!     .await?;
//! println!("{}", issue.id);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod providers;
pub mod transport;
