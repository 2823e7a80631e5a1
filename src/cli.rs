use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;

use crate::model::issue::{CreateIssueRequest, IssueDetails, RepositoryInfo, UpdateIssueRequest};
use crate::providers::ProviderSelector;

/// Provider token plus repository coordinates, as typed on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub provider: String,
    pub owner: String,
    pub repo: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create {
        target: Target,
        request: CreateIssueRequest,
    },
    Update {
        target: Target,
        issue_id: String,
        request: UpdateIssueRequest,
    },
    Close {
        target: Target,
        issue_id: String,
    },
    Help,
}

/// Parse everything after the binary name.
///
/// Supported forms:
///   issue-bridge create github octocat hello-world "Crash on start" -d "Stack trace attached"
///   issue-bridge update bitbucket acme widgets 17 -t "New title"
///   issue-bridge close github octocat hello-world 42
pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some((command, rest)) = args.split_first() else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "create" => parse_create(rest),
        "update" => parse_update(rest),
        "close" => parse_close(rest),
        "help" | "-h" | "--help" => Ok(Command::Help),
        other => bail!("Unknown command '{other}'\n\n{}", usage()),
    }
}

fn parse_target(args: &[String], command: &str) -> Result<(Target, Vec<String>)> {
    if args.len() < 3 {
        bail!("Usage: issue-bridge {command} <provider> <owner> <repo> ...\n\n{}", usage());
    }
    let target = Target {
        provider: args[0].clone(),
        owner: args[1].clone(),
        repo: args[2].clone(),
    };
    Ok((target, args[3..].to_vec()))
}

fn flag_value(args: &[String], i: usize, flag: &str) -> Result<String> {
    match args.get(i) {
        Some(value) => Ok(value.clone()),
        None => bail!("Missing value for {flag} flag"),
    }
}

fn parse_create(args: &[String]) -> Result<Command> {
    let (target, rest) = parse_target(args, "create")?;

    let mut title_parts: Vec<String> = Vec::new();
    let mut description: Option<String> = None;
    let mut i = 0;

    while i < rest.len() {
        match rest[i].as_str() {
            "-d" | "--desc" | "--description" => {
                i += 1;
                description = Some(flag_value(&rest, i, "-d/--desc")?);
            }
            _ => title_parts.push(rest[i].clone()),
        }
        i += 1;
    }

    let title = title_parts.join(" ");
    if title.is_empty() {
        bail!("Issue title cannot be empty");
    }

    Ok(Command::Create {
        target,
        request: CreateIssueRequest::new(title, description),
    })
}

fn parse_update(args: &[String]) -> Result<Command> {
    let (target, rest) = parse_target(args, "update")?;
    let Some((issue_id, flags)) = rest.split_first() else {
        bail!("Usage: issue-bridge update <provider> <owner> <repo> <issue-id> [-t <title>] [-d <description>]");
    };

    let mut request = UpdateIssueRequest::default();
    let mut i = 0;
    while i < flags.len() {
        match flags[i].as_str() {
            "-t" | "--title" => {
                i += 1;
                request.title = Some(flag_value(flags, i, "-t/--title")?);
            }
            "-d" | "--desc" | "--description" => {
                i += 1;
                request.description = Some(flag_value(flags, i, "-d/--desc")?);
            }
            other => bail!("Unexpected argument '{other}' for update"),
        }
        i += 1;
    }

    Ok(Command::Update {
        target,
        issue_id: issue_id.clone(),
        request,
    })
}

fn parse_close(args: &[String]) -> Result<Command> {
    let (target, rest) = parse_target(args, "close")?;
    match rest.as_slice() {
        [issue_id] => Ok(Command::Close {
            target,
            issue_id: issue_id.clone(),
        }),
        _ => bail!("Usage: issue-bridge close <provider> <owner> <repo> <issue-id>"),
    }
}

/// Resolve the provider and perform the operation. `Help` is handled by the caller.
pub async fn run(
    command: &Command,
    selector: &ProviderSelector,
    cancel: &CancellationToken,
) -> Result<Option<IssueDetails>> {
    let details = match command {
        Command::Create { target, request } => {
            let provider = selector.resolve(&target.provider)?;
            let repo = RepositoryInfo::new(provider.kind(), &target.owner, &target.repo);
            provider
                .create_issue(&repo, request, cancel)
                .await
                .with_context(|| format!("Failed to create issue in {repo}"))?
        }
        Command::Update {
            target,
            issue_id,
            request,
        } => {
            let provider = selector.resolve(&target.provider)?;
            let repo = RepositoryInfo::new(provider.kind(), &target.owner, &target.repo);
            provider
                .update_issue(&repo, issue_id, request, cancel)
                .await
                .with_context(|| format!("Failed to update issue {issue_id} in {repo}"))?
        }
        Command::Close { target, issue_id } => {
            let provider = selector.resolve(&target.provider)?;
            let repo = RepositoryInfo::new(provider.kind(), &target.owner, &target.repo);
            provider
                .close_issue(&repo, issue_id, cancel)
                .await
                .with_context(|| format!("Failed to close issue {issue_id} in {repo}"))?
        }
        Command::Help => return Ok(None),
    };
    Ok(Some(details))
}

pub fn usage() -> &'static str {
    "issue-bridge: create, update and close GitHub and Bitbucket issues

USAGE:
  issue-bridge create <provider> <owner> <repo> <title> [-d <description>]
  issue-bridge update <provider> <owner> <repo> <issue-id> [-t <title>] [-d <description>]
  issue-bridge close  <provider> <owner> <repo> <issue-id>

PROVIDERS:
  github, bitbucket (case-insensitive)

CONFIG:
  ~/.issue-bridge/config.toml (or $ISSUE_BRIDGE_CONFIG), overridable with
  GitProviders__GitHub__Token, GitProviders__Bitbucket__Username and
  GitProviders__Bitbucket__AppPassword"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::{self, MemoryConfig};
    use crate::providers::tests::{RecordingTransport, Reply};

    fn args(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    fn target(provider: &str, owner: &str, repo: &str) -> Target {
        Target {
            provider: provider.into(),
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    #[test]
    fn no_args_is_help() {
        assert_eq!(parse_args(&[]).unwrap(), Command::Help);
        assert_eq!(parse_args(&args(&["--help"])).unwrap(), Command::Help);
    }

    #[test]
    fn parse_create_joins_title_words() {
        let cmd = parse_args(&args(&["create", "github", "octocat", "hello", "Fix", "the", "bug"]))
            .unwrap();
        assert_eq!(
            cmd,
            Command::Create {
                target: target("github", "octocat", "hello"),
                request: CreateIssueRequest::new("Fix the bug", None),
            }
        );
    }

    #[test]
    fn parse_create_with_description() {
        let cmd = parse_args(&args(&[
            "create", "bitbucket", "acme", "widgets", "Broken", "--desc", "CI red",
        ]))
        .unwrap();
        match cmd {
            Command::Create { request, .. } => {
                assert_eq!(request.title, "Broken");
                assert_eq!(request.description.as_deref(), Some("CI red"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_create_requires_title() {
        assert!(parse_args(&args(&["create", "github", "o", "r"])).is_err());
        assert!(parse_args(&args(&["create", "github", "o", "r", "-d", "x"])).is_err());
        assert!(parse_args(&args(&["create", "github", "o", "r", "t", "-d"])).is_err());
        assert!(parse_args(&args(&["create", "github"])).is_err());
    }

    #[test]
    fn parse_update_collects_flags() {
        let cmd = parse_args(&args(&["update", "github", "o", "r", "12", "-t", "New"])).unwrap();
        assert_eq!(
            cmd,
            Command::Update {
                target: target("github", "o", "r"),
                issue_id: "12".into(),
                request: UpdateIssueRequest {
                    title: Some("New".into()),
                    description: None,
                },
            }
        );
        assert!(parse_args(&args(&["update", "github", "o", "r"])).is_err());
        assert!(parse_args(&args(&["update", "github", "o", "r", "1", "--bogus"])).is_err());
    }

    #[test]
    fn parse_close_takes_exactly_one_id() {
        assert_eq!(
            parse_args(&args(&["close", "github", "o", "r", "9"])).unwrap(),
            Command::Close {
                target: target("github", "o", "r"),
                issue_id: "9".into(),
            }
        );
        assert!(parse_args(&args(&["close", "github", "o", "r", "9", "10"])).is_err());
    }

    #[test]
    fn unknown_command_fails() {
        let err = parse_args(&args(&["delete"])).unwrap_err();
        assert!(err.to_string().contains("Unknown command 'delete'"));
    }

    #[tokio::test]
    async fn run_resolves_provider_and_creates() {
        let transport = RecordingTransport::replying(Reply::json(
            201,
            r#"{"id": 5, "title": "Broken", "state": "new"}"#,
        ));
        let config = MemoryConfig::new()
            .set(config::BITBUCKET_USERNAME, "u")
            .set(config::BITBUCKET_APP_PASSWORD, "p");
        let selector = ProviderSelector::from_config(transport.clone(), Arc::new(config));
        let cmd = parse_args(&args(&["create", "Bitbucket", "acme", "widgets", "Broken"])).unwrap();

        let details = run(&cmd, &selector, &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.id, "5");
        assert_eq!(details.owner, "acme");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn run_reports_unsupported_provider() {
        let transport = RecordingTransport::replying(Reply::Hang);
        let selector = ProviderSelector::from_config(transport.clone(), Arc::new(MemoryConfig::new()));
        let cmd = parse_args(&args(&["close", "gitlab", "o", "r", "1"])).unwrap();

        let err = run(&cmd, &selector, &CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("unsupported provider 'gitlab'"));
        assert_eq!(transport.calls(), 0);
    }
}
