//! Git repository reachability

use dlg_core::{ResultFragment, ValidationError};

use super::connectivity::{is_http_url, probe};
use crate::context::ValidationContext;
use crate::params::{GitConfig, TaskParameter};
use crate::probe::parse_tcp_target;

const GIT_SSH_PORT: u16 = 22;

fn first_repo(params: &[TaskParameter]) -> Option<&GitConfig> {
    params.iter().find_map(|p| match p {
        TaskParameter::Git(config) => Some(config),
        _ => None,
    })
}

/// `(host, port)` of an `ssh://` or scp-like `user@host:path` URL
fn ssh_endpoint(repo_url: &str) -> Option<(String, u16)> {
    let repo_url = repo_url.trim();
    if repo_url.contains("://") {
        return parse_tcp_target(repo_url, GIT_SSH_PORT);
    }
    let without_user = repo_url.rsplit_once('@').map_or(repo_url, |(_, rest)| rest);
    let (host, _path) = without_user.split_once(':')?;
    (!host.is_empty()).then(|| (host.to_string(), GIT_SSH_PORT))
}

pub(super) fn criteria(params: &[TaskParameter]) -> Vec<String> {
    first_repo(params)
        .map(|config| config.repo_url.clone())
        .into_iter()
        .collect()
}

pub(super) async fn validate(
    params: &[TaskParameter],
    ctx: &ValidationContext,
) -> Result<Vec<ResultFragment>, ValidationError> {
    let repo = first_repo(params)
        .ok_or_else(|| ValidationError::MissingParameter("git config".to_string()))?;

    let validated = if is_http_url(&repo.repo_url) {
        probe(ctx, &repo.repo_url, GIT_SSH_PORT).await?
    } else {
        let (host, port) = ssh_endpoint(&repo.repo_url)
            .ok_or_else(|| ValidationError::InvalidCriteria(repo.repo_url.clone()))?;
        ctx.reachability.tcp_reachable(&host, port).await
    };

    Ok(vec![ResultFragment::new(repo.repo_url.clone(), validated)])
}
