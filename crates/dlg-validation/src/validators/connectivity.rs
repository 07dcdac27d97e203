//! Generic reachability, the default for task types without a dedicated validator

use dlg_core::{ResultFragment, ValidationError};

use crate::context::ValidationContext;
use crate::params::TaskParameter;
use crate::probe::{parse_tcp_target, DEFAULT_TCP_PORT};

/// Whether a criteria string is an HTTP(S) URL
pub fn is_http_url(criteria: &str) -> bool {
    let lower = criteria.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// HTTP probe for URLs, TCP connect otherwise
pub(crate) async fn probe(
    ctx: &ValidationContext,
    criteria: &str,
    default_port: u16,
) -> Result<bool, ValidationError> {
    if is_http_url(criteria) {
        return Ok(ctx.reachability.http_reachable(criteria.trim()).await);
    }
    let (host, port) = parse_tcp_target(criteria, default_port)
        .ok_or_else(|| ValidationError::InvalidCriteria(criteria.to_string()))?;
    Ok(ctx.reachability.tcp_reachable(&host, port).await)
}

pub(super) fn criteria(params: &[TaskParameter]) -> Vec<String> {
    params
        .iter()
        .find_map(TaskParameter::target)
        .into_iter()
        .collect()
}

pub(super) async fn validate(
    params: &[TaskParameter],
    ctx: &ValidationContext,
) -> Result<Vec<ResultFragment>, ValidationError> {
    let Some(target) = criteria(params).into_iter().next() else {
        return Ok(Vec::new());
    };
    let validated = probe(ctx, &target, DEFAULT_TCP_PORT).await?;
    Ok(vec![ResultFragment::new(target, validated)])
}
