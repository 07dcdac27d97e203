//! Batch host validation under one wall-clock budget
//!
//! Hosts are tried in order. Each attempt is bounded by whatever remains of
//! the budget; hosts not reached before the deadline are left out of the
//! result rather than reported as failures.

use std::collections::HashSet;

use tokio::time::{timeout_at, Instant};

use dlg_core::time::duration_millis;
use dlg_core::{ResultFragment, ValidationError};

use super::ssh::connect_and_disconnect;
use crate::context::ValidationContext;
use crate::params::{HostListConfig, TaskParameter};

fn first_host_list(params: &[TaskParameter]) -> Option<&HostListConfig> {
    params.iter().find_map(|p| match p {
        TaskParameter::HostList(config) => Some(config),
        _ => None,
    })
}

/// Hosts in order, each once
fn unique_hosts(config: &HostListConfig) -> Vec<&str> {
    let mut seen = HashSet::new();
    config
        .hosts
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty() && seen.insert(*h))
        .collect()
}

pub(super) fn criteria(params: &[TaskParameter]) -> Vec<String> {
    first_host_list(params)
        .map(|config| unique_hosts(config).into_iter().map(String::from).collect())
        .unwrap_or_default()
}

pub(super) async fn validate(
    params: &[TaskParameter],
    ctx: &ValidationContext,
) -> Result<Vec<ResultFragment>, ValidationError> {
    let config = first_host_list(params)
        .ok_or_else(|| ValidationError::MissingParameter("host list config".to_string()))?;
    let hosts = unique_hosts(config);
    let deadline = Instant::now() + ctx.settings.host_list_budget;

    let mut fragments = Vec::with_capacity(hosts.len());
    for host in hosts {
        if Instant::now() >= deadline {
            break;
        }
        let started = Instant::now();
        let outcome = match timeout_at(
            deadline,
            connect_and_disconnect(ctx, host, &config.connection),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => break,
        };

        let validated = match outcome {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(host, "Host validation failed: {}", e);
                false
            }
        };
        fragments.push(ResultFragment::timed(
            host,
            validated,
            duration_millis(started.elapsed()),
        ));
    }

    if fragments.len() < criteria(params).len() {
        tracing::info!(
            validated = fragments.len(),
            budget_secs = ctx.settings.host_list_budget.as_secs(),
            "Host list budget exhausted, remaining hosts skipped"
        );
    }
    Ok(fragments)
}
