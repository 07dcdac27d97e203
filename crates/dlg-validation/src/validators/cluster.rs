//! Container cluster validation
//!
//! - `AWS:<region>` compares regions and makes no network call
//! - `GCP:` and `Azure:` resolve the cluster's API endpoint and probe it
//! - a direct cluster probes its master URL
//! - `delegate-name: X` matches this delegate's name

use dlg_core::{ResultFragment, ValidationError};

use crate::context::ValidationContext;
use crate::params::{ClusterConfig, TaskParameter};

fn first_cluster(params: &[TaskParameter]) -> Option<&ClusterConfig> {
    params.iter().find_map(|p| match p {
        TaskParameter::Cluster(config) => Some(config),
        _ => None,
    })
}

pub(super) fn criteria(params: &[TaskParameter]) -> Vec<String> {
    first_cluster(params)
        .map(ClusterConfig::criteria)
        .into_iter()
        .collect()
}

/// Whether the delegate's own region matches the target region
fn region_matches(delegate_region: Option<&str>, target: &str) -> bool {
    let target = target.trim();
    !target.is_empty() && delegate_region.is_some_and(|region| region.contains(target))
}

pub(super) async fn validate(
    params: &[TaskParameter],
    ctx: &ValidationContext,
) -> Result<Vec<ResultFragment>, ValidationError> {
    let cluster = first_cluster(params)
        .ok_or_else(|| ValidationError::MissingParameter("cluster config".to_string()))?;
    let criteria = cluster.criteria();

    let validated = match cluster {
        ClusterConfig::Aws { region } => region_matches(ctx.delegate.region.as_deref(), region),
        ClusterConfig::Pinned { delegate_name } => ctx.delegate.name == *delegate_name,
        ClusterConfig::Direct { master_url } => ctx.reachability.http_reachable(master_url).await,
        ClusterConfig::Gcp { .. } | ClusterConfig::Azure { .. } => {
            let endpoint = ctx.clusters.resolve_endpoint(cluster).await?;
            tracing::debug!(criteria = %criteria, endpoint = %endpoint, "Resolved cluster endpoint");
            ctx.reachability.http_reachable(&endpoint).await
        }
    };

    Ok(vec![ResultFragment::new(criteria, validated)])
}
