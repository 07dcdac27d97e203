//! Validators for configs that carry a service URL

use dlg_core::{ResultFragment, ValidationError};

use super::connectivity::probe;
use crate::context::ValidationContext;
use crate::params::{TaskParameter, UrlConfig};
use crate::probe::DEFAULT_TCP_PORT;

fn first_url(params: &[TaskParameter]) -> Option<&UrlConfig> {
    params.iter().find_map(|p| match p {
        TaskParameter::Url(config) => Some(config),
        _ => None,
    })
}

pub(super) fn criteria(params: &[TaskParameter]) -> Vec<String> {
    first_url(params)
        .map(|config| config.url().to_string())
        .into_iter()
        .collect()
}

pub(super) async fn validate(
    params: &[TaskParameter],
    ctx: &ValidationContext,
) -> Result<Vec<ResultFragment>, ValidationError> {
    let url = first_url(params)
        .map(UrlConfig::url)
        .ok_or_else(|| ValidationError::MissingParameter("service URL config".to_string()))?;
    let validated = probe(ctx, url, DEFAULT_TCP_PORT).await?;
    Ok(vec![ResultFragment::new(url, validated)])
}
