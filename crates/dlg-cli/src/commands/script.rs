//! Local script command implementation

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::output::{format_harvested, print_error, print_success};
use dlg_core::config::DelegateConfig;
use dlg_core::traits::TracingLogSink;
use dlg_core::ExecutionStatus;
use dlg_exec::{LocalScriptExecutor, ScriptRequest, ScriptType};

/// Options of one local script run
#[derive(Debug, Clone, Default)]
pub struct ScriptOptions {
    pub powershell: bool,
    pub workdir: Option<PathBuf>,
    pub environment: Vec<(String, String)>,
    pub kube_config: Option<PathBuf>,
    pub harvest: Vec<String>,
}

/// Parse a `KEY=VALUE` pair
pub fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

/// Run a script file on this machine
pub async fn script_command(
    config: &DelegateConfig,
    file: &Path,
    options: ScriptOptions,
) -> Result<ExecutionStatus> {
    let script = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read script: {:?}", file))?;
    let kube_config = options
        .kube_config
        .as_deref()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read kube config: {:?}", path))
        })
        .transpose()?;

    let mut request = ScriptRequest::new("dlg-cli", script);
    request.account_id = config.delegate.account_id.clone();
    request.command_unit_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "script".to_string());
    request.script_type = if options.powershell {
        ScriptType::PowerShell
    } else {
        ScriptType::Bash
    };
    request.working_directory = options.workdir;
    request.environment = options.environment.into_iter().collect::<HashMap<_, _>>();
    request.kube_config = kube_config;
    request.harvest = options.harvest;

    let executor = LocalScriptExecutor::new(Arc::new(TracingLogSink), config.script.clone());
    let outcome = executor.execute(&request).await.context("Script rejected")?;

    if !outcome.harvested.is_empty() {
        println!("{}", format_harvested(&outcome.harvested));
    }
    if outcome.status.is_success() {
        print_success(&format!("Script {:?} succeeded", file));
    } else {
        print_error(&format!("Script {:?} failed", file));
    }
    Ok(outcome.status)
}
