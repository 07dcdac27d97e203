//! Validate command implementation

use std::path::Path;

use anyhow::{Context, Result};

use crate::output::{format_results, print_info, print_success, print_warning};
use dlg_core::config::DelegateConfig;
use dlg_core::{any_validated, ConnectionResult};
use dlg_validation::{ValidationContext, ValidationRunner, ValidationTask};

/// Read a task description from a JSON file
pub fn load_task(path: &Path) -> Result<ValidationTask> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read task file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid task file: {:?}", path))
}

/// Validate a task against this delegate and print the results
pub async fn validate_command(
    config: &DelegateConfig,
    task_path: &Path,
    json: bool,
) -> Result<Vec<ConnectionResult>> {
    let task = load_task(task_path)?;
    let context = ValidationContext::from_config(config).context("Failed to set up probes")?;
    let runner = ValidationRunner::new(context);
    let validator = task.validator(config.delegate.id.as_str());

    tracing::debug!(
        task_type = %task.task_type,
        kind = %validator.kind,
        "Validating task"
    );
    let results = runner.run(&validator).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(results);
    }

    print_info(&format!(
        "{} task validated as {} on delegate {}",
        task.task_type, validator.kind, config.delegate.id
    ));
    println!("{}", format_results(&results));
    if any_validated(&results) {
        print_success("This delegate can execute the task");
    } else {
        print_warning("This delegate cannot reach the task's targets");
    }
    Ok(results)
}
