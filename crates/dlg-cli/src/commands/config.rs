//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success, print_warning};
use dlg_core::config::{self, DelegateConfig};
use dlg_core::ConfigError;

fn resolve_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path)
}

/// Load the delegate config, falling back to defaults when the file is missing
pub fn load_or_default(config_path: Option<&Path>) -> Result<DelegateConfig> {
    let path = resolve_path(config_path);
    match config::load_config(&path) {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound(_)) => {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            Ok(DelegateConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load config from {:?}", path)),
    }
}

/// Show the effective configuration
pub fn config_show(config_path: Option<&Path>) -> Result<()> {
    let path = resolve_path(config_path);
    if path.exists() {
        print_info(&format!("Configuration file: {:?}", path));
    } else {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Showing defaults. Run 'dlg config init' to create one");
    }
    println!();

    let config = load_or_default(Some(&path))?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
    println!("{}", rendered);
    Ok(())
}

/// Write the default configuration
pub fn config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = resolve_path(config_path);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    config::save_config(&path, &DelegateConfig::default())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    print_success(&format!("Created configuration file: {:?}", path));
    Ok(())
}

/// Print the config file path in use
pub fn config_path(config_path: Option<&Path>) {
    println!("{}", resolve_path(config_path).display());
}
