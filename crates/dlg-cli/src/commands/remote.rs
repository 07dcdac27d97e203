//! Remote command and file push implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use crate::output::{format_harvested, print_error, print_success};
use dlg_core::config::DelegateConfig;
use dlg_core::traits::TracingLogSink;
use dlg_core::ExecutionStatus;
use dlg_exec::{
    CommandExecutor, LocalFileProvider, RusshConnector, SessionAuth, SessionCache,
    SessionDescriptor,
};

/// Where and as whom to connect
#[derive(Args, Debug, Clone)]
pub struct HostArgs {
    /// Target host name or address
    #[arg(long)]
    pub host: String,

    /// SSH port
    #[arg(long, default_value_t = 22)]
    pub port: u16,

    /// Login user (defaults to the configured default user)
    #[arg(long)]
    pub user: Option<String>,

    /// Environment variable holding the login password
    #[arg(long, value_name = "VAR", required_unless_present = "key", conflicts_with = "key")]
    pub password_env: Option<String>,

    /// Private key file
    #[arg(long, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Environment variable holding the key passphrase
    #[arg(long, value_name = "VAR", requires = "key")]
    pub passphrase_env: Option<String>,

    /// Environment variable holding the password answered to sudo prompts
    #[arg(long, value_name = "VAR")]
    pub sudo_password_env: Option<String>,

    /// Remote working directory
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<String>,

    /// Execution the session belongs to
    #[arg(long, default_value = "dlg-cli")]
    pub execution_id: String,

    /// Connect timeout in seconds (defaults to the configured value)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

fn read_secret(var: &str) -> Result<String> {
    std::env::var(var).with_context(|| format!("Environment variable {} is not set", var))
}

impl HostArgs {
    /// Build the session descriptor, reading secrets from the environment
    pub fn descriptor(&self, config: &DelegateConfig) -> Result<SessionDescriptor> {
        let auth = match (&self.key, &self.password_env) {
            (Some(key), _) => {
                let passphrase = self.passphrase_env.as_deref().map(read_secret).transpose()?;
                SessionAuth::key_file(key.clone(), passphrase)
            }
            (None, Some(var)) => SessionAuth::password(read_secret(var)?),
            (None, None) => anyhow::bail!("Either --key or --password-env is required"),
        };

        let user = self
            .user
            .clone()
            .unwrap_or_else(|| config.remote.default_user.clone());
        let connect_timeout = self
            .timeout
            .map(std::time::Duration::from_secs)
            .unwrap_or(config.remote.connect_timeout);

        let mut builder =
            SessionDescriptor::builder(self.execution_id.as_str(), self.host.as_str())
                .account_id(config.delegate.account_id.as_str())
                .command_unit_name("dlg")
                .port(self.port)
                .user(user)
                .auth(auth)
                .connect_timeout(connect_timeout);
        if let Some(dir) = &self.workdir {
            builder = builder.working_directory(dir.as_str());
        }
        if let Some(var) = &self.sudo_password_env {
            builder = builder.sudo_password(read_secret(var)?);
        }
        Ok(builder.build())
    }
}

fn executor(config: &DelegateConfig) -> CommandExecutor {
    let connector = Arc::new(RusshConnector::new(config.remote.default_user.clone()));
    let cache = Arc::new(SessionCache::new(connector, config.remote.liveness_timeout));
    CommandExecutor::from_config(cache, Arc::new(TracingLogSink), &config.remote)
}

/// Run a command on a remote host and print harvested variables
pub async fn exec_command(
    config: &DelegateConfig,
    host: &HostArgs,
    command: &str,
    harvest: &[String],
) -> Result<ExecutionStatus> {
    let descriptor = host.descriptor(config)?;
    let executor = executor(config);

    let outcome = executor
        .execute_command(&descriptor, command, harvest)
        .await
        .context("Command rejected")?;
    executor.evict(descriptor.execution_id(), descriptor.host()).await;

    if !outcome.harvested.is_empty() {
        println!("{}", format_harvested(&outcome.harvested));
    }
    if outcome.status.is_success() {
        print_success(&format!("Command succeeded on {}", descriptor.host()));
    } else {
        print_error(&format!("Command failed on {}", descriptor.host()));
    }
    Ok(outcome.status)
}

/// Push one local file into a remote directory
pub async fn push_command(
    config: &DelegateConfig,
    host: &HostArgs,
    file: &Path,
    destination: &str,
) -> Result<ExecutionStatus> {
    let descriptor = host.descriptor(config)?;
    let provider = LocalFileProvider::new(file)
        .await
        .with_context(|| format!("Cannot read {:?}", file))?;
    let executor = executor(config);

    let status = executor
        .scp_one_file(&descriptor, destination, &provider)
        .await
        .context("File rejected")?;
    executor.evict(descriptor.execution_id(), descriptor.host()).await;

    if status.is_success() {
        print_success(&format!(
            "Copied {:?} to {}:{}",
            file,
            descriptor.host(),
            destination
        ));
    } else {
        print_error(&format!("Copy to {} failed", descriptor.host()));
    }
    Ok(status)
}
