//! dlg: delegate runtime CLI
//!
//! - `validate` checks whether this delegate can reach a task's targets
//! - `exec` and `push` run commands and copy files over SSH
//! - `script` runs a script on this machine
//! - `config` manages the delegate configuration

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use delegate_runtime::commands::{self, HostArgs, ScriptOptions};
use dlg_core::ExecutionStatus;

#[derive(Parser)]
#[command(name = "dlg")]
#[command(author, version, about = "Delegate runtime for capability validation and remote execution")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log level filter (overrides -v)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate whether this delegate can reach a task's targets
    Validate {
        /// JSON task file with taskType, accountId and parameters
        #[arg(long, value_name = "FILE")]
        task: PathBuf,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a command on a remote host over SSH
    Exec {
        #[command(flatten)]
        host: HostArgs,
        /// Environment variable to read back after the command
        #[arg(long, value_name = "NAME")]
        harvest: Vec<String>,
        /// Command to run
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Copy a local file to a remote directory over SCP
    Push {
        #[command(flatten)]
        host: HostArgs,
        /// Local file to copy
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
        /// Remote destination directory
        #[arg(long, value_name = "DIR")]
        dest: String,
    },

    /// Run a script on this machine
    Script {
        /// Script file
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
        /// Run the script with PowerShell
        #[arg(long)]
        powershell: bool,
        /// Persistent working directory
        #[arg(long, value_name = "DIR")]
        workdir: Option<PathBuf>,
        /// Extra environment variable
        #[arg(long = "env", value_name = "KEY=VALUE", value_parser = commands::parse_env_pair)]
        environment: Vec<(String, String)>,
        /// Kube-config file exported as KUBECONFIG
        #[arg(long, value_name = "PATH")]
        kubeconfig: Option<PathBuf>,
        /// Environment variable to read back after the script
        #[arg(long, value_name = "NAME")]
        harvest: Vec<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = match (cli.log_level.as_deref(), cli.verbose) {
        (Some(level), _) => level,
        (None, 0) => "info",
        (None, 1) => "debug",
        (None, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config_path = cli.config.as_deref();

    let status = match cli.command {
        Commands::Validate { task, json } => {
            let config = commands::load_or_default(config_path)?;
            commands::validate_command(&config, &task, json).await?;
            ExecutionStatus::Success
        }

        Commands::Exec {
            host,
            harvest,
            command,
        } => {
            let config = commands::load_or_default(config_path)?;
            commands::exec_command(&config, &host, &command.join(" "), &harvest).await?
        }

        Commands::Push { host, file, dest } => {
            let config = commands::load_or_default(config_path)?;
            commands::push_command(&config, &host, &file, &dest).await?
        }

        Commands::Script {
            file,
            powershell,
            workdir,
            environment,
            kubeconfig,
            harvest,
        } => {
            let config = commands::load_or_default(config_path)?;
            let options = ScriptOptions {
                powershell,
                workdir,
                environment,
                kube_config: kubeconfig,
                harvest,
            };
            commands::script_command(&config, &file, options).await?
        }

        Commands::Config { action } => {
            match action {
                ConfigAction::Show => commands::config_show(config_path)?,
                ConfigAction::Init { force } => commands::config_init(config_path, force)?,
                ConfigAction::Path => commands::config_path(config_path),
            }
            ExecutionStatus::Success
        }
    };

    Ok(if status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
