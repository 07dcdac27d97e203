//! CLI command implementations

mod config;
mod remote;
mod script;
mod validate;

pub use config::{config_init, config_path, config_show, load_or_default};
pub use remote::{exec_command, push_command, HostArgs};
pub use script::{parse_env_pair, script_command, ScriptOptions};
pub use validate::{load_task, validate_command};
