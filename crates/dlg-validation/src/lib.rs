//! dlg-validation: Capability validation for delegate-runtime
//!
//! Decides whether this delegate can reach the resources a task needs.
//! Validators derive criteria from task parameters and probe them through
//! the seams in [`probe`]; the [`ValidationRunner`] stamps, stores and
//! fault-isolates every attempt.

pub mod context;
pub mod params;
pub mod probe;
pub mod runner;
pub mod task;
pub mod validators;

pub use context::ValidationContext;
pub use params::{
    ClusterConfig, EncryptionType, GitConfig, HostConnection, HostListConfig, SecretManagerConfig,
    SshHostConfig, TaskParameter, UrlConfig, VaultConfig,
};
pub use runner::ValidationRunner;
pub use task::ValidationTask;
pub use validators::{CapabilityValidator, ValidatorKind, ALWAYS_TRUE_CRITERIA};
