//! delegate-runtime: Command-line interface for the delegate runtime
//!
//! Provides the `dlg` CLI for validating tasks against this delegate and
//! for running remote commands, file pushes and local scripts.

pub mod commands;
pub mod output;
