//! dlg-protocol: Wire formats spoken by delegate-runtime over remote shells
//!
//! This crate defines the minimal SCP sink protocol used to push a single
//! file through an exec channel, plus the framing helpers that turn a raw
//! shell output stream into log lines and detect interactive prompts.

pub mod codec;
pub mod error;
pub mod lines;
pub mod prompt;
pub mod scp;

pub use codec::ScpCodec;
pub use error::ProtocolError;
pub use lines::LineSplitter;
pub use prompt::is_sudo_prompt;
pub use scp::{
    shell_quote, sink_command, Ack, ScpMessage, DEFAULT_FILE_MODE, MAX_ACK_MESSAGE_LEN,
};
