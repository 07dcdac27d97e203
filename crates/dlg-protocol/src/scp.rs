//! SCP sink protocol messages
//!
//! A push is driven against a remote `scp -t <dir>` process:
//!
//! ```text
//! sink   -> 0x00                         ready
//! source -> C0644 <size> <name>\n        control line
//! sink   -> 0x00                         accepted
//! source -> <size raw bytes> 0x00        payload + terminator
//! sink   -> 0x00                         stored
//! ```
//!
//! Any non-zero acknowledgement aborts the transfer. Bytes 1 and 2 are
//! followed by a `\n`-terminated error line from the remote side.

use crate::error::ProtocolError;

/// Permission bits sent on the control line
pub const DEFAULT_FILE_MODE: &str = "0644";

/// Longest error line accepted after a non-zero acknowledgement
pub const MAX_ACK_MESSAGE_LEN: usize = 8 * 1024;

/// Acknowledgement sent by the remote sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// 0x00
    Ok,
    /// 0x01 followed by a message line
    Warning(String),
    /// 0x02 followed by a message line
    Fatal(String),
}

impl Ack {
    /// Whether the sink accepted the previous step
    pub fn is_ok(&self) -> bool {
        matches!(self, Ack::Ok)
    }

    /// Convert into a result, surfacing the remote error text verbatim
    pub fn into_result(self) -> Result<(), ProtocolError> {
        match self {
            Ack::Ok => Ok(()),
            Ack::Warning(message) | Ack::Fatal(message) => Err(ProtocolError::Remote(message)),
        }
    }
}

/// Messages sent by the source side of a push
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScpMessage {
    /// `C<mode> <size> <name>\n`
    File {
        mode: String,
        size: u64,
        name: String,
    },
    /// Single NUL byte closing the payload
    EndOfFile,
}

impl ScpMessage {
    /// Control line for a regular file with the default mode
    pub fn file(name: impl Into<String>, size: u64) -> Result<Self, ProtocolError> {
        let name = name.into();
        if name.is_empty() || name.contains('/') || name.contains('\n') {
            return Err(ProtocolError::InvalidFileName(name));
        }
        Ok(ScpMessage::File {
            mode: DEFAULT_FILE_MODE.to_string(),
            size,
            name,
        })
    }
}

/// Single-quote `word` for a POSIX shell
pub fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Remote command that prepares the destination and starts the sink
pub fn sink_command(destination_dir: &str) -> String {
    format!(
        "mkdir -p {dir} && scp -t {dir}",
        dir = shell_quote(destination_dir)
    )
}
