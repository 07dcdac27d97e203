//! Protocol error types

use thiserror::Error;

/// Errors that can occur while speaking the SCP sink protocol
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The remote sink answered with a warning or fatal acknowledgement
    #[error("Remote scp error: {0}")]
    Remote(String),

    /// The remote sink answered with a byte outside the protocol
    #[error("Unexpected acknowledgement byte: {0}")]
    UnknownAck(u8),

    /// The error text following a non-zero acknowledgement is too long
    #[error("Acknowledgement message exceeds {max} bytes")]
    AckMessageTooLong { max: usize },

    /// The stream ended while an acknowledgement was expected
    #[error("Stream closed before acknowledgement was received")]
    UnexpectedEof,

    /// A file name that cannot be carried on a control line
    #[error("Invalid file name for transfer: {0:?}")]
    InvalidFileName(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
