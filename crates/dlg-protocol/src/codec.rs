//! Tokio codec for the SCP sink protocol

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::scp::{Ack, ScpMessage, MAX_ACK_MESSAGE_LEN};

/// Decodes sink acknowledgements and encodes source control messages
#[derive(Debug, Default)]
pub struct ScpCodec {
    /// Acknowledgement byte read while its message line is still incomplete
    pending_code: Option<u8>,
}

impl ScpCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self { pending_code: None }
    }
}

impl Decoder for ScpCodec {
    type Item = Ack;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let code = match self.pending_code.take() {
            Some(code) => code,
            None => {
                if src.is_empty() {
                    return Ok(None);
                }
                let code = src.split_to(1)[0];
                match code {
                    0 => return Ok(Some(Ack::Ok)),
                    1 | 2 => code,
                    other => return Err(ProtocolError::UnknownAck(other)),
                }
            }
        };

        let Some(newline) = src.iter().position(|b| *b == b'\n') else {
            if src.len() > MAX_ACK_MESSAGE_LEN {
                return Err(ProtocolError::AckMessageTooLong {
                    max: MAX_ACK_MESSAGE_LEN,
                });
            }
            self.pending_code = Some(code);
            return Ok(None);
        };

        let line = src.split_to(newline + 1);
        let message = String::from_utf8_lossy(&line[..newline]).into_owned();

        Ok(Some(if code == 1 {
            Ack::Warning(message)
        } else {
            Ack::Fatal(message)
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(ack) => Ok(Some(ack)),
            None if self.pending_code.is_some() || !src.is_empty() => {
                // Remote closed mid-message: surface what it managed to say.
                let message = String::from_utf8_lossy(src).into_owned();
                src.clear();
                self.pending_code = None;
                Err(ProtocolError::Remote(message))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<ScpMessage> for ScpCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: ScpMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            ScpMessage::File { mode, size, name } => {
                let line = format!("C{} {} {}\n", mode, size, name);
                dst.reserve(line.len());
                dst.put_slice(line.as_bytes());
            }
            ScpMessage::EndOfFile => dst.put_u8(0),
        }
        Ok(())
    }
}
