//! Message encoding and decoding for network transport.
//!
//! # Wire Format
//!
//! Every message is a JSON document carried in a length-delimited frame:
//!
//! ```text
//! [u32 big-endian length][JSON payload]
//! ```
//!
//! The message kind is a field of the payload (`"kind": "request"`, `"ack"`
//! or `"cooldown_update"`), so a single stream carries every kind.
//!
//! A TCP connection opens with one [`Hello`] frame naming the connecting
//! process; every later frame is a [`Message`].

use bytes::Bytes;
use citygate_messages::Message;
use citygate_types::ProcessId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::codec::LengthDelimitedCodec;

/// Largest accepted frame. Messages are a few hundred bytes at most.
pub const MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Empty frame")]
    EmptyFrame,

    #[error("JSON decode error: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("JSON encode error: {0}")]
    Encode(#[source] serde_json::Error),
}

/// First frame of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub process: ProcessId,
}

/// Length-delimited framing shared by both ends of a connection.
pub fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec()
}

/// Encode a message to wire format.
pub fn encode_message(message: &Message) -> Result<Bytes, CodecError> {
    serde_json::to_vec(message)
        .map(Bytes::from)
        .map_err(CodecError::Encode)
}

/// Decode a message from wire format.
pub fn decode_message(data: &[u8]) -> Result<Message, CodecError> {
    if data.is_empty() {
        return Err(CodecError::EmptyFrame);
    }
    serde_json::from_slice(data).map_err(CodecError::Decode)
}

/// Encode the connection preamble.
pub fn encode_hello(process: ProcessId) -> Result<Bytes, CodecError> {
    serde_json::to_vec(&Hello { process })
        .map(Bytes::from)
        .map_err(CodecError::Encode)
}

/// Decode the connection preamble.
pub fn decode_hello(data: &[u8]) -> Result<Hello, CodecError> {
    if data.is_empty() {
        return Err(CodecError::EmptyFrame);
    }
    serde_json::from_slice(data).map_err(CodecError::Decode)
}
