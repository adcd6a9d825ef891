//! Frame transports and the wire codec.

pub mod codec;
mod transport;

pub use codec::{decode_message, encode_message, CodecError, MAX_FRAME_LENGTH};
pub use transport::{ChannelTransport, TcpTransport, Transport, TransportError};
