//! Outbound fan-out and inbound decoding on top of a [`Transport`].

use crate::network::{decode_message, encode_message, CodecError, Transport, TransportError};
use bytes::Bytes;
use citygate_messages::{Message, MessageError};
use citygate_types::{ProcessId, Topology};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// Errors raised while routing messages.
///
/// Every variant is fatal for the node.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Malformed frame from {from}: {source}")]
    Malformed {
        from: ProcessId,
        #[source]
        source: CodecError,
    },

    #[error("Failed to encode outbound message: {0}")]
    Encode(#[source] CodecError),

    #[error("Invalid message from {from}: {source}")]
    Invalid {
        from: ProcessId,
        #[source]
        source: MessageError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Routes protocol messages between the node and its transport.
pub struct MessageRouter<T: Transport> {
    transport: T,
    topology: Arc<dyn Topology>,
}

impl<T: Transport> std::fmt::Debug for MessageRouter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("local", &self.transport.local_id())
            .field("num_processes", &self.topology.num_processes())
            .finish()
    }
}

impl<T: Transport> MessageRouter<T> {
    /// Create a router for `topology` over `transport`.
    pub fn new(transport: T, topology: Arc<dyn Topology>) -> Self {
        Self {
            transport,
            topology,
        }
    }

    /// Get the topology.
    pub fn topology(&self) -> &Arc<dyn Topology> {
        &self.topology
    }

    /// Send a message to one peer.
    pub async fn send(&self, to: ProcessId, message: &Message) -> Result<(), RouterError> {
        let frame = encode_message(message).map_err(RouterError::Encode)?;
        trace!(to = %to, kind = message.type_name(), "Sending message");
        self.transport.send(to, frame).await?;
        Ok(())
    }

    /// Send a message to every peer, one point-to-point send each.
    pub async fn broadcast(&self, message: &Message) -> Result<(), RouterError> {
        let frame = encode_message(message).map_err(RouterError::Encode)?;
        for peer in self.topology.peers() {
            trace!(to = %peer, kind = message.type_name(), "Broadcasting message");
            self.transport.send(peer, frame.clone()).await?;
        }
        Ok(())
    }

    /// Decode and validate every frame that has already arrived.
    pub fn drain(&mut self) -> Result<Vec<Message>, RouterError> {
        let frames = self.transport.try_recv_all()?;
        frames
            .into_iter()
            .map(|(from, frame)| self.admit(from, &frame))
            .collect()
    }

    /// Wait for at least one message, then take everything else already
    /// queued.
    ///
    /// Cancel safe as long as nothing has arrived yet.
    pub async fn recv_batch(&mut self) -> Result<Vec<Message>, RouterError> {
        let (from, frame) = self.transport.recv().await?;
        let mut batch = vec![self.admit(from, &frame)?];
        // An inbound side that closed right after the first frame still
        // yields the first frame.
        match self.drain() {
            Ok(rest) => batch.extend(rest),
            Err(RouterError::Transport(TransportError::InboundClosed)) => {}
            Err(e) => return Err(e),
        }
        Ok(batch)
    }

    fn admit(&self, from: ProcessId, frame: &Bytes) -> Result<Message, RouterError> {
        let message =
            decode_message(frame).map_err(|source| RouterError::Malformed { from, source })?;
        message
            .validate(self.topology.as_ref(), from)
            .map_err(|source| RouterError::Invalid { from, source })?;
        trace!(from = %from, kind = message.type_name(), "Received message");
        Ok(message)
    }
}
