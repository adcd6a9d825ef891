//! The wire union of all protocol messages.

use crate::{AckResponse, CooldownUpdateGossip, NetworkMessage, RequestGossip};
use citygate_types::{ProcessId, ResourceId, Timestamp, Topology};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Any protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// A process asks every peer for a resource.
    Request(RequestGossip),

    /// A peer consents to a request.
    Ack(AckResponse),

    /// The cooldown owner replicates its counter.
    CooldownUpdate(CooldownUpdateGossip),
}

/// A message that breaks the transport contract.
///
/// The protocol has no way to mask a corrupted message, so receivers treat
/// every one of these as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// Sender id is outside the group.
    #[error("sender {sender} is not a member of a group of {num_processes}")]
    UnknownSender {
        sender: ProcessId,
        num_processes: u32,
    },

    /// Resource id is outside `[0, M)`.
    #[error("{resource} does not exist, only {num_resources} resources are configured")]
    UnknownResource {
        resource: ResourceId,
        num_resources: u32,
    },

    /// Cooldown owner id is outside the group.
    #[error("cooldown owner {owner} is not a member of the group")]
    UnknownOwner { owner: ProcessId },

    /// The transport delivered a message whose sender field names someone else.
    #[error("{kind} claims sender {claimed} but arrived from {actual}")]
    SenderMismatch {
        kind: &'static str,
        claimed: ProcessId,
        actual: ProcessId,
    },

    /// A process received its own message.
    #[error("{kind} from {sender} was delivered back to its sender")]
    Loopback {
        kind: &'static str,
        sender: ProcessId,
    },
}

impl Message {
    /// Get a human-readable name for this message type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Request(_) => RequestGossip::message_type_id(),
            Message::Ack(_) => AckResponse::message_type_id(),
            Message::CooldownUpdate(_) => CooldownUpdateGossip::message_type_id(),
        }
    }

    /// The process that produced the message.
    pub fn sender(&self) -> ProcessId {
        match self {
            Message::Request(gossip) => gossip.requester(),
            Message::Ack(ack) => ack.sender,
            Message::CooldownUpdate(update) => update.sender,
        }
    }

    /// The Lamport stamp carried by the message.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Message::Request(gossip) => gossip.timestamp(),
            Message::Ack(ack) => ack.timestamp,
            Message::CooldownUpdate(update) => update.timestamp,
        }
    }

    /// The resource the message is about.
    pub fn resource(&self) -> ResourceId {
        match self {
            Message::Request(gossip) => gossip.resource(),
            Message::Ack(ack) => ack.resource,
            Message::CooldownUpdate(update) => update.resource,
        }
    }

    /// Check the message against the receiver's topology.
    ///
    /// `from` is the peer the transport says the message came from.
    pub fn validate(&self, topology: &dyn Topology, from: ProcessId) -> Result<(), MessageError> {
        let sender = self.sender();
        if !topology.contains_process(sender) {
            return Err(MessageError::UnknownSender {
                sender,
                num_processes: topology.num_processes(),
            });
        }
        if sender != from {
            return Err(MessageError::SenderMismatch {
                kind: self.type_name(),
                claimed: sender,
                actual: from,
            });
        }
        if sender == topology.local_process_id() {
            return Err(MessageError::Loopback {
                kind: self.type_name(),
                sender,
            });
        }
        let resource = self.resource();
        if !topology.contains_resource(resource) {
            return Err(MessageError::UnknownResource {
                resource,
                num_resources: topology.num_resources(),
            });
        }
        if let Message::CooldownUpdate(CooldownUpdateGossip {
            owner: Some(owner), ..
        }) = self
        {
            if !topology.contains_process(*owner) {
                return Err(MessageError::UnknownOwner { owner: *owner });
            }
        }
        Ok(())
    }
}

impl From<RequestGossip> for Message {
    fn from(gossip: RequestGossip) -> Self {
        Message::Request(gossip)
    }
}

impl From<AckResponse> for Message {
    fn from(ack: AckResponse) -> Self {
        Message::Ack(ack)
    }
}

impl From<CooldownUpdateGossip> for Message {
    fn from(update: CooldownUpdateGossip) -> Self {
        Message::CooldownUpdate(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citygate_types::{Request, StaticTopology};

    fn topology() -> StaticTopology {
        StaticTopology::new(ProcessId(0), 3, 2).unwrap()
    }

    fn request_from(pid: u32, resource: u32) -> Message {
        RequestGossip::new(Request::new(
            ProcessId(pid),
            Timestamp(1),
            ResourceId(resource),
        ))
        .into()
    }

    #[test]
    fn test_valid_message_passes() {
        assert_eq!(request_from(1, 1).validate(&topology(), ProcessId(1)), Ok(()));
    }

    #[test]
    fn test_unknown_resource_rejected() {
        let err = request_from(1, 2)
            .validate(&topology(), ProcessId(1))
            .unwrap_err();
        assert!(matches!(err, MessageError::UnknownResource { .. }));
    }

    #[test]
    fn test_unknown_sender_rejected() {
        let err = request_from(7, 0)
            .validate(&topology(), ProcessId(7))
            .unwrap_err();
        assert!(matches!(err, MessageError::UnknownSender { .. }));
    }

    #[test]
    fn test_spoofed_sender_rejected() {
        let err = request_from(1, 0)
            .validate(&topology(), ProcessId(2))
            .unwrap_err();
        assert!(matches!(err, MessageError::SenderMismatch { .. }));
    }

    #[test]
    fn test_loopback_rejected() {
        let err = request_from(0, 0)
            .validate(&topology(), ProcessId(0))
            .unwrap_err();
        assert!(matches!(err, MessageError::Loopback { .. }));
    }

    #[test]
    fn test_cooldown_owner_checked() {
        let update: Message =
            CooldownUpdateGossip::new(ProcessId(1), ResourceId(0), 2, Some(ProcessId(9)), Timestamp(3))
                .into();
        assert_eq!(
            update.validate(&topology(), ProcessId(1)),
            Err(MessageError::UnknownOwner { owner: ProcessId(9) })
        );
    }

    #[test]
    fn test_wire_form_is_tagged() {
        let ack: Message = AckResponse::new(ProcessId(1), Timestamp(4), ResourceId(0)).into();
        let json = serde_json::to_value(ack).unwrap();
        assert_eq!(json["kind"], "ack");
        assert_eq!(json["sender"], 1);
        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, ack);
    }

    #[test]
    fn test_accessors_cover_every_kind() {
        let update: Message =
            CooldownUpdateGossip::new(ProcessId(2), ResourceId(1), 0, None, Timestamp(8)).into();
        assert_eq!(update.sender(), ProcessId(2));
        assert_eq!(update.resource(), ResourceId(1));
        assert_eq!(update.timestamp(), Timestamp(8));
        assert_eq!(update.type_name(), "city.cooldown");
    }
}
