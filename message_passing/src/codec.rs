// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Pure encode/decode functions between the typed messages and the fixed-size
//! byte envelopes a [`channel`](crate::channel) actually carries.
//!
//! Wire layout, little-endian throughout:
//!
//! ```text
//! byte 0       kind   (EnvelopeKind as u8)
//! byte 1       id     (MessageId)
//! bytes 2..4   pad    (unused, always written as zero)
//! bytes 4..8   pid    (NodeId)
//! bytes 8..    payload (8 bytes short, 16 bytes medium)
//! ```

use crate::element_fq_id::{decode_element_fq_id, encode_element_fq_id};
use crate::error::Error;
use crate::message::{
    EnvelopeKind, MediumMessage, MediumMessagePayload, MessageId, NodeId, NotifyEvent,
    OutdatedNodeId, RegisterEventNotifier, ShortMessage, ShortMessagePayload,
    UnregisterEventNotifier, MSG_NOTIFY_EVENT, MSG_OUTDATED_NODE_ID, MSG_REGISTER_EVENT_NOTIFIER,
    MSG_UNREGISTER_EVENT_NOTIFIER,
};

pub const SHORT_ENVELOPE_LEN: usize = 16;
pub const MEDIUM_ENVELOPE_LEN: usize = 24;

const HEADER_LEN: usize = 8;

fn write_header(buf: &mut [u8], kind: EnvelopeKind, id: MessageId, pid: NodeId) {
    buf[0] = kind as u8;
    buf[1] = id as u8;
    buf[2] = 0;
    buf[3] = 0;
    buf[4..8].copy_from_slice(&pid.to_le_bytes());
}

fn read_header(buf: &[u8]) -> (MessageId, NodeId) {
    let id = buf[1] as i8;
    let pid = NodeId::from_le_bytes(buf[4..8].try_into().expect("4 bytes"));
    (id, pid)
}

/// Encodes a short message into its 16-byte wire envelope.
pub fn encode_short(msg: ShortMessage) -> [u8; SHORT_ENVELOPE_LEN] {
    let mut buf = [0u8; SHORT_ENVELOPE_LEN];
    write_header(&mut buf, EnvelopeKind::Short, msg.id, msg.pid);
    buf[HEADER_LEN..].copy_from_slice(&msg.payload.to_le_bytes());
    buf
}

/// Decodes a 16-byte wire envelope into a short message.
///
/// Returns [`Error::MalformedEnvelope`] if `buf` isn't exactly
/// [`SHORT_ENVELOPE_LEN`] bytes or doesn't carry [`EnvelopeKind::Short`].
pub fn decode_short(buf: &[u8]) -> Result<ShortMessage, Error> {
    if buf.len() != SHORT_ENVELOPE_LEN || EnvelopeKind::from_u8(buf[0]) != Some(EnvelopeKind::Short)
    {
        return Err(Error::MalformedEnvelope);
    }
    let (id, pid) = read_header(buf);
    let payload = ShortMessagePayload::from_le_bytes(
        buf[HEADER_LEN..].try_into().expect("8 bytes"),
    );
    Ok(ShortMessage { id, pid, payload })
}

/// Encodes a medium message into its 24-byte wire envelope.
pub fn encode_medium(msg: MediumMessage) -> [u8; MEDIUM_ENVELOPE_LEN] {
    let mut buf = [0u8; MEDIUM_ENVELOPE_LEN];
    write_header(&mut buf, EnvelopeKind::Medium, msg.id, msg.pid);
    buf[HEADER_LEN..].copy_from_slice(&msg.payload);
    buf
}

/// Decodes a 24-byte wire envelope into a medium message.
pub fn decode_medium(buf: &[u8]) -> Result<MediumMessage, Error> {
    if buf.len() != MEDIUM_ENVELOPE_LEN
        || EnvelopeKind::from_u8(buf[0]) != Some(EnvelopeKind::Medium)
    {
        return Err(Error::MalformedEnvelope);
    }
    let (id, pid) = read_header(buf);
    let mut payload: MediumMessagePayload = [0u8; 16];
    payload.copy_from_slice(&buf[HEADER_LEN..]);
    Ok(MediumMessage { id, pid, payload })
}

/// Reads just the leading kind byte, as a [`Receiver`](crate::receiver::Receiver)
/// does to decide how many more bytes to read off the channel.
pub fn peek_kind(buf: &[u8]) -> Result<EnvelopeKind, Error> {
    buf.first()
        .copied()
        .and_then(EnvelopeKind::from_u8)
        .ok_or(Error::MalformedEnvelope)
}

impl From<RegisterEventNotifier> for ShortMessage {
    fn from(m: RegisterEventNotifier) -> Self {
        ShortMessage {
            id: MSG_REGISTER_EVENT_NOTIFIER,
            pid: m.sender,
            payload: encode_element_fq_id(m.event_id),
        }
    }
}

impl TryFrom<ShortMessage> for RegisterEventNotifier {
    type Error = Error;
    fn try_from(msg: ShortMessage) -> Result<Self, Error> {
        if msg.id != MSG_REGISTER_EVENT_NOTIFIER {
            return Err(Error::MalformedEnvelope);
        }
        Ok(RegisterEventNotifier {
            event_id: decode_element_fq_id(msg.payload),
            sender: msg.pid,
        })
    }
}

impl From<UnregisterEventNotifier> for ShortMessage {
    fn from(m: UnregisterEventNotifier) -> Self {
        ShortMessage {
            id: MSG_UNREGISTER_EVENT_NOTIFIER,
            pid: m.sender,
            payload: encode_element_fq_id(m.event_id),
        }
    }
}

impl TryFrom<ShortMessage> for UnregisterEventNotifier {
    type Error = Error;
    fn try_from(msg: ShortMessage) -> Result<Self, Error> {
        if msg.id != MSG_UNREGISTER_EVENT_NOTIFIER {
            return Err(Error::MalformedEnvelope);
        }
        Ok(UnregisterEventNotifier {
            event_id: decode_element_fq_id(msg.payload),
            sender: msg.pid,
        })
    }
}

impl From<NotifyEvent> for ShortMessage {
    fn from(m: NotifyEvent) -> Self {
        ShortMessage {
            id: MSG_NOTIFY_EVENT,
            pid: m.sender,
            payload: encode_element_fq_id(m.event_id),
        }
    }
}

impl TryFrom<ShortMessage> for NotifyEvent {
    type Error = Error;
    fn try_from(msg: ShortMessage) -> Result<Self, Error> {
        if msg.id != MSG_NOTIFY_EVENT {
            return Err(Error::MalformedEnvelope);
        }
        Ok(NotifyEvent {
            event_id: decode_element_fq_id(msg.payload),
            sender: msg.pid,
        })
    }
}

// OutdatedNodeId serializes pid_to_unregister by raw copy into the payload,
// not through the ElementFqId bit-packing - there is no element id involved.
impl From<OutdatedNodeId> for ShortMessage {
    fn from(m: OutdatedNodeId) -> Self {
        ShortMessage {
            id: MSG_OUTDATED_NODE_ID,
            pid: m.sender,
            payload: m.pid_to_unregister as u64,
        }
    }
}

impl TryFrom<ShortMessage> for OutdatedNodeId {
    type Error = Error;
    fn try_from(msg: ShortMessage) -> Result<Self, Error> {
        if msg.id != MSG_OUTDATED_NODE_ID {
            return Err(Error::MalformedEnvelope);
        }
        Ok(OutdatedNodeId {
            pid_to_unregister: msg.payload as NodeId,
            sender: msg.pid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element_fq_id::{ElementFqId, ElementType};

    #[test]
    fn short_envelope_round_trips() {
        let msg = ShortMessage {
            id: MSG_NOTIFY_EVENT,
            pid: 4242,
            payload: 0xDEAD_BEEF,
        };
        let encoded = encode_short(msg);
        assert_eq!(encoded.len(), SHORT_ENVELOPE_LEN);
        let decoded = decode_short(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn medium_envelope_round_trips() {
        let mut payload = [0u8; 16];
        payload[0] = 7;
        payload[15] = 9;
        let msg = MediumMessage {
            id: 3,
            pid: -1,
            payload,
        };
        let encoded = encode_medium(msg);
        assert_eq!(encoded.len(), MEDIUM_ENVELOPE_LEN);
        let decoded = decode_medium(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn decode_short_rejects_wrong_kind() {
        let encoded = encode_medium(MediumMessage {
            id: 1,
            pid: 1,
            payload: [0u8; 16],
        });
        assert!(decode_short(&encoded[..SHORT_ENVELOPE_LEN]).is_err());
    }

    #[test]
    fn decode_short_rejects_wrong_length() {
        let buf = [0u8; 4];
        assert!(decode_short(&buf).is_err());
    }

    #[test]
    fn typed_messages_round_trip_through_short_message() {
        let event_id = ElementFqId::new(10, 2, 30, ElementType::Event);

        let register = RegisterEventNotifier {
            event_id,
            sender: 100,
        };
        let short: ShortMessage = register.into();
        assert_eq!(RegisterEventNotifier::try_from(short).unwrap(), register);

        let unregister = UnregisterEventNotifier {
            event_id,
            sender: 100,
        };
        let short: ShortMessage = unregister.into();
        assert_eq!(UnregisterEventNotifier::try_from(short).unwrap(), unregister);

        let notify = NotifyEvent {
            event_id,
            sender: 200,
        };
        let short: ShortMessage = notify.into();
        assert_eq!(NotifyEvent::try_from(short).unwrap(), notify);

        let outdated = OutdatedNodeId {
            pid_to_unregister: 555,
            sender: 200,
        };
        let short: ShortMessage = outdated.into();
        assert_eq!(OutdatedNodeId::try_from(short).unwrap(), outdated);
    }

    #[test]
    fn mismatched_message_id_is_rejected() {
        let short = ShortMessage {
            id: MSG_REGISTER_EVENT_NOTIFIER,
            pid: 1,
            payload: 0,
        };
        assert!(NotifyEvent::try_from(short).is_err());
    }
}
