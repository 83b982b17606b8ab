// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use crate::element_fq_id::ElementFqId;

/// Identifies which handler a received envelope should be dispatched to.
/// Value `0` is reserved for the stop control message a [`Receiver`] injects
/// into its own channel and must never be sent by a peer.
///
/// [`Receiver`]: crate::receiver::Receiver
pub type MessageId = i8;

/// Process-level identifier; POSIX `pid_t`-sized.
pub type NodeId = i32;

/// Payload carried by a short envelope.
pub type ShortMessagePayload = u64;

/// Payload carried by a medium envelope.
pub type MediumMessagePayload = [u8; 16];

/// Message id reserved for the receiver-internal stop signal.
pub const STOP_MESSAGE_ID: MessageId = 0;

pub const MSG_REGISTER_EVENT_NOTIFIER: MessageId = 1;
pub const MSG_UNREGISTER_EVENT_NOTIFIER: MessageId = 2;
pub const MSG_NOTIFY_EVENT: MessageId = 3;
pub const MSG_OUTDATED_NODE_ID: MessageId = 4;

/// On-the-wire discriminator between the receiver-internal stop signal and
/// the two real envelope sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EnvelopeKind {
    Stop = 0,
    Short = 1,
    Medium = 2,
}

impl EnvelopeKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stop),
            1 => Some(Self::Short),
            2 => Some(Self::Medium),
            _ => None,
        }
    }
}

/// A short envelope: a message id, the sender's node id, and 8 bytes of
/// payload. Used for all four control messages this subsystem defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortMessage {
    pub id: MessageId,
    pub pid: NodeId,
    pub payload: ShortMessagePayload,
}

/// A medium envelope: same header as [`ShortMessage`], 16 bytes of payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediumMessage {
    pub id: MessageId,
    pub pid: NodeId,
    pub payload: MediumMessagePayload,
}

/// proxy -> skeleton: "start sending me updates for this event".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterEventNotifier {
    pub event_id: ElementFqId,
    pub sender: NodeId,
}

/// proxy -> skeleton: "stop sending me updates for this event".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnregisterEventNotifier {
    pub event_id: ElementFqId,
    pub sender: NodeId,
}

/// skeleton -> proxy: "this event has a new sample".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyEvent {
    pub event_id: ElementFqId,
    pub sender: NodeId,
}

/// proxy -> skeleton: "a prior process with this node id is gone; purge it".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutdatedNodeId {
    pub pid_to_unregister: NodeId,
    pub sender: NodeId,
}
