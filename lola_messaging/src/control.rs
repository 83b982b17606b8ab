// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Collaborator interfaces the facade and handler depend on but don't own:
//! sending to an arbitrary node, knowing this process's own node id, and
//! naming channels consistently between sender and receiver.

use message_passing::message::{MediumMessage, NodeId, ShortMessage};
use message_passing::Error;

use crate::quality_type::QualityType;

/// A handle capable of sending to one specific `(quality, target_node_id)`
/// pair. Returned by [`MessagePassingControl::sender`]; implementations wrap
/// a [`Sender`](message_passing::sender::Sender) for a concrete channel
/// backend.
pub trait SenderHandle: Send + Sync {
    fn send_short(&self, message: ShortMessage) -> Result<(), Error>;
    fn send_medium(&self, message: MediumMessage) -> Result<(), Error>;
}

/// Looks up senders by destination and names channels consistently between
/// what a [`Receiver`](message_passing::receiver::Receiver) listens on and
/// what a [`Sender`](message_passing::sender::Sender) connects to.
pub trait MessagePassingControl: Send + Sync {
    /// This process's own node id, as it would appear as `sender` in a
    /// message this process emits.
    fn node_identifier(&self) -> NodeId;

    /// Returns a sender for `target_node_id` at the given quality class.
    /// Never returns a handle that can't attempt a send; an unreachable
    /// target fails at `send_short`/`send_medium` time, not here.
    fn sender(&self, quality: QualityType, target_node_id: NodeId) -> std::sync::Arc<dyn SenderHandle>;

    /// Channel name both a sender and receiver for this `(quality, node_id)`
    /// pair must agree on, e.g. `/LoLa_<node_id>_<quality>`.
    fn create_channel_name(&self, quality: QualityType, node_id: NodeId) -> String;

    /// Drops any cached sender for `(quality, node_id)`, e.g. because the
    /// node id has been identified as outdated (a previous run of a now-gone
    /// process) and must not be reused.
    fn remove_sender(&self, quality: QualityType, node_id: NodeId);
}
