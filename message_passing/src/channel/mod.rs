// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The channel transport abstraction (C2): a named, bidirectional, message
//! sized communication primitive a [`Sender`](crate::sender::Sender) and a
//! [`Receiver`](crate::receiver::Receiver) open under the same identifier.
//!
//! A real backend ([`mqueue`]) and an in-process one for tests ([`loopback`])
//! both implement [`ChannelTraits`]; `sender.rs`/`receiver.rs` are generic
//! over it and carry no backend-specific code.

pub mod loopback;
pub mod mqueue;

use crate::error::Error;
use crate::message::{MediumMessage, ShortMessage};

/// Maximum identifier length a channel name may have (§6 invariant).
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// POSIX user id, as accepted in a receiver's allow-list. An empty allow-list
/// means no restriction.
pub type Uid = u32;

/// A single unit received off a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceivedEnvelope {
    Short(ShortMessage),
    Medium(MediumMessage),
    /// Injected locally by [`ChannelTraits::stop_receive`]; never sent by a peer.
    Stop,
}

/// What a channel backend must provide. One `Handle` is shared by every
/// worker thread a [`Receiver`](crate::receiver::Receiver) spawns; backends
/// must support concurrent `receive_next` calls on the same handle.
pub trait ChannelTraits: Send + Sync + 'static {
    type Handle: Clone + Send + Sync + 'static;

    /// Opens (creating if necessary) the receiving end of the named channel,
    /// restricted to `allowed_uids` (empty means unrestricted). Backends that
    /// cannot enforce a per-sender check at connect time should reject a
    /// restriction they cannot honour with [`Error::PermissionDenied`] rather
    /// than silently accepting every sender.
    fn open_receiver(identifier: &str, allowed_uids: &[Uid], max_queued_messages: i32) -> Result<Self::Handle, Error>;

    /// Releases OS resources held by a receiver handle. Idempotent.
    fn close_receiver(handle: &Self::Handle, identifier: &str);

    /// Unblocks exactly one in-flight [`receive_next`](Self::receive_next)
    /// call, which will return `Ok(ReceivedEnvelope::Stop)`. Call once per
    /// worker thread that must be stopped.
    fn stop_receive(handle: &Self::Handle);

    /// Blocks until a message arrives or [`stop_receive`](Self::stop_receive)
    /// is called for this worker.
    fn receive_next(handle: &Self::Handle) -> Result<ReceivedEnvelope, Error>;

    /// Opens the sending end of the named channel. Returns
    /// [`Error::Io`] wrapping `ENOENT`-like failures when no receiver is
    /// listening yet; the caller is expected to retry.
    fn try_open_sender(identifier: &str) -> Result<Self::Handle, Error>;

    /// Releases OS resources held by a sender handle. Idempotent.
    fn close_sender(handle: &Self::Handle);

    fn try_send_short(handle: &Self::Handle, message: ShortMessage) -> Result<(), Error>;
    fn try_send_medium(handle: &Self::Handle, message: MediumMessage) -> Result<(), Error>;

    /// Whether a successful `try_send_*` is a hard guarantee the message was
    /// enqueued (true for a `O_NONBLOCK` POSIX mqueue: the OS either queues
    /// it or fails immediately, never blocks).
    fn has_non_blocking_guarantee() -> bool;
}

pub(crate) fn validate_identifier(identifier: &str) -> Result<(), Error> {
    if identifier.len() >= MAX_IDENTIFIER_LEN {
        return Err(Error::MalformedEnvelope);
    }
    Ok(())
}
