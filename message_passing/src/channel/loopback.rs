// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! An in-process channel backend, standing in for the OS-level mqueue in
//! tests so they don't need queue-creation capabilities. Modeled on
//! `rpc_protocol::pipe`'s `socketpair`-based test endpoint: a normal
//! test-support module, not a spec'd transport.

use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{self, Receiver as MpscReceiver, Sender as MpscSender};
use std::sync::{Arc, Mutex, OnceLock};

use super::{ChannelTraits, ReceivedEnvelope, Uid};
use crate::error::Error;
use crate::message::{MediumMessage, ShortMessage};

type Registry = Mutex<HashMap<String, MpscSender<ReceivedEnvelope>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

#[derive(Clone)]
pub struct LoopbackHandle {
    tx: MpscSender<ReceivedEnvelope>,
    rx: Option<Arc<Mutex<MpscReceiver<ReceivedEnvelope>>>>,
}

/// Marker type implementing [`ChannelTraits`] over an in-process registry of
/// named `mpsc` queues.
pub struct LoopbackChannel;

impl ChannelTraits for LoopbackChannel {
    type Handle = LoopbackHandle;

    // In-process registry has no notion of a connecting uid; the allow-list
    // is accepted for signature parity with a real backend and ignored.
    fn open_receiver(identifier: &str, _allowed_uids: &[Uid], _max_queued_messages: i32) -> Result<Self::Handle, Error> {
        let (tx, rx) = mpsc::channel();
        registry()
            .lock()
            .expect("loopback registry poisoned")
            .insert(identifier.to_string(), tx.clone());
        Ok(LoopbackHandle {
            tx,
            rx: Some(Arc::new(Mutex::new(rx))),
        })
    }

    fn close_receiver(_handle: &Self::Handle, identifier: &str) {
        registry()
            .lock()
            .expect("loopback registry poisoned")
            .remove(identifier);
    }

    fn stop_receive(handle: &Self::Handle) {
        let _ = handle.tx.send(ReceivedEnvelope::Stop);
    }

    fn receive_next(handle: &Self::Handle) -> Result<ReceivedEnvelope, Error> {
        let rx = handle
            .rx
            .as_ref()
            .expect("receive_next called on a sender-only handle");
        let guard = rx.lock().expect("loopback queue poisoned");
        guard
            .recv()
            .map_err(|_| Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, "channel closed")))
    }

    fn try_open_sender(identifier: &str) -> Result<Self::Handle, Error> {
        let tx = registry()
            .lock()
            .expect("loopback registry poisoned")
            .get(identifier)
            .cloned()
            .ok_or_else(|| {
                Error::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no receiver listening on {identifier}"),
                ))
            })?;
        Ok(LoopbackHandle { tx, rx: None })
    }

    fn close_sender(_handle: &Self::Handle) {}

    fn try_send_short(handle: &Self::Handle, message: ShortMessage) -> Result<(), Error> {
        handle
            .tx
            .send(ReceivedEnvelope::Short(message))
            .map_err(|_| Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, "receiver gone")))
    }

    fn try_send_medium(handle: &Self::Handle, message: MediumMessage) -> Result<(), Error> {
        handle
            .tx
            .send(ReceivedEnvelope::Medium(message))
            .map_err(|_| Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, "receiver gone")))
    }

    fn has_non_blocking_guarantee() -> bool {
        // mpsc channels here are unbounded; send() never blocks the caller.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MSG_NOTIFY_EVENT;

    #[test]
    fn sender_waits_for_receiver_identity() {
        let identifier = "loopback-test-channel";
        assert!(LoopbackChannel::try_open_sender(identifier).is_err());
        let receiver = LoopbackChannel::open_receiver(identifier, &[], 10).unwrap();
        let sender = LoopbackChannel::try_open_sender(identifier).unwrap();

        LoopbackChannel::try_send_short(
            &sender,
            ShortMessage {
                id: MSG_NOTIFY_EVENT,
                pid: 1,
                payload: 7,
            },
        )
        .unwrap();

        match LoopbackChannel::receive_next(&receiver).unwrap() {
            ReceivedEnvelope::Short(msg) => assert_eq!(msg.payload, 7),
            other => panic!("unexpected envelope: {other:?}"),
        }
        LoopbackChannel::close_receiver(&receiver, identifier);
    }

    #[test]
    fn stop_receive_unblocks_receive_next() {
        let identifier = "loopback-test-stop";
        let receiver = LoopbackChannel::open_receiver(identifier, &[], 10).unwrap();
        LoopbackChannel::stop_receive(&receiver);
        assert_eq!(
            LoopbackChannel::receive_next(&receiver).unwrap(),
            ReceivedEnvelope::Stop
        );
        LoopbackChannel::close_receiver(&receiver, identifier);
    }
}
