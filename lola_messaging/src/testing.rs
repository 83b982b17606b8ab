// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! A [`MessagePassingControl`] backed by [`LoopbackChannel`], so tests can
//! build a [`MessagingFacade`](crate::facade::MessagingFacade) per simulated
//! node without needing real POSIX mqueue permissions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use message_passing::channel::loopback::LoopbackChannel;
use message_passing::message::{MediumMessage, NodeId, ShortMessage};
use message_passing::{CancellationToken, Error, Sender, SenderConfig};

use crate::control::{MessagePassingControl, SenderHandle};
use crate::quality_type::QualityType;

struct LoopbackSenderHandle {
    sender: Sender<LoopbackChannel>,
    short_sends: Arc<AtomicUsize>,
}

impl SenderHandle for LoopbackSenderHandle {
    fn send_short(&self, message: ShortMessage) -> Result<(), Error> {
        self.short_sends.fetch_add(1, Ordering::SeqCst);
        self.sender.send_short(message)
    }

    fn send_medium(&self, message: MediumMessage) -> Result<(), Error> {
        self.sender.send_medium(message)
    }
}

/// One simulated node's view of the message-passing world: its own node id,
/// a shared test-wide channel name prefix, and a cache of senders to other
/// simulated nodes.
pub struct LoopbackControl {
    node_id: NodeId,
    prefix: String,
    sender_config: SenderConfig,
    connect_token: CancellationToken,
    senders: Mutex<HashMap<(QualityType, NodeId), Arc<dyn SenderHandle>>>,
    send_counters: Mutex<HashMap<(QualityType, NodeId), Arc<AtomicUsize>>>,
    remove_sender_calls: AtomicUsize,
}

impl LoopbackControl {
    /// `prefix` must be shared by every [`LoopbackControl`] participating in
    /// one test scenario so `create_channel_name` agrees across nodes.
    pub fn new(node_id: NodeId, prefix: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            node_id,
            prefix: prefix.into(),
            sender_config: SenderConfig::default(),
            connect_token: CancellationToken::new(),
            senders: Mutex::new(HashMap::new()),
            send_counters: Mutex::new(HashMap::new()),
            remove_sender_calls: AtomicUsize::new(0),
        })
    }

    /// Number of times [`MessagePassingControl::remove_sender`] has been
    /// called on this control, for tests asserting it fires exactly once.
    pub fn remove_sender_call_count(&self) -> usize {
        self.remove_sender_calls.load(Ordering::SeqCst)
    }

    /// Number of short messages sent to `(quality, node_id)` through a
    /// sender obtained from this control, for tests asserting coalescing.
    pub fn short_send_count(&self, quality: QualityType, node_id: NodeId) -> usize {
        self.send_counters
            .lock()
            .expect("send counter map poisoned")
            .get(&(quality, node_id))
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

impl MessagePassingControl for LoopbackControl {
    fn node_identifier(&self) -> NodeId {
        self.node_id
    }

    fn sender(&self, quality: QualityType, target_node_id: NodeId) -> Arc<dyn SenderHandle> {
        if let Some(existing) = self
            .senders
            .lock()
            .expect("sender cache poisoned")
            .get(&(quality, target_node_id))
        {
            return Arc::clone(existing);
        }

        let name = self.create_channel_name(quality, target_node_id);
        let sender = Sender::<LoopbackChannel>::new(&name, self.connect_token.clone(), self.sender_config);
        let counter = Arc::new(AtomicUsize::new(0));
        let handle: Arc<dyn SenderHandle> = Arc::new(LoopbackSenderHandle {
            sender,
            short_sends: Arc::clone(&counter),
        });

        self.senders
            .lock()
            .expect("sender cache poisoned")
            .insert((quality, target_node_id), Arc::clone(&handle));
        self.send_counters
            .lock()
            .expect("send counter map poisoned")
            .insert((quality, target_node_id), counter);
        handle
    }

    fn create_channel_name(&self, quality: QualityType, node_id: NodeId) -> String {
        format!("{}/{node_id}/{quality}", self.prefix)
    }

    fn remove_sender(&self, quality: QualityType, node_id: NodeId) {
        self.remove_sender_calls.fetch_add(1, Ordering::SeqCst);
        self.senders
            .lock()
            .expect("sender cache poisoned")
            .remove(&(quality, node_id));
    }
}
