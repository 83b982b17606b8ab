// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! C5: ties a node's QM (and optionally ASIL-B) receivers together with a
//! [`NotifyEventHandler`] into the one object a skeleton or proxy binding
//! holds for its whole lifetime.
//!
//! Field order matters: [`Receiver`] is dropped before `notify_event_handler`
//! below, so every receiver worker thread has stopped calling into the
//! handler before the handler itself (and the control data it owns) goes
//! away. Rust drops struct fields top to bottom, the opposite of C++, so
//! the receivers are declared first here even though the handler is
//! constructed first.

use std::sync::Arc;

use log::error;

use message_passing::channel::ChannelTraits;
use message_passing::element_fq_id::ElementFqId;
use message_passing::message::NodeId;
use message_passing::receiver::Receiver;
use message_passing::{CancellationToken, Error};

use crate::config::FacadeConfig;
use crate::control::MessagePassingControl;
use crate::notify_event_handler::{HandlerRegistrationNo, NotifyEventHandler, ReceiveHandler};
use crate::quality_type::QualityType;

/// Owns a node's message-passing receivers and its event-notification
/// bookkeeping. Constructed once per process by whatever runtime wires up
/// the LoLa binding; cloned handles to it are not needed since all public
/// methods take `&self`.
pub struct MessagingFacade<C: ChannelTraits> {
    receiver_qm: Receiver<C>,
    receiver_asil_b: Option<Receiver<C>>,
    notify_event_handler: Arc<NotifyEventHandler>,
    token: CancellationToken,
}

impl<C: ChannelTraits> MessagingFacade<C> {
    /// Opens the QM receiver (and the ASIL-B one, if `config.asil_b_capability`
    /// is set) and starts listening on both. Fails if either receiver could
    /// not be opened; a half-started facade is never handed back to the
    /// caller.
    pub fn new(mp_control: Arc<dyn MessagePassingControl>, config: FacadeConfig) -> Result<Self, Error> {
        let token = CancellationToken::new();
        let notify_event_handler = Arc::new(NotifyEventHandler::new(
            Arc::clone(&mp_control),
            config.asil_b_capability,
            token.clone(),
            config.qm,
            config.asil_b,
        ));

        let receiver_qm = Self::start_receiver(
            &mp_control,
            &notify_event_handler,
            QualityType::AsilQm,
            config.qm.receiver_threads,
            config.receiver.clone(),
        )?;

        let receiver_asil_b = if config.asil_b_capability {
            Some(Self::start_receiver(
                &mp_control,
                &notify_event_handler,
                QualityType::AsilB,
                config.asil_b.receiver_threads,
                config.receiver,
            )?)
        } else {
            None
        };

        Ok(Self {
            receiver_qm,
            receiver_asil_b,
            notify_event_handler,
            token,
        })
    }

    fn start_receiver(
        mp_control: &Arc<dyn MessagePassingControl>,
        notify_event_handler: &Arc<NotifyEventHandler>,
        quality: QualityType,
        concurrency: usize,
        receiver_config: message_passing::ReceiverConfig,
    ) -> Result<Receiver<C>, Error> {
        let name = mp_control.create_channel_name(quality, mp_control.node_identifier());
        assert!(
            name.len() < message_passing::channel::MAX_IDENTIFIER_LEN,
            "channel name {name:?} is {} bytes, over the {}-byte limit",
            name.len(),
            message_passing::channel::MAX_IDENTIFIER_LEN
        );
        let receiver = Receiver::new(&name, concurrency, receiver_config);
        notify_event_handler.register_message_received_callbacks(quality, &receiver);
        receiver.start_listening().map_err(|e| {
            error!("MessagingFacade: failed to start listening on {name} for {quality}: {e}");
            e
        })?;
        Ok(receiver)
    }

    /// Notifies that `event_id` at `asil_level` has been updated; fans out
    /// to both local handlers and subscribed remote nodes.
    pub fn notify_event(&self, asil_level: QualityType, event_id: ElementFqId) {
        self.notify_event_handler.notify_event(asil_level, event_id);
    }

    /// Registers `callback` to be invoked whenever `event_id` is updated.
    /// If `target_node_id` names a remote process, also arranges for that
    /// process to be told about updates.
    pub fn register_event_notification(
        &self,
        asil_level: QualityType,
        event_id: ElementFqId,
        callback: ReceiveHandler,
        target_node_id: NodeId,
    ) -> HandlerRegistrationNo {
        self.notify_event_handler
            .register_event_notification(asil_level, event_id, callback, target_node_id)
    }

    /// Re-points an existing remote registration at `target_node_id`, e.g.
    /// after the provider process has restarted under a new node id.
    pub fn reregister_event_notification(&self, asil_level: QualityType, event_id: ElementFqId, target_node_id: NodeId) {
        self.notify_event_handler
            .reregister_event_notification(asil_level, event_id, target_node_id);
    }

    /// Removes a previously registered handler.
    pub fn unregister_event_notification(
        &self,
        asil_level: QualityType,
        event_id: ElementFqId,
        registration_no: HandlerRegistrationNo,
        target_node_id: NodeId,
    ) {
        self.notify_event_handler
            .unregister_event_notification(asil_level, event_id, registration_no, target_node_id);
    }

    /// Tells `target_node_id` that `outdated_node_id` is stale and any
    /// registration under it should be purged.
    pub fn notify_outdated_node_id(&self, asil_level: QualityType, outdated_node_id: NodeId, target_node_id: NodeId) {
        self.notify_event_handler
            .notify_outdated_node_id(asil_level, outdated_node_id, target_node_id);
    }
}

impl<C: ChannelTraits> Drop for MessagingFacade<C> {
    fn drop(&mut self) {
        // Tells any in-flight NotifyEventLocally dispatch loop to stop after
        // its current handler, before the receivers below join their worker
        // threads and the handler itself is torn down.
        self.token.request_stop();
    }
}
