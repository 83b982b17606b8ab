// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The event-notification core: tracks which local callbacks and which
//! remote nodes want to hear about an event update, and fans an update out
//! to both. Split per [`QualityType`] into two completely independent sets
//! of locks and worker pools, so a blocked QM callback can never starve
//! ASIL-B delivery.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use log::{error, info, warn};

use message_passing::channel::ChannelTraits;
use message_passing::element_fq_id::{decode_element_fq_id, encode_element_fq_id};
use message_passing::message::{
    NodeId, ShortMessage, ShortMessagePayload, MSG_NOTIFY_EVENT, MSG_OUTDATED_NODE_ID,
    MSG_REGISTER_EVENT_NOTIFIER, MSG_UNREGISTER_EVENT_NOTIFIER,
};
use message_passing::receiver::Receiver;
use message_passing::{CancellationToken, ElementFqId, ThreadPool};

use crate::config::AsilSpecificConfig;
use crate::control::MessagePassingControl;
use crate::quality_type::QualityType;

/// Handle returned by [`NotifyEventHandler::register_event_notification`];
/// opaque to callers beyond equality/ordering against itself.
pub type HandlerRegistrationNo = u32;

/// A local proxy-event's receive handler: invoked with no arguments, purely
/// a "something changed, go re-read the event" signal.
pub type ReceiveHandler = Box<dyn Fn() + Send + Sync>;

/// Maximum node ids copied under lock in one chunk of a remote fan-out.
const NODE_ID_CHUNK: usize = 20;
const MAX_FANOUT_CHUNKS: u16 = 255;

struct RegisteredHandler {
    handler: ReceiveHandler,
    register_no: HandlerRegistrationNo,
}

struct NodeCounter {
    node_id: NodeId,
    counter: u16,
}

#[derive(Default)]
struct EventNotificationControlData {
    event_update_handlers: RwLock<HashMap<ElementFqId, Vec<RegisteredHandler>>>,
    event_update_interested_nodes: RwLock<HashMap<ElementFqId, BTreeSet<NodeId>>>,
    event_update_remote_registrations: RwLock<HashMap<ElementFqId, NodeCounter>>,
    cur_registration_no: AtomicU32,
}

/// Handles event-notification functionality on behalf of a
/// [`MessagingFacade`](crate::facade::MessagingFacade): registration,
/// unregistration, and the fan-out of an event update to local and remote
/// subscribers.
pub struct NotifyEventHandler {
    control_data_qm: EventNotificationControlData,
    control_data_asil: Option<EventNotificationControlData>,
    // Mutex-wrapped purely so the pool (whose sender half is Send but not
    // Sync) can live behind the shared `Arc<Self>` this handler is always
    // accessed through; `execute` itself needs no exclusion.
    dispatch_pool_qm: Mutex<ThreadPool>,
    dispatch_pool_asil: Option<Mutex<ThreadPool>>,
    token: CancellationToken,
    mp_control: Arc<dyn MessagePassingControl>,
    asil_b_capability: bool,
}

impl NotifyEventHandler {
    pub fn new(
        mp_control: Arc<dyn MessagePassingControl>,
        asil_b_capability: bool,
        token: CancellationToken,
        qm_config: AsilSpecificConfig,
        asil_b_config: AsilSpecificConfig,
    ) -> Self {
        Self {
            control_data_qm: EventNotificationControlData::default(),
            control_data_asil: asil_b_capability.then(EventNotificationControlData::default),
            dispatch_pool_qm: Mutex::new(ThreadPool::new(qm_config.local_dispatch_threads, "lola-notify-qm")),
            dispatch_pool_asil: asil_b_capability.then(|| {
                Mutex::new(ThreadPool::new(asil_b_config.local_dispatch_threads, "lola-notify-asil-b"))
            }),
            token,
            mp_control,
            asil_b_capability,
        }
    }

    fn assert_valid_asil(&self, quality: QualityType) {
        assert!(
            quality == QualityType::AsilQm || (quality == QualityType::AsilB && self.asil_b_capability),
            "invalid asil level: {quality}"
        );
    }

    fn control_data(&self, quality: QualityType) -> &EventNotificationControlData {
        match quality {
            QualityType::AsilQm => &self.control_data_qm,
            QualityType::AsilB => self
                .control_data_asil
                .as_ref()
                .expect("asil level checked by assert_valid_asil"),
            QualityType::Invalid => unreachable!("invalid asil level rejected by assert_valid_asil"),
        }
    }

    fn dispatch_pool(&self, quality: QualityType) -> &Mutex<ThreadPool> {
        match quality {
            QualityType::AsilQm => &self.dispatch_pool_qm,
            QualityType::AsilB => self
                .dispatch_pool_asil
                .as_ref()
                .expect("asil level checked by assert_valid_asil"),
            QualityType::Invalid => unreachable!("invalid asil level rejected by assert_valid_asil"),
        }
    }

    /// Registers this handler's four inbound message handlers on `receiver`
    /// for the given quality class. `receiver` and `self` must be owned by
    /// the same facade so that the facade's destruction order keeps `self`
    /// alive at least as long as `receiver`.
    pub fn register_message_received_callbacks<C: ChannelTraits>(
        self: &Arc<Self>,
        quality: QualityType,
        receiver: &Receiver<C>,
    ) {
        self.assert_valid_asil(quality);

        let handler = Arc::clone(self);
        receiver.register_short(MSG_REGISTER_EVENT_NOTIFIER, move |payload, pid| {
            handler.handle_register_notification_msg(quality, payload, pid)
        });

        let handler = Arc::clone(self);
        receiver.register_short(MSG_UNREGISTER_EVENT_NOTIFIER, move |payload, pid| {
            handler.handle_unregister_notification_msg(quality, payload, pid)
        });

        let handler = Arc::clone(self);
        receiver.register_short(MSG_NOTIFY_EVENT, move |payload, pid| {
            handler.handle_notify_event_msg(quality, payload, pid)
        });

        let handler = Arc::clone(self);
        receiver.register_short(MSG_OUTDATED_NODE_ID, move |payload, pid| {
            handler.handle_outdated_node_id_msg(quality, payload as NodeId, pid)
        });
    }

    /// Notifies that `event_id` has been updated. Called by a local
    /// skeleton-event. Remote fan-out happens synchronously on the calling
    /// thread (short, deterministic runtime); local fan-out is handed to a
    /// per-quality worker pool since a user callback's runtime isn't bounded.
    pub fn notify_event(self: &Arc<Self>, quality: QualityType, event_id: ElementFqId) {
        self.assert_valid_asil(quality);
        let control_data = self.control_data(quality);

        self.notify_event_remote(quality, event_id, control_data);

        let has_handlers = control_data
            .event_update_handlers
            .read()
            .expect("event_update_handlers poisoned")
            .get(&event_id)
            .is_some_and(|v| !v.is_empty());

        if has_handlers {
            let this = Arc::clone(self);
            self.dispatch_pool(quality)
                .lock()
                .expect("dispatch pool mutex poisoned")
                .execute(move || {
                    this.notify_event_locally(quality, event_id);
                });
        }
    }

    /// Adds a local receive handler for `event_id`, returning a handle used
    /// later to unregister it. If `target_node_id` names a remote process,
    /// also (idempotently) arranges for that process to be told about
    /// updates.
    pub fn register_event_notification(
        &self,
        quality: QualityType,
        event_id: ElementFqId,
        callback: ReceiveHandler,
        target_node_id: NodeId,
    ) -> HandlerRegistrationNo {
        self.assert_valid_asil(quality);
        let control_data = self.control_data(quality);

        let registration_no = control_data.cur_registration_no.fetch_add(1, Ordering::SeqCst);
        control_data
            .event_update_handlers
            .write()
            .expect("event_update_handlers poisoned")
            .entry(event_id)
            .or_default()
            .push(RegisteredHandler {
                handler: callback,
                register_no: registration_no,
            });

        if target_node_id != self.mp_control.node_identifier() {
            self.register_event_notification_remote(quality, event_id, target_node_id);
        }
        registration_no
    }

    /// Re-points an existing remote registration at a new `target_node_id`,
    /// e.g. after the provider process restarted under a new pid. A no-op
    /// for local targets.
    pub fn reregister_event_notification(
        &self,
        quality: QualityType,
        event_id: ElementFqId,
        target_node_id: NodeId,
    ) {
        self.assert_valid_asil(quality);
        let control_data = self.control_data(quality);

        let has_local_registration = control_data
            .event_update_handlers
            .read()
            .expect("event_update_handlers poisoned")
            .contains_key(&event_id);
        if !has_local_registration {
            error!(
                "NotifyEventHandler: reregister_event_notification called for event {event_id}, which had not yet been registered"
            );
            return;
        }

        if target_node_id == self.mp_control.node_identifier() {
            return;
        }

        enum Outcome {
            Missing,
            Bumped,
            BecameFirst,
        }

        let outcome = {
            let mut remote = control_data
                .event_update_remote_registrations
                .write()
                .expect("event_update_remote_registrations poisoned");
            match remote.get_mut(&event_id) {
                None => Outcome::Missing,
                Some(counter) if counter.node_id == target_node_id => {
                    counter.counter += 1;
                    Outcome::Bumped
                }
                Some(counter) => {
                    counter.node_id = target_node_id;
                    counter.counter = 1;
                    Outcome::BecameFirst
                }
            }
        };

        match outcome {
            Outcome::Missing => error!(
                "NotifyEventHandler: reregister_event_notification called with asil level {quality} for remote event {event_id} without current remote registration"
            ),
            Outcome::Bumped => {}
            Outcome::BecameFirst => {
                self.send_register_event_notification_message(quality, event_id, target_node_id)
            }
        }
    }

    fn register_event_notification_remote(
        &self,
        quality: QualityType,
        event_id: ElementFqId,
        target_node_id: NodeId,
    ) {
        let control_data = self.control_data(quality);

        let reg_counter = {
            let mut remote = control_data
                .event_update_remote_registrations
                .write()
                .expect("event_update_remote_registrations poisoned");
            match remote.get_mut(&event_id) {
                None => {
                    remote.insert(
                        event_id,
                        NodeCounter {
                            node_id: target_node_id,
                            counter: 1,
                        },
                    );
                    1
                }
                Some(counter) if counter.node_id != target_node_id => {
                    error!(
                        "NotifyEventHandler: register_event_notification_remote called for event {event_id} and node {target_node_id} although event is currently located at node {}",
                        counter.node_id
                    );
                    counter.node_id = target_node_id;
                    counter.counter = 1;
                    1
                }
                Some(counter) => {
                    counter.counter += 1;
                    counter.counter
                }
            }
        };

        if reg_counter == 1 {
            self.send_register_event_notification_message(quality, event_id, target_node_id);
        }
    }

    fn send_register_event_notification_message(
        &self,
        quality: QualityType,
        event_id: ElementFqId,
        target_node_id: NodeId,
    ) {
        let message = ShortMessage {
            id: MSG_REGISTER_EVENT_NOTIFIER,
            pid: self.mp_control.node_identifier(),
            payload: encode_element_fq_id(event_id),
        };
        let sender = self.mp_control.sender(quality, target_node_id);
        if let Err(e) = sender.send_short(message) {
            error!(
                "NotifyEventHandler: sending RegisterEventNotifier to node {target_node_id} with asil level {quality} failed: {e}"
            );
        }
    }

    /// Removes a previously registered local handler. A call with an
    /// already-removed or never-valid `registration_no` is tolerated: it
    /// just logs and returns, since it's indistinguishable from a bogus
    /// double-unregister at the application level.
    pub fn unregister_event_notification(
        &self,
        quality: QualityType,
        event_id: ElementFqId,
        registration_no: HandlerRegistrationNo,
        target_node_id: NodeId,
    ) {
        let found = self.search_handler_for_notification(quality, event_id, registration_no);
        if !found {
            warn!(
                "NotifyEventHandler: couldn't find handler for unregister_event_notification with asil level {quality} and registration_no {registration_no}"
            );
            return;
        }

        if target_node_id != self.mp_control.node_identifier() {
            self.unregister_event_notification_remote(quality, event_id, registration_no, target_node_id);
        }
    }

    fn search_handler_for_notification(
        &self,
        quality: QualityType,
        event_id: ElementFqId,
        registration_no: HandlerRegistrationNo,
    ) -> bool {
        self.assert_valid_asil(quality);
        let control_data = self.control_data(quality);
        let mut handlers = control_data
            .event_update_handlers
            .write()
            .expect("event_update_handlers poisoned");
        let Some(handlers_for_event) = handlers.get_mut(&event_id) else {
            return false;
        };
        match handlers_for_event.binary_search_by(|h| h.register_no.cmp(&registration_no)) {
            Ok(idx) => {
                handlers_for_event.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    fn unregister_event_notification_remote(
        &self,
        quality: QualityType,
        event_id: ElementFqId,
        registration_no: HandlerRegistrationNo,
        target_node_id: NodeId,
    ) {
        let control_data = self.control_data(quality);

        let send_message = {
            let mut remote = control_data
                .event_update_remote_registrations
                .write()
                .expect("event_update_remote_registrations poisoned");
            let Some(counter) = remote.get_mut(&event_id) else {
                error!(
                    "NotifyEventHandler: unregister_event_notification called with asil level {quality} and registration_no {registration_no} for remote event {event_id} without current remote registration"
                );
                return;
            };
            assert!(counter.counter > 0, "remote registration counter underflow for {event_id}");
            if counter.node_id != target_node_id {
                error!(
                    "NotifyEventHandler: unregister_event_notification called with asil level {quality} and registration_no {registration_no} for remote event {event_id} and target node {target_node_id}, which is not the node ({}) currently providing it",
                    counter.node_id
                );
                return;
            }
            counter.counter -= 1;
            let zero = counter.counter == 0;
            if zero {
                remote.remove(&event_id);
            }
            zero
        };

        if send_message {
            let message = ShortMessage {
                id: MSG_UNREGISTER_EVENT_NOTIFIER,
                pid: self.mp_control.node_identifier(),
                payload: encode_element_fq_id(event_id),
            };
            let sender = self.mp_control.sender(quality, target_node_id);
            if let Err(e) = sender.send_short(message) {
                error!(
                    "NotifyEventHandler: sending UnregisterEventNotifier to node {target_node_id} with asil level {quality} failed: {e}"
                );
            }
        }
    }

    /// Tells `target_node_id` that `outdated_node_id` is stale and any
    /// registration under it should be purged. Mirrors the original's
    /// choice of embedding `target_node_id`, not this process's own node
    /// id, as the message's `sender` field.
    pub fn notify_outdated_node_id(&self, quality: QualityType, outdated_node_id: NodeId, target_node_id: NodeId) {
        self.assert_valid_asil(quality);
        let message = ShortMessage {
            id: MSG_OUTDATED_NODE_ID,
            pid: target_node_id,
            payload: outdated_node_id as u64,
        };
        let sender = self.mp_control.sender(quality, target_node_id);
        if let Err(e) = sender.send_short(message) {
            error!(
                "NotifyEventHandler: sending OutdatedNodeId to node {target_node_id} with asil level {quality} failed: {e}"
            );
        }
    }

    fn notify_event_remote(
        &self,
        quality: QualityType,
        event_id: ElementFqId,
        control_data: &EventNotificationControlData,
    ) {
        let message = ShortMessage {
            id: MSG_NOTIFY_EVENT,
            pid: self.mp_control.node_identifier(),
            payload: encode_element_fq_id(event_id),
        };

        let mut buf = [0 as NodeId; NODE_ID_CHUNK];
        let mut start_node_id: NodeId = NodeId::MIN;
        let mut loop_count: u16 = 0;
        loop {
            loop_count += 1;
            if loop_count > MAX_FANOUT_CHUNKS {
                error!("NotifyEventHandler: overflow fanning out NotifyEvent for {event_id}, aborting");
                break;
            }

            let (copied, more) = {
                let interested = control_data
                    .event_update_interested_nodes
                    .read()
                    .expect("event_update_interested_nodes poisoned");
                let Some(nodes) = interested.get(&event_id) else {
                    break;
                };
                let mut iter = nodes.range(start_node_id..);
                let mut copied = 0;
                for node_id in iter.by_ref().take(NODE_ID_CHUNK) {
                    buf[copied] = *node_id;
                    copied += 1;
                }
                (copied, iter.next().is_some())
            };

            if copied == 0 {
                break;
            }

            for &node_id in &buf[..copied] {
                let sender = self.mp_control.sender(quality, node_id);
                if let Err(e) = sender.send_short(message) {
                    error!(
                        "NotifyEventHandler: sending NotifyEvent to node {node_id} with asil level {quality} failed: {e}"
                    );
                }
            }

            if !more {
                break;
            }
            start_node_id = buf[copied - 1] + 1;
        }

        if loop_count > 1 {
            warn!("NotifyEventHandler: NotifyEvent fan-out for {event_id} needed more than one copy chunk; consider a larger NodeIdTmpBuffer");
        }
    }

    fn notify_event_locally(&self, quality: QualityType, event_id: ElementFqId) -> u32 {
        let control_data = self.control_data(quality);
        let mut handlers_called = 0u32;

        let mut reg_no_start = {
            let handlers = control_data
                .event_update_handlers
                .read()
                .expect("event_update_handlers poisoned");
            let Some(handlers_for_event) = handlers.get(&event_id) else {
                return 0;
            };
            let Some(first) = handlers_for_event.first() else {
                return 0;
            };
            (first.handler)();
            handlers_called += 1;
            first.register_no
        };

        loop {
            let next = {
                let handlers = control_data
                    .event_update_handlers
                    .read()
                    .expect("event_update_handlers poisoned");
                let Some(handlers_for_event) = handlers.get(&event_id) else {
                    break;
                };
                let idx = handlers_for_event.partition_point(|h| h.register_no <= reg_no_start);
                handlers_for_event.get(idx).map(|h| {
                    (h.handler)();
                    h.register_no
                })
            };
            match next {
                Some(register_no) => {
                    reg_no_start = register_no;
                    handlers_called += 1;
                }
                None => break,
            }
            if self.token.is_stop_requested() {
                break;
            }
        }

        handlers_called
    }

    fn handle_notify_event_msg(&self, quality: QualityType, payload: ShortMessagePayload, sender_node_id: NodeId) {
        self.assert_valid_asil(quality);
        let event_id = decode_element_fq_id(payload);
        if self.notify_event_locally(quality, event_id) == 0 {
            warn!(
                "NotifyEventHandler: received NotifyEvent for {event_id} from node {sender_node_id} but have no registered handlers; acceptable if rare"
            );
        }
    }

    fn handle_register_notification_msg(&self, quality: QualityType, payload: ShortMessagePayload, sender_node_id: NodeId) {
        self.assert_valid_asil(quality);
        let control_data = self.control_data(quality);
        let event_id = decode_element_fq_id(payload);

        let already_registered = {
            let mut interested = control_data
                .event_update_interested_nodes
                .write()
                .expect("event_update_interested_nodes poisoned");
            !interested.entry(event_id).or_default().insert(sender_node_id)
        };

        if already_registered {
            warn!("NotifyEventHandler: received redundant RegisterEventNotifier for {event_id} from node {sender_node_id}");
        }
    }

    fn handle_unregister_notification_msg(&self, quality: QualityType, payload: ShortMessagePayload, sender_node_id: NodeId) {
        self.assert_valid_asil(quality);
        let control_data = self.control_data(quality);
        let event_id = decode_element_fq_id(payload);

        let removed = control_data
            .event_update_interested_nodes
            .write()
            .expect("event_update_interested_nodes poisoned")
            .get_mut(&event_id)
            .is_some_and(|nodes| nodes.remove(&sender_node_id));

        if !removed {
            warn!("NotifyEventHandler: received UnregisterEventNotifier for {event_id} from node {sender_node_id}, but there was no registration");
        }
    }

    fn handle_outdated_node_id_msg(&self, quality: QualityType, pid_to_unregister: NodeId, sender_node_id: NodeId) {
        self.assert_valid_asil(quality);
        let control_data = self.control_data(quality);

        let remove_count = {
            let mut interested = control_data
                .event_update_interested_nodes
                .write()
                .expect("event_update_interested_nodes poisoned");
            interested
                .values_mut()
                .filter(|nodes| nodes.remove(&pid_to_unregister))
                .count()
        };

        if remove_count == 0 {
            info!(
                "NotifyEventHandler: outdated node {pid_to_unregister} from node {sender_node_id} had no update notifications registered"
            );
        }

        self.mp_control.remove_sender(quality, pid_to_unregister);
    }
}
