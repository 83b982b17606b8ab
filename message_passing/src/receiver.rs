// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! C2/C3: the receiving half of a channel plus its dispatch table.
//!
//! A [`Receiver`] moves through `Created -> Listening -> Stopping -> Closed`.
//! Callbacks may only be registered in `Created`. `start_listening` opens
//! the channel and hands its worker loop to `concurrency` threads of an
//! internal [`ThreadPool`]; each thread blocks in `receive_next` and
//! dispatches to whatever callback is registered for the message id it
//! reads, calling it inline on that worker thread.
//!
//! This differs from the original's stop mechanism, which had thread 0 own
//! a stop-callback that issued `stop_receive` for every *other* thread, to
//! avoid a thread stopping itself before entering its receive loop. Here
//! `request_stop` simply issues one `stop_receive` per worker directly; since
//! `stop_receive` only unblocks an in-flight `receive_next` and is otherwise
//! inert, there's no equivalent deadlock to avoid.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Duration;

use log::{debug, warn};

use crate::channel::{ChannelTraits, Uid};
use crate::error::Error;
use crate::message::{MediumMessagePayload, MessageId, NodeId, ShortMessagePayload};
use crate::threadpool::ThreadPool;

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Maximum backlog a backend should hold before a sender starts failing.
    pub max_queued_messages: i32,
    /// Artificial per-iteration delay, to throttle a misbehaving sender.
    pub message_loop_delay: Option<Duration>,
    /// Uids permitted to send on this channel; empty means unrestricted.
    pub allowed_user_ids: Vec<Uid>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            max_queued_messages: 10,
            message_loop_delay: None,
            allowed_user_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReceiverState {
    Created,
    Listening,
    Stopping,
    Closed,
}

type ShortCallback = Box<dyn Fn(ShortMessagePayload, NodeId) + Send + Sync>;
type MediumCallback = Box<dyn Fn(MediumMessagePayload, NodeId) + Send + Sync>;

enum Callback {
    Short(ShortCallback),
    Medium(MediumCallback),
}

struct Inner<C: ChannelTraits> {
    identifier: String,
    config: ReceiverConfig,
    callbacks: RwLock<HashMap<MessageId, Callback>>,
    handle: OnceLock<C::Handle>,
}

impl<C: ChannelTraits> Inner<C> {
    fn worker_loop(self: Arc<Self>) {
        let handle = self
            .handle
            .get()
            .expect("worker started before handle was set")
            .clone();
        loop {
            match C::receive_next(&handle) {
                Ok(crate::channel::ReceivedEnvelope::Stop) => return,
                Ok(crate::channel::ReceivedEnvelope::Short(msg)) => {
                    self.dispatch_short(msg.id, msg.payload, msg.pid)
                }
                Ok(crate::channel::ReceivedEnvelope::Medium(msg)) => {
                    self.dispatch_medium(msg.id, msg.payload, msg.pid)
                }
                Err(e) => warn!("{}: could not receive message: {e}", self.identifier),
            }
            if let Some(delay) = self.config.message_loop_delay {
                std::thread::sleep(delay);
            }
        }
    }

    fn dispatch_short(&self, id: MessageId, payload: ShortMessagePayload, pid: NodeId) {
        let callbacks = self.callbacks.read().expect("callback map poisoned");
        match callbacks.get(&id) {
            Some(Callback::Short(callback)) => callback(payload, pid),
            Some(Callback::Medium(_)) => {
                warn!("{}: message {id} registered as medium, got short", self.identifier)
            }
            None => debug!("{}: no callback registered for message {id}", self.identifier),
        }
    }

    fn dispatch_medium(&self, id: MessageId, payload: MediumMessagePayload, pid: NodeId) {
        let callbacks = self.callbacks.read().expect("callback map poisoned");
        match callbacks.get(&id) {
            Some(Callback::Medium(callback)) => callback(payload, pid),
            Some(Callback::Short(_)) => {
                warn!("{}: message {id} registered as short, got medium", self.identifier)
            }
            None => debug!("{}: no callback registered for message {id}", self.identifier),
        }
    }
}

/// Generic receiver parametrized over a [`ChannelTraits`] backend.
pub struct Receiver<C: ChannelTraits> {
    inner: Arc<Inner<C>>,
    concurrency: usize,
    state: Mutex<ReceiverState>,
    pool: Mutex<Option<ThreadPool>>,
}

impl<C: ChannelTraits> Receiver<C> {
    pub fn new(identifier: &str, concurrency: usize, config: ReceiverConfig) -> Self {
        assert!(concurrency > 0, "receiver needs at least one worker thread");
        Self {
            inner: Arc::new(Inner {
                identifier: identifier.to_string(),
                config,
                callbacks: RwLock::new(HashMap::new()),
                handle: OnceLock::new(),
            }),
            concurrency,
            state: Mutex::new(ReceiverState::Created),
            pool: Mutex::new(None),
        }
    }

    /// Registers a handler for short messages with id `id`. Only legal
    /// before [`start_listening`](Self::start_listening) has been called.
    pub fn register_short(
        &self,
        id: MessageId,
        callback: impl Fn(ShortMessagePayload, NodeId) + Send + Sync + 'static,
    ) {
        let state = self.state.lock().expect("receiver state poisoned");
        assert_eq!(
            *state,
            ReceiverState::Created,
            "register_short called after start_listening"
        );
        self.inner
            .callbacks
            .write()
            .expect("callback map poisoned")
            .insert(id, Callback::Short(Box::new(callback)));
    }

    /// Registers a handler for medium messages with id `id`. Only legal
    /// before [`start_listening`](Self::start_listening) has been called.
    pub fn register_medium(
        &self,
        id: MessageId,
        callback: impl Fn(MediumMessagePayload, NodeId) + Send + Sync + 'static,
    ) {
        let state = self.state.lock().expect("receiver state poisoned");
        assert_eq!(
            *state,
            ReceiverState::Created,
            "register_medium called after start_listening"
        );
        self.inner
            .callbacks
            .write()
            .expect("callback map poisoned")
            .insert(id, Callback::Medium(Box::new(callback)));
    }

    /// Opens the channel and spawns `concurrency` worker threads to receive
    /// on it. Each failure here is operational-surfaced: the caller (the
    /// facade) must fail construction rather than continue with a half-open
    /// receiver.
    pub fn start_listening(&self) -> Result<(), Error> {
        let mut state = self.state.lock().expect("receiver state poisoned");
        assert_eq!(*state, ReceiverState::Created, "start_listening called twice");

        let handle = C::open_receiver(
            &self.inner.identifier,
            &self.inner.config.allowed_user_ids,
            self.inner.config.max_queued_messages,
        )?;
        self.inner
            .handle
            .set(handle)
            .unwrap_or_else(|_| panic!("receiver handle set twice"));

        let pool = ThreadPool::new(self.concurrency, &self.inner.identifier);
        for _ in 0..self.concurrency {
            let inner = Arc::clone(&self.inner);
            pool.execute(move || inner.worker_loop());
        }
        *self.pool.lock().expect("receiver pool poisoned") = Some(pool);
        *state = ReceiverState::Listening;
        Ok(())
    }

    /// Stops every worker thread and closes the channel. Idempotent after
    /// the first call; a no-op if `start_listening` was never called.
    pub fn request_stop(&self) {
        let mut state = self.state.lock().expect("receiver state poisoned");
        if *state != ReceiverState::Listening {
            return;
        }
        *state = ReceiverState::Stopping;
        let handle = self.inner.handle.get().expect("listening without a handle");
        for _ in 0..self.concurrency {
            C::stop_receive(handle);
        }
        drop(state);

        // Dropping the pool blocks until every worker has observed the stop
        // sentinel and returned.
        self.pool.lock().expect("receiver pool poisoned").take();

        let handle = self.inner.handle.get().expect("listening without a handle");
        C::close_receiver(handle, &self.inner.identifier);
        *self.state.lock().expect("receiver state poisoned") = ReceiverState::Closed;
    }
}

impl<C: ChannelTraits> Drop for Receiver<C> {
    fn drop(&mut self) {
        self.request_stop();
    }
}
