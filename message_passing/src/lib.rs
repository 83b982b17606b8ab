// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Fixed-size message envelopes and a named channel transport for
//! asynchronous, best-effort control-plane communication between processes.
//!
//! This crate carries no notion of service elements, ASIL quality classes,
//! or subscription registries; it only moves short/medium messages between
//! a [`Sender`](sender::Sender) and [`Receiver`](receiver::Receiver) that
//! agree on a channel name and a [`MessageId`](message::MessageId) dispatch
//! table.

pub mod cancel;
pub mod channel;
pub mod codec;
pub mod element_fq_id;
pub mod error;
pub mod message;
pub mod receiver;
pub mod sender;
pub mod threadpool;

pub use cancel::CancellationToken;
pub use element_fq_id::{ElementFqId, ElementType};
pub use error::Error;
pub use receiver::{Receiver, ReceiverConfig};
pub use sender::{Sender, SenderConfig};
pub use threadpool::ThreadPool;
