// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! C4/C5: event-change notification and the facade that ties a node's
//! senders, receivers, and notification bookkeeping together into one
//! object a skeleton or proxy binding can hold.
//!
//! Built on top of [`message_passing`], which owns the wire format and
//! channel transport; this crate adds the notion of service elements,
//! ASIL quality classes, and the subscription registries that decide who
//! gets told about an event update.

pub mod config;
pub mod control;
pub mod facade;
pub mod notify_event_handler;
pub mod quality_type;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{AsilSpecificConfig, FacadeConfig};
pub use control::{MessagePassingControl, SenderHandle};
pub use facade::MessagingFacade;
pub use notify_event_handler::{HandlerRegistrationNo, NotifyEventHandler, ReceiveHandler};
pub use quality_type::QualityType;
