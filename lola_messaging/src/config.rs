// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::time::Duration;

use message_passing::{ReceiverConfig, SenderConfig};

/// Per-quality-class knobs: how many worker threads decouple local
/// notification callbacts from the publisher's thread, and how many
/// receiver threads listen on that class's channel.
#[derive(Debug, Clone, Copy)]
pub struct AsilSpecificConfig {
    pub local_dispatch_threads: usize,
    pub receiver_threads: usize,
}

impl Default for AsilSpecificConfig {
    fn default() -> Self {
        let hw_conc = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        Self {
            local_dispatch_threads: hw_conc,
            receiver_threads: hw_conc,
        }
    }
}

/// Top-level configuration for a [`MessagingFacade`](crate::facade::MessagingFacade).
#[derive(Debug, Clone)]
pub struct FacadeConfig {
    /// Whether this process participates in ASIL-B communication at all, in
    /// addition to the always-available QM class.
    pub asil_b_capability: bool,
    pub qm: AsilSpecificConfig,
    pub asil_b: AsilSpecificConfig,
    pub sender: SenderConfig,
    pub receiver: ReceiverConfig,
    /// Delay between retrying a failed connect to a just-started peer.
    pub connect_retry_delay: Duration,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            asil_b_capability: false,
            qm: AsilSpecificConfig::default(),
            asil_b: AsilSpecificConfig::default(),
            sender: SenderConfig::default(),
            receiver: ReceiverConfig::default(),
            connect_retry_delay: Duration::from_millis(5),
        }
    }
}
