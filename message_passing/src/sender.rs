// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! C2 sender half: opens (or waits for) the named channel and retries a
//! failed send a bounded number of times before giving up.

use std::time::Duration;

use log::{info, warn};

use crate::cancel::CancellationToken;
use crate::channel::ChannelTraits;
use crate::error::Error;
use crate::message::{MediumMessage, ShortMessage};

/// Mirrors the original's `SenderConfig` defaults: five retries, no delay
/// between retries, 5 ms between connect attempts.
#[derive(Debug, Clone, Copy)]
pub struct SenderConfig {
    pub max_number_of_retries: i32,
    pub send_retry_delay: Duration,
    pub connect_retry_delay: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_number_of_retries: 5,
            send_retry_delay: Duration::ZERO,
            connect_retry_delay: Duration::from_millis(5),
        }
    }
}

/// Sends short/medium messages to whatever [`Receiver`](crate::receiver::Receiver)
/// is listening on the channel named `identifier`. Blocks in the constructor
/// until that receiver exists, or `token` is cancelled first.
pub struct Sender<C: ChannelTraits> {
    handle: Option<C::Handle>,
    config: SenderConfig,
    token: CancellationToken,
}

impl<C: ChannelTraits> Sender<C> {
    pub fn new(identifier: &str, token: CancellationToken, config: SenderConfig) -> Self {
        let mut printed_failure = false;
        let mut handle = None;
        while handle.is_none() && !token.is_stop_requested() {
            match C::try_open_sender(identifier) {
                Ok(h) => {
                    if printed_failure {
                        info!("channel finally opened: {identifier}");
                    }
                    handle = Some(h);
                }
                Err(e) => {
                    if !printed_failure {
                        warn!("could not open channel {identifier}: {e}");
                        printed_failure = true;
                    }
                    std::thread::sleep(config.connect_retry_delay);
                }
            }
        }
        Self {
            handle,
            config,
            token,
        }
    }

    pub fn send_short(&self, message: ShortMessage) -> Result<(), Error> {
        self.send_with_retry(|handle| C::try_send_short(handle, message))
    }

    pub fn send_medium(&self, message: MediumMessage) -> Result<(), Error> {
        self.send_with_retry(|handle| C::try_send_medium(handle, message))
    }

    /// Whether a successful send is a hard guarantee of enqueueing, as
    /// opposed to a best-effort handoff that can still silently drop under
    /// OS-level backpressure.
    pub fn has_non_blocking_guarantee(&self) -> bool {
        C::has_non_blocking_guarantee()
    }

    fn send_with_retry(
        &self,
        mut attempt: impl FnMut(&C::Handle) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let Some(handle) = self.handle.as_ref() else {
            return Err(Error::Cancelled);
        };

        let mut retries = 0;
        let mut last_error = Ok(());
        while retries < self.config.max_number_of_retries && !self.token.is_stop_requested() {
            match attempt(handle) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_error = Err(e);
                    retries += 1;
                    if self.config.send_retry_delay > Duration::ZERO {
                        std::thread::sleep(self.config.send_retry_delay);
                    }
                }
            }
        }
        last_error
    }
}

impl<C: ChannelTraits> Drop for Sender<C> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            C::close_sender(&handle);
        }
    }
}
