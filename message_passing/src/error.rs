// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::fmt;

/// Errors that can arise from the channel transport and message codec.
#[derive(Debug)]
pub enum Error {
    /// A received envelope did not have a recognised `kind` byte, or its raw
    /// byte count didn't match the fixed short/medium envelope size.
    MalformedEnvelope,

    /// The channel could not be opened, or a send/receive failed at the
    /// transport layer.
    Io(std::io::Error),

    /// The peer is not present in the receiver's uid allow-list.
    PermissionDenied,

    /// Construction was aborted by a cancellation token before the named
    /// channel came into existence.
    Cancelled,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedEnvelope => write!(f, "malformed envelope"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::PermissionDenied => write!(f, "sender uid not in allow-list"),
            Self::Cancelled => write!(f, "cancelled before channel became available"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<nix::Error> for Error {
    fn from(e: nix::Error) -> Self {
        Self::Io(std::io::Error::from(e))
    }
}
