// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation signal shared between a caller and whatever loop
/// it asks to stop. Stands in for the originating stop-token abstraction;
/// `request_stop` is idempotent and safe to call from any thread.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn request_stop(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unsignalled_and_is_idempotent() {
        let token = CancellationToken::new();
        assert!(!token.is_stop_requested());
        token.request_stop();
        token.request_stop();
        assert!(token.is_stop_requested());
    }

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.request_stop();
        assert!(token.is_stop_requested());
    }
}
