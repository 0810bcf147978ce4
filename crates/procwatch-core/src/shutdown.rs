//! Shutdown signal shared between a monitor and its watch loop.
//!
//! The loop checks the token between samples. Waking a loop that is blocked
//! on its sample channel is the monitor's job; the token only carries state.

use crate::error::{Result, WatchError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable, one-way shutdown flag.
///
/// When `trigger()` is called on any clone, all clones observe it. There is
/// no reset: a triggered token stays triggered.
///
/// # Example
///
/// ```
/// use procwatch_core::shutdown::ShutdownToken;
///
/// let token = ShutdownToken::new();
/// let observer = token.clone();
///
/// token.trigger();
/// assert!(observer.is_triggered());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    triggered: Arc<AtomicBool>,
}

impl ShutdownToken {
    /// Create a new, untriggered token.
    pub fn new() -> Self {
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request shutdown.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn trigger(&self) -> bool {
        !self.triggered.swap(true, Ordering::SeqCst)
    }

    /// Check if shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Return `WatchError::Terminated` once shutdown has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_triggered() {
            Err(WatchError::Terminated)
        } else {
            Ok(())
        }
    }
}
