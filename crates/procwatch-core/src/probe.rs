//! Boundary to the platform layer that answers "is this process alive".
//!
//! A probe can be queried (poll mode) and may additionally push samples
//! through a `SampleSink` (push mode). Pushed samples cross a channel into the
//! watch loop, so the probe's own threads never touch tracker or listener
//! locks.

use crate::error::{Result, WatchError};
use std::sync::mpsc;
use std::sync::Arc;

/// One raw liveness observation from the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Raw platform key, resolved by the identity registry.
    pub key: String,
    pub alive: bool,
}

impl Sample {
    pub fn new(key: impl Into<String>, alive: bool) -> Self {
        Self {
            key: key.into(),
            alive,
        }
    }
}

/// Messages consumed by the watch loop.
#[derive(Debug)]
pub(crate) enum LoopMessage {
    Sample(Sample),
    Shutdown,
}

/// Cloneable handle for delivering samples to a monitor's watch loop.
#[derive(Debug, Clone)]
pub struct SampleSink {
    tx: mpsc::Sender<LoopMessage>,
}

impl SampleSink {
    pub(crate) fn new(tx: mpsc::Sender<LoopMessage>) -> Self {
        Self { tx }
    }

    /// Queue a sample. Fails with `Terminated` once the monitor is gone.
    pub fn send(&self, key: impl Into<String>, alive: bool) -> Result<()> {
        self.send_sample(Sample::new(key, alive))
    }

    pub fn send_sample(&self, sample: Sample) -> Result<()> {
        self.tx
            .send(LoopMessage::Sample(sample))
            .map_err(|_| WatchError::Terminated)
    }
}

/// Platform liveness capability.
///
/// `bind` is called once from `ProcessMonitor::start` and `release` once at
/// shutdown. Methods take `&self`; implementations use interior mutability.
pub trait LivenessProbe: Send + Sync + 'static {
    /// One-time initialization. Failure is fatal to the monitor.
    fn bind(&self) -> Result<()>;

    /// Synchronously check whether the process behind `raw_key` is running.
    fn is_alive(&self, raw_key: &str) -> Result<bool>;

    /// Register for push notifications.
    ///
    /// Probes that can only be queried keep the default, which reports
    /// `PushUnsupported`.
    fn attach(&self, sink: SampleSink) -> Result<()> {
        let _ = sink;
        Err(WatchError::PushUnsupported)
    }

    /// Release the platform binding.
    fn release(&self) {}
}

impl<P: LivenessProbe + ?Sized> LivenessProbe for Arc<P> {
    fn bind(&self) -> Result<()> {
        (**self).bind()
    }

    fn is_alive(&self, raw_key: &str) -> Result<bool> {
        (**self).is_alive(raw_key)
    }

    fn attach(&self, sink: SampleSink) -> Result<()> {
        (**self).attach(sink)
    }

    fn release(&self) {
        (**self).release()
    }
}
