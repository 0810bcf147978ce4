//! Centralized configuration for the process watcher.
//!
//! Constants live on `MonitorConfig`; per-instance choices live on
//! `MonitorOptions`.

use crate::error::{Result, WatchError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Monitor-level constants.
pub struct MonitorConfig;

impl MonitorConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
    pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);
    pub const WORKER_THREAD_NAME: &'static str = "procwatch-monitor";
    /// Process table snapshots younger than this are reused across keys.
    pub const PROCESS_TABLE_TTL: Duration = Duration::from_millis(40);
}

/// How the watch loop obtains samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchMode {
    /// Query every configured identity on a fixed interval.
    Poll { interval_ms: u64 },
    /// Wait for the probe to push `(key, alive)` samples.
    Push,
}

impl WatchMode {
    /// Polling mode with the given interval.
    pub fn poll(interval: Duration) -> Self {
        WatchMode::Poll {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Poll interval, or `None` in push mode.
    pub fn interval(&self) -> Option<Duration> {
        match self {
            WatchMode::Poll { interval_ms } => Some(Duration::from_millis(*interval_ms)),
            WatchMode::Push => None,
        }
    }
}

impl Default for WatchMode {
    fn default() -> Self {
        WatchMode::poll(MonitorConfig::DEFAULT_POLL_INTERVAL)
    }
}

/// What the first sample for an identity does while it is still `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialSamplePolicy {
    /// Any first sample is a transition; a first `false` fires `stopped`.
    Report,
    /// A first `false` records `Stopped` silently; a first `true` fires `started`.
    #[default]
    SuppressInitialStop,
    /// The first sample only records state and never fires.
    Baseline,
}

/// Options for a single monitor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorOptions {
    pub mode: WatchMode,
    pub initial_sample: InitialSamplePolicy,
}

impl MonitorOptions {
    /// Reject option combinations the watch loop cannot honour.
    pub fn validate(&self) -> Result<()> {
        if let Some(interval) = self.mode.interval() {
            if interval < MonitorConfig::MIN_POLL_INTERVAL {
                return Err(WatchError::Config {
                    message: format!(
                        "poll interval {:?} is below the minimum of {:?}",
                        interval,
                        MonitorConfig::MIN_POLL_INTERVAL
                    ),
                });
            }
        }
        Ok(())
    }
}
