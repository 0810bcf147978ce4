//! Builder for configuring a `ProcessMonitor`.

use super::service::ProcessMonitor;
use crate::config::{InitialSamplePolicy, MonitorOptions, WatchMode};
use crate::error::Result;
use crate::identity::{Identity, IdentityRegistry};
use crate::listener::SharedListener;
use crate::probe::LivenessProbe;
use std::time::Duration;

/// Builder for configuring monitor construction.
///
/// # Example
///
/// ```rust,no_run
/// use procwatch_core::{AppVersion, ProcessMonitorBuilder, SysinfoProbe};
/// use std::time::Duration;
///
/// let monitor = ProcessMonitorBuilder::new(AppVersion::registry()?, SysinfoProbe::for_app_versions())
///     .poll_interval(Duration::from_secs(1))
///     .build()?;
/// monitor.start()?;
/// # Ok::<(), procwatch_core::WatchError>(())
/// ```
pub struct ProcessMonitorBuilder<I: Identity, P: LivenessProbe> {
    registry: IdentityRegistry<I>,
    probe: P,
    options: MonitorOptions,
    listeners: Vec<SharedListener<I>>,
}

impl<I: Identity, P: LivenessProbe> ProcessMonitorBuilder<I, P> {
    /// Create a builder with default options.
    pub fn new(registry: IdentityRegistry<I>, probe: P) -> Self {
        Self {
            registry,
            probe,
            options: MonitorOptions::default(),
            listeners: Vec::new(),
        }
    }

    /// Replace all options at once.
    pub fn options(mut self, options: MonitorOptions) -> Self {
        self.options = options;
        self
    }

    /// Poll every identity on this interval.
    ///
    /// Default: `MonitorConfig::DEFAULT_POLL_INTERVAL`
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.options.mode = WatchMode::poll(interval);
        self
    }

    /// Rely on samples pushed by the probe instead of polling.
    pub fn push(mut self) -> Self {
        self.options.mode = WatchMode::Push;
        self
    }

    /// Choose how the first sample of each identity is treated.
    ///
    /// Default: `InitialSamplePolicy::SuppressInitialStop`
    pub fn initial_sample(mut self, policy: InitialSamplePolicy) -> Self {
        self.options.initial_sample = policy;
        self
    }

    /// Register a listener before the monitor exists.
    pub fn listener(mut self, listener: SharedListener<I>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Build the monitor. Does not start it.
    pub fn build(self) -> Result<ProcessMonitor<I>> {
        let monitor = ProcessMonitor::new(self.registry, self.probe, self.options)?;
        for listener in self.listeners {
            monitor.add_listener(listener);
        }
        Ok(monitor)
    }
}
