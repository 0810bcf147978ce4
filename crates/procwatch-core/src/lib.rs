//! Procwatch Core - process-presence monitoring with debounced transitions.
//!
//! Watches a fixed set of application identities, samples whether each one
//! is running (by polling the platform probe or receiving pushed samples),
//! and notifies registered listeners exactly once per actual start or stop.
//!
//! # Example
//!
//! ```rust,ignore
//! use procwatch_core::{AppVersion, ChannelListener, ProcessMonitorBuilder, SysinfoProbe};
//! use std::sync::Arc;
//!
//! let (listener, mut events) = ChannelListener::new();
//! let monitor = ProcessMonitorBuilder::new(AppVersion::registry()?, SysinfoProbe::for_app_versions())
//!     .listener(Arc::new(listener))
//!     .build()?;
//! monitor.start()?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod listener;
pub mod monitor;
pub mod platform;
pub mod probe;
pub mod shutdown;
pub mod tracker;

// Re-export commonly used types
pub use config::{InitialSamplePolicy, MonitorConfig, MonitorOptions, WatchMode};
pub use error::{Result, WatchError};
pub use identity::{AppVersion, Identity, IdentityRegistry};
pub use listener::{
    CallbackListener, ChannelListener, ListenerRegistry, ProcessListener, SharedListener,
};
pub use monitor::{MonitorState, ProcessMonitor, ProcessMonitorBuilder};
pub use platform::{ProcessPattern, SysinfoProbe};
pub use probe::{LivenessProbe, Sample, SampleSink};
pub use shutdown::ShutdownToken;
pub use tracker::{EventKind, LivenessState, ProcessEvent, TransitionTracker};
