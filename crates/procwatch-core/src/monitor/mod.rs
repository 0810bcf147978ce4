//! Monitor service: owns the watch loop and ties the other components together.
//!
//! # Data flow
//!
//! Each sample, polled or pushed, takes the same path on the watch loop's
//! thread:
//! 1. **Identity registry** resolves the raw key (unknown keys are dropped)
//! 2. **Transition tracker** decides whether the state changed
//! 3. **Listener registry** broadcasts the resulting event
//!
//! # Example
//!
//! ```rust,no_run
//! use procwatch_core::{AppVersion, CallbackListener, ProcessMonitor, SysinfoProbe};
//! use std::sync::Arc;
//!
//! fn main() -> procwatch_core::Result<()> {
//!     let monitor = ProcessMonitor::new(
//!         AppVersion::registry()?,
//!         SysinfoProbe::for_app_versions(),
//!         Default::default(),
//!     )?;
//!
//!     monitor.add_listener(Arc::new(CallbackListener::new(
//!         "printer",
//!         |v: &AppVersion| println!("{} started", v),
//!         |v: &AppVersion| println!("{} stopped", v),
//!     )));
//!
//!     monitor.start()?;
//!     Ok(())
//! }
//! ```

mod builder;
mod service;
mod watch_loop;

pub use builder::ProcessMonitorBuilder;
pub use service::{MonitorState, ProcessMonitor};
