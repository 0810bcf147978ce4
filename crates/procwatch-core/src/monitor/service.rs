//! The monitor service handle.

use super::watch_loop::{bind_error, WatchContext, WatchLoop};
use crate::config::{MonitorConfig, MonitorOptions, WatchMode};
use crate::error::{Result, WatchError};
use crate::identity::{Identity, IdentityRegistry};
use crate::listener::{ListenerRegistry, SharedListener};
use crate::probe::{LivenessProbe, LoopMessage, SampleSink};
use crate::shutdown::ShutdownToken;
use crate::tracker::{LivenessState, TransitionTracker};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Lifecycle of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    NotStarted,
    Running,
    Terminated,
}

/// Watches a fixed set of identities and notifies listeners of transitions.
///
/// Construct one explicitly and share it by reference or `Arc`. `start` binds
/// the probe and spawns the single watch loop; `shutdown` (or drop) stops the
/// loop and releases the probe.
pub struct ProcessMonitor<I: Identity> {
    context: Arc<WatchContext<I>>,
    options: MonitorOptions,
    lifecycle: Mutex<MonitorState>,
    /// Sender half of the watch loop inbox.
    tx: mpsc::Sender<LoopMessage>,
    /// Receiver half, moved into the worker on start.
    inbox: Mutex<Option<mpsc::Receiver<LoopMessage>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<I: Identity> ProcessMonitor<I> {
    /// Create a monitor. Nothing runs until `start`.
    pub fn new(
        registry: IdentityRegistry<I>,
        probe: impl LivenessProbe,
        options: MonitorOptions,
    ) -> Result<Self> {
        options.validate()?;

        let tracker = TransitionTracker::new(registry.identities(), options.initial_sample);
        let (tx, inbox) = mpsc::channel();

        Ok(Self {
            context: Arc::new(WatchContext {
                registry,
                tracker,
                listeners: ListenerRegistry::new(),
                probe: Arc::new(probe),
                shutdown: ShutdownToken::new(),
            }),
            options,
            lifecycle: Mutex::new(MonitorState::NotStarted),
            tx,
            inbox: Mutex::new(Some(inbox)),
            worker: Mutex::new(None),
        })
    }

    /// Bind the probe and start the watch loop.
    ///
    /// Calling this again while running is a no-op. A bind failure is
    /// returned to the caller and leaves the monitor `Terminated`.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            MonitorState::Running => {
                debug!("start() called on a running monitor; ignoring");
                return Ok(());
            }
            MonitorState::Terminated => return Err(WatchError::Terminated),
            MonitorState::NotStarted => {}
        }

        if let Err(e) = self.context.probe.bind() {
            let err = bind_error(e);
            error!("Cannot start monitor: {}", err);
            *lifecycle = MonitorState::Terminated;
            return Err(err);
        }

        if self.options.mode == WatchMode::Push {
            if let Err(e) = self.context.probe.attach(self.sample_sink()) {
                let err = bind_error(e);
                error!("Cannot attach to probe notifications: {}", err);
                self.context.probe.release();
                *lifecycle = MonitorState::Terminated;
                return Err(err);
            }
        }

        let inbox = self
            .inbox
            .lock()
            .take()
            .ok_or_else(|| WatchError::Other("watch loop inbox already taken".to_string()))?;

        let watch_loop = WatchLoop {
            context: Arc::clone(&self.context),
            inbox,
            interval: self.options.mode.interval(),
        };

        let handle = thread::Builder::new()
            .name(MonitorConfig::WORKER_THREAD_NAME.to_string())
            .spawn(move || watch_loop.run())
            .map_err(|e| {
                self.context.probe.release();
                *lifecycle = MonitorState::Terminated;
                WatchError::Other(format!("Failed to spawn watch loop: {}", e))
            })?;

        *self.worker.lock() = Some(handle);
        *lifecycle = MonitorState::Running;
        info!(
            "Process monitor started for {} identities",
            self.context.registry.identities().len()
        );
        Ok(())
    }

    /// Stop the watch loop and release the probe. Idempotent.
    ///
    /// The lifecycle lock is only held while the state flips, so listeners
    /// may call back into the monitor while this waits for the loop. Called
    /// from a listener callback, the worker is left to exit on its own and
    /// releases the probe when it does.
    pub fn shutdown(&self) {
        let worker = {
            let mut lifecycle = self.lifecycle.lock();
            match *lifecycle {
                MonitorState::Terminated => return,
                MonitorState::NotStarted => {
                    self.context.shutdown.trigger();
                    *lifecycle = MonitorState::Terminated;
                    self.inbox.lock().take();
                    debug!("Monitor terminated before start");
                    return;
                }
                MonitorState::Running => {}
            }
            self.context.shutdown.trigger();
            *lifecycle = MonitorState::Terminated;
            self.worker.lock().take()
        };

        let _ = self.tx.send(LoopMessage::Shutdown);
        if let Some(handle) = worker {
            if handle.thread().id() == thread::current().id() {
                debug!("shutdown() called from the watch loop; not joining");
            } else if handle.join().is_err() {
                warn!("Watch loop panicked during shutdown");
                self.context.probe.release();
            }
        }

        info!("Process monitor terminated");
    }

    pub fn state(&self) -> MonitorState {
        *self.lifecycle.lock()
    }

    /// Register a listener. Works in any lifecycle state.
    pub fn add_listener(&self, listener: SharedListener<I>) -> bool {
        self.context.listeners.register(listener)
    }

    pub fn remove_listener(&self, listener: &SharedListener<I>) -> bool {
        self.context.listeners.unregister(listener)
    }

    pub fn listeners(&self) -> &ListenerRegistry<I> {
        &self.context.listeners
    }

    pub fn registry(&self) -> &IdentityRegistry<I> {
        &self.context.registry
    }

    pub fn options(&self) -> &MonitorOptions {
        &self.options
    }

    /// Handle for pushing samples into the watch loop.
    ///
    /// Samples queued before `start` are processed once the loop runs.
    pub fn sample_sink(&self) -> SampleSink {
        SampleSink::new(self.tx.clone())
    }

    /// Last tracked state for an identity.
    pub fn liveness(&self, identity: &I) -> Option<LivenessState> {
        self.context.tracker.state(identity)
    }

    /// Ask the probe directly whether an identity is running.
    ///
    /// Bypasses the tracker: no state changes and no events.
    pub fn is_alive(&self, identity: &I) -> Result<bool> {
        let key = self
            .context
            .registry
            .key_for(identity)
            .ok_or_else(|| WatchError::UnknownIdentity {
                key: identity.key().to_string(),
            })?;
        self.context.probe.is_alive(key)
    }
}

impl<I: Identity> Drop for ProcessMonitor<I> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
