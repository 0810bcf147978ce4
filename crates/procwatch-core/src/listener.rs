//! Listener interface and the registry that fans transitions out to listeners.
//!
//! The registry is copy-on-write: a broadcast clones the current list `Arc`
//! under a short read lock and iterates it with no lock held. Registration
//! and removal therefore never wait on a running broadcast, and a listener
//! may unregister itself from inside its own callback.

use crate::error::WatchError;
use crate::identity::Identity;
use crate::tracker::ProcessEvent;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Subscriber notified when a watched identity starts or stops.
///
/// Callbacks run synchronously on the watch loop's thread. A panic inside a
/// callback is caught and logged; it does not reach the monitor.
pub trait ProcessListener<I: Identity>: Send + Sync {
    fn on_started(&self, identity: &I);

    fn on_stopped(&self, identity: &I);

    /// Name used in fault logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Shared handle to a registered listener.
///
/// Registry membership is by pointer identity of this `Arc`.
pub type SharedListener<I> = Arc<dyn ProcessListener<I>>;

struct Members<I: Identity> {
    ordered: Arc<Vec<SharedListener<I>>>,
    addresses: HashSet<usize>,
}

/// Ordered, concurrently mutable set of listeners.
pub struct ListenerRegistry<I: Identity> {
    members: RwLock<Members<I>>,
}

fn address<I: Identity>(listener: &SharedListener<I>) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}

impl<I: Identity> ListenerRegistry<I> {
    pub fn new() -> Self {
        Self {
            members: RwLock::new(Members {
                ordered: Arc::new(Vec::new()),
                addresses: HashSet::new(),
            }),
        }
    }

    /// Add a listener if it is not already registered.
    ///
    /// Returns `false` when the same `Arc` was already present. A broadcast
    /// that has already begun does not see the new listener.
    pub fn register(&self, listener: SharedListener<I>) -> bool {
        let mut members = self.members.write();
        if !members.addresses.insert(address(&listener)) {
            return false;
        }
        // Copies only if a broadcast currently holds the old snapshot.
        Arc::make_mut(&mut members.ordered).push(listener);
        true
    }

    /// Remove a listener. No-op if it is not registered.
    pub fn unregister(&self, listener: &SharedListener<I>) -> bool {
        let mut members = self.members.write();
        let addr = address(listener);
        if !members.addresses.remove(&addr) {
            return false;
        }
        Arc::make_mut(&mut members.ordered).retain(|l| address(l) != addr);
        true
    }

    /// Listeners registered right now, in registration order.
    pub fn snapshot(&self) -> Arc<Vec<SharedListener<I>>> {
        Arc::clone(&self.members.read().ordered)
    }

    pub fn len(&self) -> usize {
        self.members.read().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to every listener registered when the call begins.
    ///
    /// Delivery is in registration order on the caller's thread. Faulting
    /// listeners are logged and returned; delivery continues past them.
    pub fn broadcast(&self, event: &ProcessEvent<I>) -> Vec<WatchError> {
        let listeners = self.snapshot();
        let mut faults = Vec::new();

        for listener in listeners.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| match event {
                ProcessEvent::Started(identity) => listener.on_started(identity),
                ProcessEvent::Stopped(identity) => listener.on_stopped(identity),
            }));

            if let Err(payload) = outcome {
                let fault = WatchError::ListenerFault {
                    listener: listener.name().to_string(),
                    message: panic_message(payload.as_ref()),
                };
                warn!("{} while delivering {:?}", fault, event);
                faults.push(fault);
            }
        }

        debug!(
            "Delivered {:?} to {} listeners ({} faulted)",
            event,
            listeners.len(),
            faults.len()
        );
        faults
    }
}

impl<I: Identity> Default for ListenerRegistry<I> {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "listener panicked".to_string()
    }
}

/// Callback type for one side of a `CallbackListener`.
pub type IdentityCallback<I> = Box<dyn Fn(&I) + Send + Sync + 'static>;

/// Listener assembled from two closures.
pub struct CallbackListener<I: Identity> {
    name: String,
    on_started: IdentityCallback<I>,
    on_stopped: IdentityCallback<I>,
}

impl<I: Identity> CallbackListener<I> {
    pub fn new(
        name: impl Into<String>,
        on_started: impl Fn(&I) + Send + Sync + 'static,
        on_stopped: impl Fn(&I) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            on_started: Box::new(on_started),
            on_stopped: Box::new(on_stopped),
        }
    }
}

impl<I: Identity> ProcessListener<I> for CallbackListener<I> {
    fn on_started(&self, identity: &I) {
        (self.on_started)(identity)
    }

    fn on_stopped(&self, identity: &I) {
        (self.on_stopped)(identity)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Listener that forwards events into a tokio channel.
///
/// Lets async code `.recv().await` transitions. Events are dropped once the
/// receiver is gone.
pub struct ChannelListener<I: Identity> {
    tx: mpsc::UnboundedSender<ProcessEvent<I>>,
}

impl<I: Identity> ChannelListener<I> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProcessEvent<I>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: ProcessEvent<I>) {
        if self.tx.send(event).is_err() {
            debug!("Channel listener receiver dropped; discarding event");
        }
    }
}

impl<I: Identity> ProcessListener<I> for ChannelListener<I> {
    fn on_started(&self, identity: &I) {
        self.forward(ProcessEvent::Started(identity.clone()));
    }

    fn on_stopped(&self, identity: &I) {
        self.forward(ProcessEvent::Stopped(identity.clone()));
    }
}
