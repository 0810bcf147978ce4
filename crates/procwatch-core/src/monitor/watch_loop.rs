//! The producer side: the loop that samples liveness and drives transitions.

use crate::error::WatchError;
use crate::identity::{Identity, IdentityRegistry};
use crate::listener::ListenerRegistry;
use crate::probe::{LivenessProbe, LoopMessage, Sample};
use crate::shutdown::ShutdownToken;
use crate::tracker::{ProcessEvent, TransitionTracker};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Components shared between the monitor handle and its watch loop.
pub(crate) struct WatchContext<I: Identity> {
    pub registry: IdentityRegistry<I>,
    pub tracker: TransitionTracker<I>,
    pub listeners: ListenerRegistry<I>,
    pub probe: Arc<dyn LivenessProbe>,
    pub shutdown: ShutdownToken,
}

impl<I: Identity> WatchContext<I> {
    /// Route one raw sample through resolve -> track -> broadcast.
    ///
    /// Unknown keys are logged and dropped. Once shutdown is triggered the
    /// sample is dropped before it reaches the tracker or any listener.
    pub fn process_sample(&self, sample: &Sample) -> Option<ProcessEvent<I>> {
        if self.shutdown.is_triggered() {
            debug!("Dropping sample for {} after shutdown", sample.key);
            return None;
        }

        let identity = match self.registry.resolve(&sample.key) {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Dropping sample (alive={}): {}", sample.alive, e);
                return None;
            }
        };

        let event = match self.tracker.observe(&identity, sample.alive) {
            Ok(event) => event?,
            Err(e) => {
                warn!("Dropping sample for {}: {}", identity, e);
                return None;
            }
        };

        match &event {
            ProcessEvent::Started(identity) => info!("Process {} is RUNNING", identity),
            ProcessEvent::Stopped(identity) => info!("Process {} has STOPPED", identity),
        }
        if self.shutdown.is_triggered() {
            debug!("Not broadcasting {:?} after shutdown", event);
            return None;
        }
        self.listeners.broadcast(&event);
        Some(event)
    }

    /// Query every configured key once.
    ///
    /// A failed query skips that key for this round only. The round stops
    /// early if a listener triggers shutdown partway through.
    pub fn poll_all(&self) {
        for (key, _) in self.registry.entries() {
            if self.shutdown.is_triggered() {
                debug!("Poll round cut short by shutdown");
                return;
            }
            match self.probe.is_alive(key) {
                Ok(alive) => {
                    self.process_sample(&Sample::new(key, alive));
                }
                Err(e) => warn!("Skipping {} this round: {}", key, e),
            }
        }
    }
}

/// Body of the monitor's worker thread.
pub(crate) struct WatchLoop<I: Identity> {
    pub context: Arc<WatchContext<I>>,
    pub inbox: Receiver<LoopMessage>,
    /// `Some` in poll mode, `None` in push mode.
    pub interval: Option<Duration>,
}

impl<I: Identity> WatchLoop<I> {
    /// Run until shutdown, then release the probe.
    ///
    /// The loop owns the release so no query can reach a released probe.
    pub fn run(self) {
        info!(
            "Watch loop started ({} keys, {})",
            self.context.registry.len(),
            match self.interval {
                Some(interval) => format!("polling every {:?}", interval),
                None => "push".to_string(),
            }
        );

        match self.interval {
            Some(interval) => self.run_polling(interval),
            None => self.run_push(),
        }

        self.context.probe.release();
        info!("Watch loop stopped");
    }

    /// Poll on the interval; pushed samples are handled in between.
    fn run_polling(&self, interval: Duration) {
        while !self.context.shutdown.is_triggered() {
            self.context.poll_all();

            let deadline = Instant::now() + interval;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match self.inbox.recv_timeout(remaining) {
                    Ok(message) => {
                        if !self.handle(message) {
                            return;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => {
                        debug!("Watch loop inbox disconnected");
                        return;
                    }
                }
            }
        }
    }

    fn run_push(&self) {
        while let Ok(message) = self.inbox.recv() {
            if !self.handle(message) {
                return;
            }
        }
        debug!("Watch loop inbox disconnected");
    }

    /// Returns `false` when the loop should exit.
    fn handle(&self, message: LoopMessage) -> bool {
        if self.context.shutdown.is_triggered() {
            return false;
        }
        match message {
            LoopMessage::Sample(sample) => {
                debug!("Sample {} alive={}", sample.key, sample.alive);
                self.context.process_sample(&sample);
                true
            }
            LoopMessage::Shutdown => false,
        }
    }
}

/// Map any error raised while binding the probe to a bind failure.
pub(crate) fn bind_error(err: WatchError) -> WatchError {
    match err {
        WatchError::ProbeBindFailure { .. } | WatchError::PushUnsupported => err,
        other => WatchError::bind_failure(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InitialSamplePolicy;
    use crate::error::Result;
    use crate::identity::AppVersion;
    use crate::listener::{CallbackListener, ChannelListener};
    use crate::probe::SampleSink;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    struct FixedProbe(HashMap<String, Result<bool>>);

    impl LivenessProbe for FixedProbe {
        fn bind(&self) -> Result<()> {
            Ok(())
        }

        fn is_alive(&self, raw_key: &str) -> Result<bool> {
            match self.0.get(raw_key) {
                Some(Ok(alive)) => Ok(*alive),
                _ => Err(WatchError::ProbeQuery {
                    key: raw_key.to_string(),
                    message: "unavailable".to_string(),
                }),
            }
        }
    }

    struct CountingTable {
        inner: FixedProbe,
        queries: Arc<AtomicUsize>,
    }

    impl LivenessProbe for CountingTable {
        fn bind(&self) -> Result<()> {
            Ok(())
        }

        fn is_alive(&self, raw_key: &str) -> Result<bool> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.inner.is_alive(raw_key)
        }
    }

    fn context(probe: FixedProbe) -> WatchContext<AppVersion> {
        let registry = AppVersion::registry().unwrap();
        WatchContext {
            tracker: TransitionTracker::new(registry.identities(), InitialSamplePolicy::Report),
            registry,
            listeners: ListenerRegistry::new(),
            probe: Arc::new(probe),
            shutdown: ShutdownToken::new(),
        }
    }

    #[test]
    fn test_unknown_key_dropped_without_state_change() {
        let ctx = context(FixedProbe(HashMap::new()));
        let event = ctx.process_sample(&Sample::new("com.adobe.Lightroom9", true));
        assert!(event.is_none());
        for version in AppVersion::ALL {
            assert_eq!(
                ctx.tracker.state(&version),
                Some(crate::tracker::LivenessState::Unknown)
            );
        }
    }

    #[test]
    fn test_poll_all_skips_failed_queries() {
        let mut answers = HashMap::new();
        answers.insert(AppVersion::V3.as_str().to_string(), Ok(true));
        answers.insert(AppVersion::V5.as_str().to_string(), Ok(false));
        let ctx = context(FixedProbe(answers));

        let (listener, mut rx) = ChannelListener::new();
        ctx.listeners.register(Arc::new(listener));

        ctx.poll_all();

        assert_eq!(rx.try_recv().ok(), Some(ProcessEvent::Started(AppVersion::V3)));
        assert_eq!(rx.try_recv().ok(), Some(ProcessEvent::Stopped(AppVersion::V5)));
        assert!(rx.try_recv().is_err());
        assert_eq!(
            ctx.tracker.state(&AppVersion::V4),
            Some(crate::tracker::LivenessState::Unknown)
        );
    }

    #[test]
    fn test_poll_round_stops_when_listener_triggers_shutdown() {
        let mut answers = HashMap::new();
        for version in AppVersion::ALL {
            answers.insert(version.as_str().to_string(), Ok(true));
        }
        let queries = Arc::new(AtomicUsize::new(0));
        let table = CountingTable {
            inner: FixedProbe(answers),
            queries: queries.clone(),
        };
        let registry = AppVersion::registry().unwrap();
        let ctx = WatchContext {
            tracker: TransitionTracker::new(registry.identities(), InitialSamplePolicy::Report),
            registry,
            listeners: ListenerRegistry::new(),
            probe: Arc::new(table),
            shutdown: ShutdownToken::new(),
        };

        let token = ctx.shutdown.clone();
        let started = Arc::new(AtomicUsize::new(0));
        let counter = started.clone();
        ctx.listeners.register(Arc::new(CallbackListener::new(
            "stopper",
            move |_: &AppVersion| {
                counter.fetch_add(1, Ordering::SeqCst);
                token.trigger();
            },
            |_: &AppVersion| {},
        )));

        ctx.poll_all();

        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(queries.load(Ordering::SeqCst), 1);
        assert_eq!(
            ctx.tracker.state(&AppVersion::V4),
            Some(crate::tracker::LivenessState::Unknown)
        );
    }

    #[test]
    fn test_sample_after_shutdown_is_not_broadcast() {
        let ctx = context(FixedProbe(HashMap::new()));
        let (listener, mut rx) = ChannelListener::new();
        ctx.listeners.register(Arc::new(listener));

        ctx.shutdown.trigger();

        assert!(ctx
            .process_sample(&Sample::new(AppVersion::V3.as_str(), true))
            .is_none());
        assert!(rx.try_recv().is_err());
        assert_eq!(
            ctx.tracker.state(&AppVersion::V3),
            Some(crate::tracker::LivenessState::Unknown)
        );
    }

    #[test]
    fn test_push_loop_exits_on_shutdown_message() {
        let ctx = Arc::new(context(FixedProbe(HashMap::new())));
        let (listener, mut rx) = ChannelListener::new();
        ctx.listeners.register(Arc::new(listener));

        let (tx, inbox) = mpsc::channel();
        let sink = SampleSink::new(tx.clone());
        sink.send(AppVersion::V4.as_str(), true).unwrap();
        sink.send(AppVersion::V4.as_str(), true).unwrap();
        sink.send(AppVersion::V4.as_str(), false).unwrap();
        tx.send(LoopMessage::Shutdown).unwrap();

        WatchLoop {
            context: ctx,
            inbox,
            interval: None,
        }
        .run();

        assert_eq!(rx.try_recv().ok(), Some(ProcessEvent::Started(AppVersion::V4)));
        assert_eq!(rx.try_recv().ok(), Some(ProcessEvent::Stopped(AppVersion::V4)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_bind_error_normalization() {
        assert!(matches!(
            bind_error(WatchError::Other("no driver".into())),
            WatchError::ProbeBindFailure { .. }
        ));
        assert!(matches!(
            bind_error(WatchError::PushUnsupported),
            WatchError::PushUnsupported
        ));
    }
}
