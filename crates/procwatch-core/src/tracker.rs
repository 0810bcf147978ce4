//! Per-identity liveness state machine.
//!
//! Raw samples go in, events come out only when the state actually changes.
//! Each identity has its own lock, so samples for different identities never
//! contend with each other.

use crate::config::InitialSamplePolicy;
use crate::error::{Result, WatchError};
use crate::identity::Identity;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Tracked liveness of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessState {
    /// No sample seen yet. Never re-entered.
    #[default]
    Unknown,
    Running,
    Stopped,
}

/// Which way an identity transitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Started,
    Stopped,
}

/// A state change for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "identity", rename_all = "snake_case")]
pub enum ProcessEvent<I> {
    Started(I),
    Stopped(I),
}

impl<I> ProcessEvent<I> {
    pub fn identity(&self) -> &I {
        match self {
            ProcessEvent::Started(identity) | ProcessEvent::Stopped(identity) => identity,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            ProcessEvent::Started(_) => EventKind::Started,
            ProcessEvent::Stopped(_) => EventKind::Stopped,
        }
    }
}

/// Transition tracker over a fixed set of identities.
///
/// The identity set is fixed at construction; only the per-identity state
/// behind each lock changes afterwards.
pub struct TransitionTracker<I: Identity> {
    states: HashMap<I, Mutex<LivenessState>>,
    policy: InitialSamplePolicy,
}

impl<I: Identity> TransitionTracker<I> {
    /// Create a tracker with every identity in `Unknown`.
    pub fn new(identities: impl IntoIterator<Item = I>, policy: InitialSamplePolicy) -> Self {
        Self {
            states: identities
                .into_iter()
                .map(|identity| (identity, Mutex::new(LivenessState::Unknown)))
                .collect(),
            policy,
        }
    }

    /// Feed one liveness sample.
    ///
    /// Returns the event to broadcast, if the sample changed the state. The
    /// read-then-write decision happens under the identity's lock.
    pub fn observe(&self, identity: &I, alive: bool) -> Result<Option<ProcessEvent<I>>> {
        let slot = self
            .states
            .get(identity)
            .ok_or_else(|| WatchError::UnknownIdentity {
                key: identity.key().to_string(),
            })?;

        let mut state = slot.lock();
        let previous = *state;
        let next = if alive {
            LivenessState::Running
        } else {
            LivenessState::Stopped
        };

        if previous == next {
            return Ok(None);
        }
        *state = next;
        drop(state);

        let fire = match (previous, self.policy) {
            (LivenessState::Unknown, InitialSamplePolicy::Baseline) => false,
            (LivenessState::Unknown, InitialSamplePolicy::SuppressInitialStop) => alive,
            _ => true,
        };

        debug!(
            "{}: {:?} -> {:?}{}",
            identity,
            previous,
            next,
            if fire { "" } else { " (silent)" }
        );

        if !fire {
            return Ok(None);
        }

        Ok(Some(if alive {
            ProcessEvent::Started(identity.clone())
        } else {
            ProcessEvent::Stopped(identity.clone())
        }))
    }

    /// Current state of an identity, or `None` if it is not tracked.
    pub fn state(&self, identity: &I) -> Option<LivenessState> {
        self.states.get(identity).map(|slot| *slot.lock())
    }

    pub fn policy(&self) -> InitialSamplePolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AppVersion;
    use std::sync::Arc;

    fn tracker(policy: InitialSamplePolicy) -> TransitionTracker<AppVersion> {
        TransitionTracker::new(AppVersion::ALL, policy)
    }

    fn feed(
        tracker: &TransitionTracker<AppVersion>,
        identity: AppVersion,
        samples: &[bool],
    ) -> Vec<EventKind> {
        samples
            .iter()
            .filter_map(|&alive| tracker.observe(&identity, alive).unwrap())
            .map(|event| event.kind())
            .collect()
    }

    /// Count edges after collapsing consecutive duplicates.
    fn expected_edges(samples: &[bool]) -> (usize, usize) {
        let mut started = 0;
        let mut stopped = 0;
        for pair in samples.windows(2) {
            match (pair[0], pair[1]) {
                (false, true) => started += 1,
                (true, false) => stopped += 1,
                _ => {}
            }
        }
        (started, stopped)
    }

    #[test]
    fn test_initial_state_unknown() {
        let tracker = tracker(InitialSamplePolicy::Report);
        assert_eq!(tracker.state(&AppVersion::V3), Some(LivenessState::Unknown));
    }

    #[test]
    fn test_scenario_suppress_initial_stop() {
        let tracker = tracker(InitialSamplePolicy::SuppressInitialStop);
        let events = feed(&tracker, AppVersion::V3, &[false, false, true, true, false]);
        assert_eq!(events, vec![EventKind::Started, EventKind::Stopped]);
        assert_eq!(tracker.state(&AppVersion::V3), Some(LivenessState::Stopped));
    }

    #[test]
    fn test_scenario_report() {
        let tracker = tracker(InitialSamplePolicy::Report);
        let events = feed(&tracker, AppVersion::V3, &[false, false, true, true, false]);
        assert_eq!(
            events,
            vec![EventKind::Stopped, EventKind::Started, EventKind::Stopped]
        );
    }

    #[test]
    fn test_first_start_fires_unless_baseline() {
        let suppress = tracker(InitialSamplePolicy::SuppressInitialStop);
        assert_eq!(
            feed(&suppress, AppVersion::V4, &[true]),
            vec![EventKind::Started]
        );

        let baseline = tracker(InitialSamplePolicy::Baseline);
        assert!(feed(&baseline, AppVersion::V4, &[true]).is_empty());
        assert_eq!(baseline.state(&AppVersion::V4), Some(LivenessState::Running));
        assert_eq!(
            feed(&baseline, AppVersion::V4, &[true, false]),
            vec![EventKind::Stopped]
        );
    }

    #[test]
    fn test_repeated_samples_absorbed() {
        let tracker = tracker(InitialSamplePolicy::Report);
        assert!(tracker.observe(&AppVersion::V5, true).unwrap().is_some());
        assert!(tracker.observe(&AppVersion::V5, true).unwrap().is_none());
        assert!(tracker.observe(&AppVersion::V5, true).unwrap().is_none());
        assert!(tracker.observe(&AppVersion::V5, false).unwrap().is_some());
        assert!(tracker.observe(&AppVersion::V5, false).unwrap().is_none());
    }

    #[test]
    fn test_event_count_matches_edges() {
        let sequences: [&[bool]; 4] = [
            &[true, false, true, false, true],
            &[true, true, true, false, false, true],
            &[false, true, false, false, false, true, true, false],
            &[true],
        ];

        for samples in sequences {
            let tracker = tracker(InitialSamplePolicy::Baseline);
            let events = feed(&tracker, AppVersion::V3, samples);
            let started = events.iter().filter(|k| **k == EventKind::Started).count();
            let stopped = events.iter().filter(|k| **k == EventKind::Stopped).count();
            assert_eq!((started, stopped), expected_edges(samples), "{:?}", samples);
        }
    }

    #[test]
    fn test_identities_are_independent() {
        let tracker = tracker(InitialSamplePolicy::Report);
        tracker.observe(&AppVersion::V3, true).unwrap();
        assert_eq!(tracker.state(&AppVersion::V3), Some(LivenessState::Running));
        assert_eq!(tracker.state(&AppVersion::V4), Some(LivenessState::Unknown));
    }

    #[test]
    fn test_untracked_identity_rejected() {
        let tracker = TransitionTracker::new([AppVersion::V3], InitialSamplePolicy::Report);
        let err = tracker.observe(&AppVersion::V4, true).unwrap_err();
        assert!(matches!(err, WatchError::UnknownIdentity { .. }));
        assert_eq!(tracker.state(&AppVersion::V4), None);
        assert_eq!(tracker.state(&AppVersion::V3), Some(LivenessState::Unknown));
    }

    #[test]
    fn test_concurrent_samples_fire_once() {
        let tracker = Arc::new(tracker(InitialSamplePolicy::Report));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    tracker
                        .observe(&AppVersion::V5, true)
                        .unwrap()
                        .map_or(0, |_| 1)
                })
            })
            .collect();

        let fired: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_event_serialization() {
        let event = ProcessEvent::Started(AppVersion::V4);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"started","identity":"V4"}"#);
        assert_eq!(event.identity(), &AppVersion::V4);
    }
}
