//! Timestamp rollover tracking
//!
//! Extended format CRC-S5 covers a 16-bit rollover count that is never
//! transmitted. It is reconstructed here by watching producer time stamps
//! wrap. The running state must advance exactly once per message in capture
//! order; replay passes read the annotation cached on the first pass.

use cipsafety_protocol::{ConnectionTriad, TransportDirection};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a captured message (its frame number)
pub type MessageId = u64;

/// Time state is tracked separately for each direction of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionKey {
    pub triad: ConnectionTriad,
    pub direction: TransportDirection,
}

impl ConnectionKey {
    #[must_use]
    pub fn new(triad: ConnectionTriad, direction: TransportDirection) -> Self {
        Self { triad, direction }
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.triad, self.direction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingPhase {
    #[default]
    NoDataSeen,
    /// Only zero time stamps so far: no time coordination has completed
    TrackingZero,
    Tracking,
}

/// Running time stamp and rollover for one connection direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionTimeState {
    pub running_time_stamp: u16,
    pub running_rollover: u16,
    pub seen_non_zero_time_stamp: bool,
    pub phase: TrackingPhase,
}

impl ConnectionTimeState {
    /// Advance the state with the next time stamp in capture order.
    ///
    /// Must be called once per message. Calling it again for the same message
    /// counts a wrap that never happened.
    pub fn observe(&mut self, time_stamp: u16) -> PacketTimeAnnotation {
        if time_stamp == 0 && !self.seen_non_zero_time_stamp {
            self.phase = TrackingPhase::TrackingZero;
        } else {
            if time_stamp < self.running_time_stamp {
                self.running_rollover = self.running_rollover.wrapping_add(1);
            }
            self.seen_non_zero_time_stamp = true;
            self.running_time_stamp = time_stamp;
            self.phase = TrackingPhase::Tracking;
        }

        PacketTimeAnnotation {
            rollover_value: self.running_rollover,
            time_stamp,
        }
    }
}

/// Rollover value in effect for one message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketTimeAnnotation {
    pub rollover_value: u16,
    pub time_stamp: u16,
}

/// Per-connection time state plus the per-message annotation cache
#[derive(Debug, Default)]
pub struct RolloverTracker {
    states: DashMap<ConnectionKey, ConnectionTimeState>,
    /// One frame can carry items for several connections
    annotations: DashMap<(ConnectionKey, MessageId), PacketTimeAnnotation>,
}

impl RolloverTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Annotation for `message` on `key`, computing it on first sight.
    ///
    /// The first call for a message advances the connection state; later calls
    /// return the cached annotation and leave the state alone. First-sight
    /// calls for one key must arrive in capture order.
    pub fn annotate(
        &self,
        key: ConnectionKey,
        message: MessageId,
        time_stamp: u16,
    ) -> PacketTimeAnnotation {
        // Annotation entry lock first, then state lock
        match self.annotations.entry((key, message)) {
            Entry::Occupied(cached) => *cached.get(),
            Entry::Vacant(slot) => {
                let annotation = {
                    let mut state = self.states.entry(key).or_default();
                    let before = state.running_rollover;
                    let annotation = state.observe(time_stamp);
                    if annotation.rollover_value != before {
                        tracing::debug!(
                            "Rollover on {} at message {}: {} -> {}",
                            key,
                            message,
                            before,
                            annotation.rollover_value
                        );
                    }
                    annotation
                };
                slot.insert(annotation);
                annotation
            }
        }
    }

    /// Cached annotation, if the message was seen before on `key`
    #[must_use]
    pub fn annotation(
        &self,
        key: &ConnectionKey,
        message: MessageId,
    ) -> Option<PacketTimeAnnotation> {
        self.annotations.get(&(*key, message)).map(|a| *a)
    }

    /// Current state of one connection direction
    #[must_use]
    pub fn state(&self, key: &ConnectionKey) -> Option<ConnectionTimeState> {
        self.states.get(key).map(|s| *s)
    }

    /// Number of annotated messages
    #[must_use]
    pub fn annotated(&self) -> usize {
        self.annotations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key() -> ConnectionKey {
        ConnectionKey::new(
            ConnectionTriad::new(1, 2, 3),
            TransportDirection::TargetToOriginator,
        )
    }

    #[test]
    fn test_leading_zeros_keep_rollover() {
        let mut state = ConnectionTimeState::default();
        assert_eq!(state.phase, TrackingPhase::NoDataSeen);
        assert_eq!(state.observe(0).rollover_value, 0);
        assert_eq!(state.observe(0).rollover_value, 0);
        assert_eq!(state.phase, TrackingPhase::TrackingZero);
        assert!(!state.seen_non_zero_time_stamp);

        assert_eq!(state.observe(10).rollover_value, 0);
        assert_eq!(state.phase, TrackingPhase::Tracking);
        // zero after tracking started is a wrap
        assert_eq!(state.observe(0).rollover_value, 1);
    }

    #[test]
    fn test_rollover_monotonic() {
        let mut state = ConnectionTimeState::default();
        let stamps = [100u16, 30_000, 65_000, 5, 40_000, 65_535, 1, 2, 60_000, 10];
        let pairs: Vec<(u16, u16)> = stamps
            .iter()
            .map(|&ts| {
                let a = state.observe(ts);
                (a.rollover_value, a.time_stamp)
            })
            .collect();

        for window in pairs.windows(2) {
            assert!(window[0] < window[1], "{:?} not increasing", window);
            let expected = if window[1].1 < window[0].1 {
                window[0].0 + 1
            } else {
                window[0].0
            };
            assert_eq!(window[1].0, expected);
        }
        assert_eq!(state.running_rollover, 3);
    }

    #[test]
    fn test_rollover_counter_wraps() {
        let mut state = ConnectionTimeState {
            running_time_stamp: 500,
            running_rollover: u16::MAX,
            seen_non_zero_time_stamp: true,
            phase: TrackingPhase::Tracking,
        };
        assert_eq!(state.observe(1).rollover_value, 0);
    }

    #[test]
    fn test_replay_reads_cache() {
        let tracker = RolloverTracker::new();
        let stamps = [40_000u16, 60_000, 100, 200, 50_000, 7];

        let first: Vec<_> = stamps
            .iter()
            .enumerate()
            .map(|(i, &ts)| tracker.annotate(key(), i as MessageId, ts))
            .collect();
        let state_after_first = tracker.state(&key());

        for _ in 0..3 {
            let replay: Vec<_> = stamps
                .iter()
                .enumerate()
                .map(|(i, &ts)| tracker.annotate(key(), i as MessageId, ts))
                .collect();
            assert_eq!(replay, first);
        }
        assert_eq!(tracker.state(&key()), state_after_first);
        assert_eq!(tracker.annotated(), stamps.len());
        assert_eq!(tracker.annotation(&key(), 2).map(|a| a.rollover_value), Some(1));
    }

    #[test]
    fn test_re_mutating_on_replay_diverges() {
        // What happens without the annotation cache
        let mut state = ConnectionTimeState::default();
        let stamps = [40_000u16, 60_000, 100];
        let first: Vec<_> = stamps.iter().map(|&ts| state.observe(ts)).collect();
        let second: Vec<_> = stamps.iter().map(|&ts| state.observe(ts)).collect();
        assert_eq!(first[0].rollover_value, 0);
        assert_ne!(first, second);
        assert_eq!(second[0].rollover_value, 1);
        assert_eq!(second[2].rollover_value, 2);
    }

    #[test]
    fn test_directions_are_independent() {
        let tracker = RolloverTracker::new();
        let reverse = ConnectionKey::new(key().triad, key().direction.reverse());
        tracker.annotate(key(), 1, 50_000);
        tracker.annotate(key(), 2, 10);
        let other = tracker.annotate(reverse, 3, 10);
        assert_eq!(other.rollover_value, 0);
        assert_eq!(tracker.state(&key()).map(|s| s.running_rollover), Some(1));
    }

    #[test]
    fn test_shared_frame_number_across_connections() {
        let tracker = RolloverTracker::new();
        let other = ConnectionKey::new(ConnectionTriad::new(9, 9, 9), key().direction);

        // Both connections carry an item in frames 1 and 2
        tracker.annotate(key(), 1, 50_000);
        tracker.annotate(other, 1, 60_000);
        assert_eq!(tracker.annotate(key(), 2, 10).rollover_value, 1);
        assert_eq!(tracker.annotate(other, 2, 20).rollover_value, 1);

        assert_eq!(tracker.state(&other).map(|s| s.running_time_stamp), Some(20));
        assert_eq!(
            tracker.annotation(&other, 1),
            Some(PacketTimeAnnotation {
                rollover_value: 0,
                time_stamp: 60_000,
            })
        );
        assert_eq!(tracker.annotated(), 4);
    }

    #[test]
    fn test_concurrent_replay_mutates_once() {
        let tracker = Arc::new(RolloverTracker::new());
        for (i, ts) in [1000u16, 2000, 3000].into_iter().enumerate() {
            tracker.annotate(key(), i as MessageId, ts);
        }

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let tracker = Arc::clone(&tracker);
                scope.spawn(move || {
                    for (i, ts) in [1000u16, 2000, 3000].into_iter().enumerate() {
                        let a = tracker.annotate(key(), i as MessageId, ts);
                        assert_eq!(a.rollover_value, 0);
                    }
                });
            }
        });

        let state = tracker.state(&key()).unwrap();
        assert_eq!(state.running_rollover, 0);
        assert_eq!(state.running_time_stamp, 3000);
    }
}
