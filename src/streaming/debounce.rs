//! Wall-clock debounce gate for transcript emission.
//!
//! Suppresses any interim or final event arriving within the configured
//! interval of the previous emission. Suppressed events are discarded, not
//! deferred: a final landing inside the window is lost. This matches the
//! production service's observed behavior and trades occasional loss for a
//! hard ceiling on event rate.

use crate::clock::Clock;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimum-spacing gate over emitted events.
pub struct DebounceGate {
    clock: Arc<dyn Clock>,
    interval: Duration,
    last_emit: Option<Instant>,
}

impl DebounceGate {
    /// Creates a gate with the given minimum spacing.
    pub fn new(clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            clock,
            interval,
            last_emit: None,
        }
    }

    /// Returns true if an event may be emitted now, recording the emission.
    ///
    /// A rejected event leaves the window unchanged.
    pub fn admit(&mut self) -> bool {
        let now = self.clock.now();
        if let Some(last) = self.last_emit {
            if now.duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_emit = Some(now);
        true
    }

    /// Elapsed time since the last admitted event, if any.
    pub fn since_last_emit(&self) -> Option<Duration> {
        self.last_emit
            .map(|last| self.clock.now().duration_since(last))
    }

    /// Clears the window (stream restart).
    pub fn reset(&mut self) {
        self.last_emit = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn gate_with_clock() -> (DebounceGate, MockClock) {
        let clock = MockClock::new();
        let gate = DebounceGate::new(Arc::new(clock.clone()), Duration::from_millis(100));
        (gate, clock)
    }

    #[test]
    fn test_first_event_admitted() {
        let (mut gate, _clock) = gate_with_clock();
        assert!(gate.admit());
    }

    #[test]
    fn test_event_inside_window_rejected() {
        let (mut gate, clock) = gate_with_clock();
        assert!(gate.admit());

        clock.advance(Duration::from_millis(50));
        assert!(!gate.admit());
    }

    #[test]
    fn test_event_after_window_admitted() {
        let (mut gate, clock) = gate_with_clock();
        assert!(gate.admit());

        clock.advance(Duration::from_millis(100));
        assert!(gate.admit());
    }

    #[test]
    fn test_rejection_does_not_extend_window() {
        let (mut gate, clock) = gate_with_clock();
        assert!(gate.admit());

        clock.advance(Duration::from_millis(60));
        assert!(!gate.admit());

        // 60 + 40 = 100ms since the admitted event; the rejection at 60ms
        // must not have restarted the window
        clock.advance(Duration::from_millis(40));
        assert!(gate.admit());
    }

    #[test]
    fn test_since_last_emit() {
        let (mut gate, clock) = gate_with_clock();
        assert!(gate.since_last_emit().is_none());

        gate.admit();
        clock.advance(Duration::from_millis(250));
        assert_eq!(gate.since_last_emit(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_reset_reopens_gate() {
        let (mut gate, clock) = gate_with_clock();
        assert!(gate.admit());
        clock.advance(Duration::from_millis(10));

        gate.reset();
        assert!(gate.since_last_emit().is_none());
        assert!(gate.admit());
    }
}
