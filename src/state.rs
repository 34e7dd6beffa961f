//! Idle/active transition state machine.
//!
//! Pure state tracking with injected timestamps: the monitor loop reads the
//! clock and passes `Instant`s in, so transition logic is testable without
//! real time passing.

use std::time::Duration;
use std::time::Instant;

/// Stream activity phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No recent data on the input.
    Idle,
    /// Data has been seen within the idle timeout.
    Active,
}

/// Timing configuration for the state machine.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    /// Silence tolerated before an ACTIVE stream is reclassified IDLE.
    pub idle_timeout: Duration,

    /// Minimum idle dwell before the idle-to-active hook is eligible.
    pub idle_to_active: Duration,

    /// Minimum active dwell before the active-to-idle hook is eligible.
    pub active_to_idle: Duration,
}

/// A phase transition produced by the tracker.
///
/// The phase always flips when its trigger condition holds; `hook_eligible`
/// reports whether the exited phase's dwell time met the configured threshold,
/// which gates the hook but not the transition itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// IDLE -> ACTIVE, triggered by data arrival.
    Activated { hook_eligible: bool },
    /// ACTIVE -> IDLE, triggered by silence reaching the idle timeout.
    Idled { hook_eligible: bool },
}

/// Tracks the stream's phase and the timestamps transitions are judged by.
#[derive(Debug)]
pub struct StateTracker {
    thresholds: Thresholds,
    phase: Phase,
    phase_entered_at: Instant,
    last_data_at: Instant,
}

impl StateTracker {
    /// Create a tracker starting in IDLE at the given instant.
    pub fn new(thresholds: Thresholds, start: Instant) -> Self {
        Self {
            thresholds,
            phase: Phase::Idle,
            phase_entered_at: start,
            last_data_at: start,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Evaluate the IDLE -> ACTIVE transition at the moment data arrived.
    ///
    /// Arrival of data always means the stream is no longer idle, so the
    /// phase flips regardless of the hook gate. While already ACTIVE this
    /// only refreshes `last_data_at`.
    pub fn on_data(&mut self, now: Instant) -> Option<Edge> {
        let edge = match self.phase {
            Phase::Idle => {
                let dwell = now.duration_since(self.phase_entered_at);
                self.phase = Phase::Active;
                self.phase_entered_at = now;
                Some(Edge::Activated {
                    hook_eligible: dwell >= self.thresholds.idle_to_active,
                })
            }
            Phase::Active => None,
        };

        // Refreshed strictly after the dwell evaluation above, so the
        // evaluation sees the previous phase's duration.
        self.last_data_at = now;

        edge
    }

    /// Evaluate the ACTIVE -> IDLE transition on a poll tick.
    ///
    /// Idleness is defined by absence of data, so this runs every tick, not
    /// just when data arrives. The active dwell is measured up to `now`, the
    /// instant silence was detected, and therefore includes the trailing
    /// silence period.
    pub fn on_tick(&mut self, now: Instant) -> Option<Edge> {
        if self.phase != Phase::Active {
            return None;
        }

        let silence = now.duration_since(self.last_data_at);
        if silence < self.thresholds.idle_timeout {
            return None;
        }

        let dwell = now.duration_since(self.phase_entered_at);
        self.phase = Phase::Idle;
        self.phase_entered_at = now;
        Some(Edge::Idled {
            hook_eligible: dwell >= self.thresholds.active_to_idle,
        })
    }
}
