//! Door episode tracking.
//!
//! An episode is the uninterrupted interval during which the door holds one
//! state. Every sample either extends the current episode or closes it and
//! opens a new one.

use super::state::DoorState;
use log::info;
use std::time::Duration;
use tokio::time::Instant;

/// The interval during which the door has held one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Episode {
    pub state: DoorState,
    pub started_at: Instant,
}

/// Result of feeding one sensor reading into the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub state: DoorState,
    /// Zero exactly when `transitioned` is set.
    pub time_in_state: Duration,
    pub transitioned: bool,
    /// Length of the episode that this sample closed, if any.
    pub previous_duration: Option<Duration>,
}

/// Tracks the current [`Episode`] from a stream of sensor readings.
#[derive(Debug)]
pub struct DoorStateTracker {
    name: String,
    episode: Episode,
}

impl DoorStateTracker {
    /// Start tracking from the first sensor reading.
    pub fn new(name: impl Into<String>, initial: DoorState, now: Instant) -> Self {
        let name = name.into();
        info!("Initial state of \"{}\" is {}", name, initial);
        Self {
            name,
            episode: Episode {
                state: initial,
                started_at: now,
            },
        }
    }

    /// Feed a sensor reading taken at `now`.
    pub fn observe(&mut self, state: DoorState, now: Instant) -> Sample {
        let elapsed = now.saturating_duration_since(self.episode.started_at);

        if state != self.episode.state {
            info!(
                "State of {} changed to {} after {:.0} sec",
                self.name,
                state,
                elapsed.as_secs_f64()
            );
            self.episode = Episode {
                state,
                started_at: now,
            };
            return Sample {
                state,
                time_in_state: Duration::ZERO,
                transitioned: true,
                previous_duration: Some(elapsed),
            };
        }

        Sample {
            state,
            time_in_state: elapsed,
            transitioned: false,
            previous_duration: None,
        }
    }

    /// State of the current episode, i.e. the last sampled state.
    pub fn state(&self) -> DoorState {
        self.episode.state
    }

    pub fn episode(&self) -> Episode {
        self.episode
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
