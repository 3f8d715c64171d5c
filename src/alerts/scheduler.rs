//! Per-episode alert scheduling.

use super::rule::AlertRule;
use crate::door::{DoorState, Mode};
use log::info;
use std::time::Duration;

/// Recipient of the away alert when no armed rule covers it.
pub const AWAY_RECIPIENT: &str = "firebase";

/// An alert that has just fired and must be handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredAlert {
    pub recipients: Vec<String>,
    pub state: DoorState,
    pub time_in_state: Duration,
    /// Fired by the away-mode override rather than the rule's window.
    pub away_override: bool,
}

/// Evaluates alert rules against the current episode.
///
/// Each rule carries an armed flag that is cleared when it fires and only
/// re-armed by [`AlertScheduler::start_episode`], so a rule fires at most
/// once per episode. Away mode keeps its own episode flag so an open door
/// alerts once even when no rule is configured.
#[derive(Debug)]
pub struct AlertScheduler {
    rules: Vec<AlertRule>,
    fired: Vec<bool>,
    away_fired: bool,
}

impl AlertScheduler {
    pub fn new(rules: Vec<AlertRule>) -> Self {
        let fired = vec![false; rules.len()];
        Self {
            rules,
            fired,
            away_fired: false,
        }
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    /// Re-arm every rule. Called on each door state transition.
    pub fn start_episode(&mut self) {
        self.fired.iter_mut().for_each(|f| *f = false);
        self.away_fired = false;
    }

    /// Whether the away alert has gone out in the current episode.
    pub fn away_fired(&self) -> bool {
        self.away_fired
    }

    /// Whether rule `index` has already fired in the current episode.
    pub fn has_fired(&self, index: usize) -> bool {
        self.fired.get(index).copied().unwrap_or(false)
    }

    /// Evaluate all armed rules for one poll tick.
    ///
    /// `hour` is the local hour of day (0-23).
    pub fn evaluate(
        &mut self,
        state: DoorState,
        time_in_state: Duration,
        mode: Mode,
        hour: u32,
    ) -> Vec<FiredAlert> {
        let mut alerts = Vec::new();
        let away_override = mode == Mode::Away && state == DoorState::Open;

        for (rule, fired) in self.rules.iter().zip(self.fired.iter_mut()) {
            if *fired {
                continue;
            }

            let scheduled = rule.in_window(hour)
                && state == rule.trigger_state
                && time_in_state > rule.threshold();

            if away_override || scheduled {
                *fired = true;
                info!(
                    "Alert fired for {} door after {} sec ({})",
                    state,
                    time_in_state.as_secs(),
                    if away_override { "away mode" } else { "scheduled" }
                );
                alerts.push(FiredAlert {
                    recipients: rule.recipients.clone(),
                    state,
                    time_in_state,
                    away_override,
                });
            }
        }

        if away_override && !self.away_fired {
            self.away_fired = true;
            if !alerts.iter().any(|a| a.away_override) {
                info!(
                    "Away alert for {} door after {} sec",
                    state,
                    time_in_state.as_secs()
                );
                alerts.push(FiredAlert {
                    recipients: vec![AWAY_RECIPIENT.to_string()],
                    state,
                    time_in_state,
                    away_override,
                });
            }
        }

        alerts
    }
}
