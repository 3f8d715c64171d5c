//! Alert rule definitions as loaded from the alerts file.

use crate::door::DoorState;
use crate::error::{GarageError, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// A time-windowed alert rule.
///
/// Fires once per episode when the door has been in `trigger_state` for
/// longer than `threshold_secs` while the local hour lies in
/// `[start_hour, end_hour]`. The window wraps midnight when
/// `start_hour > end_hour`, and covers the whole day when both are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRule {
    #[serde(alias = "start")]
    pub start_hour: u32,
    #[serde(alias = "end")]
    pub end_hour: u32,
    #[serde(alias = "time")]
    pub threshold_secs: u64,
    #[serde(alias = "state")]
    pub trigger_state: DoorState,
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl AlertRule {
    /// Whether `hour` (0-23) falls inside this rule's window.
    pub fn in_window(&self, hour: u32) -> bool {
        let (start, end) = (self.start_hour, self.end_hour);
        if start == end {
            true
        } else if start < end {
            hour >= start && hour <= end
        } else {
            hour >= start || hour <= end
        }
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.threshold_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_hour > 23 || self.end_hour > 23 {
            return Err(GarageError::Config(format!(
                "alert window {}-{} must use hours 0-23",
                self.start_hour, self.end_hour
            )));
        }
        Ok(())
    }
}

/// Load and validate rules from a JSON array file.
///
/// A missing file yields no rules; a present but malformed file is an error.
pub fn load_rules(path: &Path) -> Result<Vec<AlertRule>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No alerts file at {:?}, running without alert rules", path);
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    parse_rules(&bytes)
}

pub fn parse_rules(bytes: &[u8]) -> Result<Vec<AlertRule>> {
    let rules: Vec<AlertRule> = serde_json::from_slice(bytes)?;
    for rule in &rules {
        rule.validate()?;
    }
    Ok(rules)
}
