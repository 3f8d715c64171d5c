//! Door state and operating mode values.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Physical state of the door as reported by the sensor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    Open,
    Closed,
}

impl DoorState {
    pub fn is_open(self) -> bool {
        self == DoorState::Open
    }
}

/// Operator-selected presence mode.
///
/// In `Away` mode any open door is alert-worthy regardless of rule windows.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Home,
    Away,
}
