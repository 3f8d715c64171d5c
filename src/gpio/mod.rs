//! Hardware ports for the door sensor and the opener control line.
//!
//! The core only sees the [`SensorPort`] and [`ActuatorPort`] traits. Two
//! backends exist: Linux sysfs GPIO for real boards and an in-memory
//! simulation for development hosts and tests.

pub mod simulation;
pub mod sysfs;

pub use simulation::{SimulatedActuator, SimulatedDoor, SimulatedSensor};
pub use sysfs::{SysfsActuator, SysfsSensor};

use crate::door::DoorState;
use crate::error::Result;

/// Reads the instantaneous door state.
pub trait SensorPort: Send {
    fn read(&mut self) -> Result<DoorState>;
}

/// Drives the opener's control line.
///
/// `set_active(true)` simulates holding the wall button down; `false`
/// returns the line to its idle level. Implementations must leave the line
/// idle when dropped.
pub trait ActuatorPort: Send {
    fn set_active(&mut self, active: bool) -> Result<()>;
}
