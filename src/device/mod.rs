//! The garage door device: poll loop and opener control.

pub mod actuator;
pub mod garage;

pub use actuator::ActuatorController;
pub use garage::{GarageManager, ManagerSettings};
