//! Simulated door for hosts without GPIO.
//!
//! A [`SimulatedDoor`] is shared between a sensor and an actuator: releasing
//! the simulated button after a press toggles the door, the way a real
//! opener reacts to the wall button.

use super::{ActuatorPort, SensorPort};
use crate::door::DoorState;
use crate::error::Result;
use log::info;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Shared simulated door state.
#[derive(Debug, Default)]
pub struct SimulatedDoor {
    open: AtomicBool,
    presses: AtomicU32,
}

impl SimulatedDoor {
    pub fn new(initial: DoorState) -> Arc<Self> {
        Arc::new(Self {
            open: AtomicBool::new(initial.is_open()),
            presses: AtomicU32::new(0),
        })
    }

    pub fn state(&self) -> DoorState {
        if self.open.load(Ordering::SeqCst) {
            DoorState::Open
        } else {
            DoorState::Closed
        }
    }

    pub fn set_state(&self, state: DoorState) {
        self.open.store(state.is_open(), Ordering::SeqCst);
    }

    /// Number of completed button presses.
    pub fn presses(&self) -> u32 {
        self.presses.load(Ordering::SeqCst)
    }

    fn press_released(&self) {
        self.presses.fetch_add(1, Ordering::SeqCst);
        let was_open = self.open.fetch_xor(true, Ordering::SeqCst);
        info!(
            "[Sim] Door {}",
            if was_open { "closed" } else { "opened" }
        );
    }
}

pub struct SimulatedSensor {
    door: Arc<SimulatedDoor>,
}

impl SimulatedSensor {
    pub fn new(door: Arc<SimulatedDoor>) -> Self {
        Self { door }
    }
}

impl SensorPort for SimulatedSensor {
    fn read(&mut self) -> Result<DoorState> {
        Ok(self.door.state())
    }
}

pub struct SimulatedActuator {
    door: Arc<SimulatedDoor>,
    active: bool,
}

impl SimulatedActuator {
    pub fn new(door: Arc<SimulatedDoor>) -> Self {
        Self {
            door,
            active: false,
        }
    }
}

impl ActuatorPort for SimulatedActuator {
    fn set_active(&mut self, active: bool) -> Result<()> {
        if self.active && !active {
            self.door.press_released();
        }
        self.active = active;
        Ok(())
    }
}
