//! Opener pulse arbitration.
//!
//! A pulse holds the control line active for a fixed duration on its own
//! task so neither the poll loop nor the command listener waits for it.
//! While a pulse is in flight further triggers are ignored, never queued.

use crate::error::{GarageError, Result};
use crate::gpio::ActuatorPort;
use log::{error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

pub struct ActuatorController {
    port: Arc<Mutex<Box<dyn ActuatorPort>>>,
    in_flight: Arc<AtomicBool>,
    pulse: Duration,
    faults: mpsc::UnboundedSender<GarageError>,
}

impl ActuatorController {
    /// Wrap an actuator port. Faults raised by pulse tasks are delivered on
    /// the returned receiver.
    pub fn new(
        port: Box<dyn ActuatorPort>,
        pulse: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<GarageError>) {
        let (faults, fault_rx) = mpsc::unbounded_channel();
        (
            Self {
                port: Arc::new(Mutex::new(port)),
                in_flight: Arc::new(AtomicBool::new(false)),
                pulse,
                faults,
            },
            fault_rx,
        )
    }

    /// Start a pulse unless one is already running.
    ///
    /// Returns `true` if a new pulse was started.
    pub fn trigger(&self) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("Pulse already in progress, ignoring trigger");
            return false;
        }

        let port = self.port.clone();
        let in_flight = self.in_flight.clone();
        let faults = self.faults.clone();
        let pulse = self.pulse;

        tokio::spawn(async move {
            let result = run_pulse(&port, pulse).await;
            in_flight.store(false, Ordering::SeqCst);
            if let Err(e) = result {
                error!("Opener pulse failed: {}", e);
                let _ = faults.send(e);
            }
        });
        true
    }

    pub fn is_pulsing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Drive the control line idle. Used on every exit path.
    pub fn release(&self) {
        if let Err(e) = self.port.lock().set_active(false) {
            warn!("Failed to release opener control line: {}", e);
        }
    }
}

async fn run_pulse(port: &Mutex<Box<dyn ActuatorPort>>, pulse: Duration) -> Result<()> {
    info!("Pulsing opener for {} ms", pulse.as_millis());
    port.lock().set_active(true)?;
    tokio::time::sleep(pulse).await;
    port.lock().set_active(false)
}
