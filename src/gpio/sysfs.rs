//! Linux sysfs GPIO backend.
//!
//! Lines are exported through `<base>/export` and driven via
//! `<base>/gpioN/{direction,value}`. The base defaults to `/sys/class/gpio`.

use super::{ActuatorPort, SensorPort};
use crate::door::DoorState;
use crate::error::{GarageError, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SYSFS_GPIO: &str = "/sys/class/gpio";

/// A single exported sysfs GPIO line.
#[derive(Debug)]
struct GpioLine {
    pin: u32,
    dir: PathBuf,
}

impl GpioLine {
    fn export(base: &Path, pin: u32) -> Result<Self> {
        let dir = base.join(format!("gpio{}", pin));
        if !dir.exists() {
            debug!("Exporting GPIO {}", pin);
            fs::write(base.join("export"), pin.to_string()).map_err(|source| gpio_err(pin, source))?;
        }
        Ok(Self { pin, dir })
    }

    fn set_direction(&self, direction: &str) -> Result<()> {
        fs::write(self.dir.join("direction"), direction).map_err(|source| gpio_err(self.pin, source))
    }

    fn read(&self) -> Result<bool> {
        let raw = fs::read_to_string(self.dir.join("value")).map_err(|source| gpio_err(self.pin, source))?;
        match raw.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(GarageError::SensorRead(format!(
                "GPIO {} returned unexpected value {:?}",
                self.pin, other
            ))),
        }
    }

    fn write(&self, high: bool) -> Result<()> {
        fs::write(self.dir.join("value"), if high { "1" } else { "0" })
            .map_err(|source| gpio_err(self.pin, source))
    }
}

fn gpio_err(pin: u32, source: std::io::Error) -> GarageError {
    GarageError::Gpio { pin, source }
}

/// Reed switch input. A high level means the door is open.
#[derive(Debug)]
pub struct SysfsSensor {
    line: GpioLine,
}

impl SysfsSensor {
    pub fn open(base: impl AsRef<Path>, pin: u32) -> Result<Self> {
        let line = GpioLine::export(base.as_ref(), pin)?;
        line.set_direction("in")?;
        info!("Configured GPIO {} as door sensor input", pin);
        Ok(Self { line })
    }
}

impl SensorPort for SysfsSensor {
    fn read(&mut self) -> Result<DoorState> {
        let high = self
            .line
            .read()
            .map_err(|e| GarageError::SensorRead(e.to_string()))?;
        Ok(if high { DoorState::Open } else { DoorState::Closed })
    }
}

/// Relay control output. Idle high, pulled low while "pressed".
#[derive(Debug)]
pub struct SysfsActuator {
    line: GpioLine,
}

impl SysfsActuator {
    pub fn open(base: impl AsRef<Path>, pin: u32) -> Result<Self> {
        let line = GpioLine::export(base.as_ref(), pin)?;
        // "high" sets the direction and the initial level atomically.
        line.set_direction("high")?;
        info!("Configured GPIO {} as opener control output", pin);
        Ok(Self { line })
    }
}

impl ActuatorPort for SysfsActuator {
    fn set_active(&mut self, active: bool) -> Result<()> {
        self.line
            .write(!active)
            .map_err(|e| GarageError::Actuator(e.to_string()))
    }
}

impl Drop for SysfsActuator {
    fn drop(&mut self) {
        if let Err(e) = self.line.write(true) {
            warn!("Failed to return GPIO {} to idle: {}", self.line.pin, e);
        }
    }
}
