//! Garage Door Manager library.
//!
//! Watches a door sensor, tracks how long the door has been in its current
//! state, raises time-windowed alerts, and serves an authenticated command
//! channel that can query state, switch home/away mode and pulse the opener.

pub mod alerts;
pub mod command;
pub mod config;
pub mod device;
pub mod door;
pub mod error;
pub mod gpio;
pub mod instance_lock;
pub mod notify;
