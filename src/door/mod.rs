//! Door state tracking and operating mode.

pub mod mode;
pub mod state;
pub mod tracker;

pub use mode::ModeStore;
pub use state::{DoorState, Mode};
pub use tracker::{DoorStateTracker, Episode, Sample};
