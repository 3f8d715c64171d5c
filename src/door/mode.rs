//! Home/away mode holder.

use super::state::Mode;
use log::info;

/// Holds the process-wide [`Mode`].
///
/// Owned by the garage manager task; the command path is the only caller of
/// [`ModeStore::set`], the alert scheduler only reads it.
#[derive(Debug, Default)]
pub struct ModeStore {
    mode: Mode,
}

impl ModeStore {
    pub fn new(initial: Mode) -> Self {
        Self { mode: initial }
    }

    pub fn get(&self) -> Mode {
        self.mode
    }

    pub fn set(&mut self, mode: Mode) {
        if self.mode != mode {
            info!("Mode changed from {} to {}", self.mode, mode);
        }
        self.mode = mode;
    }
}
