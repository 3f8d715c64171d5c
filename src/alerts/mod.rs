//! Alert rules and the per-episode scheduler that evaluates them.

pub mod rule;
pub mod scheduler;

pub use rule::{AlertRule, load_rules, parse_rules};
pub use scheduler::{AlertScheduler, FiredAlert};
