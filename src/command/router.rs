//! Command vocabulary and routing.
//!
//! Routing is pure: given a command and the current door state and mode it
//! returns the response text plus the single effect the manager must apply.

use crate::door::{DoorState, Mode};

const PUSH_TARGET_PREFIX: &str = "firebase:";

/// A parsed command request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Trigger,
    Open,
    Close,
    SetMode(Mode),
    Status,
    /// Reconfigure the push notification target. The id keeps its case.
    SetPushTarget(String),
    Unknown(String),
}

impl Command {
    /// Parse a raw request. Matching ignores case and surrounding whitespace.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(prefix) = trimmed.get(..PUSH_TARGET_PREFIX.len())
            && prefix.eq_ignore_ascii_case(PUSH_TARGET_PREFIX)
        {
            return Command::SetPushTarget(trimmed[PUSH_TARGET_PREFIX.len()..].to_string());
        }

        match trimmed.to_lowercase().as_str() {
            "trigger" => Command::Trigger,
            "open" | "up" => Command::Open,
            "close" | "down" => Command::Close,
            "home" | "set to home" => Command::SetMode(Mode::Home),
            "away" | "set to away" => Command::SetMode(Mode::Away),
            "state" | "status" => Command::Status,
            _ => Command::Unknown(trimmed.to_string()),
        }
    }
}

/// Side effect requested by a routed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Pulse the opener once (subject to debounce).
    Actuate,
    SetMode(Mode),
    SetPushTarget(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub response: String,
    pub effect: Effect,
}

impl Decision {
    fn new(response: impl Into<String>, effect: Effect) -> Self {
        Self {
            response: response.into(),
            effect,
        }
    }
}

/// Map a command to its response and effect.
pub fn route(command: &Command, door: DoorState, mode: Mode) -> Decision {
    match command {
        Command::Trigger => match door {
            DoorState::Open => Decision::new("closing", Effect::Actuate),
            DoorState::Closed => Decision::new("opening", Effect::Actuate),
        },
        Command::Open => match door {
            DoorState::Open => Decision::new("already open", Effect::None),
            DoorState::Closed => Decision::new("opening", Effect::Actuate),
        },
        Command::Close => match door {
            DoorState::Open => Decision::new("closing", Effect::Actuate),
            DoorState::Closed => Decision::new("already closed", Effect::None),
        },
        Command::SetMode(new_mode) => {
            Decision::new(format!("set to {}", new_mode), Effect::SetMode(*new_mode))
        }
        Command::Status => Decision::new(format!("{} and {}", door, mode), Effect::None),
        Command::SetPushTarget(id) => Decision::new("ok", Effect::SetPushTarget(id.clone())),
        Command::Unknown(_) => Decision::new("unknown command", Effect::None),
    }
}
