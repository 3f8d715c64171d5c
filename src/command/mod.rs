//! Remote command channel: wire protocol, listener, client and router.

pub mod client;
pub mod listener;
pub mod protocol;
pub mod router;

pub use client::send_command;
pub use listener::{CommandListener, CommandRequest};
pub use router::{Command, Decision, Effect, route};
