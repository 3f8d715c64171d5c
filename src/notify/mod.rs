//! Notification transports and the dispatcher that routes fired alerts.
//!
//! Each transport is a small async capability:
//! - [`EmailTransport`]: `send(recipient, subject, body)`
//! - [`WebhookTransport`]: `trigger(event, value1, value2, value3)`
//! - [`PushTransport`]: `send(target, kind, event, duration_secs)`
//!
//! Recipients in alert rules are tagged by transport prefix
//! (`email:`, `ifttt:`, `firebase`) and routed by [`Recipient::parse`].

pub mod dispatcher;
pub mod email;
pub mod firebase;
pub mod format;
pub mod ifttt;

pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use email::SendmailTransport;
pub use firebase::FirebaseClient;
pub use format::{format_duration, truncate};
pub use ifttt::IftttClient;

use crate::error::Result;
use async_trait::async_trait;
use strum::Display;

/// Kind of push message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PushKind {
    /// Visible notification with title, body and sound.
    Alert,
    /// Silent data message carrying only the new state.
    Data,
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;
}

#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn trigger(&self, event: &str, value1: &str, value2: &str, value3: &str) -> Result<()>;
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, target: &str, kind: PushKind, event: &str, duration_secs: u64)
    -> Result<()>;
}

/// A parsed alert recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Email(String),
    Ifttt(String),
    /// Push target id; `None` means the current dynamic target.
    Firebase(Option<String>),
}

impl Recipient {
    /// Parse a prefixed recipient string. Returns `None` for unknown prefixes.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("firebase") {
            return Some(Recipient::Firebase(None));
        }
        let (prefix, value) = raw.split_once(':')?;
        let value = value.trim();
        match prefix.trim().to_ascii_lowercase().as_str() {
            "email" if !value.is_empty() => Some(Recipient::Email(value.to_string())),
            "ifttt" if !value.is_empty() => Some(Recipient::Ifttt(value.to_string())),
            "firebase" if value.is_empty() => Some(Recipient::Firebase(None)),
            "firebase" => Some(Recipient::Firebase(Some(value.to_string()))),
            _ => None,
        }
    }
}
