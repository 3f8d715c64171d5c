//! Firebase Cloud Messaging push transport.

use super::format::format_duration;
use super::{PushKind, PushTransport};
use crate::error::{GarageError, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

pub const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

const ALERT_TITLE: &str = "Garage door alert";

/// Push transport posting to the FCM HTTP endpoint.
#[derive(Debug, Clone)]
pub struct FirebaseClient {
    client: Client,
    server_key: String,
    endpoint: String,
    door_name: String,
}

impl FirebaseClient {
    pub fn new(
        server_key: impl Into<String>,
        door_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let server_key = server_key.into();
        if server_key.is_empty() {
            return Err(GarageError::Config("Firebase key is empty".to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            server_key,
            endpoint: DEFAULT_FCM_ENDPOINT.to_string(),
            door_name: door_name.into(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Build the FCM message body.
    pub fn payload(&self, target: &str, kind: PushKind, event: &str, duration_secs: u64) -> Value {
        match kind {
            PushKind::Alert => {
                let body = format!(
                    "Your {} has been {} for {}",
                    self.door_name.to_lowercase(),
                    event,
                    format_duration(duration_secs)
                );
                json!({
                    "notification": { "title": ALERT_TITLE, "body": body, "sound": "default" },
                    "data": { "event": event },
                    "to": target,
                })
            }
            PushKind::Data => json!({
                "data": { "event": event },
                "to": target,
            }),
        }
    }
}

#[async_trait]
impl PushTransport for FirebaseClient {
    async fn send(
        &self,
        target: &str,
        kind: PushKind,
        event: &str,
        duration_secs: u64,
    ) -> Result<()> {
        let payload = self.payload(target, kind, event, duration_secs);
        debug!("Posting {} push to {}: {}", kind, self.endpoint, payload);

        self.client
            .post(&self.endpoint)
            .header("Authorization", &self.server_key)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
