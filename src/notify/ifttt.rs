//! IFTTT Maker webhook transport.

use super::WebhookTransport;
use crate::error::{GarageError, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_IFTTT_BASE_URL: &str = "https://maker.ifttt.com";

#[derive(Debug, Serialize)]
struct IftttValues<'a> {
    value1: &'a str,
    value2: &'a str,
    value3: &'a str,
}

/// Triggers IFTTT Maker events.
#[derive(Debug, Clone)]
pub struct IftttClient {
    client: Client,
    key: String,
    base_url: String,
}

impl IftttClient {
    pub fn new(key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(GarageError::Config("IFTTT key is empty".to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            key,
            base_url: DEFAULT_IFTTT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn event_url(&self, event: &str) -> String {
        format!(
            "{}/trigger/{}/with/key/{}",
            self.base_url.trim_end_matches('/'),
            event,
            self.key
        )
    }
}

#[async_trait]
impl WebhookTransport for IftttClient {
    async fn trigger(&self, event: &str, value1: &str, value2: &str, value3: &str) -> Result<()> {
        debug!("Triggering IFTTT event {}", event);
        self.client
            .post(self.event_url(event))
            .json(&IftttValues {
                value1,
                value2,
                value3,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
