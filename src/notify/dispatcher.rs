//! Routes fired alerts and state changes to the configured transports.

use super::format::{format_duration, truncate};
use super::{EmailTransport, PushKind, PushTransport, Recipient, WebhookTransport};
use crate::alerts::FiredAlert;
use crate::door::DoorState;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Maximum subject length for email alerts.
const SUBJECT_MAX_LEN: usize = 100;

/// Outcome counts for one dispatch, mainly for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Delivers notifications through whichever transports are configured.
///
/// Transport failures are logged and counted, never returned: an alert is
/// considered fired regardless of delivery.
#[derive(Clone)]
pub struct NotificationDispatcher {
    door_name: String,
    email: Option<Arc<dyn EmailTransport>>,
    webhook: Option<Arc<dyn WebhookTransport>>,
    push: Option<Arc<dyn PushTransport>>,
}

impl NotificationDispatcher {
    pub fn new(door_name: impl Into<String>) -> Self {
        Self {
            door_name: door_name.into(),
            email: None,
            webhook: None,
            push: None,
        }
    }

    pub fn with_email(mut self, transport: Arc<dyn EmailTransport>) -> Self {
        self.email = Some(transport);
        self
    }

    pub fn with_webhook(mut self, transport: Arc<dyn WebhookTransport>) -> Self {
        self.webhook = Some(transport);
        self
    }

    pub fn with_push(mut self, transport: Arc<dyn PushTransport>) -> Self {
        self.push = Some(transport);
        self
    }

    pub fn subject(&self, state: DoorState) -> String {
        truncate(&format!("{} is {}", self.door_name, state), SUBJECT_MAX_LEN)
    }

    pub fn body(&self, state: DoorState, time_in_state: Duration) -> String {
        format!(
            "{} has been {} for {}",
            self.door_name,
            state,
            format_duration(time_in_state.as_secs())
        )
    }

    /// Deliver a fired alert to every recipient of its rule.
    ///
    /// `push_target` is the current dynamic push id, used by bare `firebase`
    /// recipients.
    pub async fn dispatch(&self, alert: &FiredAlert, push_target: Option<&str>) -> DispatchReport {
        let mut report = DispatchReport::default();
        let subject = self.subject(alert.state);
        let mut body = self.body(alert.state, alert.time_in_state);
        if alert.away_override {
            body.push_str(" while set to away");
        }
        let duration = format_duration(alert.time_in_state.as_secs());
        let state = alert.state.to_string();

        for raw in &alert.recipients {
            let Some(recipient) = Recipient::parse(raw) else {
                error!("Unrecognized alert recipient \"{}\", skipping", raw);
                report.skipped += 1;
                continue;
            };

            let result = match &recipient {
                Recipient::Email(address) => match &self.email {
                    Some(email) => {
                        info!("Sending email alert to {}", address);
                        Some(email.send(address, &subject, &body).await)
                    }
                    None => None,
                },
                Recipient::Ifttt(event) => match &self.webhook {
                    Some(webhook) => {
                        info!(
                            "Sending IFTTT event \"{}\": value1 = \"{}\", value2 = \"{}\", value3 = \"{}\"",
                            event, self.door_name, state, duration
                        );
                        Some(webhook.trigger(event, &self.door_name, &state, &duration).await)
                    }
                    None => None,
                },
                Recipient::Firebase(explicit) => {
                    let target = explicit.as_deref().or(push_target).filter(|t| !t.is_empty());
                    match (&self.push, target) {
                        (Some(push), Some(target)) => {
                            info!("Sending push alert for {} door", state);
                            Some(
                                push.send(
                                    target,
                                    PushKind::Alert,
                                    &state,
                                    alert.time_in_state.as_secs(),
                                )
                                .await,
                            )
                        }
                        (Some(_), None) => {
                            error!("Push target id is empty, cannot deliver alert");
                            report.skipped += 1;
                            continue;
                        }
                        (None, _) => None,
                    }
                }
            };

            match result {
                Some(Ok(())) => report.delivered += 1,
                Some(Err(e)) => {
                    error!("Failed to deliver alert to {}: {}", raw, e);
                    report.failed += 1;
                }
                None => {
                    warn!("No transport configured for recipient {}, skipping", raw);
                    report.skipped += 1;
                }
            }
        }

        report
    }

    /// Send the silent state-change push that accompanies every transition.
    pub async fn state_changed(
        &self,
        state: DoorState,
        previous_duration: Duration,
        push_target: Option<&str>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let Some(push) = &self.push else {
            return report;
        };
        let Some(target) = push_target.filter(|t| !t.is_empty()) else {
            error!("Push target id is empty, not sending state change");
            report.skipped += 1;
            return report;
        };

        match push
            .send(
                target,
                PushKind::Data,
                &state.to_string(),
                previous_duration.as_secs(),
            )
            .await
        {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                error!("Failed to send state change push: {}", e);
                report.failed += 1;
            }
        }
        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{GarageError, Result};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Transport that records every call and optionally fails.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub calls: Mutex<Vec<String>>,
        pub fail: bool,
    }

    impl RecordingTransport {
        pub(crate) fn failing() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn record(&self, call: String) -> Result<()> {
            self.calls.lock().push(call);
            if self.fail {
                Err(GarageError::Notification("transport down".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl EmailTransport for RecordingTransport {
        async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
            self.record(format!("email {} | {} | {}", recipient, subject, body))
        }
    }

    #[async_trait]
    impl WebhookTransport for RecordingTransport {
        async fn trigger(&self, event: &str, v1: &str, v2: &str, v3: &str) -> Result<()> {
            self.record(format!("ifttt {} | {} | {} | {}", event, v1, v2, v3))
        }
    }

    #[async_trait]
    impl PushTransport for RecordingTransport {
        async fn send(&self, target: &str, kind: PushKind, event: &str, secs: u64) -> Result<()> {
            self.record(format!("push {} | {} | {} | {}", target, kind, event, secs))
        }
    }

    fn alert(recipients: &[&str]) -> FiredAlert {
        FiredAlert {
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
            state: DoorState::Open,
            time_in_state: Duration::from_secs(660),
            away_override: false,
        }
    }

    #[tokio::test]
    async fn test_routes_by_prefix() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = NotificationDispatcher::new("Garage Door")
            .with_email(transport.clone())
            .with_webhook(transport.clone())
            .with_push(transport.clone());

        let report = dispatcher
            .dispatch(
                &alert(&["email:me@example.com", "ifttt:garage", "firebase"]),
                Some("device-1"),
            )
            .await;

        assert_eq!(report.delivered, 3);
        let calls = transport.calls.lock();
        assert_eq!(
            calls[0],
            "email me@example.com | Garage Door is open | Garage Door has been open for 11 minutes"
        );
        assert_eq!(calls[1], "ifttt garage | Garage Door | open | 11 minutes");
        assert_eq!(calls[2], "push device-1 | alert | open | 660");
    }

    #[tokio::test]
    async fn test_unknown_prefix_skips_only_that_recipient() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = NotificationDispatcher::new("Garage").with_email(transport.clone());

        let report = dispatcher
            .dispatch(&alert(&["pager:42", "email:a@example.com"]), None)
            .await;

        assert_eq!(report.skipped, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(transport.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_returned() {
        let failing = Arc::new(RecordingTransport::failing());
        let working = Arc::new(RecordingTransport::default());
        let dispatcher = NotificationDispatcher::new("Garage")
            .with_email(failing.clone())
            .with_webhook(working.clone());

        let report = dispatcher
            .dispatch(&alert(&["email:a@example.com", "ifttt:evt"]), None)
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(working.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_explicit_push_target_wins() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = NotificationDispatcher::new("Garage").with_push(transport.clone());

        dispatcher
            .dispatch(&alert(&["firebase:explicit"]), Some("dynamic"))
            .await;
        assert!(transport.calls.lock()[0].starts_with("push explicit |"));
    }

    #[tokio::test]
    async fn test_missing_push_target_skips() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = NotificationDispatcher::new("Garage").with_push(transport.clone());

        let report = dispatcher.dispatch(&alert(&["firebase"]), None).await;
        assert_eq!(report.skipped, 1);
        assert!(transport.calls.lock().is_empty());

        let report = dispatcher
            .state_changed(DoorState::Closed, Duration::from_secs(5), Some(""))
            .await;
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_state_change_sends_data_push() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = NotificationDispatcher::new("Garage").with_push(transport.clone());

        let report = dispatcher
            .state_changed(DoorState::Closed, Duration::from_secs(42), Some("device-1"))
            .await;
        assert_eq!(report.delivered, 1);
        assert_eq!(transport.calls.lock()[0], "push device-1 | data | closed | 42");
    }

    #[tokio::test]
    async fn test_away_override_body() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = NotificationDispatcher::new("Garage").with_email(transport.clone());
        let mut fired = alert(&["email:a@example.com"]);
        fired.away_override = true;

        dispatcher.dispatch(&fired, None).await;
        assert!(transport.calls.lock()[0].ends_with("while set to away"));
    }
}
