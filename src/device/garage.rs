//! The garage manager owns all mutable door state.
//!
//! It runs the poll loop: sample the sensor, advance the episode, evaluate
//! alert rules. Commands arrive over a request queue and are answered on
//! the same task, so the tracker, mode and push target have exactly one
//! writer and need no locks.

use super::actuator::ActuatorController;
use crate::alerts::{AlertRule, AlertScheduler, FiredAlert};
use crate::command::{Command, CommandRequest, Effect, route};
use crate::config::Config;
use crate::door::{DoorState, DoorStateTracker, Mode, ModeStore};
use crate::error::{GarageError, Result};
use crate::gpio::{ActuatorPort, SensorPort};
use crate::notify::NotificationDispatcher;
use chrono::{Local, Timelike};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval};

/// Runtime settings for [`GarageManager`].
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub door_name: String,
    pub poll_interval: Duration,
    pub pulse_duration: Duration,
    /// Initial push notification target id.
    pub push_target: Option<String>,
}

impl ManagerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            door_name: config.door.name.clone(),
            poll_interval: Duration::from_millis(config.door.poll_interval_ms),
            pulse_duration: Duration::from_millis(config.door.pulse_duration_ms),
            push_target: config.notify.firebase_id.clone(),
        }
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            door_name: "Garage Door".to_string(),
            poll_interval: Duration::from_secs(1),
            pulse_duration: Duration::from_secs(2),
            push_target: None,
        }
    }
}

pub struct GarageManager {
    sensor: Box<dyn SensorPort>,
    tracker: DoorStateTracker,
    scheduler: AlertScheduler,
    mode: ModeStore,
    actuator: ActuatorController,
    faults: mpsc::UnboundedReceiver<GarageError>,
    dispatcher: Arc<NotificationDispatcher>,
    push_target: Option<String>,
    poll_interval: Duration,
}

impl GarageManager {
    /// Take ownership of the hardware and read the initial door state.
    pub fn new(
        mut sensor: Box<dyn SensorPort>,
        actuator: Box<dyn ActuatorPort>,
        rules: Vec<AlertRule>,
        dispatcher: NotificationDispatcher,
        settings: ManagerSettings,
    ) -> Result<Self> {
        let initial = sensor.read()?;
        let tracker = DoorStateTracker::new(settings.door_name, initial, Instant::now());
        let (actuator, faults) = ActuatorController::new(actuator, settings.pulse_duration);

        Ok(Self {
            sensor,
            tracker,
            scheduler: AlertScheduler::new(rules),
            mode: ModeStore::default(),
            actuator,
            faults,
            dispatcher: Arc::new(dispatcher),
            push_target: settings.push_target,
            poll_interval: settings.poll_interval,
        })
    }

    pub fn door_state(&self) -> DoorState {
        self.tracker.state()
    }

    pub fn mode(&self) -> Mode {
        self.mode.get()
    }

    pub fn push_target(&self) -> Option<&str> {
        self.push_target.as_deref()
    }

    pub fn actuator(&self) -> &ActuatorController {
        &self.actuator
    }

    /// One poll step at `now`, with `hour` the local hour of day.
    ///
    /// Returns the alerts fired by this tick; their delivery runs on
    /// separate tasks.
    pub fn tick(&mut self, now: Instant, hour: u32) -> Result<Vec<FiredAlert>> {
        let state = self.sensor.read()?;
        let sample = self.tracker.observe(state, now);

        if sample.transitioned {
            self.scheduler.start_episode();
            let dispatcher = self.dispatcher.clone();
            let target = self.push_target.clone();
            let previous = sample.previous_duration.unwrap_or_default();
            tokio::spawn(async move {
                dispatcher
                    .state_changed(state, previous, target.as_deref())
                    .await;
            });
        }

        let mode = self.mode.get();
        let alerts = self
            .scheduler
            .evaluate(sample.state, sample.time_in_state, mode, hour);

        for alert in &alerts {
            let dispatcher = self.dispatcher.clone();
            let target = self.push_target.clone();
            let alert = alert.clone();
            tokio::spawn(async move {
                let report = dispatcher.dispatch(&alert, target.as_deref()).await;
                info!(
                    "Alert dispatch finished: {} delivered, {} failed, {} skipped",
                    report.delivered, report.failed, report.skipped
                );
            });
        }

        Ok(alerts)
    }

    /// Route one raw command and apply its effect.
    pub fn process_command(&mut self, raw: &str) -> String {
        let command = Command::parse(raw);
        let decision = route(&command, self.tracker.state(), self.mode.get());

        match decision.effect {
            Effect::None => {
                if let Command::Unknown(text) = &command {
                    warn!("Unrecognized command \"{}\"", text);
                }
            }
            Effect::Actuate => {
                self.actuator.trigger();
            }
            Effect::SetMode(mode) => self.mode.set(mode),
            Effect::SetPushTarget(id) => {
                info!("Push target updated");
                self.push_target = Some(id);
            }
        }

        info!("received {}. {}", raw, decision.response);
        decision.response
    }

    fn handle_request(&mut self, request: CommandRequest) {
        let response = self.process_command(&request.command);
        if request.reply.send(response).is_err() {
            warn!("Command client went away before the response was sent");
        }
    }

    /// Run until a fatal fault. The control line is released on exit.
    pub async fn run(mut self, mut requests: mpsc::Receiver<CommandRequest>) -> Result<()> {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(Instant::now(), Local::now().hour()) {
                        break Err(e);
                    }
                }
                Some(request) = requests.recv() => self.handle_request(request),
                Some(fault) = self.faults.recv() => break Err(fault),
            }
        };

        if let Err(e) = &result {
            error!("Poll loop stopped: {}", e);
        }
        self.actuator.release();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandListener, send_command};
    use crate::device::actuator::tests::RecordingActuator;
    use crate::gpio::{SimulatedActuator, SimulatedDoor, SimulatedSensor};
    use crate::notify::dispatcher::tests::RecordingTransport;

    struct FailingSensor;

    impl SensorPort for FailingSensor {
        fn read(&mut self) -> Result<DoorState> {
            Err(GarageError::SensorRead("line disconnected".to_string()))
        }
    }

    /// Sensor that succeeds once for the initial read, then fails.
    struct FlakySensor {
        reads: u32,
    }

    impl SensorPort for FlakySensor {
        fn read(&mut self) -> Result<DoorState> {
            self.reads += 1;
            if self.reads == 1 {
                Ok(DoorState::Closed)
            } else {
                Err(GarageError::SensorRead("line disconnected".to_string()))
            }
        }
    }

    fn all_day_rule(threshold_secs: u64) -> AlertRule {
        AlertRule {
            start_hour: 0,
            end_hour: 23,
            threshold_secs,
            trigger_state: DoorState::Open,
            recipients: vec!["email:me@example.com".to_string()],
        }
    }

    fn manager_with(
        door: &Arc<SimulatedDoor>,
        actuator: RecordingActuator,
        rules: Vec<AlertRule>,
    ) -> GarageManager {
        GarageManager::new(
            Box::new(SimulatedSensor::new(door.clone())),
            Box::new(actuator),
            rules,
            NotificationDispatcher::new("Garage Door"),
            ManagerSettings::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_initial_state_from_sensor() {
        let door = SimulatedDoor::new(DoorState::Open);
        let manager = manager_with(&door, RecordingActuator::default(), vec![]);
        assert_eq!(manager.door_state(), DoorState::Open);
        assert_eq!(manager.mode(), Mode::Home);
    }

    #[test]
    fn test_initial_sensor_fault_is_fatal() {
        let result = GarageManager::new(
            Box::new(FailingSensor),
            Box::new(RecordingActuator::default()),
            vec![],
            NotificationDispatcher::new("Garage"),
            ManagerSettings::default(),
        );
        assert!(matches!(result, Err(GarageError::SensorRead(_))));
    }

    #[tokio::test]
    async fn test_away_is_visible_before_any_tick() {
        let door = SimulatedDoor::new(DoorState::Open);
        let mut manager = manager_with(&door, RecordingActuator::default(), vec![]);

        assert_eq!(manager.process_command("away"), "set to away");
        assert_eq!(manager.process_command("state"), "open and away");
        assert_eq!(manager.process_command("Set To Home"), "set to home");
        assert_eq!(manager.process_command("status"), "open and home");
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_and_close_without_actuation() {
        let door = SimulatedDoor::new(DoorState::Open);
        let actuator = RecordingActuator::default();
        let levels = actuator.levels.clone();
        let mut manager = manager_with(&door, actuator, vec![]);

        assert_eq!(manager.process_command("open"), "already open");
        assert_eq!(manager.process_command("up"), "already open");
        assert!(!manager.actuator().is_pulsing());

        door.set_state(DoorState::Closed);
        manager.tick(Instant::now(), 12).unwrap();
        assert_eq!(manager.process_command("close"), "already closed");
        assert_eq!(manager.process_command("DOWN"), "already closed");
        assert!(!manager.actuator().is_pulsing());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(levels.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_pulses_once_while_in_flight() {
        let door = SimulatedDoor::new(DoorState::Closed);
        let actuator = RecordingActuator::default();
        let levels = actuator.levels.clone();
        let mut manager = manager_with(&door, actuator, vec![]);

        assert_eq!(manager.process_command("trigger"), "opening");
        assert!(manager.actuator().is_pulsing());
        // Responses keep flowing while the pulse is running.
        assert_eq!(manager.process_command("trigger"), "opening");
        assert_eq!(manager.process_command("open"), "opening");

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(*levels.lock(), vec![true, false]);
    }

    #[tokio::test]
    async fn test_push_target_command() {
        let door = SimulatedDoor::new(DoorState::Closed);
        let mut manager = manager_with(&door, RecordingActuator::default(), vec![]);

        assert_eq!(manager.process_command("firebase:AbCdEf"), "ok");
        assert_eq!(manager.push_target(), Some("AbCdEf"));
        assert_eq!(manager.process_command("reboot"), "unknown command");
    }

    #[tokio::test]
    async fn test_alert_rearms_on_new_episode() {
        let door = SimulatedDoor::new(DoorState::Open);
        let mut manager = manager_with(&door, RecordingActuator::default(), vec![all_day_rule(10)]);
        let t0 = Instant::now();
        let at = |secs: u64| t0 + Duration::from_secs(secs);

        assert!(manager.tick(at(5), 9).unwrap().is_empty());
        assert_eq!(manager.tick(at(11), 9).unwrap().len(), 1);
        for s in 12..40 {
            assert!(manager.tick(at(s), 9).unwrap().is_empty());
        }

        door.set_state(DoorState::Closed);
        assert!(manager.tick(at(40), 9).unwrap().is_empty());
        door.set_state(DoorState::Open);
        assert!(manager.tick(at(41), 9).unwrap().is_empty());
        assert!(manager.tick(at(51), 9).unwrap().is_empty());
        assert_eq!(manager.tick(at(52), 9).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_away_mode_alerts_immediately() {
        let door = SimulatedDoor::new(DoorState::Closed);
        let mut manager =
            manager_with(&door, RecordingActuator::default(), vec![all_day_rule(3600)]);
        manager.process_command("away");

        let t0 = Instant::now();
        assert!(manager.tick(t0, 3).unwrap().is_empty());
        door.set_state(DoorState::Open);
        let alerts = manager.tick(t0 + Duration::from_secs(1), 3).unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].away_override);
        assert!(manager.tick(t0 + Duration::from_secs(2), 3).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fired_alerts_are_delivered() {
        let transport = Arc::new(RecordingTransport::default());
        let door = SimulatedDoor::new(DoorState::Open);
        let mut manager = GarageManager::new(
            Box::new(SimulatedSensor::new(door.clone())),
            Box::new(RecordingActuator::default()),
            vec![all_day_rule(10)],
            NotificationDispatcher::new("Garage Door").with_email(transport.clone()),
            ManagerSettings::default(),
        )
        .unwrap();

        let t0 = Instant::now();
        manager.tick(t0 + Duration::from_secs(11), 9).unwrap();
        settle().await;
        let calls = transport.calls.lock();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("email me@example.com | Garage Door is open"));
    }

    fn manager_with_push(
        door: &Arc<SimulatedDoor>,
        transport: Arc<RecordingTransport>,
    ) -> GarageManager {
        GarageManager::new(
            Box::new(SimulatedSensor::new(door.clone())),
            Box::new(RecordingActuator::default()),
            vec![],
            NotificationDispatcher::new("Garage Door").with_push(transport),
            ManagerSettings {
                push_target: Some("dev".to_string()),
                ..ManagerSettings::default()
            },
        )
        .unwrap()
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_change_push_carries_previous_duration() {
        let transport = Arc::new(RecordingTransport::default());
        let door = SimulatedDoor::new(DoorState::Closed);
        let t0 = Instant::now();
        let mut manager = manager_with_push(&door, transport.clone());

        assert!(manager.tick(t0 + Duration::from_secs(20), 12).unwrap().is_empty());
        door.set_state(DoorState::Open);
        manager.tick(t0 + Duration::from_secs(45), 12).unwrap();
        settle().await;

        assert_eq!(*transport.calls.lock(), vec!["push dev | data | open | 45".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_away_alert_without_rules_goes_to_push_target() {
        let transport = Arc::new(RecordingTransport::default());
        let door = SimulatedDoor::new(DoorState::Closed);
        let t0 = Instant::now();
        let mut manager = manager_with_push(&door, transport.clone());
        manager.process_command("away");

        door.set_state(DoorState::Open);
        let alerts = manager.tick(t0 + Duration::from_secs(1), 12).unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].away_override);
        assert!(manager.tick(t0 + Duration::from_secs(2), 12).unwrap().is_empty());
        settle().await;

        let calls = transport.calls.lock();
        assert_eq!(calls.len(), 2);
        assert!(calls.contains(&"push dev | data | open | 1".to_string()));
        assert!(calls.contains(&"push dev | alert | open | 0".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_answers_requests_between_ticks() {
        let door = SimulatedDoor::new(DoorState::Closed);
        let manager = manager_with(&door, RecordingActuator::default(), vec![]);
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(manager.run(rx));

        let (request, reply) = CommandRequest::new("away");
        tx.send(request).await.unwrap();
        assert_eq!(reply.await.unwrap(), "set to away");

        let (request, reply) = CommandRequest::new("state");
        tx.send(request).await.unwrap();
        assert_eq!(reply.await.unwrap(), "closed and away");

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exits_on_sensor_fault_and_releases_line() {
        let actuator = RecordingActuator::default();
        let levels = actuator.levels.clone();
        let manager = GarageManager::new(
            Box::new(FlakySensor { reads: 0 }),
            Box::new(actuator),
            vec![],
            NotificationDispatcher::new("Garage"),
            ManagerSettings::default(),
        )
        .unwrap();
        let (_tx, rx) = mpsc::channel(4);

        let result = manager.run(rx).await;
        assert!(matches!(result, Err(GarageError::SensorRead(_))));
        assert_eq!(*levels.lock(), vec![false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exits_on_actuator_fault() {
        let door = SimulatedDoor::new(DoorState::Closed);
        let actuator = RecordingActuator {
            fail: true,
            ..Default::default()
        };
        let manager = manager_with(&door, actuator, vec![]);
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(manager.run(rx));

        let (request, reply) = CommandRequest::new("trigger");
        tx.send(request).await.unwrap();
        assert_eq!(reply.await.unwrap(), "opening");

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(GarageError::Actuator(_))));
    }

    #[tokio::test]
    async fn test_end_to_end_over_tcp() {
        const KEY: &[u8] = b"secret password";
        let door = SimulatedDoor::new(DoorState::Closed);
        let settings = ManagerSettings {
            poll_interval: Duration::from_millis(10),
            pulse_duration: Duration::from_millis(50),
            ..Default::default()
        };
        let manager = GarageManager::new(
            Box::new(SimulatedSensor::new(door.clone())),
            Box::new(SimulatedActuator::new(door.clone())),
            vec![],
            NotificationDispatcher::new("Garage Door"),
            settings,
        )
        .unwrap();

        let (tx, rx) = mpsc::channel(8);
        let listener = CommandListener::bind("127.0.0.1:0", KEY, tx).await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let listener_handle = tokio::spawn(listener.run());
        let manager_handle = tokio::spawn(manager.run(rx));

        assert_eq!(send_command(&addr, KEY, "state").await.unwrap(), "closed and home");
        assert_eq!(send_command(&addr, KEY, "trigger").await.unwrap(), "opening");

        // The opener reacts after the pulse; the new state shows up on a later tick.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(door.presses(), 1);
        assert_eq!(send_command(&addr, KEY, "status").await.unwrap(), "open and home");
        assert_eq!(send_command(&addr, KEY, "up").await.unwrap(), "already open");

        listener_handle.abort();
        manager_handle.abort();
    }
}
