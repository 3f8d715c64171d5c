use clap::Parser;
use garage_door_manager::alerts::load_rules;
use garage_door_manager::command::CommandListener;
use garage_door_manager::config::{self, Config};
use garage_door_manager::device::{GarageManager, ManagerSettings};
use garage_door_manager::door::DoorState;
use garage_door_manager::error::Result;
use garage_door_manager::gpio::{
    ActuatorPort, SensorPort, SimulatedActuator, SimulatedDoor, SimulatedSensor, SysfsActuator,
    SysfsSensor,
};
use garage_door_manager::instance_lock::InstanceLock;
use garage_door_manager::notify::{
    FirebaseClient, IftttClient, NotificationDispatcher, SendmailTransport,
};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Depth of the command request queue between listener and manager.
const REQUEST_QUEUE_DEPTH: usize = 16;

#[derive(Parser)]
#[command(name = "garage-door-manager")]
#[command(about = "Monitor and control a garage door")]
struct Cli {
    /// Alert rules file (JSON)
    #[arg(long, env = "ALERTS_FILE")]
    alerts_file: Option<PathBuf>,

    /// Use a simulated door instead of GPIO
    #[arg(long, env = "SIMULATE")]
    simulate: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() -> ExitCode {
    // Load .env before any threads exist
    config::load_dotenv();
    init_logger();
    let cli = Cli::parse();

    info!("==========================================================");
    info!("Garage Door Manager starting");

    let mut config = Config::from_env();
    if let Some(path) = cli.alerts_file {
        config.alerts_file = path;
    }

    let _lock = match InstanceLock::acquire() {
        Ok(lock) => lock,
        Err(e) => {
            error!("Cannot start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config, cli.simulate)) {
        Ok(()) => {
            info!("Garage Door Manager stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Terminating process: {}", e);
            error!("Exiting garage-door-manager");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config, simulate: bool) -> Result<()> {
    info!("Configuration loaded:");
    info!("  Door Name: {}", config.door.name);
    info!(
        "  Sensor GPIO: {}, Control GPIO: {}",
        config.door.sensor_pin, config.door.control_pin
    );
    info!("  Poll interval: {} ms", config.door.poll_interval_ms);
    info!("  Command channel: {}", config.listener.address());
    info!("  Command timeout: {} s", config.listener.request_timeout_secs);
    info!("  Alerts file: {:?}", config.alerts_file);

    let rules = load_rules(&config.alerts_file)?;
    info!("Loaded {} alert rules", rules.len());

    let dispatcher = build_dispatcher(&config)?;
    let (sensor, actuator) = open_hardware(&config, simulate)?;
    let manager = GarageManager::new(
        sensor,
        actuator,
        rules,
        dispatcher,
        ManagerSettings::from_config(&config),
    )?;

    let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
    let listener = CommandListener::bind(
        &config.listener.address(),
        config.listener.auth_key.clone(),
        tx,
    )
    .await?
    .with_request_timeout(Duration::from_secs(config.listener.request_timeout_secs));
    let listener_task = tokio::spawn(async move {
        if let Err(e) = listener.run().await {
            error!("Command listener stopped: {}", e);
        }
    });

    info!("Garage Door Manager is running");

    let result = tokio::select! {
        result = manager.run(rx) => result,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Received shutdown signal"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
            Ok(())
        }
    };

    listener_task.abort();
    result
}

fn open_hardware(
    config: &Config,
    simulate: bool,
) -> Result<(Box<dyn SensorPort>, Box<dyn ActuatorPort>)> {
    if simulate {
        info!("Using simulated door hardware");
        let door = SimulatedDoor::new(DoorState::Closed);
        return Ok((
            Box::new(SimulatedSensor::new(door.clone())),
            Box::new(SimulatedActuator::new(door)),
        ));
    }

    info!(
        "Configuring GPIO {} and {} for {}",
        config.door.sensor_pin, config.door.control_pin, config.door.name
    );
    let sensor = SysfsSensor::open(&config.door.gpio_base, config.door.sensor_pin)?;
    let actuator = SysfsActuator::open(&config.door.gpio_base, config.door.control_pin)?;
    Ok((Box::new(sensor), Box::new(actuator)))
}

fn build_dispatcher(config: &Config) -> Result<NotificationDispatcher> {
    let timeout = Duration::from_secs(config.notify.http_timeout_secs);
    let mut dispatcher = NotificationDispatcher::new(&config.door.name);

    if let Some(key) = &config.notify.firebase_key {
        dispatcher = dispatcher.with_push(Arc::new(FirebaseClient::new(
            key.as_str(),
            config.door.name.as_str(),
            timeout,
        )?));
        info!("  Push notifications: enabled");
    }
    if let Some(key) = &config.notify.ifttt_key {
        dispatcher = dispatcher.with_webhook(Arc::new(IftttClient::new(key.as_str(), timeout)?));
        info!("  IFTTT webhooks: enabled");
    }
    if let Some(from) = &config.notify.mail_from {
        dispatcher = dispatcher.with_email(Arc::new(SendmailTransport::new(
            config.notify.sendmail_path.clone(),
            from.as_str(),
        )));
        info!("  Email via {:?}: enabled", config.notify.sendmail_path);
    }

    Ok(dispatcher)
}
