use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    load_dotenv_from(Path::new(".env"));
}

pub fn load_dotenv_from(env_path: &Path) {
    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = parse_env_line(line) {
            // Only set if not already set (env vars take precedence)
            if std::env::var(key).is_err() {
                // SAFETY: called from main before the async runtime starts
                unsafe { std::env::set_var(key, value) };
            }
        }
    }
}

/// Split a `KEY=value` line, stripping one layer of matching quotes.
fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim().trim_start_matches("export ").trim();
    let mut value = value.trim();

    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        value = &value[1..value.len() - 1];
    }

    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub door: DoorConfig,
    pub listener: ListenerConfig,
    pub notify: NotifyConfig,
    pub alerts_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorConfig {
    pub name: String,
    pub sensor_pin: u32,
    pub control_pin: u32,
    pub gpio_base: PathBuf,
    pub poll_interval_ms: u64,
    pub pulse_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing)]
    pub auth_key: String,
    pub request_timeout_secs: u64,
}

impl ListenerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub firebase_id: Option<String>,
    #[serde(skip_serializing)]
    pub firebase_key: Option<String>,
    #[serde(skip_serializing)]
    pub ifttt_key: Option<String>,
    pub sendmail_path: PathBuf,
    pub mail_from: Option<String>,
    pub http_timeout_secs: u64,
}

pub fn default_alerts_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/etc"))
        .join("garage-door-manager")
        .join("alerts.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            door: DoorConfig {
                name: "Garage Door".to_string(),
                sensor_pin: 22,
                control_pin: 7,
                gpio_base: PathBuf::from(crate::gpio::sysfs::DEFAULT_SYSFS_GPIO),
                poll_interval_ms: 1000,
                pulse_duration_ms: 2000,
            },
            listener: ListenerConfig {
                host: "127.0.0.1".to_string(),
                port: 6000,
                auth_key: "secret password".to_string(),
                request_timeout_secs: 10,
            },
            notify: NotifyConfig {
                firebase_id: None,
                firebase_key: None,
                ifttt_key: None,
                sendmail_path: PathBuf::from(crate::notify::email::DEFAULT_SENDMAIL_PATH),
                mail_from: None,
                http_timeout_secs: 10,
            },
            alerts_file: default_alerts_file(),
        }
    }
}

/// Read a non-empty environment variable.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(name) = env_string("DOOR_NAME") {
            config.door.name = name;
        }
        if let Some(pin) = env_parsed("SENSOR_PIN") {
            config.door.sensor_pin = pin;
        }
        if let Some(pin) = env_parsed("CONTROL_PIN") {
            config.door.control_pin = pin;
        }
        if let Some(base) = env_string("GPIO_SYSFS_BASE") {
            config.door.gpio_base = PathBuf::from(base);
        }
        if let Some(ms) = env_parsed::<u64>("POLL_INTERVAL_MS")
            && ms > 0
        {
            config.door.poll_interval_ms = ms;
        }
        if let Some(ms) = env_parsed("PULSE_DURATION_MS") {
            config.door.pulse_duration_ms = ms;
        }

        // Command channel
        if let Some(host) = env_string("LISTEN_HOST") {
            config.listener.host = host;
        }
        if let Some(port) = env_parsed("LISTEN_PORT") {
            config.listener.port = port;
        }
        if let Some(key) = env_string("AUTH_KEY") {
            config.listener.auth_key = key;
        }
        if let Some(secs) = env_parsed::<u64>("COMMAND_TIMEOUT_SECS")
            && secs > 0
        {
            config.listener.request_timeout_secs = secs;
        }

        // Notifications
        config.notify.firebase_id = env_string("FIREBASE_ID");
        config.notify.firebase_key = env_string("FIREBASE_KEY");
        config.notify.ifttt_key = env_string("IFTTT_KEY");
        if let Some(path) = env_string("SENDMAIL_PATH") {
            config.notify.sendmail_path = PathBuf::from(path);
        }
        config.notify.mail_from = env_string("MAIL_FROM");
        if let Some(secs) = env_parsed("HTTP_TIMEOUT_SECS") {
            config.notify.http_timeout_secs = secs;
        }

        if let Some(path) = env_string("ALERTS_FILE") {
            config.alerts_file = PathBuf::from(path);
        }

        config
    }
}
