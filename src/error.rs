use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum GarageError {
    #[error("Failed to read door sensor: {0}")]
    SensorRead(String),

    #[error("Actuator fault: {0}")]
    Actuator(String),

    #[error("GPIO {pin} error: {source}")]
    Gpio {
        pin: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),

    #[error("Notification delivery failed: {0}")]
    Notification(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    #[error(transparent)]
    HttpError(#[from] reqwest::Error),
}

impl GarageError {
    /// Whether this error must tear the process down.
    ///
    /// Hardware faults lose ground truth about the door; everything else is
    /// scoped to a single connection or notification.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GarageError::SensorRead(_)
                | GarageError::Actuator(_)
                | GarageError::Gpio { .. }
                | GarageError::ChannelClosed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GarageError>;
