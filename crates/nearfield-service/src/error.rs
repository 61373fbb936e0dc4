use nearfield_hal::HardwareError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Adapter is not enabled")]
    NotEnabled,

    #[error("Polling pause timeout out of range: {millis}ms")]
    PauseTimeoutOutOfRange { millis: u64 },

    #[error("Service has shut down")]
    ServiceStopped,

    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Domain(#[from] nearfield_core::Error),

    #[error("Preference store I/O error: {0}")]
    PreferenceIo(#[from] std::io::Error),

    #[error("Preference store format error: {0}")]
    PreferenceFormat(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
