use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RigError {
    #[error("no pump named {0} on either board")]
    UnknownPump(String),
    #[error("pump {0} has no calibration; run calibration first")]
    UncalibratedPump(String),
    #[error("could not persist calibration: {0}")]
    CalibrationPersist(String),
    #[error("pH measurement failed: {0}")]
    MeasurementFailed(String),
    #[error("position {position} is outside probe travel [0, {limit}]")]
    TravelLimit { position: i64, limit: i64 },
    #[error("device {device} not found on board {board}")]
    UnknownDevice { board: String, device: String },
    #[error("invalid volume: {0}")]
    InvalidVolume(f64),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("timeout waiting for hardware")]
    Timeout,
    #[error("cancelled")]
    Cancelled,
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RigError>;
