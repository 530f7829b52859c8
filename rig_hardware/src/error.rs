use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("acquisition timeout")]
    Timeout,
    #[error("acquisition fault: {0}")]
    Acquisition(String),
    #[error("actuator fault on {0}")]
    Actuator(String),
}

pub type Result<T> = std::result::Result<T, HwError>;
