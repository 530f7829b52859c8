//! Hardware seams for the rig.
//!
//! Everything that touches a controller board, the acquisition unit or the
//! status LED goes through these traits so the core can run against real
//! drivers or the simulated backend without change.

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Error type used at every trait boundary.
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// One named actuator on a board: a stepper-driven pump, the wheel drive,
/// a modular driver or a PWM output.
pub trait Actuator {
    /// Relative move by `steps`; blocks until the move is done.
    fn move_by(&mut self, steps: i64) -> Result<(), DynError>;
    /// Absolute move to `position`; blocks until the move is done.
    fn move_to(&mut self, position: i64) -> Result<(), DynError>;
    /// Overwrite the position counter without moving.
    fn set_current_position(&mut self, position: i64) -> Result<(), DynError>;
    /// Drive to the home switch.
    fn home(&mut self) -> Result<(), DynError>;
    /// Set a PWM duty value (fans, stirrer plate). Values are passed through unclamped.
    fn set_pwm(&mut self, value: u8) -> Result<(), DynError>;
}

/// One independently addressable controller board.
pub trait Board {
    /// Board label used in logs (e.g. `frodo1`).
    fn name(&self) -> &str;
    /// Whether this board carries a device called `device`.
    fn has_device(&self, device: &str) -> bool;
    /// Look up a device by name.
    fn device(&mut self, device: &str) -> Option<&mut dyn Actuator>;
}

/// A single-shot data acquisition unit (the pH probe digitiser).
pub trait Acquisition {
    /// Arm one fixed-length sampling run.
    fn run_single_shot(&mut self) -> Result<(), DynError>;
    /// Poll whether the current run has finished.
    fn sampling_done(&mut self) -> Result<bool, DynError>;
    /// Read back the samples of the last run. The buffer is owned by the caller.
    fn read_samples(&mut self) -> Result<Vec<f64>, DynError>;
    /// Stop the current run.
    fn stop(&mut self) -> Result<(), DynError>;
}

/// Tri-colour status LED on the acquisition unit.
pub trait Indicator {
    fn set_indicator(&mut self, r: u8, g: u8, b: u8) -> Result<(), DynError>;
}
