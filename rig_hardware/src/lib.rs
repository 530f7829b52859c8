//! Simulated rig hardware.
//!
//! `SimulatedBoard` stands in for one controller board and records every
//! command it receives in a shared `Journal`, so tests (and `self-check`)
//! can see exactly what the core asked the hardware to do.
//! `SimulatedAcquisition` returns a fixed-length sample run around a
//! configurable mean, or fails on demand.
pub mod error;

use rig_traits::{Acquisition, Actuator, Board, DynError, Indicator};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub use error::HwError;

/// One command as seen by a simulated board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    MoveBy { device: String, steps: i64 },
    MoveTo { device: String, position: i64 },
    SetPosition { device: String, position: i64 },
    Home { device: String },
    Pwm { device: String, value: u8 },
}

impl Command {
    pub fn device(&self) -> &str {
        match self {
            Command::MoveBy { device, .. }
            | Command::MoveTo { device, .. }
            | Command::SetPosition { device, .. }
            | Command::Home { device }
            | Command::Pwm { device, .. } => device,
        }
    }
}

/// Shared, cloneable command log.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Command>>>);

impl Journal {
    fn push(&self, c: Command) {
        if let Ok(mut v) = self.0.lock() {
            v.push(c);
        }
    }

    pub fn commands(&self) -> Vec<Command> {
        self.0.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Commands addressed to `device`.
    pub fn for_device(&self, device: &str) -> Vec<Command> {
        self.commands()
            .into_iter()
            .filter(|c| c.device() == device)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().map(|v| v.is_empty()).unwrap_or(true)
    }

    pub fn clear(&self) {
        if let Ok(mut v) = self.0.lock() {
            v.clear();
        }
    }
}

/// Simulated actuator: tracks its position counter and logs commands.
#[derive(Debug)]
pub struct SimulatedActuator {
    name: String,
    position: i64,
    pwm: u8,
    journal: Journal,
    fail: bool,
}

impl SimulatedActuator {
    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn pwm(&self) -> u8 {
        self.pwm
    }

    fn check(&self) -> Result<(), DynError> {
        if self.fail {
            return Err(Box::new(HwError::Actuator(self.name.clone())));
        }
        Ok(())
    }
}

impl Actuator for SimulatedActuator {
    fn move_by(&mut self, steps: i64) -> Result<(), DynError> {
        self.check()?;
        self.position = self.position.saturating_add(steps);
        self.journal.push(Command::MoveBy {
            device: self.name.clone(),
            steps,
        });
        Ok(())
    }

    fn move_to(&mut self, position: i64) -> Result<(), DynError> {
        self.check()?;
        self.position = position;
        self.journal.push(Command::MoveTo {
            device: self.name.clone(),
            position,
        });
        Ok(())
    }

    fn set_current_position(&mut self, position: i64) -> Result<(), DynError> {
        self.check()?;
        self.position = position;
        self.journal.push(Command::SetPosition {
            device: self.name.clone(),
            position,
        });
        Ok(())
    }

    fn home(&mut self) -> Result<(), DynError> {
        self.check()?;
        self.position = 0;
        self.journal.push(Command::Home {
            device: self.name.clone(),
        });
        Ok(())
    }

    fn set_pwm(&mut self, value: u8) -> Result<(), DynError> {
        self.check()?;
        self.pwm = value;
        self.journal.push(Command::Pwm {
            device: self.name.clone(),
            value,
        });
        Ok(())
    }
}

/// Simulated controller board with a fixed device catalog.
#[derive(Debug)]
pub struct SimulatedBoard {
    name: String,
    devices: BTreeMap<String, SimulatedActuator>,
    journal: Journal,
}

impl SimulatedBoard {
    pub fn new<I, S>(name: impl Into<String>, devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let journal = Journal::default();
        let devices = devices
            .into_iter()
            .map(|d| {
                let d = d.into();
                let act = SimulatedActuator {
                    name: d.clone(),
                    position: 0,
                    pwm: 0,
                    journal: journal.clone(),
                    fail: false,
                };
                (d, act)
            })
            .collect();
        Self {
            name: name.into(),
            devices,
            journal,
        }
    }

    /// Make every command to `device` fail.
    pub fn with_faulty(mut self, device: &str) -> Self {
        if let Some(a) = self.devices.get_mut(device) {
            a.fail = true;
        }
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn actuator(&self, device: &str) -> Option<&SimulatedActuator> {
        self.devices.get(device)
    }
}

impl Board for SimulatedBoard {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_device(&self, device: &str) -> bool {
        self.devices.contains_key(device)
    }

    fn device(&mut self, device: &str) -> Option<&mut dyn Actuator> {
        self.devices
            .get_mut(device)
            .map(|a| a as &mut dyn Actuator)
    }
}

/// How the simulated acquisition unit behaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcquisitionMode {
    /// Samples alternate `mean - spread`, `mean + spread`.
    Steady { mean: f64, spread: f64 },
    /// `read_samples` reports a driver fault.
    Faulty,
    /// `read_samples` times out.
    Timeout,
}

/// Simulated single-shot digitiser producing `samples` values per run.
#[derive(Debug)]
pub struct SimulatedAcquisition {
    mode: AcquisitionMode,
    samples: usize,
    armed: bool,
    runs: usize,
}

impl SimulatedAcquisition {
    /// Production run length of the pH digitiser.
    pub const DEFAULT_SAMPLES: usize = 20_000;

    pub fn new(mode: AcquisitionMode) -> Self {
        Self {
            mode,
            samples: Self::DEFAULT_SAMPLES,
            armed: false,
            runs: 0,
        }
    }

    pub fn with_samples(mut self, n: usize) -> Self {
        self.samples = n;
        self
    }

    /// Completed sampling runs.
    pub fn runs(&self) -> usize {
        self.runs
    }
}

impl Acquisition for SimulatedAcquisition {
    fn run_single_shot(&mut self) -> Result<(), DynError> {
        self.armed = true;
        Ok(())
    }

    fn sampling_done(&mut self) -> Result<bool, DynError> {
        Ok(self.armed)
    }

    fn read_samples(&mut self) -> Result<Vec<f64>, DynError> {
        if !self.armed {
            return Err(Box::new(HwError::Acquisition("no run armed".into())));
        }
        match self.mode {
            AcquisitionMode::Steady { mean, spread } => {
                self.runs += 1;
                tracing::debug!(samples = self.samples, mean, "simulated sampling run");
                Ok((0..self.samples)
                    .map(|i| if i % 2 == 0 { mean - spread } else { mean + spread })
                    .collect())
            }
            AcquisitionMode::Faulty => Err(Box::new(HwError::Acquisition("overflow on channel".into()))),
            AcquisitionMode::Timeout => Err(Box::new(HwError::Timeout)),
        }
    }

    fn stop(&mut self) -> Result<(), DynError> {
        self.armed = false;
        Ok(())
    }
}

/// Indicator that remembers every colour it was set to.
#[derive(Debug, Clone, Default)]
pub struct SimulatedIndicator(Arc<Mutex<Vec<(u8, u8, u8)>>>);

impl SimulatedIndicator {
    pub fn history(&self) -> Vec<(u8, u8, u8)> {
        self.0.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<(u8, u8, u8)> {
        self.history().last().copied()
    }
}

impl Indicator for SimulatedIndicator {
    fn set_indicator(&mut self, r: u8, g: u8, b: u8) -> Result<(), DynError> {
        if let Ok(mut v) = self.0.lock() {
            v.push((r, g, b));
        }
        Ok(())
    }
}
