//! The rig facade: the verbs a run script uses.
//!
//! A `Rig` owns both boards, the pump calibration, the measurement channel
//! and the notifier. It takes `&mut self` for every actuation, so only one
//! command is ever in flight per rig.
use std::sync::Arc;
use std::time::Duration;

use rig_config::{CalibrationStore, PhCalibration, PumpCalibration};
use rig_traits::{Board, Clock, DynError, MonotonicClock};

use crate::cancel::CancelToken;
use crate::config::{CalibrationParams, MotionParams};
use crate::error::{Result, RigError};
use crate::hw_error::hw;
use crate::measurement::{MeasurementClient, MeasurementSource};
use crate::notify::{LogNotifier, Notice, Notifier, notify_best_effort};
use crate::probe::{ProbeGuard, home_probe, move_probe};
use crate::router::{BoardId, Boards, PulseTrain, RunReport, device};

/// PWM value used to spin stirrers up from rest.
pub const STIR_KICK: u8 = 250;
pub const STIR_KICK_TIME: Duration = Duration::from_millis(500);
pub const WHEEL_STIR_RATE: u8 = 35;
pub const PLATE_STIR_RATE: u8 = 30;

/// Operator-supplied vial weights during pump calibration.
pub trait WeightSource {
    /// Block until the operator reports the current weight.
    fn read_weight(&mut self, prompt: &str) -> std::result::Result<f64, DynError>;
}

/// A raw probe reading and, when buffers are calibrated, the fitted pH.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhReading {
    pub raw: f64,
    pub ph: Option<f64>,
}

/// What one calibration pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationOutcome {
    /// Pumps that received a new rate, in calibration order.
    pub rates: Vec<(String, f64)>,
    /// Pumps neither board knows.
    pub skipped: Vec<String>,
    /// Pumps whose measured rate was not positive.
    pub rejected: Vec<String>,
    /// Whether the mapping reached disk.
    pub persisted: bool,
}

pub struct Rig {
    name: String,
    boards: Boards,
    motion: MotionParams,
    params: CalibrationParams,
    store: CalibrationStore,
    calibration: PumpCalibration,
    ph_calibration: Option<PhCalibration>,
    measurement: Box<dyn MeasurementSource + Send>,
    notifier: Box<dyn Notifier + Send>,
    pulse: PulseTrain,
}

impl core::fmt::Debug for Rig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Rig")
            .field("name", &self.name)
            .field("boards", &self.boards)
            .field("calibration", &self.calibration)
            .field("ph_calibration", &self.ph_calibration)
            .finish_non_exhaustive()
    }
}

impl Rig {
    pub fn builder(name: impl Into<String>) -> RigBuilder {
        RigBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn calibration(&self) -> &PumpCalibration {
        &self.calibration
    }

    /// Every tracked pump has a usable rate.
    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_complete(&self.params.tracked_pumps)
    }

    /// Tracked pumps still lacking a rate.
    pub fn uncalibrated_pumps(&self) -> Vec<&str> {
        self.calibration.missing(&self.params.tracked_pumps)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.pulse.cancel_token().clone()
    }

    /// Devices the rig needs but neither board provides.
    pub fn missing_devices(&self) -> Vec<String> {
        let mut missing = Vec::new();
        for pump in &self.params.tracked_pumps {
            if self.boards.resolve(pump).is_err() {
                missing.push(pump.clone());
            }
        }
        missing
    }

    /// Dispense `volume` from `pump` using its calibrated rate.
    ///
    /// Nothing moves unless the pump has a rate and the volume is a
    /// non-negative number.
    pub fn dispense(&mut self, pump: &str, volume: f64) -> Result<RunReport> {
        let rate = self
            .calibration
            .rate(pump)
            .ok_or_else(|| RigError::UncalibratedPump(pump.to_string()))?;
        if !volume.is_finite() || volume < 0.0 {
            return Err(RigError::InvalidVolume(volume));
        }
        let id = self.boards.resolve(pump)?;
        tracing::info!(pump, volume, rate, board = self.boards.name(id), "dispense");
        self.pulse
            .run_by_volume(self.boards.get_mut(id), pump, volume, rate)
    }

    /// Run `pump` for a fixed time, calibrated or not.
    pub fn run_pump(&mut self, pump: &str, duration: Duration) -> Result<RunReport> {
        let id = self.boards.resolve(pump)?;
        tracing::info!(pump, secs = duration.as_secs_f64(), board = self.boards.name(id), "run pump");
        self.pulse.run_by_time(self.boards.get_mut(id), pump, duration)
    }

    /// Fill the lines of every tracked pump not listed in `skip`.
    pub fn prime_pumps(&mut self, skip: &[&str]) -> Result<()> {
        tracing::info!(?skip, "priming pumps");
        let pumps: Vec<String> = self
            .params
            .tracked_pumps
            .iter()
            .filter(|p| !skip.contains(&p.as_str()))
            .cloned()
            .collect();
        for pump in &pumps {
            self.run_pump(pump, self.params.prime)?;
        }
        tracing::info!(pumps = pumps.len(), "pumps primed");
        Ok(())
    }

    /// Advance the carousel `n` positions.
    pub fn turn_wheel(&mut self, n: u32) -> Result<()> {
        let steps = self.motion.wheel_turn_steps;
        let wheel = device(self.boards.main_mut(), &self.motion.wheel_device)?;
        for _ in 0..n {
            if self.pulse.cancel_token().is_cancelled() {
                return Err(RigError::Cancelled);
            }
            wheel.move_by(steps).map_err(hw)?;
        }
        tracing::debug!(turns = n, "wheel turned");
        Ok(())
    }

    pub fn move_probe(&mut self, position: i64) -> Result<()> {
        move_probe(self.boards.main_mut(), &self.motion, position)
    }

    pub fn lower_probe(&mut self) -> Result<()> {
        move_probe(self.boards.main_mut(), &self.motion, self.motion.probe_travel_limit)
    }

    pub fn raise_probe(&mut self) -> Result<()> {
        home_probe(self.boards.main_mut(), &self.motion)
    }

    /// Lower the probe, take one reading, raise the probe.
    ///
    /// The probe is raised exactly once whether or not the reading
    /// succeeded. A measurement error wins over a raise error.
    pub fn measure_ph(&mut self) -> Result<f64> {
        tracing::info!("measuring pH of sample solution");
        let mut guard = ProbeGuard::new(self.boards.main_mut(), &self.motion);
        guard.lower()?;
        let value = self.measurement.request_measurement();
        let raised = guard.release();
        let value = value?;
        raised?;
        Ok(value)
    }

    /// `measure_ph` plus conversion through the buffer calibration, if any.
    pub fn measure_ph_calibrated(&mut self) -> Result<PhReading> {
        let raw = self.measure_ph()?;
        let ph = self.ph_calibration.map(|c| c.to_ph(raw));
        match ph {
            Some(ph) => tracing::info!(raw, ph, "pH measured"),
            None => tracing::warn!(raw, "pH calibrations have not been set; reporting raw value"),
        }
        Ok(PhReading { raw, ph })
    }

    /// Fan PWM under the wheel. Values are passed through unclamped.
    pub fn set_stir_rate(&mut self, value: u8) -> Result<()> {
        set_pwm(&mut self.boards, &self.motion.fans_device, value)
    }

    pub fn set_stirrer_plate_rate(&mut self, value: u8) -> Result<()> {
        set_pwm(&mut self.boards, &self.motion.stirrer_device, value)
    }

    pub fn start_wheel_stirring(&mut self) -> Result<()> {
        self.set_stir_rate(STIR_KICK)?;
        self.pulse.clock().sleep(STIR_KICK_TIME);
        self.set_stir_rate(WHEEL_STIR_RATE)
    }

    pub fn stop_wheel_stirring(&mut self) -> Result<()> {
        self.set_stir_rate(0)
    }

    pub fn start_stirrer_plate(&mut self) -> Result<()> {
        self.set_stirrer_plate_rate(STIR_KICK)?;
        self.pulse.clock().sleep(STIR_KICK_TIME);
        self.set_stirrer_plate_rate(PLATE_STIR_RATE)
    }

    pub fn stop_stirrer_plate(&mut self) -> Result<()> {
        self.set_stirrer_plate_rate(0)
    }

    /// Measure every tracked pump's rate against operator weighings.
    ///
    /// Per pump and repetition: weigh, run for the reference time, advance
    /// the wheel to a fresh vial, weigh again. Deltas are rounded to 4
    /// decimals and averaged. The mapping is written once, after the last
    /// pump; an interrupted pass leaves the file untouched. A failed write
    /// is logged and the new rates stay in memory for this session.
    pub fn calibrate(&mut self, weights: &mut dyn WeightSource) -> Result<CalibrationOutcome> {
        let mut outcome = CalibrationOutcome::default();
        let reps = self.params.repetitions.max(1);
        let reference = self.params.reference;
        let per_minute = 60.0 / reference.as_secs_f64();
        let pumps = self.params.tracked_pumps.clone();

        for pump in &pumps {
            let id = match self.boards.resolve(pump) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(pump = %pump, error = %e, "unrecognised pump; skipped");
                    outcome.skipped.push(pump.clone());
                    continue;
                }
            };
            tracing::info!(pump = %pump, repetitions = reps, "calibrating pump");

            let mut total = 0.0;
            for rep in 1..=reps {
                let before = read_weight(weights, &format!("{pump} weight before ({rep}/{reps}): "))?;
                self.pulse.run_by_time(self.boards.get_mut(id), pump, reference)?;
                self.turn_wheel(1)?;
                let after = read_weight(weights, &format!("{pump} weight after ({rep}/{reps}): "))?;
                total += round4(after - before);
            }
            let rate = total / f64::from(reps) * per_minute;

            if rate.is_finite() && rate > 0.0 {
                tracing::info!(pump = %pump, rate, "calibration set (volume per minute)");
                self.calibration.set(pump.clone(), rate);
                outcome.rates.push((pump.clone(), rate));
            } else {
                tracing::warn!(pump = %pump, rate, "non-positive rate not stored");
                outcome.rejected.push(pump.clone());
            }
        }

        match self.store.save(&self.name, &self.calibration) {
            Ok(()) => outcome.persisted = true,
            Err(e) => {
                let err = RigError::CalibrationPersist(e.to_string());
                tracing::error!(error = %err, "calibration kept in memory only");
            }
        }
        Ok(outcome)
    }

    /// Tell the measurement process to exit.
    pub fn kill_ph_server(&mut self) -> Result<()> {
        tracing::info!("killing connection to pH server");
        self.measurement.request_shutdown()
    }

    /// Best-effort operator notification.
    pub fn notify(&mut self, notice: Notice) {
        notify_best_effort(self.notifier.as_mut(), &notice);
    }
}

fn read_weight(weights: &mut dyn WeightSource, prompt: &str) -> Result<f64> {
    let w = weights
        .read_weight(prompt)
        .map_err(|e| RigError::Hardware(format!("weight input: {e}")))?;
    if !w.is_finite() {
        return Err(RigError::Hardware(format!("weight input: {w} is not a weight")));
    }
    Ok(w)
}

/// PWM outputs all live on the main board.
fn set_pwm(boards: &mut Boards, dev: &str, value: u8) -> Result<()> {
    tracing::debug!(device = dev, value, "pwm");
    device(boards.get_mut(BoardId::Main), dev)?
        .set_pwm(value)
        .map_err(hw)
}

fn round4(x: f64) -> f64 {
    (x * 1e4).round() / 1e4
}

/// Builder for `Rig`. Boards, store and measurement channel are required.
pub struct RigBuilder {
    name: String,
    boards: Option<Boards>,
    motion: MotionParams,
    params: CalibrationParams,
    store: Option<CalibrationStore>,
    ph_calibration: Option<PhCalibration>,
    measurement: Option<Box<dyn MeasurementSource + Send>>,
    notifier: Option<Box<dyn Notifier + Send>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    cancel: Option<CancelToken>,
}

impl RigBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            boards: None,
            motion: MotionParams::default(),
            params: CalibrationParams::default(),
            store: None,
            ph_calibration: None,
            measurement: None,
            notifier: None,
            clock: None,
            cancel: None,
        }
    }

    /// Everything except the boards, taken from a validated config.
    pub fn from_config(cfg: &rig_config::Config) -> Result<Self> {
        let client = MeasurementClient::resolve(
            &cfg.measurement.addr,
            Duration::from_millis(cfg.measurement.timeout_ms),
        )?;
        Ok(Self::new(cfg.rig.name.clone())
            .with_motion(MotionParams::from(&cfg.motion))
            .with_calibration_params(CalibrationParams::from(cfg))
            .with_store(cfg.calibration_store())
            .with_measurement(client)
            .with_notifier(LogNotifier::from(&cfg.notify)))
    }

    pub fn with_boards(
        mut self,
        main: impl Board + Send + 'static,
        secondary: impl Board + Send + 'static,
    ) -> Self {
        self.boards = Some(Boards::new(Box::new(main), Box::new(secondary)));
        self
    }

    pub fn with_motion(mut self, motion: MotionParams) -> Self {
        self.motion = motion;
        self
    }

    pub fn with_calibration_params(mut self, params: CalibrationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_store(mut self, store: CalibrationStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_ph_calibration(mut self, cal: Option<PhCalibration>) -> Self {
        self.ph_calibration = cal;
        self
    }

    pub fn with_measurement(mut self, source: impl MeasurementSource + Send + 'static) -> Self {
        self.measurement = Some(Box::new(source));
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + Send + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Validate, load the stored pump calibration and build the rig.
    pub fn build(self) -> Result<Rig> {
        let RigBuilder {
            name,
            boards,
            motion,
            params,
            store,
            ph_calibration,
            measurement,
            notifier,
            clock,
            cancel,
        } = self;

        let boards = boards.ok_or_else(|| RigError::Config("rig has no boards".into()))?;
        let store = store.ok_or_else(|| RigError::Config("rig has no calibration store".into()))?;
        let measurement =
            measurement.ok_or_else(|| RigError::Config("rig has no measurement channel".into()))?;
        if motion.wheel_turn_steps <= 0 || motion.pump_increment_steps <= 0 {
            return Err(RigError::Config("step counts must be > 0".into()));
        }
        if motion.probe_travel_limit <= 0 {
            return Err(RigError::Config("probe travel limit must be > 0".into()));
        }
        if params.reference.is_zero() {
            return Err(RigError::Config("calibration reference time must be > 0".into()));
        }

        let notifier: Box<dyn Notifier + Send> = match notifier {
            Some(n) => n,
            None => Box::new(LogNotifier::new(name.clone(), Vec::new())),
        };
        let clock: Arc<dyn Clock + Send + Sync> = match clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let pulse = PulseTrain::new(
            clock,
            motion.pump_increment_steps,
            motion.pulse_interval,
            cancel.unwrap_or_default(),
        );

        let calibration = store.load(&name);
        if !calibration.is_complete(&params.tracked_pumps) {
            tracing::warn!(
                rig = %name,
                missing = ?calibration.missing(&params.tracked_pumps),
                "!!! calibration needed !!!"
            );
        }
        tracing::info!(rig = %name, ?boards, "rig ready");

        Ok(Rig {
            name,
            boards,
            motion,
            params,
            store,
            calibration,
            ph_calibration,
            measurement,
            notifier,
            pulse,
        })
    }
}
