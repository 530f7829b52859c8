#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core rig logic (hardware-agnostic).
//!
//! All hardware interactions go through the `rig_traits` seams (`Board`,
//! `Acquisition`, `Indicator`, `Clock`), so the same code drives the real
//! boards and the simulated backend.
//!
//! ## Architecture
//!
//! - **Routing**: which board owns a pump, duration and volume runs (`router`)
//! - **Measurement**: request/reply protocol with the pH server (`measurement`)
//! - **Facade**: the operator verbs and the calibration procedure (`rig`)
//! - **Plans**: running a synthesis plan reaction by reaction (`plan`)
//! - **Side channels**: best-effort notifications (`notify`) and log shipping
//!   to a remote log host (`remote_log`)

pub mod cancel;
pub mod config;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod measurement;
pub mod mocks;
pub mod notify;
pub mod plan;
pub mod probe;
pub mod remote_log;
pub mod rig;
pub mod router;
pub mod stats;

pub use cancel::CancelToken;
pub use config::{CalibrationParams, MotionParams};
pub use error::{Result, RigError};
pub use measurement::{MeasurementClient, MeasurementServer, MeasurementSource};
pub use notify::{LogNotifier, Notice, Notifier};
pub use plan::{Operator, PlanReport, run_plan};
pub use remote_log::{RemoteLog, RemoteLogWriter};
pub use rig::{CalibrationOutcome, PhReading, Rig, RigBuilder, WeightSource};
pub use router::{BoardId, Boards, PulseTrain, RunReport, run_time_for_volume};
pub use stats::SampleStats;
