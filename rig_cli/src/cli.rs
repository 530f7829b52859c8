//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "rig", version, about = "Synthesis rig CLI")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum StirTarget {
    /// Fans under the wheel
    Wheel,
    /// Stirrer plate
    Plate,
}

#[derive(Subcommand, Debug)]
pub enum ProbeCmd {
    /// Home the probe (fully raised)
    Raise,
    /// Lower the probe to its travel limit
    Lower,
    /// Move the probe to an absolute position within [0, travel limit]
    Move {
        #[arg(allow_negative_numbers = true)]
        position: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispense a volume from a calibrated pump
    Dispense {
        /// Pump name (e.g. R1)
        pump: String,
        /// Volume in calibration units
        #[arg(allow_negative_numbers = true)]
        volume: f64,
    },
    /// Run a pump for a fixed time, calibrated or not
    RunPump {
        pump: String,
        /// Seconds to run
        secs: f64,
    },
    /// Prime the lines of every tracked pump
    Prime {
        /// Pumps to leave alone
        #[arg(long, value_name = "PUMP")]
        skip: Vec<String>,
    },
    /// Advance the carousel
    TurnWheel {
        #[arg(default_value_t = 1)]
        turns: u32,
    },
    /// Move the pH probe
    Probe {
        #[command(subcommand)]
        action: ProbeCmd,
    },
    /// Start or stop stirring
    Stir {
        #[arg(value_enum)]
        target: StirTarget,
        /// Raw PWM value instead of the kick-then-settle start
        #[arg(long, value_name = "PWM")]
        rate: Option<u8>,
        /// Stop stirring
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "rate")]
        off: bool,
    },
    /// Take one pH reading through the measurement server
    Measure,
    /// Run the pH measurement server until it receives KILL
    PhServer,
    /// Tell a running pH server to exit
    KillPhServer,
    /// Calibrate every tracked pump against weighings read from stdin
    Calibrate,
    /// Run a synthesis plan CSV
    RunPlan {
        /// Plan CSV (reaction,<pump>,<pump>,...)
        plan: PathBuf,
        /// Prime all pumps before the first reaction
        #[arg(long, action = ArgAction::SetTrue)]
        prime: bool,
    },
    /// Quick health check (device catalog and calibration state)
    SelfCheck,
}
