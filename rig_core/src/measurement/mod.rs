//! Request/reply protocol between the rig and the pH measurement server.
//!
//! One TCP connection carries one request. The rig sends the opaque trigger
//! [`REQUEST`]; the server answers with the mean of one sampling run as ASCII
//! decimal text and closes. [`KILL`] stops the server without a reply.
//!
//! ```text
//! rig                         server
//!  |---- "measure pH value" --->|  Connected -> Sampling
//!  |<------- "512.000" ---------|  Replying  -> Listening
//!  |---- "KILL" --------------->|  Shutdown
//! ```
use thiserror::Error;

use crate::error::Result;

pub mod client;
pub mod server;

pub use client::MeasurementClient;
pub use server::{MeasurementServer, ServeReport, ServerOptions, ServerState};

pub const REQUEST: &str = "measure pH value";
pub const KILL: &str = "KILL";
/// Bytes the server reads per request.
pub const REQUEST_BUDGET: usize = 16;
/// Largest reply the protocol carries.
pub const REPLY_BUDGET: usize = 32;
pub const DEFAULT_ADDR: &str = "127.0.0.1:9000";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WireError {
    #[error("value {0} cannot be sent")]
    NotFinite(f64),
    #[error("reply of {0} bytes exceeds the {REPLY_BUDGET}-byte budget")]
    TooLong(usize),
    #[error("empty reply")]
    Empty,
    #[error("reply is not text")]
    NotUtf8,
    #[error("reply {0:?} is not a number")]
    Parse(String),
}

/// What a received payload asks the server to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Measure,
    Kill,
}

impl Request {
    /// `KILL` (surrounding whitespace ignored) is the only special payload;
    /// anything else triggers a measurement.
    pub fn parse(payload: &[u8]) -> Self {
        if payload.trim_ascii() == KILL.as_bytes() {
            Request::Kill
        } else {
            Request::Measure
        }
    }
}

/// Encode a mean as `%.3f` text, refusing what does not fit the budget.
pub fn encode_reply(mean: f64) -> std::result::Result<String, WireError> {
    if !mean.is_finite() {
        return Err(WireError::NotFinite(mean));
    }
    let text = format!("{mean:.3}");
    if text.len() > REPLY_BUDGET {
        return Err(WireError::TooLong(text.len()));
    }
    Ok(text)
}

pub fn decode_reply(bytes: &[u8]) -> std::result::Result<f64, WireError> {
    if bytes.len() > REPLY_BUDGET {
        return Err(WireError::TooLong(bytes.len()));
    }
    let text = std::str::from_utf8(bytes).map_err(|_| WireError::NotUtf8)?.trim();
    if text.is_empty() {
        return Err(WireError::Empty);
    }
    let v: f64 = text.parse().map_err(|_| WireError::Parse(text.to_string()))?;
    if !v.is_finite() {
        return Err(WireError::NotFinite(v));
    }
    Ok(v)
}

/// Anything that can produce a raw pH reading on demand.
pub trait MeasurementSource {
    fn request_measurement(&mut self) -> Result<f64>;
    /// Ask the measurement process to exit. Does not wait for it.
    fn request_shutdown(&mut self) -> Result<()>;
}
