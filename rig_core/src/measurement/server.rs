//! Blocking accept loop of the pH measurement process.
//!
//! Each connection is handled to completion before the next accept; the
//! acquisition unit can only run one sampling pass at a time anyway.
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use rig_traits::{Acquisition, Clock, Indicator};

use super::{REQUEST_BUDGET, Request, encode_reply};
use crate::error::{Result, RigError};
use crate::hw_error::hw;
use crate::stats::SampleStats;

const RED: (u8, u8, u8) = (255, 0, 0);
const GREEN: (u8, u8, u8) = (0, 255, 0);
const BLUE: (u8, u8, u8) = (0, 0, 255);

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Listening,
    Connected,
    Sampling,
    Replying,
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// Pause between arming a run and reading it back. Not interruptible.
    pub settle: Duration,
    /// How long to wait for a request payload.
    pub read_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(1000),
            read_timeout: Duration::from_millis(10_000),
        }
    }
}

impl From<&rig_config::MeasurementCfg> for ServerOptions {
    fn from(c: &rig_config::MeasurementCfg) -> Self {
        Self {
            settle: Duration::from_millis(c.settle_ms),
            read_timeout: Duration::from_millis(c.timeout_ms),
        }
    }
}

/// Counters returned when the server shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeReport {
    pub replies: u64,
    pub failures: u64,
}

pub struct MeasurementServer<A, I, C> {
    listener: TcpListener,
    daq: A,
    indicator: I,
    clock: C,
    opts: ServerOptions,
    state: ServerState,
}

impl<A, I, C> core::fmt::Debug for MeasurementServer<A, I, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MeasurementServer")
            .field("addr", &self.listener.local_addr().ok())
            .field("state", &self.state)
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl<A: Acquisition, I: Indicator, C: Clock> MeasurementServer<A, I, C> {
    /// Bind the listening socket. The indicator goes red until `serve` runs.
    pub fn bind(
        addr: impl ToSocketAddrs,
        daq: A,
        indicator: I,
        clock: C,
        opts: ServerOptions,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let mut server = Self {
            listener,
            daq,
            indicator,
            clock,
            opts,
            state: ServerState::Listening,
        };
        server.light(RED);
        Ok(server)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Accept and answer requests until a `KILL` arrives.
    ///
    /// A failed sampling run closes that connection without a reply and the
    /// loop keeps listening. The server is consumed: the listening socket
    /// closes when this returns.
    pub fn serve(mut self) -> io::Result<ServeReport> {
        let mut report = ServeReport::default();
        tracing::info!(addr = ?self.listener.local_addr().ok(), "pH server listening");
        loop {
            self.enter(ServerState::Listening);
            self.light(GREEN);
            let (stream, peer) = match self.listener.accept() {
                Ok(c) => c,
                Err(e) => {
                    self.accept_failed(&e);
                    continue;
                }
            };
            self.enter(ServerState::Connected);
            tracing::debug!(%peer, "connection");
            match self.handle(stream) {
                Handled::Replied => report.replies += 1,
                Handled::Failed => report.failures += 1,
                Handled::Dropped => {}
                Handled::Kill => {
                    self.enter(ServerState::Shutdown);
                    self.light(RED);
                    tracing::info!(replies = report.replies, failures = report.failures, "pH server shutting down");
                    return Ok(report);
                }
            }
        }
    }

    fn accept_failed(&mut self, e: &io::Error) {
        tracing::warn!(error = %e, backoff = ?ACCEPT_BACKOFF, "accept failed");
        self.clock.sleep(ACCEPT_BACKOFF);
    }

    fn handle(&mut self, mut stream: TcpStream) -> Handled {
        let mut buf = [0u8; REQUEST_BUDGET];
        if let Err(e) = stream.set_read_timeout(Some(self.opts.read_timeout)) {
            tracing::warn!(error = %e, "read timeout not set");
            return Handled::Dropped;
        }
        let n = read_request(&mut stream, &mut buf);
        if n == 0 {
            tracing::debug!("peer closed without a request");
            return Handled::Dropped;
        }

        if Request::parse(&buf[..n]) == Request::Kill {
            return Handled::Kill;
        }

        self.enter(ServerState::Sampling);
        self.light(BLUE);
        let reply = self.sample().and_then(|stats| {
            tracing::info!(samples = stats.count, mean = stats.mean, std_dev = stats.std_dev, "pH sampled");
            encode_reply(stats.mean).map_err(|e| RigError::MeasurementFailed(e.to_string()))
        });
        let reply = match reply {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "sampling failed; closing without reply");
                self.light(RED);
                return Handled::Failed;
            }
        };

        self.enter(ServerState::Replying);
        if let Err(e) = stream.write_all(reply.as_bytes()).and_then(|()| stream.flush()) {
            tracing::warn!(error = %e, "reply not delivered");
            return Handled::Failed;
        }
        Handled::Replied
    }

    /// One single-shot run: arm, settle, read back, stop, reduce.
    fn sample(&mut self) -> Result<SampleStats> {
        self.daq.run_single_shot().map_err(hw)?;
        let early = self.daq.sampling_done().map_err(hw)?;
        self.clock.sleep(self.opts.settle);
        let done = self.daq.sampling_done().map_err(hw)?;
        tracing::trace!(early, done, "sampling status");

        let samples = self.daq.read_samples().map_err(hw);
        if let Err(e) = self.daq.stop() {
            tracing::warn!(error = %e, "acquisition stop failed");
        }
        let samples = samples?;
        SampleStats::from_samples(&samples).ok_or_else(|| {
            RigError::MeasurementFailed(format!(
                "run of {} samples has nothing usable",
                samples.len()
            ))
        })
    }

    fn enter(&mut self, next: ServerState) {
        tracing::trace!(from = ?self.state, to = ?next, "server state");
        self.state = next;
    }

    fn light(&mut self, (r, g, b): (u8, u8, u8)) {
        if let Err(e) = self.indicator.set_indicator(r, g, b) {
            tracing::debug!(error = %e, "indicator update ignored");
        }
    }
}

/// Fill `buf` until it is full, the peer shuts down its write side, or a read
/// fails. Returns how many bytes arrived.
fn read_request(stream: &mut impl Read, buf: &mut [u8]) -> usize {
    let mut n = 0;
    while n < buf.len() {
        match stream.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(k) => n += k,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::warn!(error = %e, received = n, "request read stopped");
                break;
            }
        }
    }
    n
}

enum Handled {
    Replied,
    Failed,
    Dropped,
    Kill,
}
