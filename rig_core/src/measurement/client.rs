use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{KILL, MeasurementSource, REPLY_BUDGET, REQUEST, decode_reply};
use crate::error::{Result, RigError};

/// Rig side of the protocol: one short-lived connection per request.
#[derive(Debug, Clone)]
pub struct MeasurementClient {
    addr: SocketAddr,
    timeout: Duration,
}

impl MeasurementClient {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }

    /// Resolve `addr` (e.g. `"127.0.0.1:9000"`) to the first socket address.
    pub fn resolve(addr: &str, timeout: Duration) -> Result<Self> {
        let sock = addr
            .to_socket_addrs()
            .map_err(|e| RigError::Config(format!("measurement addr {addr:?}: {e}")))?
            .next()
            .ok_or_else(|| RigError::Config(format!("measurement addr {addr:?} resolves to nothing")))?;
        Ok(Self::new(sock, timeout))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn connect(&self) -> Result<TcpStream> {
        let stream = TcpStream::connect_timeout(&self.addr, self.timeout)
            .map_err(|e| failed(format!("connect {}: {e}", self.addr)))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .and_then(|()| stream.set_write_timeout(Some(self.timeout)))
            .map_err(|e| failed(format!("socket options: {e}")))?;
        Ok(stream)
    }

    /// Send the trigger and wait for the mean of one sampling run.
    pub fn request_measurement(&self) -> Result<f64> {
        let mut stream = self.connect()?;
        stream
            .write_all(REQUEST.as_bytes())
            .map_err(|e| failed(format!("send request: {e}")))?;

        // One byte over budget so an oversized reply is detected, not truncated.
        let mut reply = Vec::with_capacity(REPLY_BUDGET);
        (&mut stream)
            .take(REPLY_BUDGET as u64 + 1)
            .read_to_end(&mut reply)
            .map_err(|e| failed(format!("read reply: {e}")))?;
        let value = decode_reply(&reply).map_err(|e| failed(e.to_string()))?;
        tracing::debug!(addr = %self.addr, value, "measurement reply");
        Ok(value)
    }

    /// Send `KILL` and close without waiting for anything.
    pub fn request_shutdown(&self) -> Result<()> {
        let mut stream = self.connect()?;
        stream
            .write_all(KILL.as_bytes())
            .map_err(|e| failed(format!("send kill: {e}")))?;
        let _ = stream.shutdown(Shutdown::Write);
        tracing::info!(addr = %self.addr, "pH server kill sent");
        Ok(())
    }
}

impl MeasurementSource for MeasurementClient {
    fn request_measurement(&mut self) -> Result<f64> {
        MeasurementClient::request_measurement(self)
    }

    fn request_shutdown(&mut self) -> Result<()> {
        MeasurementClient::request_shutdown(self)
    }
}

fn failed(msg: String) -> RigError {
    RigError::MeasurementFailed(msg)
}
