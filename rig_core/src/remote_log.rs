//! Shipping log lines to a remote log host.
//!
//! `RemoteLog::open` connects, announces the platform with
//! `<PLATFORM>::INIT` and spawns one thread that forwards every line as
//! `<PLATFORM>::LOG::<line>`. Frames are newline-terminated. The thread is
//! stopped and joined by `close` or when the `RemoteLog` is dropped.
use crossbeam_channel as xch;
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::thread::JoinHandle;
use std::time::Duration;

enum Msg {
    Line(String),
    Terminate,
}

pub struct RemoteLog {
    tx: xch::Sender<Msg>,
    join_handle: Option<JoinHandle<()>>,
}

impl core::fmt::Debug for RemoteLog {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RemoteLog")
            .field("running", &self.join_handle.is_some())
            .finish()
    }
}

impl RemoteLog {
    /// Connect to the log host and start the forwarding thread.
    pub fn open(addr: impl ToSocketAddrs, platform: &str, timeout: Duration) -> io::Result<Self> {
        let sock = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log host resolves to nothing"))?;
        let mut stream = TcpStream::connect_timeout(&sock, timeout)?;
        stream.set_write_timeout(Some(timeout))?;
        stream.write_all(format!("{platform}::INIT\n").as_bytes())?;

        let (tx, rx) = xch::unbounded::<Msg>();
        let platform = platform.to_string();
        let join_handle = std::thread::Builder::new()
            .name("remote-log".into())
            .spawn(move || {
                for msg in rx.iter() {
                    match msg {
                        Msg::Line(line) => {
                            let frame = format!("{platform}::LOG::{line}\n");
                            if let Err(e) = stream.write_all(frame.as_bytes()) {
                                // Reporting through tracing would feed this thread again.
                                eprintln!("remote log host unreachable, shipping stopped: {e}");
                                break;
                            }
                        }
                        Msg::Terminate => break,
                    }
                }
                let _ = stream.flush();
                let _ = stream.shutdown(Shutdown::Both);
            })?;

        Ok(Self {
            tx,
            join_handle: Some(join_handle),
        })
    }

    /// A `Write` handle; each write is shipped as one line.
    pub fn writer(&self) -> RemoteLogWriter {
        RemoteLogWriter {
            tx: self.tx.clone(),
        }
    }

    /// Ship a single line.
    pub fn send(&self, line: &str) {
        let _ = self.tx.send(Msg::Line(line.to_string()));
    }

    /// Flush queued lines, close the connection and join the thread.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            let _ = self.tx.send(Msg::Terminate);
            if handle.join().is_err() {
                tracing::warn!("remote log thread panicked during shutdown");
            }
        }
    }
}

impl Drop for RemoteLog {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Cloneable writer feeding a `RemoteLog`. Writes after `close` are dropped.
#[derive(Clone)]
pub struct RemoteLogWriter {
    tx: xch::Sender<Msg>,
}

impl Write for RemoteLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        for line in text.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
            let _ = self.tx.send(Msg::Line(line.to_string()));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    #[test]
    fn frames_are_prefixed_and_closed_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let log = RemoteLog::open(addr, "CLUSTERBOT", Duration::from_secs(2)).unwrap();
        let (mut peer, _) = listener.accept().unwrap();

        log.send("wheel turned");
        let mut w = log.writer();
        w.write_all(b"dispensed 5 mL\n\n").unwrap();
        log.close();
        // Writes after close are silently dropped.
        w.write_all(b"late\n").unwrap();

        let mut got = String::new();
        peer.read_to_string(&mut got).unwrap();
        assert_eq!(
            got,
            "CLUSTERBOT::INIT\nCLUSTERBOT::LOG::wheel turned\nCLUSTERBOT::LOG::dispensed 5 mL\n"
        );
    }

    #[test]
    fn unreachable_host_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(RemoteLog::open(addr, "X", Duration::from_millis(200)).is_err());
    }
}
