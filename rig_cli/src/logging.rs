//! Tracing setup: console (pretty or JSON), optional file, optional remote log host.

use std::time::Duration;

use rig_config::Config;
use rig_core::RemoteLog;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::FILE_GUARD;

const REMOTE_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the config level, which wins over `--log-level`.
/// Console output goes to stderr so stdout only carries command results.
/// Returns the remote shipper, if one is configured and reachable; the
/// caller closes it before exiting so queued lines are flushed.
pub fn init(cfg: &Config, json: bool, cli_level: &str) -> Option<RemoteLog> {
    let level = cfg.logging.level.as_deref().unwrap_or(cli_level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_json = json.then(|| {
        fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
    });
    let console_pretty = (!json).then(|| {
        fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let file_layer = cfg.logging.file.as_deref().map(|path| {
        let path = std::path::Path::new(path);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "rig.log".into(), |n| n.to_string_lossy().into_owned());
        let appender = match cfg.logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_ansi(false).with_writer(writer)
    });

    // The connection has to exist before the subscriber; failures are
    // reported once the subscriber is up.
    let mut remote_err = None;
    let remote = cfg.logging.remote.as_deref().and_then(|addr| {
        match RemoteLog::open(addr, &cfg.notify.platform.to_uppercase(), REMOTE_CONNECT_TIMEOUT) {
            Ok(log) => Some(log),
            Err(e) => {
                remote_err = Some((addr.to_string(), e));
                None
            }
        }
    });
    let remote_layer = remote.as_ref().map(|log| {
        let w = log.writer();
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(move || w.clone())
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_json)
        .with(console_pretty)
        .with(file_layer)
        .with(remote_layer)
        .try_init();

    if let Some((addr, e)) = remote_err {
        tracing::warn!(%addr, error = %e, "log host unreachable; logging locally only");
    }
    remote
}
