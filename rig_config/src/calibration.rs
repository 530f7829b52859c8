//! Per-rig pump calibration: pump id -> dispense rate in volume per minute.
//!
//! The file is a flat JSON object, e.g. `{"R1": 10.0, "R2": 9.7}`, stored as
//! `<calibration_dir>/<rig>.json`. Loading never fails: a missing or corrupt
//! file means "calibration required" and yields an empty mapping.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::atomic::write_atomic;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PumpCalibration(BTreeMap<String, f64>);

impl PumpCalibration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispense rate for `pump`, only when it is usable (finite and > 0).
    pub fn rate(&self, pump: &str) -> Option<f64> {
        self.0
            .get(pump)
            .copied()
            .filter(|r| r.is_finite() && *r > 0.0)
    }

    pub fn set(&mut self, pump: impl Into<String>, rate: f64) {
        self.0.insert(pump.into(), rate);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// True only if every tracked pump has a strictly positive rate.
    ///
    /// An empty mapping is never complete, whatever the tracked list holds.
    pub fn is_complete<S: AsRef<str>>(&self, tracked: &[S]) -> bool {
        !self.0.is_empty() && tracked.iter().all(|p| self.rate(p.as_ref()).is_some())
    }

    /// Tracked pumps that still need a rate.
    pub fn missing<'a, S: AsRef<str>>(&self, tracked: &'a [S]) -> Vec<&'a str> {
        tracked
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| self.rate(p).is_none())
            .collect()
    }
}

impl FromIterator<(String, f64)> for PumpCalibration {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Error)]
pub enum CalibrationPersistError {
    #[error("serialize calibration: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("write calibration {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Directory of per-rig calibration files.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    dir: PathBuf,
}

impl CalibrationStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, rig: &str) -> PathBuf {
        self.dir.join(format!("{rig}.json"))
    }

    /// Read the rig's calibration. Any I/O or parse failure is logged and
    /// returns an empty mapping.
    pub fn load(&self, rig: &str) -> PumpCalibration {
        let path = self.path_for(rig);
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "no calibration file; calibration required");
                return PumpCalibration::new();
            }
        };
        match serde_json::from_str::<PumpCalibration>(&text) {
            Ok(cal) => {
                tracing::info!(path = %path.display(), pumps = cal.len(), "calibrations found");
                cal
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable calibration file; calibration required");
                PumpCalibration::new()
            }
        }
    }

    /// Overwrite the rig's calibration file atomically.
    pub fn save(&self, rig: &str, cal: &PumpCalibration) -> Result<(), CalibrationPersistError> {
        let path = self.path_for(rig);
        let bytes = serde_json::to_vec_pretty(cal)?;
        write_atomic(&path, &bytes).map_err(|source| CalibrationPersistError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), pumps = cal.len(), "calibrations written");
        Ok(())
    }
}
