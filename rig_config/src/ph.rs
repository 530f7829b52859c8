//! Buffer calibration for the pH probe.
//!
//! The probe reports a raw millivolt-ish value. Reading it in buffer
//! solutions of known pH (4, 7, 10) gives points for a straight line
//! pH = slope * raw + intercept. The file is stored per rig as
//! `<rig>_pH_calibrations.json`, mapping the buffer pH to the raw reading:
//!
//! ```json
//! {"4": 612.0, "7": 512.0, "10": 410.0}
//! ```
//!
//! A raw value of 0 marks a buffer that has not been measured yet; such a
//! file loads as "not calibrated".
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhCalibration {
    pub slope: f64,
    pub intercept: f64,
}

impl PhCalibration {
    /// Fit pH = a*raw + b by ordinary least squares over `(raw, ph)` points.
    pub fn from_points(points: &[(f64, f64)]) -> eyre::Result<Self> {
        if points.len() < 2 {
            eyre::bail!(
                "pH calibration requires at least two buffers, got {}",
                points.len()
            );
        }
        if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            eyre::bail!("pH calibration contains non-finite values");
        }

        let n = points.len() as f64;
        let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
        let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
        let mut sxx = 0.0f64;
        let mut sxy = 0.0f64;
        for (rx, py) in points {
            let x = rx - mean_x;
            sxx += x * x;
            sxy += x * (py - mean_y);
        }
        if !sxx.is_finite() || sxx == 0.0 {
            eyre::bail!("pH calibration cannot determine slope (all raw readings equal)");
        }
        let slope = sxy / sxx;
        if !slope.is_finite() || slope == 0.0 {
            eyre::bail!("pH calibration produced an unusable slope");
        }
        Ok(Self {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    pub fn to_ph(&self, raw: f64) -> f64 {
        self.slope * raw + self.intercept
    }
}

pub fn ph_calibration_path(dir: &Path, rig: &str) -> PathBuf {
    dir.join(format!("{rig}_pH_calibrations.json"))
}

/// Load and fit the buffer file. `Ok(None)` when any buffer is still unmeasured.
pub fn load_ph_calibration(path: &Path) -> eyre::Result<Option<PhCalibration>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("open pH calibration {:?}: {}", path, e))?;
    let raw: BTreeMap<String, f64> = serde_json::from_str(&text)
        .map_err(|e| eyre::eyre!("parse pH calibration {:?}: {}", path, e))?;

    if raw.values().any(|v| *v == 0.0) {
        return Ok(None);
    }

    let mut points = Vec::with_capacity(raw.len());
    for (label, reading) in &raw {
        let ph: f64 = label
            .trim()
            .parse()
            .map_err(|_| eyre::eyre!("pH calibration key {label:?} is not a number"))?;
        points.push((*reading, ph));
    }
    PhCalibration::from_points(&points).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_line_is_recovered() {
        // pH = -0.03 * raw + 22.36
        let pts: Vec<(f64, f64)> = [4.0, 7.0, 10.0]
            .iter()
            .map(|ph| ((22.36 - ph) / 0.03, *ph))
            .collect();
        let cal = PhCalibration::from_points(&pts).unwrap();
        assert!((cal.slope + 0.03).abs() < 1e-9);
        assert!((cal.to_ph(512.0) - 7.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_degenerate_buffers() {
        let err = PhCalibration::from_points(&[(500.0, 4.0), (500.0, 7.0)]).unwrap_err();
        assert!(err.to_string().contains("all raw readings equal"));
        assert!(PhCalibration::from_points(&[(500.0, 4.0)]).is_err());
    }
}
