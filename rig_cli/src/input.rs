//! Operator input on stdin. Prompts go to stderr so stdout stays parseable.

use std::io::{BufRead, Write};

use rig_core::{Operator, WeightSource};
use rig_traits::DynError;

fn read_line(prompt: &str) -> Result<String, DynError> {
    let mut err = std::io::stderr().lock();
    write!(err, "{prompt}")?;
    err.flush()?;
    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line)? == 0 {
        return Err("stdin closed".into());
    }
    Ok(line.trim().to_string())
}

/// Reads one balance reading per prompt.
#[derive(Debug, Default)]
pub struct StdinWeights;

impl WeightSource for StdinWeights {
    fn read_weight(&mut self, prompt: &str) -> Result<f64, DynError> {
        loop {
            let line = read_line(prompt)?;
            match line.parse::<f64>() {
                Ok(w) if w.is_finite() => return Ok(w),
                _ => eprintln!("not a weight: {line:?}"),
            }
        }
    }
}

/// Waits for Enter before a tray change.
#[derive(Debug, Default)]
pub struct StdinOperator;

impl Operator for StdinOperator {
    fn acknowledge(&mut self, prompt: &str) -> Result<(), DynError> {
        read_line(&format!("{prompt}\n")).map(|_| ())
    }
}
