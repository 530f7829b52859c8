//! Test and helper mocks for rig_core
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rig_traits::DynError;

use crate::error::{Result, RigError};
use crate::measurement::MeasurementSource;
use crate::notify::{Notice, Notifier};
use crate::plan::Operator;
use crate::rig::WeightSource;

/// Measurement source that replays scripted replies, then fails.
#[derive(Debug, Clone, Default)]
pub struct ScriptedMeasurement {
    replies: Arc<Mutex<VecDeque<Result<f64>>>>,
    shutdowns: Arc<Mutex<u32>>,
}

impl ScriptedMeasurement {
    pub fn new<I: IntoIterator<Item = Result<f64>>>(replies: I) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            shutdowns: Arc::default(),
        }
    }

    pub fn shutdowns(&self) -> u32 {
        self.shutdowns.lock().map(|g| *g).unwrap_or(0)
    }
}

impl MeasurementSource for ScriptedMeasurement {
    fn request_measurement(&mut self) -> Result<f64> {
        self.replies
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Err(RigError::MeasurementFailed("no scripted reply".into())))
    }

    fn request_shutdown(&mut self) -> Result<()> {
        if let Ok(mut n) = self.shutdowns.lock() {
            *n += 1;
        }
        Ok(())
    }
}

/// Weighings handed out in order; running out is an input error.
#[derive(Debug, Clone, Default)]
pub struct FixedWeights {
    weights: VecDeque<f64>,
    prompts: Vec<String>,
}

impl FixedWeights {
    pub fn new<I: IntoIterator<Item = f64>>(weights: I) -> Self {
        Self {
            weights: weights.into_iter().collect(),
            prompts: Vec::new(),
        }
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

impl WeightSource for FixedWeights {
    fn read_weight(&mut self, prompt: &str) -> std::result::Result<f64, DynError> {
        self.prompts.push(prompt.to_string());
        self.weights
            .pop_front()
            .ok_or_else(|| DynError::from("no more weights"))
    }
}

/// Notifier that keeps every notice for inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier(Arc<Mutex<Vec<Notice>>>);

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.0.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, notice: &Notice) -> std::result::Result<(), DynError> {
        if let Ok(mut v) = self.0.lock() {
            v.push(notice.clone());
        }
        Ok(())
    }
}

/// Operator who acknowledges immediately and counts how often.
#[derive(Debug, Clone, Default)]
pub struct PatientOperator {
    pub acknowledged: Vec<String>,
}

impl Operator for PatientOperator {
    fn acknowledge(&mut self, prompt: &str) -> std::result::Result<(), DynError> {
        self.acknowledged.push(prompt.to_string());
        Ok(())
    }
}
