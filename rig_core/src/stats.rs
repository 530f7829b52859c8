//! Reduction of a sampling run to a single scalar.

/// Count, mean and population standard deviation of one sample run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl SampleStats {
    /// `None` for an empty run or when any sample is non-finite.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() || samples.iter().any(|s| !s.is_finite()) {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let var = samples.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / n;
        Some(Self {
            count: samples.len(),
            mean,
            std_dev: var.sqrt(),
        })
    }
}
