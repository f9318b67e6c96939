//! Sound pressure signal at the model's operating rate

use std::fmt;

use crate::error::{ensure_finite, LoudnessError, Result, Stage};

/// Operating sample rate of the model in Hz
pub const SAMPLE_RATE: u32 = 32_000;

/// Zero samples added at each end of a signal (64 ms)
pub const GUARD_SAMPLES: usize = 2048;

/// Ear a channel is presented to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Left,
    Right,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Left => f.write_str("left"),
            Channel::Right => f.write_str("right"),
        }
    }
}

/// One or two channels of samples, full scale = 1.0
///
/// A mono signal is presented diotically: both ears receive the same samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    left: Vec<f32>,
    right: Option<Vec<f32>>,
    sample_rate: u32,
}

impl Signal {
    /// Create a single-channel signal
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            left: samples,
            right: None,
            sample_rate,
        }
    }

    /// Create a two-channel signal; both channels must have the same length
    pub fn stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if left.len() != right.len() {
            return Err(LoudnessError::configuration(
                Stage::Input,
                format!(
                    "left channel has {} samples but right channel has {}",
                    left.len(),
                    right.len()
                ),
            ));
        }
        Ok(Self {
            left,
            right: Some(right),
            sample_rate,
        })
    }

    /// Add [`GUARD_SAMPLES`] of silence at both ends
    pub fn with_guard(self) -> Self {
        let pad = |samples: Vec<f32>| {
            let mut padded = Vec::with_capacity(samples.len() + 2 * GUARD_SAMPLES);
            padded.resize(GUARD_SAMPLES, 0.0);
            padded.extend_from_slice(&samples);
            padded.resize(samples.len() + 2 * GUARD_SAMPLES, 0.0);
            padded
        };
        Self {
            left: pad(self.left),
            right: self.right.map(pad),
            sample_rate: self.sample_rate,
        }
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples per channel
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// True when only one channel was supplied
    pub fn is_mono(&self) -> bool {
        self.right.is_none()
    }

    /// Samples reaching the given ear
    pub fn channel(&self, channel: Channel) -> &[f32] {
        match channel {
            Channel::Left => &self.left,
            Channel::Right => self.right.as_deref().unwrap_or(&self.left),
        }
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    /// Check rate and sample values before the pipeline touches them
    pub(crate) fn validate(&self) -> Result<()> {
        if self.sample_rate != SAMPLE_RATE {
            return Err(LoudnessError::configuration(
                Stage::Input,
                format!(
                    "sample rate is {} Hz, the model runs at {} Hz",
                    self.sample_rate, SAMPLE_RATE
                ),
            ));
        }
        ensure_finite(Stage::Input, Some(Channel::Left), &self.left)?;
        if let Some(right) = &self.right {
            ensure_finite(Stage::Input, Some(Channel::Right), right)?;
        }
        Ok(())
    }
}
