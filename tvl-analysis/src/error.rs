//! Error taxonomy for the loudness pipeline
//!
//! Every stage validates its own preconditions and fails the whole
//! computation on the first violation. Threshold flooring inside the
//! specific-loudness transform is normal behaviour, not an error.

use std::fmt;
use thiserror::Error;

use crate::signal::Channel;

/// Pipeline stage that raised an error or is being reported on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Signal validation before the pipeline starts
    Input,
    /// Field-to-cochlea transform
    Cochlea,
    /// Filterbank, excitation and instantaneous specific loudness
    SpecificLoudness,
    /// Short-term temporal integration
    ShortTerm,
    /// Binaural inhibition
    Binaural,
    /// Long-term temporal integration
    LongTerm,
    /// Sone to phon mapping
    Phon,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Input => "input",
            Stage::Cochlea => "cochlea transform",
            Stage::SpecificLoudness => "specific loudness",
            Stage::ShortTerm => "short-term integration",
            Stage::Binaural => "binaural inhibition",
            Stage::LongTerm => "long-term integration",
            Stage::Phon => "phon conversion",
        };
        f.write_str(name)
    }
}

/// Errors raised by the loudness pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoudnessError {
    /// Unsupported field type, wrong sample rate, mismatched channels, short signal
    #[error("configuration error in {stage}: {reason}")]
    Configuration { stage: Stage, reason: String },

    /// A value outside the modelled physical range reached a stage
    #[error(
        "numeric domain error in {stage}: value {value} at index {index}{}",
        describe_channel(.channel)
    )]
    NumericDomain {
        stage: Stage,
        channel: Option<Channel>,
        index: usize,
        value: f32,
    },
}

fn describe_channel(channel: &Option<Channel>) -> String {
    match channel {
        Some(channel) => format!(" ({} channel)", channel),
        None => String::new(),
    }
}

impl LoudnessError {
    pub(crate) fn configuration(stage: Stage, reason: impl Into<String>) -> Self {
        LoudnessError::Configuration {
            stage,
            reason: reason.into(),
        }
    }

    /// Stage that failed
    pub fn stage(&self) -> Stage {
        match self {
            LoudnessError::Configuration { stage, .. } => *stage,
            LoudnessError::NumericDomain { stage, .. } => *stage,
        }
    }
}

/// Result alias used throughout the pipeline
pub type Result<T> = std::result::Result<T, LoudnessError>;

/// Fail on the first non-finite value
pub(crate) fn ensure_finite(stage: Stage, channel: Option<Channel>, values: &[f32]) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(LoudnessError::NumericDomain {
            stage,
            channel,
            index,
            value: values[index],
        }),
        None => Ok(()),
    }
}
