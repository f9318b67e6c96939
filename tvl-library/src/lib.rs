//! Recording input for TVL - decoding, resampling, and calibration config

mod config;
mod loader;

pub use config::Config;
pub use loader::{
    deinterleave, resample, signal_from_channels, LoadError, LoadedRecording, RecordingInfo,
    RecordingLoader,
};
