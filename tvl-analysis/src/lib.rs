//! Time-varying binaural loudness for TVL
//!
//! Implements the Moore/Glasberg/Schlittenlacher loudness model (ISO 532-3):
//! cochlea transform, instantaneous specific loudness, short-term
//! integration, binaural inhibition, long-term integration, and the
//! sone to phon mapping used for reporting.
//!
//! The input is a 32 kHz signal with [`GUARD_SAMPLES`] of silence at each
//! end; see [`Signal::with_guard`].

mod binaural;
mod cochlea;
mod erb;
mod error;
mod excitation;
mod phon;
mod pipeline;
mod signal;
mod specific;
mod spectrum;
mod temporal;

pub use binaural::{BinauralFrame, BinauralInhibition};
pub use cochlea::{CochleaFilter, FieldType};
pub use erb::{band_centres, cam_to_hz, erb_bandwidth, hz_to_cam, BandVector, BANDS};
pub use error::{LoudnessError, Result, Stage};
pub use phon::{phon_to_sone, sone_to_phon, sones_to_phons};
pub use pipeline::{AnalysisProgress, LoudnessAnalyzer, TimeVaryingLoudness};
pub use signal::{Channel, Signal, GUARD_SAMPLES, SAMPLE_RATE};
pub use specific::{trim_edges, SpecificLoudnessModel, EDGE_FRAMES, LOUDNESS_CONSTANT};
pub use spectrum::{frame_count, BLOCK_SIZE, HOP_SIZE};
pub use temporal::{
    long_term_loudness, short_term_specific_loudness, Smoothing, LONG_TERM, SHORT_TERM,
};
