//! Instantaneous specific loudness
//!
//! Turns the cochlea signal of one ear into a frame x band matrix:
//! multi-resolution spectrum, roex excitation pattern, then the compressive
//! excitation-to-loudness transform with its absolute-threshold attenuation.

use rayon::prelude::*;

use crate::erb::{band_centres, BandVector, BANDS};
use crate::error::{LoudnessError, Result, Stage};
use crate::excitation::RoexFilterBank;
use crate::signal::Channel;
use crate::spectrum::{frame_count, MultiResolutionSpectrum, BLOCK_SIZE, HOP_SIZE};

/// Scales specific loudness so a binaural 1 kHz tone at 40 dB SPL is 1 sone
pub const LOUDNESS_CONSTANT: f32 = 0.0631;

/// Frames dropped at each end to remove zero-padding artifacts
pub const EDGE_FRAMES: usize = 32;

/// Excitation at threshold (dB) is constant from 500 Hz upwards
const HIGH_FREQ_THRESHOLD_DB: f32 = 3.73;

/// Above this excitation the high-level branch applies
const HIGH_LEVEL_EXCITATION: f32 = 1e10;

/// Excitation at absolute threshold below 500 Hz
const THRESHOLD_FREQS: [f32; 11] = [
    50.0, 63.0, 80.0, 100.0, 125.0, 160.0, 200.0, 250.0, 315.0, 400.0, 500.0,
];
const THRESHOLD_DB: [f32; 11] = [
    28.18, 23.90, 19.20, 15.68, 12.67, 10.09, 8.08, 6.30, 5.30, 4.50, 3.73,
];

/// Compression exponent and additive constant against low-level gain (dB)
const GAIN_DB: [f32; 6] = [-25.0, -20.0, -15.0, -10.0, -5.0, 0.0];
const ALPHA: [f32; 6] = [0.26692, 0.25016, 0.23679, 0.22228, 0.21055, 0.2];
const A_CONSTANT: [f32; 6] = [15.68, 10.97, 8.35, 6.59, 5.37, 4.72];

fn interpolate(x: f32, xs: &[f32], ys: &[f32]) -> f32 {
    if x <= xs[0] {
        return ys[0];
    }
    let last = xs.len() - 1;
    if x >= xs[last] {
        return ys[last];
    }
    let upper = xs.iter().position(|&v| v >= x).unwrap_or(last);
    let lower = upper - 1;
    let t = (x - xs[lower]) / (xs[upper] - xs[lower]);
    ys[lower] + t * (ys[upper] - ys[lower])
}

/// Frequency-dependent constants of the loudness transform for one band
#[derive(Debug, Clone, Copy)]
struct BandParams {
    /// Excitation at absolute threshold (linear)
    threshold: f32,
    /// Low-level cochlear gain relative to 500 Hz and above (linear)
    gain: f32,
    alpha: f32,
    a: f32,
    /// A^alpha
    a_pow: f32,
}

impl BandParams {
    fn at(freq: f32) -> Self {
        let threshold_db = if freq >= THRESHOLD_FREQS[THRESHOLD_FREQS.len() - 1] {
            HIGH_FREQ_THRESHOLD_DB
        } else {
            let log_freqs = THRESHOLD_FREQS.map(f32::log10);
            interpolate(freq.max(1.0).log10(), &log_freqs, &THRESHOLD_DB)
        };
        let gain_db = HIGH_FREQ_THRESHOLD_DB - threshold_db;
        let alpha = interpolate(gain_db, &GAIN_DB, &ALPHA);
        let a = interpolate(gain_db, &GAIN_DB, &A_CONSTANT);
        Self {
            threshold: 10.0f32.powf(threshold_db / 10.0),
            gain: 10.0f32.powf(gain_db / 10.0),
            alpha,
            a,
            a_pow: a.powf(alpha),
        }
    }

    fn specific_loudness(&self, excitation: f32) -> f32 {
        if excitation > HIGH_LEVEL_EXCITATION {
            return LOUDNESS_CONSTANT * (excitation / 1.0707).powf(0.2);
        }
        let mut loudness =
            LOUDNESS_CONSTANT * ((self.gain * excitation + self.a).powf(self.alpha) - self.a_pow);
        if excitation < self.threshold {
            let ratio = 2.0 * excitation / (excitation + self.threshold);
            loudness *= ratio * ratio.sqrt();
        }
        loudness.max(0.0)
    }
}

/// Spectrum, excitation and loudness transform for one ear
pub struct SpecificLoudnessModel {
    spectrum: MultiResolutionSpectrum,
    filters: RoexFilterBank,
    bands: Vec<BandParams>,
}

impl Default for SpecificLoudnessModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecificLoudnessModel {
    pub fn new() -> Self {
        Self {
            spectrum: MultiResolutionSpectrum::new(),
            filters: RoexFilterBank::new(),
            bands: band_centres().iter().map(|&fc| BandParams::at(fc)).collect(),
        }
    }

    /// Specific loudness (sone per Cam) of an excitation pattern
    pub fn transform(&self, excitation: &BandVector) -> BandVector {
        let mut loudness = [0.0; BANDS];
        for ((n, &e), params) in loudness.iter_mut().zip(excitation).zip(&self.bands) {
            *n = params.specific_loudness(e);
        }
        loudness
    }

    /// Instantaneous specific loudness of every frame of one cochlea signal
    ///
    /// `calibration_db` is the SPL of a full-scale sinusoid. Frames are
    /// independent and computed in parallel.
    pub fn instantaneous(
        &self,
        cochlea: &[f32],
        calibration_db: f32,
        channel: Channel,
    ) -> Result<Vec<BandVector>> {
        let reference = 10.0f32.powf(calibration_db / 10.0);
        if !reference.is_finite() {
            return Err(LoudnessError::NumericDomain {
                stage: Stage::SpecificLoudness,
                channel: None,
                index: 0,
                value: calibration_db,
            });
        }

        (0..frame_count(cochlea.len()))
            .into_par_iter()
            .map_init(
                || (self.spectrum.scratch(), Vec::new()),
                |state, frame| {
                    let (scratch, components) = state;
                    let start = frame * HOP_SIZE;
                    let block = &cochlea[start..start + BLOCK_SIZE];
                    self.spectrum.components(block, reference, scratch, components);

                    let mut excitation = [0.0; BANDS];
                    self.filters.excitation(components, &mut excitation);
                    if let Some(bad) = excitation.iter().find(|e| !e.is_finite()) {
                        return Err(LoudnessError::NumericDomain {
                            stage: Stage::SpecificLoudness,
                            channel: Some(channel),
                            index: frame,
                            value: *bad,
                        });
                    }
                    Ok(self.transform(&excitation))
                },
            )
            .collect()
    }
}

/// Drop [`EDGE_FRAMES`] from each end and silence the first retained frame
pub fn trim_edges(mut frames: Vec<BandVector>, channel: Channel) -> Result<Vec<BandVector>> {
    if frames.len() <= 2 * EDGE_FRAMES {
        return Err(LoudnessError::configuration(
            Stage::SpecificLoudness,
            format!(
                "{} channel yields {} frames, at least {} are needed; is the signal guard-padded?",
                channel,
                frames.len(),
                2 * EDGE_FRAMES + 1
            ),
        ));
    }
    frames.truncate(frames.len() - EDGE_FRAMES);
    frames.drain(..EDGE_FRAMES);
    frames[0] = [0.0; BANDS];
    Ok(frames)
}
