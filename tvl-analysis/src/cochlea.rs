//! Field-to-cochlea transform
//!
//! Combines the free-field or diffuse-field to eardrum correction with the
//! middle-ear transfer function into a single linear-phase FIR filter, then
//! applies it by FFT overlap-add. The filter delay is removed so the output
//! lines up sample-for-sample with the input.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{LoudnessError, Stage};
use crate::signal::SAMPLE_RATE;

/// Number of FIR taps (odd, so the delay is a whole number of samples)
const FIR_TAPS: usize = 2049;

/// FFT size used to sample the target response
const DESIGN_FFT_SIZE: usize = 4096;

/// FFT size used for overlap-add filtering
const FILTER_FFT_SIZE: usize = 8192;

/// Frequencies of the transfer-function tables in Hz
const TABLE_FREQS: [f32; 39] = [
    20.0, 25.0, 31.5, 40.0, 50.0, 63.0, 80.0, 100.0, 125.0, 160.0, 200.0, 250.0, 315.0, 400.0,
    500.0, 630.0, 750.0, 800.0, 1000.0, 1250.0, 1500.0, 1600.0, 2000.0, 2500.0, 3000.0, 3150.0,
    4000.0, 5000.0, 6000.0, 6300.0, 8000.0, 9000.0, 10000.0, 11200.0, 12500.0, 14000.0, 15000.0,
    16000.0, 20000.0,
];

/// Free field (frontal incidence) to eardrum, dB
const FREE_FIELD_DB: [f32; 39] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.1, 0.3, 0.5, 0.9, 1.4, 1.6, 1.7, 2.5, 2.7, 2.6, 2.6,
    3.2, 5.2, 6.6, 12.0, 16.8, 15.3, 15.2, 14.2, 10.7, 7.1, 6.4, 1.8, -0.9, -1.6, 1.9, 4.9, 2.0,
    -2.0, 2.5, 2.5,
];

/// Diffuse field to eardrum, dB
const DIFFUSE_FIELD_DB: [f32; 39] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.1, 0.3, 0.4, 0.5, 1.0, 1.6, 1.7, 2.2, 2.7, 2.9, 3.8,
    5.3, 6.8, 7.2, 10.2, 14.9, 14.5, 14.4, 12.7, 10.8, 8.9, 8.7, 8.5, 6.2, 5.0, 4.5, 4.0, 3.3, 2.6,
    2.0, 2.0,
];

/// Middle-ear transmission, dB
const MIDDLE_EAR_DB: [f32; 39] = [
    -39.6, -32.0, -25.85, -21.4, -18.5, -15.9, -14.1, -12.4, -11.0, -9.6, -8.3, -7.4, -6.2, -4.8,
    -3.8, -3.3, -2.9, -2.6, -2.6, -4.5, -5.4, -6.1, -8.5, -10.4, -7.3, -7.0, -6.6, -7.0, -9.2,
    -10.2, -12.2, -10.8, -10.1, -12.7, -15.0, -18.2, -23.8, -32.3, -50.0,
];

/// Sound field the recording represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldType {
    /// Frontal free field
    #[default]
    Free,
    /// Diffuse field
    Diffuse,
}

impl FieldType {
    fn outer_ear_table(self) -> &'static [f32; 39] {
        match self {
            FieldType::Free => &FREE_FIELD_DB,
            FieldType::Diffuse => &DIFFUSE_FIELD_DB,
        }
    }

    /// Combined outer and middle ear gain in dB at `freq`
    pub fn transfer_db(self, freq: f32) -> f32 {
        let outer = interpolate_log_freq(freq, self.outer_ear_table());
        let middle = interpolate_log_freq(freq, &MIDDLE_EAR_DB);
        outer + middle
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Free => f.write_str("free"),
            FieldType::Diffuse => f.write_str("diffuse"),
        }
    }
}

impl FromStr for FieldType {
    type Err = LoudnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" | "free-field" | "ff" => Ok(FieldType::Free),
            "diffuse" | "diffuse-field" | "df" => Ok(FieldType::Diffuse),
            other => Err(LoudnessError::configuration(
                Stage::Cochlea,
                format!("unknown field type '{}' (expected 'free' or 'diffuse')", other),
            )),
        }
    }
}

/// Linear interpolation of a dB table over log frequency, clamped at the ends
fn interpolate_log_freq(freq: f32, table: &[f32; 39]) -> f32 {
    let freq = freq.clamp(TABLE_FREQS[0], TABLE_FREQS[TABLE_FREQS.len() - 1]);
    let upper = TABLE_FREQS
        .iter()
        .position(|&f| f >= freq)
        .unwrap_or(TABLE_FREQS.len() - 1);
    if upper == 0 {
        return table[0];
    }
    let lower = upper - 1;
    let span = TABLE_FREQS[upper].log10() - TABLE_FREQS[lower].log10();
    let t = (freq.log10() - TABLE_FREQS[lower].log10()) / span;
    table[lower] + t * (table[upper] - table[lower])
}

/// Linear-phase FIR approximating the outer and middle ear
pub struct CochleaFilter {
    field_type: FieldType,
    taps: Vec<f32>,
    /// Spectrum of the zero-padded taps at [`FILTER_FFT_SIZE`]
    taps_spectrum: Vec<Complex<f32>>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl CochleaFilter {
    /// Design the filter for a field type
    pub fn new(field_type: FieldType) -> Self {
        let mut planner = FftPlanner::new();
        let taps = Self::design(field_type, &mut planner);

        let forward = planner.plan_fft_forward(FILTER_FFT_SIZE);
        let inverse = planner.plan_fft_inverse(FILTER_FFT_SIZE);

        let mut taps_spectrum = vec![Complex::new(0.0, 0.0); FILTER_FFT_SIZE];
        for (slot, &tap) in taps_spectrum.iter_mut().zip(&taps) {
            *slot = Complex::new(tap, 0.0);
        }
        forward.process(&mut taps_spectrum);

        Self {
            field_type,
            taps,
            taps_spectrum,
            forward,
            inverse,
        }
    }

    /// Frequency sampling design: zero-phase target, inverse FFT, Hann taper
    fn design(field_type: FieldType, planner: &mut FftPlanner<f32>) -> Vec<f32> {
        let bin_hz = SAMPLE_RATE as f32 / DESIGN_FFT_SIZE as f32;
        let mut response = vec![Complex::new(0.0, 0.0); DESIGN_FFT_SIZE];
        for k in 0..=DESIGN_FFT_SIZE / 2 {
            let gain = 10.0f32.powf(field_type.transfer_db(k as f32 * bin_hz) / 20.0);
            response[k] = Complex::new(gain, 0.0);
            response[(DESIGN_FFT_SIZE - k) % DESIGN_FFT_SIZE] = Complex::new(gain, 0.0);
        }
        planner.plan_fft_inverse(DESIGN_FFT_SIZE).process(&mut response);

        let centre = (FIR_TAPS - 1) / 2;
        (0..FIR_TAPS)
            .map(|m| {
                let lag = (m as isize - centre as isize).rem_euclid(DESIGN_FFT_SIZE as isize);
                let window = 0.5 * (1.0 - (2.0 * PI * m as f32 / (FIR_TAPS - 1) as f32).cos());
                response[lag as usize].re / DESIGN_FFT_SIZE as f32 * window
            })
            .collect()
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Filter taps, centred on tap `(len - 1) / 2`
    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    /// Filter one channel; the output has the same length as the input
    pub fn process(&self, samples: &[f32]) -> Vec<f32> {
        if samples.is_empty() {
            return Vec::new();
        }

        let block = FILTER_FFT_SIZE - self.taps.len() + 1;
        let full_len = samples.len() + self.taps.len() - 1;
        let mut output = vec![0.0f32; full_len];
        let mut buffer = vec![Complex::new(0.0, 0.0); FILTER_FFT_SIZE];
        let scale = 1.0 / FILTER_FFT_SIZE as f32;

        for (index, chunk) in samples.chunks(block).enumerate() {
            buffer.fill(Complex::new(0.0, 0.0));
            for (slot, &sample) in buffer.iter_mut().zip(chunk) {
                *slot = Complex::new(sample, 0.0);
            }

            self.forward.process(&mut buffer);
            for (bin, h) in buffer.iter_mut().zip(&self.taps_spectrum) {
                *bin = *bin * *h;
            }
            self.inverse.process(&mut buffer);

            let start = index * block;
            let produced = chunk.len() + self.taps.len() - 1;
            for (out, value) in output[start..start + produced].iter_mut().zip(&buffer) {
                *out += value.re * scale;
            }
        }

        // Drop the group delay
        let delay = (self.taps.len() - 1) / 2;
        output.drain(..delay);
        output.truncate(samples.len());
        output
    }
}
