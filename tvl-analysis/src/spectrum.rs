//! Multi-resolution short-time spectrum
//!
//! Every 1 ms a 64 ms block of the cochlea signal is analysed with six Hann
//! windows of decreasing length. Long windows resolve the low frequencies,
//! short windows track fast changes at high frequencies. Each window only
//! contributes the FFT bins inside its own frequency range.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

use crate::signal::SAMPLE_RATE;

/// Samples in one analysis block (64 ms)
pub const BLOCK_SIZE: usize = 2048;

/// Samples between consecutive frames (1 ms)
pub const HOP_SIZE: usize = 32;

/// Components weaker than this intensity (-60 dB SPL) are dropped
const INTENSITY_FLOOR: f32 = 1e-6;

/// Window length and the frequency range (Hz) it is used for
const RESOLUTIONS: [(usize, f32, f32); 6] = [
    (2048, 20.0, 80.0),
    (1024, 80.0, 500.0),
    (512, 500.0, 1250.0),
    (256, 1250.0, 2540.0),
    (128, 2540.0, 4050.0),
    (64, 4050.0, 15000.0),
];

/// A spectral component: frequency in Hz, intensity relative to 0 dB SPL
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Component {
    pub freq: f32,
    pub intensity: f32,
}

struct Resolution {
    window: Vec<f32>,
    /// Offset of the window inside the block (windows share a centre)
    offset: usize,
    first_bin: usize,
    last_bin: usize,
    /// Turns |X|^2 into intensity relative to a full-scale sinusoid
    norm: f32,
}

/// Number of frames produced for a signal of `len` samples
pub fn frame_count(len: usize) -> usize {
    if len < BLOCK_SIZE {
        0
    } else {
        (len - BLOCK_SIZE) / HOP_SIZE + 1
    }
}

/// Six-window spectrum analyser shared across frames
pub struct MultiResolutionSpectrum {
    fft: Arc<dyn Fft<f32>>,
    resolutions: Vec<Resolution>,
}

impl Default for MultiResolutionSpectrum {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiResolutionSpectrum {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(BLOCK_SIZE);
        let bin_hz = SAMPLE_RATE as f32 / BLOCK_SIZE as f32;

        let resolutions = RESOLUTIONS
            .iter()
            .enumerate()
            .map(|(i, &(len, low, high))| {
                let window: Vec<f32> = (0..len)
                    .map(|n| 0.5 * (1.0 - (2.0 * PI * n as f32 / len as f32).cos()))
                    .collect();
                let energy: f32 = window.iter().map(|w| w * w).sum();

                // Ranges are half-open except the topmost one
                let first_bin = (low / bin_hz).ceil() as usize;
                let last_bin = if i + 1 == RESOLUTIONS.len() {
                    (high / bin_hz).floor() as usize
                } else {
                    (high / bin_hz).ceil() as usize - 1
                };

                Resolution {
                    window,
                    offset: (BLOCK_SIZE - len) / 2,
                    first_bin,
                    last_bin,
                    norm: 4.0 / (BLOCK_SIZE as f32 * energy),
                }
            })
            .collect();

        Self { fft, resolutions }
    }

    /// Scratch buffer sized for [`Self::components`]
    pub fn scratch(&self) -> Vec<Complex<f32>> {
        vec![Complex::new(0.0, 0.0); BLOCK_SIZE]
    }

    /// Spectral components of one block
    ///
    /// `reference` is the intensity of a full-scale sinusoid, i.e.
    /// `10^(calibration_db / 10)`. Results are appended to `out` after it is
    /// cleared; both buffers are reused across frames.
    pub fn components(
        &self,
        block: &[f32],
        reference: f32,
        scratch: &mut [Complex<f32>],
        out: &mut Vec<Component>,
    ) {
        debug_assert_eq!(block.len(), BLOCK_SIZE);
        out.clear();
        let bin_hz = SAMPLE_RATE as f32 / BLOCK_SIZE as f32;

        for resolution in &self.resolutions {
            scratch.fill(Complex::new(0.0, 0.0));
            let segment = &block[resolution.offset..resolution.offset + resolution.window.len()];
            for ((slot, &sample), &w) in scratch[resolution.offset..]
                .iter_mut()
                .zip(segment)
                .zip(&resolution.window)
            {
                *slot = Complex::new(sample * w, 0.0);
            }

            self.fft.process(scratch);

            let scale = reference * resolution.norm;
            for bin in resolution.first_bin..=resolution.last_bin {
                let intensity = scratch[bin].norm_sqr() * scale;
                if intensity > INTENSITY_FLOOR {
                    out.push(Component {
                        freq: bin as f32 * bin_hz,
                        intensity,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_block(freq: f32, amplitude: f32) -> Vec<f32> {
        (0..BLOCK_SIZE)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32 + 0.3).sin())
            .collect()
    }

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(0), 0);
        assert_eq!(frame_count(BLOCK_SIZE - 1), 0);
        assert_eq!(frame_count(BLOCK_SIZE), 1);
        assert_eq!(frame_count(BLOCK_SIZE + HOP_SIZE - 1), 1);
        assert_eq!(frame_count(BLOCK_SIZE + HOP_SIZE), 2);
        assert_eq!(frame_count(4096), 65);
    }

    #[test]
    fn test_bin_ranges_are_contiguous() {
        let spectrum = MultiResolutionSpectrum::new();
        let ranges: Vec<_> = spectrum
            .resolutions
            .iter()
            .map(|r| (r.first_bin, r.last_bin))
            .collect();
        assert_eq!(ranges.first().unwrap().0, 2);
        assert_eq!(ranges.last().unwrap().1, 960);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].1 + 1, pair[1].0);
        }
    }

    #[test]
    fn test_full_scale_tone_integrates_to_reference() {
        let spectrum = MultiResolutionSpectrum::new();
        let mut scratch = spectrum.scratch();
        let mut components = Vec::new();

        // 1 kHz lies well inside the 512-sample window's range
        spectrum.components(&tone_block(1000.0, 1.0), 1.0, &mut scratch, &mut components);
        let total: f32 = components.iter().map(|c| c.intensity).sum();
        assert!((total - 1.0).abs() < 0.02, "total intensity {total}");

        let peak = components
            .iter()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
            .unwrap();
        assert!((peak.freq - 1000.0).abs() < 16.0);
    }

    #[test]
    fn test_silence_has_no_components() {
        let spectrum = MultiResolutionSpectrum::new();
        let mut scratch = spectrum.scratch();
        let mut components = vec![Component {
            freq: 1.0,
            intensity: 1.0,
        }];
        spectrum.components(&vec![0.0; BLOCK_SIZE], 1e10, &mut scratch, &mut components);
        assert!(components.is_empty());
    }
}
