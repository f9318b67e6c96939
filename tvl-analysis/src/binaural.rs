//! Binaural loudness with contralateral inhibition
//!
//! Each ear's specific loudness is smoothed across bands with a Gaussian
//! and used to inhibit the other ear. A diotic sound comes out at 1.5 times
//! its monaural loudness instead of twice; with a large level difference the
//! result approaches the louder ear alone.
//!
//! The combination is stateless across frames, so whole sequences are
//! mapped in parallel.

use rayon::prelude::*;

use crate::erb::{integrate_bands, BandVector, BANDS, BAND_STEP_CAM};

/// Width parameter of the across-band Gaussian (per Cam)
const SPREAD_PER_CAM: f32 = 0.08;

/// Exponent of the hyperbolic-secant inhibition function
const INHIBITION_EXPONENT: f32 = 1.5978;

/// Loudness of one frame after binaural inhibition, in sone
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BinauralFrame {
    /// Left plus right
    pub binaural: f32,
    /// Contribution attributed to the left ear
    pub left: f32,
    /// Contribution attributed to the right ear
    pub right: f32,
}

/// Across-band Gaussian smoothing and inhibition
pub struct BinauralInhibition {
    /// Gaussian weight by band distance
    weights: [f32; BANDS],
}

impl Default for BinauralInhibition {
    fn default() -> Self {
        Self::new()
    }
}

impl BinauralInhibition {
    pub fn new() -> Self {
        let mut weights = [0.0; BANDS];
        for (distance, w) in weights.iter_mut().enumerate() {
            let x = SPREAD_PER_CAM * BAND_STEP_CAM * distance as f32;
            *w = (-x * x).exp();
        }
        Self { weights }
    }

    fn smooth(&self, bands: &BandVector) -> BandVector {
        let mut smoothed = [0.0; BANDS];
        for (i, out) in smoothed.iter_mut().enumerate() {
            *out = bands
                .iter()
                .enumerate()
                .map(|(j, &n)| n * self.weights[i.abs_diff(j)])
                .sum();
        }
        smoothed
    }

    /// Inhibition divisor applied to an ear, given both smoothed values
    ///
    /// Ranges from 1 (other ear silent) to 2 (other ear dominant).
    #[inline]
    fn inhibition(own: f32, other: f32) -> f32 {
        if other <= 0.0 {
            return 1.0;
        }
        if own <= 0.0 {
            return 2.0;
        }
        let sech = 1.0 / (other / own).cosh();
        2.0 / (1.0 + sech.powf(INHIBITION_EXPONENT))
    }

    /// Combine one frame of left and right short-term specific loudness
    pub fn combine(&self, left: &BandVector, right: &BandVector) -> BinauralFrame {
        let smooth_left = self.smooth(left);
        let smooth_right = self.smooth(right);

        let mut inhibited_left = [0.0; BANDS];
        let mut inhibited_right = [0.0; BANDS];
        for i in 0..BANDS {
            inhibited_left[i] = left[i] / Self::inhibition(smooth_left[i], smooth_right[i]);
            inhibited_right[i] = right[i] / Self::inhibition(smooth_right[i], smooth_left[i]);
        }

        let left = integrate_bands(&inhibited_left);
        let right = integrate_bands(&inhibited_right);
        BinauralFrame {
            binaural: left + right,
            left,
            right,
        }
    }

    /// Combine aligned frame sequences, frames in parallel
    pub fn combine_frames(&self, left: &[BandVector], right: &[BandVector]) -> Vec<BinauralFrame> {
        debug_assert_eq!(left.len(), right.len());
        left.par_iter()
            .zip(right.par_iter())
            .map(|(l, r)| self.combine(l, r))
            .collect()
    }
}
