//! Temporal integration with asymmetric attack and release
//!
//! Both integrators are first-order recursions run once per 1 ms frame.
//! A rising input is followed with the attack coefficient, a falling one
//! with the release coefficient. The recursion is a carry-state fold over
//! time and must see frames in order; bands and channels are independent.

use crate::erb::{BandVector, BANDS};

/// One-pole smoother with separate attack and release coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothing {
    /// Coefficient applied when the input exceeds the previous output
    pub attack: f32,
    /// Coefficient applied otherwise
    pub release: f32,
}

/// Short-term specific loudness: 22 ms attack, 30 ms release
pub const SHORT_TERM: Smoothing = Smoothing {
    attack: 0.045,
    release: 0.033,
};

/// Long-term loudness: 99 ms attack, 750 ms release
pub const LONG_TERM: Smoothing = Smoothing {
    attack: 0.01,
    release: 0.00133,
};

impl Smoothing {
    /// Next output given the previous output and the current input
    #[inline]
    pub fn step(&self, previous: f32, input: f32) -> f32 {
        let coefficient = if input > previous {
            self.attack
        } else {
            self.release
        };
        coefficient * input + (1.0 - coefficient) * previous
    }

    /// Smooth a sequence starting from silence
    pub fn run(&self, input: &[f32]) -> Vec<f32> {
        input
            .iter()
            .scan(0.0f32, |state, &x| {
                *state = self.step(*state, x);
                Some(*state)
            })
            .collect()
    }

    /// Smooth every band of a frame sequence; each band keeps its own state
    pub fn run_bands(&self, input: &[BandVector]) -> Vec<BandVector> {
        input
            .iter()
            .scan([0.0f32; BANDS], |state, frame| {
                for (s, &x) in state.iter_mut().zip(frame) {
                    *s = self.step(*s, x);
                }
                Some(*state)
            })
            .collect()
    }
}

/// Short-term specific loudness of one ear from its instantaneous matrix
pub fn short_term_specific_loudness(instantaneous: &[BandVector]) -> Vec<BandVector> {
    SHORT_TERM.run_bands(instantaneous)
}

/// Long-term loudness of one ear from its per-frame short-term loudness
pub fn long_term_loudness(short_term: &[f32]) -> Vec<f32> {
    LONG_TERM.run(short_term)
}
