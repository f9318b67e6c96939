//! Excitation pattern from rounded-exponential (roex) auditory filters
//!
//! The upper skirt of every filter has a fixed slope. The lower skirt
//! flattens as the level per ERB at the filter centre rises, which spreads
//! excitation of intense sounds towards higher bands.

use crate::erb::{band_centres, erb_bandwidth, BandVector, BANDS};
use crate::spectrum::Component;

/// Level (dB per ERB) at which the lower skirt equals the upper skirt
const REFERENCE_LEVEL_DB: f32 = 51.0;

/// Change of lower-skirt slope per dB, relative to the 1 kHz filter
const SLOPE_PER_DB: f32 = 0.35;

/// Lower skirts never get shallower than this
const MIN_SLOPE: f32 = 0.1;

/// Roex weighting for relative deviation `g` and slope `p`
#[inline]
fn roex(p: f32, g: f32) -> f32 {
    let pg = p * g;
    (1.0 + pg) * (-pg).exp()
}

/// Bank of [`BANDS`] roex filters on the Cam scale
pub struct RoexFilterBank {
    centres: BandVector,
    /// Level-independent slope of each filter
    p51: BandVector,
    /// p51 of a filter centred at 1 kHz
    p51_1khz: f32,
}

impl Default for RoexFilterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl RoexFilterBank {
    pub fn new() -> Self {
        let centres = band_centres();
        let mut p51 = [0.0; BANDS];
        for (p, &fc) in p51.iter_mut().zip(&centres) {
            *p = 4.0 * fc / erb_bandwidth(fc);
        }
        Self {
            centres,
            p51,
            p51_1khz: 4.0 * 1000.0 / erb_bandwidth(1000.0),
        }
    }

    /// Centre frequencies in Hz
    pub fn centres(&self) -> &BandVector {
        &self.centres
    }

    /// Slope of the lower skirt of `band` for an input of `level_db` per ERB
    pub fn lower_slope(&self, band: usize, level_db: f32) -> f32 {
        let p51 = self.p51[band];
        let p = p51 - SLOPE_PER_DB * (p51 / self.p51_1khz) * (level_db - REFERENCE_LEVEL_DB);
        p.max(MIN_SLOPE)
    }

    /// Excitation (intensity relative to 0 dB) in every band
    pub fn excitation(&self, components: &[Component], out: &mut BandVector) {
        for (band, (e, &fc)) in out.iter_mut().zip(&self.centres).enumerate() {
            let p51 = self.p51[band];

            // Input level per ERB at the filter centre
            let per_erb: f32 = components
                .iter()
                .map(|c| c.intensity * roex(p51, (c.freq - fc).abs() / fc))
                .sum();
            if per_erb <= 0.0 {
                *e = 0.0;
                continue;
            }
            let p_lower = self.lower_slope(band, 10.0 * per_erb.log10());

            *e = components
                .iter()
                .map(|c| {
                    let g = (c.freq - fc) / fc;
                    let p = if g < 0.0 { p_lower } else { p51 };
                    c.intensity * roex(p, g.abs())
                })
                .sum();
        }
    }
}
