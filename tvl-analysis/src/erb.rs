//! ERB-number (Cam) scale and the auditory band layout

/// Number of auditory filter bands
pub const BANDS: usize = 150;

/// Centre of the lowest band in Cam
pub const FIRST_BAND_CAM: f32 = 1.75;

/// Spacing between band centres in Cam
pub const BAND_STEP_CAM: f32 = 0.25;

/// Specific loudness of one frame, one value per band
pub type BandVector = [f32; BANDS];

/// Convert frequency in Hz to ERB-number (Cam)
#[inline]
pub fn hz_to_cam(freq: f32) -> f32 {
    21.366 * (4.368 * freq / 1000.0 + 1.0).log10()
}

/// Convert ERB-number (Cam) to frequency in Hz
#[inline]
pub fn cam_to_hz(cam: f32) -> f32 {
    (10.0f32.powf(cam / 21.366) - 1.0) / 4.368 * 1000.0
}

/// Equivalent rectangular bandwidth in Hz at the given frequency
#[inline]
pub fn erb_bandwidth(freq: f32) -> f32 {
    24.673 * (4.368 * freq / 1000.0 + 1.0)
}

/// Cam value of band `index`
#[inline]
pub fn band_cam(index: usize) -> f32 {
    FIRST_BAND_CAM + BAND_STEP_CAM * index as f32
}

/// Centre frequencies of all bands in Hz
pub fn band_centres() -> BandVector {
    let mut centres = [0.0; BANDS];
    for (i, centre) in centres.iter_mut().enumerate() {
        *centre = cam_to_hz(band_cam(i));
    }
    centres
}

/// Sum of a band vector scaled to sone (bands are a quarter Cam apart)
#[inline]
pub fn integrate_bands(bands: &[f32]) -> f32 {
    bands.iter().sum::<f32>() * BAND_STEP_CAM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cam_roundtrip() {
        for f in [50.0f32, 250.0, 1000.0, 4000.0, 12000.0] {
            let back = cam_to_hz(hz_to_cam(f));
            assert!((back - f).abs() / f < 1e-4, "f={f}, back={back}");
        }
    }

    #[test]
    fn test_erb_at_1khz() {
        assert!((erb_bandwidth(1000.0) - 132.45).abs() < 0.1);
    }

    #[test]
    fn test_band_layout_spans_audible_range() {
        let centres = band_centres();
        assert!((centres[0] - 47.5).abs() < 1.0, "lowest {}", centres[0]);
        assert!(centres[BANDS - 1] > 14_000.0 && centres[BANDS - 1] < 16_000.0);
        assert!((band_cam(BANDS - 1) - 39.0).abs() < 1e-4);
        assert!(centres.windows(2).all(|w| w[1] > w[0]));
    }
}
