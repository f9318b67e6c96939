//! Sone to phon conversion for reporting
//!
//! Loudness level in phon is the SPL of a 1 kHz reference tone that is as
//! loud as the sound. The mapping interpolates a table of reference-tone
//! loudness over log loudness; 1 sone is 40 phon by definition.

use crate::error::{LoudnessError, Result, Stage};

/// Loudness (sone) of a binaurally presented 1 kHz tone, by level in phon
const REFERENCE_TONE: [(f32, f32); 25] = [
    (0.0, 0.000826128),
    (5.0, 0.00813206),
    (10.0, 0.0296703),
    (15.0, 0.0731681),
    (20.0, 0.148704),
    (25.0, 0.265841),
    (30.0, 0.436026),
    (35.0, 0.674234),
    (40.0, 1.0),
    (45.0, 1.43785),
    (50.0, 2.02134),
    (55.0, 2.79303),
    (60.0, 3.81037),
    (65.0, 5.15159),
    (70.0, 6.93903),
    (75.0, 9.32863),
    (80.0, 12.5103),
    (85.0, 16.7274),
    (90.0, 22.2886),
    (95.0, 29.5969),
    (100.0, 39.1931),
    (105.0, 51.7577),
    (110.0, 68.2089),
    (115.0, 89.7911),
    (120.0, 118.153),
];

/// Growth above the table: loudness doubles every 10 phon
const PHON_PER_DOUBLING: f32 = 10.0;

fn domain_error(index: usize, value: f32) -> LoudnessError {
    LoudnessError::NumericDomain {
        stage: Stage::Phon,
        channel: None,
        index,
        value,
    }
}

/// Loudness level in phon of a loudness in sone
///
/// Values below the quietest table entry map to 0 phon.
pub fn sone_to_phon(sone: f32) -> Result<f32> {
    if !sone.is_finite() || sone < 0.0 {
        return Err(domain_error(0, sone));
    }

    let (first_phon, first_sone) = REFERENCE_TONE[0];
    if sone <= first_sone {
        return Ok(first_phon);
    }
    let (last_phon, last_sone) = REFERENCE_TONE[REFERENCE_TONE.len() - 1];
    if sone >= last_sone {
        return Ok(last_phon + PHON_PER_DOUBLING * (sone / last_sone).log2());
    }

    let upper = REFERENCE_TONE
        .iter()
        .position(|&(_, s)| s >= sone)
        .unwrap_or(REFERENCE_TONE.len() - 1);
    let (p0, s0) = REFERENCE_TONE[upper - 1];
    let (p1, s1) = REFERENCE_TONE[upper];
    let t = (sone.ln() - s0.ln()) / (s1.ln() - s0.ln());
    Ok(p0 + t * (p1 - p0))
}

/// Convert a loudness sequence; errors carry the offending index
pub fn sones_to_phons(sones: &[f32]) -> Result<Vec<f32>> {
    sones
        .iter()
        .enumerate()
        .map(|(index, &sone)| sone_to_phon(sone).map_err(|_| domain_error(index, sone)))
        .collect()
}

/// Loudness in sone of a loudness level in phon (inverse of [`sone_to_phon`])
pub fn phon_to_sone(phon: f32) -> Result<f32> {
    if !phon.is_finite() {
        return Err(domain_error(0, phon));
    }
    let (first_phon, first_sone) = REFERENCE_TONE[0];
    if phon <= first_phon {
        return Ok(first_sone);
    }
    let (last_phon, last_sone) = REFERENCE_TONE[REFERENCE_TONE.len() - 1];
    if phon >= last_phon {
        return Ok(last_sone * 2.0f32.powf((phon - last_phon) / PHON_PER_DOUBLING));
    }

    let upper = REFERENCE_TONE
        .iter()
        .position(|&(p, _)| p >= phon)
        .unwrap_or(REFERENCE_TONE.len() - 1);
    let (p0, s0) = REFERENCE_TONE[upper - 1];
    let (p1, s1) = REFERENCE_TONE[upper];
    let t = (phon - p0) / (p1 - p0);
    Ok((s0.ln() + t * (s1.ln() - s0.ln())).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_sone_is_forty_phon() {
        assert_eq!(sone_to_phon(1.0).unwrap(), 40.0);
    }

    #[test]
    fn test_table_points() {
        for &(phon, sone) in &REFERENCE_TONE[1..] {
            let converted = sone_to_phon(sone).unwrap();
            assert!((converted - phon).abs() < 1e-3, "{sone} sone -> {converted} phon");
        }
    }

    #[test]
    fn test_monotonic() {
        let mut previous = -1.0;
        for i in 0..2000 {
            let sone = i as f32 * 0.1;
            let phon = sone_to_phon(sone).unwrap();
            assert!(phon >= previous, "not monotonic at {sone} sone");
            previous = phon;
        }
    }

    #[test]
    fn test_doubling_above_forty_phon() {
        let p2 = sone_to_phon(2.0).unwrap();
        assert!((p2 - 50.0).abs() < 0.5, "2 sone -> {p2} phon");
        let above = sone_to_phon(2.0 * 118.153).unwrap();
        assert!((above - 130.0).abs() < 1e-3);
    }

    #[test]
    fn test_silence_and_invalid() {
        assert_eq!(sone_to_phon(0.0).unwrap(), 0.0);
        assert!(sone_to_phon(-0.1).is_err());
        assert!(sone_to_phon(f32::NAN).is_err());
        assert!(sone_to_phon(f32::INFINITY).is_err());
    }

    #[test]
    fn test_sequence_error_index() {
        let err = sones_to_phons(&[1.0, 2.0, -3.0]).unwrap_err();
        assert!(matches!(err, LoudnessError::NumericDomain { index: 2, .. }));
        let phons = sones_to_phons(&[0.0, 1.0]).unwrap();
        assert_eq!(phons, vec![0.0, 40.0]);
    }

    #[test]
    fn test_inverse() {
        assert_eq!(phon_to_sone(40.0).unwrap(), 1.0);
        for phon in [12.5, 33.0, 61.0, 99.0, 125.0] {
            let back = sone_to_phon(phon_to_sone(phon).unwrap()).unwrap();
            assert!((back - phon).abs() < 1e-2, "{phon} -> {back}");
        }
    }
}
