//! Signal-to-loudness pipeline
//!
//! cochlea transform -> instantaneous specific loudness -> short-term
//! integration -> binaural inhibition -> long-term integration. Any stage
//! failure aborts the whole run; there is no partial result.

use tracing::debug;

use crate::binaural::BinauralInhibition;
use crate::cochlea::{CochleaFilter, FieldType};
use crate::erb::{integrate_bands, BandVector};
use crate::error::{LoudnessError, Result, Stage};
use crate::phon::sone_to_phon;
use crate::signal::{Channel, Signal, SAMPLE_RATE};
use crate::spectrum::HOP_SIZE;
use crate::specific::{trim_edges, SpecificLoudnessModel};
use crate::temporal::{long_term_loudness, short_term_specific_loudness};

/// Progress updates emitted while a signal is analysed
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisProgress {
    /// Validation passed
    Started {
        /// Samples per channel, guard padding included
        samples: usize,
        /// Distinct channels processed (1 for a diotic mono signal)
        channels: usize,
    },
    /// A stage is about to run
    Stage(Stage),
    /// All stages finished
    Complete {
        /// Retained frames
        frames: usize,
        /// Overall loudness in sone
        loudness: f32,
    },
}

/// Time-varying loudness of a signal; all sequences have one value per frame
#[derive(Debug, Clone, PartialEq)]
pub struct TimeVaryingLoudness {
    /// Maximum of the binaural long-term loudness, in sone
    pub loudness: f32,
    /// Binaural short-term loudness
    pub short_term: Vec<f32>,
    /// Binaural long-term loudness
    pub long_term: Vec<f32>,
    pub short_term_left: Vec<f32>,
    pub short_term_right: Vec<f32>,
    pub long_term_left: Vec<f32>,
    pub long_term_right: Vec<f32>,
    /// Monaural instantaneous loudness of the left ear (diagnostic)
    pub instantaneous_left: Vec<f32>,
    /// Monaural instantaneous loudness of the right ear (diagnostic)
    pub instantaneous_right: Vec<f32>,
}

impl TimeVaryingLoudness {
    /// Number of retained frames (1 ms each)
    pub fn frame_count(&self) -> usize {
        self.long_term.len()
    }

    /// Time of a frame relative to the start of the unpadded signal, in seconds
    pub fn frame_time(&self, frame: usize) -> f64 {
        (frame * HOP_SIZE) as f64 / SAMPLE_RATE as f64
    }

    /// Maximum binaural short-term loudness in sone
    pub fn max_short_term(&self) -> f32 {
        max_of(&self.short_term)
    }

    /// Maximum binaural long-term loudness in sone
    pub fn max_long_term(&self) -> f32 {
        max_of(&self.long_term)
    }

    /// Maximum monaural instantaneous loudness of the left ear in sone
    pub fn max_instantaneous_left(&self) -> f32 {
        max_of(&self.instantaneous_left)
    }

    /// Maximum monaural instantaneous loudness of the right ear in sone
    pub fn max_instantaneous_right(&self) -> f32 {
        max_of(&self.instantaneous_right)
    }

    /// Loudness level of [`Self::loudness`] in phon
    pub fn loudness_level(&self) -> Result<f32> {
        sone_to_phon(self.loudness)
    }
}

fn max_of(values: &[f32]) -> f32 {
    values.iter().copied().fold(0.0, f32::max)
}

/// Time-varying binaural loudness analyser
///
/// Holds the designed filters; one analyser can score many signals.
pub struct LoudnessAnalyzer {
    calibration_db: f32,
    cochlea: CochleaFilter,
    specific: SpecificLoudnessModel,
    binaural: BinauralInhibition,
}

impl LoudnessAnalyzer {
    /// Create an analyser
    ///
    /// `calibration_db` is the SPL of a full-scale sinusoid for the
    /// recording chain that produced the signal.
    pub fn new(field_type: FieldType, calibration_db: f32) -> Result<Self> {
        if !calibration_db.is_finite() {
            return Err(LoudnessError::NumericDomain {
                stage: Stage::Input,
                channel: None,
                index: 0,
                value: calibration_db,
            });
        }
        Ok(Self {
            calibration_db,
            cochlea: CochleaFilter::new(field_type),
            specific: SpecificLoudnessModel::new(),
            binaural: BinauralInhibition::new(),
        })
    }

    pub fn field_type(&self) -> FieldType {
        self.cochlea.field_type()
    }

    pub fn calibration_db(&self) -> f32 {
        self.calibration_db
    }

    /// Analyse a 32 kHz, guard-padded signal
    pub fn analyze(&self, signal: &Signal) -> Result<TimeVaryingLoudness> {
        self.analyze_with_progress(signal, |_| {})
    }

    /// Analyse a signal, reporting progress through `on_progress`
    pub fn analyze_with_progress<F>(
        &self,
        signal: &Signal,
        mut on_progress: F,
    ) -> Result<TimeVaryingLoudness>
    where
        F: FnMut(AnalysisProgress),
    {
        signal.validate()?;
        let channels = if signal.is_mono() { 1 } else { 2 };
        on_progress(AnalysisProgress::Started {
            samples: signal.len(),
            channels,
        });

        on_progress(AnalysisProgress::Stage(Stage::Cochlea));
        let left = self.cochlea.process(signal.channel(Channel::Left));
        let right = if signal.is_mono() {
            None
        } else {
            Some(self.cochlea.process(signal.channel(Channel::Right)))
        };
        debug!(samples = left.len(), channels, "cochlea transform done");

        on_progress(AnalysisProgress::Stage(Stage::SpecificLoudness));
        let (inst_left, inst_right) = match &right {
            None => {
                let inst = self.instantaneous(&left, Channel::Left)?;
                (inst.clone(), inst)
            }
            Some(right) => {
                let (l, r) = rayon::join(
                    || self.instantaneous(&left, Channel::Left),
                    || self.instantaneous(right, Channel::Right),
                );
                (l?, r?)
            }
        };
        debug!(frames = inst_left.len(), "instantaneous specific loudness done");

        on_progress(AnalysisProgress::Stage(Stage::ShortTerm));
        let (short_left, short_right) = rayon::join(
            || short_term_specific_loudness(&inst_left),
            || short_term_specific_loudness(&inst_right),
        );

        on_progress(AnalysisProgress::Stage(Stage::Binaural));
        let frames = self.binaural.combine_frames(&short_left, &short_right);
        let short_term_left: Vec<f32> = frames.iter().map(|f| f.left).collect();
        let short_term_right: Vec<f32> = frames.iter().map(|f| f.right).collect();
        let short_term: Vec<f32> = frames.iter().map(|f| f.binaural).collect();

        on_progress(AnalysisProgress::Stage(Stage::LongTerm));
        let (long_term_left, long_term_right) = rayon::join(
            || long_term_loudness(&short_term_left),
            || long_term_loudness(&short_term_right),
        );
        let long_term: Vec<f32> = long_term_left
            .iter()
            .zip(&long_term_right)
            .map(|(l, r)| l + r)
            .collect();
        let loudness = max_of(&long_term);
        debug!(frames = long_term.len(), loudness, "long-term loudness done");

        let result = TimeVaryingLoudness {
            loudness,
            short_term,
            long_term,
            short_term_left,
            short_term_right,
            long_term_left,
            long_term_right,
            instantaneous_left: instantaneous_totals(&inst_left),
            instantaneous_right: instantaneous_totals(&inst_right),
        };
        on_progress(AnalysisProgress::Complete {
            frames: result.frame_count(),
            loudness,
        });
        Ok(result)
    }

    fn instantaneous(&self, cochlea: &[f32], channel: Channel) -> Result<Vec<BandVector>> {
        let frames = self
            .specific
            .instantaneous(cochlea, self.calibration_db, channel)?;
        trim_edges(frames, channel)
    }
}

fn instantaneous_totals(frames: &[BandVector]) -> Vec<f32> {
    frames.iter().map(|f| integrate_bands(f)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::GUARD_SAMPLES;
    use crate::spectrum::{frame_count, BLOCK_SIZE};
    use crate::specific::EDGE_FRAMES;
    use std::f32::consts::PI;

    /// 1 kHz tone at `level_db` SPL when full scale is 100 dB SPL
    fn tone(level_db: f32, secs: f32) -> Vec<f32> {
        let amplitude = 10.0f32.powf((level_db - 100.0) / 20.0);
        (0..(secs * SAMPLE_RATE as f32) as usize)
            .map(|i| amplitude * (2.0 * PI * 1000.0 * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    fn analyze_tone(level_db: f32, secs: f32) -> TimeVaryingLoudness {
        let analyzer = LoudnessAnalyzer::new(FieldType::Free, 100.0).unwrap();
        let signal = Signal::mono(tone(level_db, secs), SAMPLE_RATE).with_guard();
        analyzer.analyze(&signal).unwrap()
    }

    #[test]
    fn test_silence_is_zero_everywhere() {
        let analyzer = LoudnessAnalyzer::new(FieldType::Diffuse, 100.0).unwrap();
        let signal = Signal::stereo(vec![0.0; 3000], vec![0.0; 3000], SAMPLE_RATE)
            .unwrap()
            .with_guard();
        let result = analyzer.analyze(&signal).unwrap();

        assert_eq!(result.loudness, 0.0);
        for sequence in [
            &result.short_term,
            &result.long_term,
            &result.instantaneous_left,
            &result.instantaneous_right,
        ] {
            assert!(sequence.iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_empty_signal_with_guard() {
        let analyzer = LoudnessAnalyzer::new(FieldType::Free, 90.0).unwrap();
        let result = analyzer
            .analyze(&Signal::mono(Vec::new(), SAMPLE_RATE).with_guard())
            .unwrap();
        assert_eq!(result.frame_count(), 1);
        assert_eq!(result.loudness, 0.0);
    }

    #[test]
    fn test_retained_frame_count() {
        let analyzer = LoudnessAnalyzer::new(FieldType::Free, 100.0).unwrap();
        for len in [0usize, 31, 32, 1000, 4567] {
            let signal = Signal::mono(tone(60.0, len as f32 / SAMPLE_RATE as f32), SAMPLE_RATE)
                .with_guard();
            let padded = signal.len();
            let result = analyzer.analyze(&signal).unwrap();
            let expected = frame_count(padded) - 2 * EDGE_FRAMES;
            assert_eq!(expected, (padded - BLOCK_SIZE) / HOP_SIZE + 1 - 64);
            for sequence in [
                &result.short_term,
                &result.long_term,
                &result.long_term_left,
                &result.instantaneous_right,
            ] {
                assert_eq!(sequence.len(), expected);
            }
            assert_eq!(result.instantaneous_left[0], 0.0);
            assert_eq!(result.short_term[0], 0.0);
            assert_eq!(result.long_term[0], 0.0);
        }
    }

    #[test]
    fn test_unpadded_short_signal_rejected() {
        let analyzer = LoudnessAnalyzer::new(FieldType::Free, 100.0).unwrap();
        let err = analyzer
            .analyze(&Signal::mono(vec![0.0; 2 * GUARD_SAMPLES - 1], SAMPLE_RATE))
            .unwrap_err();
        assert!(matches!(err, LoudnessError::Configuration { .. }));
    }

    #[test]
    fn test_wrong_rate_rejected() {
        let analyzer = LoudnessAnalyzer::new(FieldType::Free, 100.0).unwrap();
        let err = analyzer
            .analyze(&Signal::mono(vec![0.0; 10_000], 48_000))
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Input);
    }

    #[test]
    fn test_non_finite_calibration_rejected() {
        assert!(LoudnessAnalyzer::new(FieldType::Free, f32::NAN).is_err());
        assert!(LoudnessAnalyzer::new(FieldType::Free, f32::INFINITY).is_err());
    }

    #[test]
    fn test_40db_tone_is_one_sone() {
        let result = analyze_tone(40.0, 1.0);
        assert!(
            (result.loudness - 1.0).abs() < 0.1,
            "40 dB tone gave {} sone",
            result.loudness
        );
        let phon = result.loudness_level().unwrap();
        assert!((phon - 40.0).abs() < 1.5, "{phon} phon");
    }

    #[test]
    fn test_10db_step_doubles_loudness() {
        let soft = analyze_tone(40.0, 1.0).loudness;
        let loud = analyze_tone(50.0, 1.0).loudness;
        let ratio = loud / soft;
        assert!((ratio - 2.0).abs() < 0.2, "ratio {ratio}");
        assert!((loud - 2.0).abs() < 0.2, "50 dB tone gave {loud} sone");
    }

    #[test]
    fn test_monotonic_in_calibration() {
        let signal = Signal::mono(tone(50.0, 0.25), SAMPLE_RATE).with_guard();
        let mut previous = 0.0;
        for calibration in [60.0, 80.0, 90.0, 100.0, 110.0] {
            let analyzer = LoudnessAnalyzer::new(FieldType::Free, calibration).unwrap();
            let loudness = analyzer.analyze(&signal).unwrap().loudness;
            assert!(loudness >= previous, "{loudness} < {previous} at {calibration} dB");
            previous = loudness;
        }
    }

    #[test]
    fn test_diotic_stereo_matches_mono() {
        let analyzer = LoudnessAnalyzer::new(FieldType::Free, 100.0).unwrap();
        let samples = tone(60.0, 0.2);
        let mono = analyzer
            .analyze(&Signal::mono(samples.clone(), SAMPLE_RATE).with_guard())
            .unwrap();
        let stereo = analyzer
            .analyze(
                &Signal::stereo(samples.clone(), samples, SAMPLE_RATE)
                    .unwrap()
                    .with_guard(),
            )
            .unwrap();
        assert_eq!(mono, stereo);
    }

    #[test]
    fn test_binaural_below_twice_monaural() {
        let result = analyze_tone(60.0, 0.3);
        // Steady-state short-term loudness versus the monaural instantaneous value
        let last = result.frame_count() - 40;
        assert!(result.short_term[last] < 2.0 * result.instantaneous_left[last]);
        assert!(result.short_term[last] > 1.3 * result.instantaneous_left[last]);
    }

    #[test]
    fn test_one_sided_signal() {
        let analyzer = LoudnessAnalyzer::new(FieldType::Free, 100.0).unwrap();
        let samples = tone(50.0, 0.5);
        let signal = Signal::stereo(samples.clone(), vec![0.0; samples.len()], SAMPLE_RATE)
            .unwrap()
            .with_guard();
        let result = analyzer.analyze(&signal).unwrap();
        assert!(result.long_term_right.iter().all(|&v| v == 0.0));
        assert!(result.loudness > 0.5);
        assert_eq!(result.long_term, result.long_term_left);
        assert_eq!(result.max_instantaneous_right(), 0.0);
        assert!(result.max_instantaneous_left() > 0.5);
        assert!(result.instantaneous_left.iter().all(|&v| v <= result.max_instantaneous_left()));
    }

    #[test]
    fn test_deterministic() {
        let analyzer = LoudnessAnalyzer::new(FieldType::Diffuse, 94.0).unwrap();
        let signal = Signal::mono(tone(70.0, 0.2), SAMPLE_RATE).with_guard();
        let a = analyzer.analyze(&signal).unwrap();
        let b = analyzer.analyze(&signal).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_progress_events() {
        let analyzer = LoudnessAnalyzer::new(FieldType::Free, 100.0).unwrap();
        let signal = Signal::mono(tone(40.0, 0.1), SAMPLE_RATE).with_guard();
        let mut events = Vec::new();
        let result = analyzer
            .analyze_with_progress(&signal, |event| events.push(event))
            .unwrap();

        assert_eq!(
            events.first(),
            Some(&AnalysisProgress::Started {
                samples: signal.len(),
                channels: 1
            })
        );
        let stages: Vec<Stage> = events
            .iter()
            .filter_map(|e| match e {
                AnalysisProgress::Stage(stage) => Some(*stage),
                _ => None,
            })
            .collect();
        assert_eq!(
            stages,
            vec![
                Stage::Cochlea,
                Stage::SpecificLoudness,
                Stage::ShortTerm,
                Stage::Binaural,
                Stage::LongTerm
            ]
        );
        assert_eq!(
            events.last(),
            Some(&AnalysisProgress::Complete {
                frames: result.frame_count(),
                loudness: result.loudness
            })
        );
    }

    #[test]
    fn test_all_values_non_negative() {
        let analyzer = LoudnessAnalyzer::new(FieldType::Free, 100.0).unwrap();
        // Noise-like burst followed by silence
        let mut state = 12345u32;
        let mut samples: Vec<f32> = (0..3200)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect();
        samples.extend(vec![0.0; 6400]);
        let result = analyzer
            .analyze(&Signal::mono(samples, SAMPLE_RATE).with_guard())
            .unwrap();
        for sequence in [
            &result.short_term,
            &result.long_term,
            &result.instantaneous_left,
        ] {
            assert!(sequence.iter().all(|&v| v >= 0.0));
        }
        assert!(result.loudness > 0.0);
        // Long-term loudness decays slowly after the burst
        let last = result.frame_count() - 1;
        assert!(result.long_term[last] > 0.0);
        assert!(result.short_term[last] < result.long_term[last]);
    }
}
