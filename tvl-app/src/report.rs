//! Text summary and per-frame CSV output

use std::io::{self, Write};

use tvl_analysis::{sone_to_phon, FieldType, LoudnessError, TimeVaryingLoudness};

/// Headline numbers of an analysis, in sone and phon
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub calibration_db: f32,
    pub field_type: FieldType,
    pub duration_secs: f64,
    pub max_long_term: f32,
    pub max_long_term_phon: f32,
    pub max_short_term: f32,
    pub max_short_term_phon: f32,
    pub max_instantaneous_left: f32,
    pub max_instantaneous_right: f32,
}

impl Summary {
    pub fn new(
        loudness: &TimeVaryingLoudness,
        calibration_db: f32,
        field_type: FieldType,
    ) -> Result<Self, LoudnessError> {
        let max_long_term = loudness.max_long_term();
        let max_short_term = loudness.max_short_term();
        Ok(Self {
            calibration_db,
            field_type,
            duration_secs: loudness.frame_time(loudness.frame_count()),
            max_long_term,
            max_long_term_phon: sone_to_phon(max_long_term)?,
            max_short_term,
            max_short_term_phon: sone_to_phon(max_short_term)?,
            max_instantaneous_left: loudness.max_instantaneous_left(),
            max_instantaneous_right: loudness.max_instantaneous_right(),
        })
    }

    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "Calibration level:        {:.1} dB SPL", self.calibration_db)?;
        writeln!(out, "Field type:               {}", self.field_type)?;
        writeln!(out, "Duration:                 {:.3} s", self.duration_secs)?;
        writeln!(
            out,
            "Max long-term loudness:   {:.3} sone ({:.1} phon)",
            self.max_long_term, self.max_long_term_phon
        )?;
        writeln!(
            out,
            "Max short-term loudness:  {:.3} sone ({:.1} phon)",
            self.max_short_term, self.max_short_term_phon
        )?;
        writeln!(
            out,
            "Max instantaneous (L/R):  {:.3} / {:.3} sone",
            self.max_instantaneous_left, self.max_instantaneous_right
        )
    }
}

/// One row per 1 ms frame with every sequence of the analysis
pub fn write_csv(loudness: &TimeVaryingLoudness, out: &mut impl Write) -> io::Result<()> {
    writeln!(
        out,
        "time_s,short_term_sone,long_term_sone,short_term_left,short_term_right,\
         long_term_left,long_term_right,instantaneous_left,instantaneous_right"
    )?;
    for frame in 0..loudness.frame_count() {
        writeln!(
            out,
            "{:.3},{},{},{},{},{},{},{},{}",
            loudness.frame_time(frame),
            loudness.short_term[frame],
            loudness.long_term[frame],
            loudness.short_term_left[frame],
            loudness.short_term_right[frame],
            loudness.long_term_left[frame],
            loudness.long_term_right[frame],
            loudness.instantaneous_left[frame],
            loudness.instantaneous_right[frame],
        )?;
    }
    Ok(())
}
