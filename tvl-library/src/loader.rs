//! Recording loading, decoding and resampling to the model rate

use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, warn};
use tvl_analysis::{LoudnessError, Signal, SAMPLE_RATE};

/// Input frames per resampler chunk (rounded by rubato to a valid size)
const RESAMPLE_CHUNK: usize = 1024;

/// Errors that can occur while loading a recording
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Unsupported channel count {0} (expected 1 or 2)")]
    UnsupportedChannels(usize),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Resample error: {0}")]
    Resample(String),
    #[error(transparent)]
    Signal(#[from] LoudnessError),
}

/// Facts about the source file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingInfo {
    pub title: String,
    pub duration_secs: f64,
    /// Sample rate of the file before resampling
    pub source_sample_rate: u32,
    pub channels: u16,
}

/// A decoded recording ready for the loudness model
#[derive(Debug)]
pub struct LoadedRecording {
    /// 32 kHz, guard-padded signal
    pub signal: Signal,
    pub info: RecordingInfo,
}

/// Recording loader using Symphonia
#[derive(Debug, Default)]
pub struct RecordingLoader;

impl RecordingLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load, decode, resample to 32 kHz and guard-pad a recording
    pub fn load(&self, path: &Path) -> Result<LoadedRecording, LoadError> {
        let (channels, source_sample_rate) = self.decode(path)?;

        let frames = channels.first().map_or(0, Vec::len);
        let info = RecordingInfo {
            title: path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Unknown")
                .to_string(),
            duration_secs: frames as f64 / source_sample_rate as f64,
            source_sample_rate,
            channels: channels.len() as u16,
        };

        let channels = if source_sample_rate != SAMPLE_RATE {
            warn!(
                from = source_sample_rate,
                to = SAMPLE_RATE,
                "resampling recording to the model rate"
            );
            resample(&channels, source_sample_rate, SAMPLE_RATE)?
        } else {
            channels
        };

        Ok(LoadedRecording {
            signal: signal_from_channels(channels)?,
            info,
        })
    }

    /// Decode every packet of the first audio track into planar channels
    fn decode(&self, path: &Path) -> Result<(Vec<Vec<f32>>, u32), LoadError> {
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| LoadError::Decode("unknown sample rate".into()))?;
        // Containers may omit the layout; decoded packets are authoritative
        let declared = codec_params.channels.map(|c| c.count());
        if let Some(count) = declared {
            check_channel_count(count)?;
        }

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut interleaved: Vec<f32> = Vec::new();
        let mut channel_count: Option<usize> = None;
        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(symphonia::core::errors::Error::DecodeError(e)) => {
                    warn!(error = e, "skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            let count = check_channel_count(spec.channels.count())?;
            match channel_count {
                None => channel_count = Some(count),
                Some(previous) if previous != count => {
                    return Err(LoadError::Decode(format!(
                        "channel count changed from {previous} to {count}"
                    )));
                }
                Some(_) => {}
            }
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(sample_buf.samples());
        }

        let channel_count = channel_count.or(declared).unwrap_or(1);
        debug!(
            samples = interleaved.len(),
            sample_rate, channel_count, "decoded recording"
        );
        Ok((deinterleave(&interleaved, channel_count), sample_rate))
    }
}

fn check_channel_count(count: usize) -> Result<usize, LoadError> {
    if (1..=2).contains(&count) {
        Ok(count)
    } else {
        Err(LoadError::UnsupportedChannels(count))
    }
}

/// Split interleaved samples into one vector per channel
pub fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    (0..channels)
        .map(|ch| samples.iter().skip(ch).step_by(channels).copied().collect())
        .collect()
}

/// Build a guard-padded model signal from one or two 32 kHz channels
pub fn signal_from_channels(channels: Vec<Vec<f32>>) -> Result<Signal, LoadError> {
    let count = channels.len();
    let mut channels = channels.into_iter();
    let signal = match (count, channels.next(), channels.next()) {
        (1, Some(mono), None) => Signal::mono(mono, SAMPLE_RATE),
        (2, Some(left), Some(right)) => Signal::stereo(left, right, SAMPLE_RATE)?,
        _ => return Err(LoadError::UnsupportedChannels(count)),
    };
    Ok(signal.with_guard())
}

/// Resample planar channels from `source_rate` to `target_rate`
///
/// The resampler's delay is removed, so the output starts at the same
/// instant as the input and lasts as long.
pub fn resample(
    channels: &[Vec<f32>],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<Vec<f32>>, LoadError> {
    use rubato::{FftFixedInOut, Resampler};

    if source_rate == target_rate || channels.is_empty() {
        return Ok(channels.to_vec());
    }

    let frames = channels[0].len();
    let mut resampler = FftFixedInOut::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        RESAMPLE_CHUNK,
        channels.len(),
    )
    .map_err(|e| LoadError::Resample(e.to_string()))?;

    let delay = resampler.output_delay();
    let expected = (frames as u64 * target_rate as u64).div_ceil(source_rate as u64) as usize;
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels.len()];

    // Keep feeding (zeros past the end) until the delayed tail is out
    let mut pos = 0;
    while output[0].len() < expected + delay {
        let chunk_size = resampler.input_frames_next();
        let chunk: Vec<Vec<f32>> = channels
            .iter()
            .map(|ch| {
                let mut block = vec![0.0; chunk_size];
                if pos < frames {
                    let end = (pos + chunk_size).min(frames);
                    block[..end - pos].copy_from_slice(&ch[pos..end]);
                }
                block
            })
            .collect();

        let resampled = resampler
            .process(&chunk, None)
            .map_err(|e| LoadError::Resample(e.to_string()))?;
        for (out, data) in output.iter_mut().zip(resampled) {
            out.extend(data);
        }
        pos += chunk_size;
    }

    for out in &mut output {
        out.drain(..delay);
        out.truncate(expected);
    }
    Ok(output)
}
