//! Audio decoding, resampling and WAV persistence
//!
//! Decoding goes through symphonia so uploads may be any container it supports.
//! Everything this service writes is WAV via hound, written to a `.partial` sibling and
//! renamed into place so no reader ever sees a half-written artifact.

use crate::models::AudioAsset;
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum AudioIoError {
    #[error("Audio file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Malformed audio in {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("Failed to write {path}: {reason}")]
    Encode { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn malformed(path: &Path, reason: impl ToString) -> AudioIoError {
    AudioIoError::Malformed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Sample format for written WAV files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    /// Intermediate artifacts (chunks, merged components), lossless
    Float32,
    /// Final artifacts (denoised, normalized, speakers)
    Pcm16,
}

/// Header-level facts about a WAV artifact
#[derive(Debug, Clone, PartialEq)]
pub struct WavInfo {
    pub frames: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_seconds: f64,
}

/// Decodes audio files to PCM at a fixed rate
pub struct AudioLoader {
    target_sample_rate: u32,
}

impl AudioLoader {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Decode, fold to mono and resample to the target rate
    pub fn load_mono(&self, path: &Path) -> Result<AudioAsset, AudioIoError> {
        let native = decode_file(path)?;
        let mono = native.into_mono();

        if mono.sample_rate == self.target_sample_rate {
            return Ok(mono);
        }

        debug!(
            "Resampling {} from {} Hz to {} Hz",
            path.display(),
            mono.sample_rate,
            self.target_sample_rate
        );
        let samples = resample_channel(mono.samples, mono.sample_rate, self.target_sample_rate)?;
        Ok(AudioAsset::mono(samples, self.target_sample_rate))
    }
}

/// Decode at the file's own rate and channel layout
pub fn load_native(path: &Path) -> Result<AudioAsset, AudioIoError> {
    decode_file(path)
}

fn decode_file(path: &Path) -> Result<AudioAsset, AudioIoError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AudioIoError::NotFound(path.to_path_buf()),
        _ => AudioIoError::Io(e),
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| malformed(path, e))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| malformed(path, "no audio track"))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| malformed(path, "sample rate not specified"))?;
    let mut channels = codec_params.channels.map(|c| c.count() as u16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| malformed(path, e))?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(malformed(path, e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                channels.get_or_insert(spec.channels.count() as u16);
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet in {}: {}", path.display(), e);
            }
            Err(e) => return Err(malformed(path, e)),
        }
    }

    if samples.is_empty() {
        return Err(malformed(path, "no audio frames decoded"));
    }

    let channels = channels.unwrap_or(1).max(1);
    debug!(
        "Decoded {} frames ({} ch, {} Hz) from {}",
        samples.len() / channels as usize,
        channels,
        sample_rate,
        path.display()
    );

    Ok(AudioAsset::new(samples, sample_rate, channels))
}

/// Resample one channel with a single-pass sinc interpolator
///
/// The filter delay is trimmed from the head and the tail is flushed with silence, so
/// output frame `n` lines up with input time `n / target_rate`.
fn resample_channel(samples: Vec<f32>, source_rate: u32, target_rate: u32) -> Result<Vec<f32>, AudioIoError> {
    if samples.is_empty() {
        return Ok(samples);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / source_rate as f64;
    let frames = samples.len();
    let expected = (frames as f64 * ratio).ceil() as usize;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, frames, 1)
        .map_err(|e| AudioIoError::Resample(e.to_string()))?;
    let delay = resampler.output_delay();

    let mut output = resampler
        .process(&[samples], None)
        .map_err(|e| AudioIoError::Resample(e.to_string()))?
        .pop()
        .unwrap_or_default();

    while output.len() < delay + expected {
        let flushed = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| AudioIoError::Resample(e.to_string()))?
            .pop()
            .unwrap_or_default();
        if flushed.is_empty() {
            break;
        }
        output.extend(flushed);
    }

    let end = (delay + expected).min(output.len());
    Ok(output.get(delay..end).map(<[f32]>::to_vec).unwrap_or_default())
}

/// `<path>.partial`, the staging name for atomic writes
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Write `asset` as WAV, atomically replacing any existing file
pub fn write_wav(path: &Path, asset: &AudioAsset, encoding: SampleEncoding) -> Result<(), AudioIoError> {
    let staging = partial_path(path);
    let encode_err = |e: hound::Error| AudioIoError::Encode {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    let spec = match encoding {
        SampleEncoding::Float32 => hound::WavSpec {
            channels: asset.channels.max(1),
            sample_rate: asset.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        },
        SampleEncoding::Pcm16 => hound::WavSpec {
            channels: asset.channels.max(1),
            sample_rate: asset.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        },
    };

    let written = (|| {
        let mut writer = hound::WavWriter::create(&staging, spec)?;
        match encoding {
            SampleEncoding::Float32 => {
                for &sample in &asset.samples {
                    writer.write_sample(sample)?;
                }
            }
            SampleEncoding::Pcm16 => {
                for &sample in &asset.samples {
                    writer.write_sample(to_pcm16(sample))?;
                }
            }
        }
        writer.finalize()
    })();

    if let Err(e) = written {
        let _ = std::fs::remove_file(&staging);
        return Err(encode_err(e));
    }

    std::fs::rename(&staging, path)?;
    Ok(())
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Read a WAV file written by this service or a model program
pub fn read_wav(path: &Path) -> Result<AudioAsset, AudioIoError> {
    if !path.exists() {
        return Err(AudioIoError::NotFound(path.to_path_buf()));
    }

    let mut reader = hound::WavReader::open(path).map_err(|e| malformed(path, e))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| malformed(path, e))?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| malformed(path, e))?
        }
    };

    Ok(AudioAsset::new(samples, spec.sample_rate, spec.channels))
}

/// Read duration, rate and channel count from the WAV header
pub fn probe_wav(path: &Path) -> Result<WavInfo, AudioIoError> {
    if !path.exists() {
        return Err(AudioIoError::NotFound(path.to_path_buf()));
    }

    let reader = hound::WavReader::open(path).map_err(|e| malformed(path, e))?;
    let spec = reader.spec();
    let frames = reader.duration();

    Ok(WavInfo {
        frames,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        duration_seconds: if spec.sample_rate == 0 {
            0.0
        } else {
            frames as f64 / spec.sample_rate as f64
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_float_wav_round_trip_is_exact() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunk.wav");
        let asset = AudioAsset::mono(vec![0.1, -0.25, 0.333, 0.0], 8000);

        write_wav(&path, &asset, SampleEncoding::Float32).unwrap();
        let read = read_wav(&path).unwrap();

        assert_eq!(read, asset);
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_pcm16_clips_out_of_range_samples() {
        assert_eq!(to_pcm16(2.0), i16::MAX);
        assert_eq!(to_pcm16(-2.0), -i16::MAX);
        assert_eq!(to_pcm16(0.0), 0);
    }

    #[test]
    fn test_load_mono_folds_stereo() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stereo.wav");
        let stereo = AudioAsset::new(vec![0.5, 0.0, 0.25, 0.25, -0.5, 0.5], 8000, 2);
        write_wav(&path, &stereo, SampleEncoding::Float32).unwrap();

        let mono = AudioLoader::new(8000).load_mono(&path).unwrap();

        assert_eq!(mono.channels, 1);
        assert_eq!(mono.samples, vec![0.25, 0.25, 0.0]);
    }

    #[test]
    fn test_load_mono_resamples() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tone.wav");
        let samples: Vec<f32> = (0..16_000)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 16_000.0).sin() * 0.5)
            .collect();
        write_wav(&path, &AudioAsset::mono(samples, 16_000), SampleEncoding::Float32).unwrap();

        let resampled = AudioLoader::new(8000).load_mono(&path).unwrap();

        assert_eq!(resampled.sample_rate, 8000);
        assert_eq!(resampled.frames(), 8000);
    }

    #[test]
    fn test_resampling_keeps_events_in_place() {
        // Silence for half a second, then a constant level up to the end
        let source: Vec<f32> = (0..16_000).map(|i| if i < 8_000 { 0.0 } else { 0.5 }).collect();

        let out = resample_channel(source, 16_000, 8000).unwrap();

        assert_eq!(out.len(), 8000);
        let edge = out.iter().position(|s| *s > 0.25).unwrap();
        assert!((edge as i64 - 4000).abs() <= 2, "edge at {}", edge);
        assert!(out[2000].abs() < 0.01);
        assert!((out[7900] - 0.5).abs() < 0.05, "tail {}", out[7900]);
    }

    #[test]
    fn test_probe_reports_header_facts() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("info.wav");
        write_wav(
            &path,
            &AudioAsset::new(vec![0.0; 8000 * 2 * 3], 8000, 2),
            SampleEncoding::Pcm16,
        )
        .unwrap();

        let info = probe_wav(&path).unwrap();
        assert_eq!(info.sample_rate, 8000);
        assert_eq!(info.channels, 2);
        assert_eq!(info.frames, 24_000);
        assert!((info.duration_seconds - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_and_malformed_inputs_are_distinct() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.wav");
        assert!(matches!(load_native(&missing), Err(AudioIoError::NotFound(_))));

        let garbage = temp.path().join("garbage.wav");
        std::fs::write(&garbage, b"definitely not a wav file").unwrap();
        assert!(matches!(load_native(&garbage), Err(AudioIoError::Malformed { .. })));
        assert!(matches!(probe_wav(&garbage), Err(AudioIoError::Malformed { .. })));
    }
}
