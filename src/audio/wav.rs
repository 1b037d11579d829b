//! WAV encoding for generated waveforms.
//!
//! MusicGen-small produces mono f32 samples at 32 kHz; files are written
//! as 16-bit PCM so browsers play them without plugins.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::{Result, ServiceError};

/// Output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 32_000;

/// Number of output channels.
pub const CHANNELS: u16 = 1;

fn wav_spec() -> WavSpec {
    WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Writes samples to a WAV file at the given path.
///
/// The write is synchronous: the file is finalized before this returns,
/// so a subsequent read sees the complete file.
pub fn write_wav(path: &Path, samples: &[f32]) -> Result<()> {
    let mut writer = WavWriter::create(path, wav_spec()).map_err(|e| {
        ServiceError::audio_io(format!("Failed to create {}: {}", path.display(), e))
    })?;

    for &sample in samples {
        writer
            .write_sample(f32_to_i16(sample))
            .map_err(|e| ServiceError::audio_io(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| ServiceError::audio_io(format!("Failed to finalize {}: {}", path.display(), e)))
}

/// Encodes samples as a complete WAV file in memory.
pub fn write_wav_to_buffer(samples: &[f32]) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, wav_spec())
            .map_err(|e| ServiceError::audio_io(format!("Failed to create WAV buffer: {}", e)))?;
        for &sample in samples {
            writer
                .write_sample(f32_to_i16(sample))
                .map_err(|e| ServiceError::audio_io(format!("Failed to write sample: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| ServiceError::audio_io(format!("Failed to finalize WAV buffer: {}", e)))?;
    }
    Ok(cursor.into_inner())
}

/// Duration in seconds of a mono sample buffer at the output rate.
pub fn samples_to_duration(sample_count: usize) -> f32 {
    sample_count as f32 / SAMPLE_RATE as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_math() {
        assert_eq!(samples_to_duration(32_000), 1.0);
        assert_eq!(samples_to_duration(320_000), 10.0);
        assert_eq!(samples_to_duration(0), 0.0);
    }

    #[test]
    fn buffer_parses_back_with_expected_spec() {
        let samples: Vec<f32> = (0..1600)
            .map(|i| (i as f32 / 1600.0 * 2.0 * std::f32::consts::PI).sin())
            .collect();
        let bytes = write_wav_to_buffer(&samples).unwrap();

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, SAMPLE_RATE);
        assert_eq!(spec.channels, CHANNELS);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 1600);
    }

    #[test]
    fn out_of_range_samples_clamp() {
        let bytes = write_wav_to_buffer(&[2.0, -2.0]).unwrap();
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let decoded: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, vec![i16::MAX, -i16::MAX]);
    }

    #[test]
    fn file_write_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples = vec![0.0_f32, 0.25, -0.25, 0.5];

        write_wav(&path, &samples).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.len(), 4);
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
    }
}
