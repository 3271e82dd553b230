use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::NormalizeError;

/// Mono samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct PcmAudio {
    pub samples: Vec<f32>,
    pub sample_rate_hz: u32,
}

impl PcmAudio {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate_hz == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate_hz as u64
    }
}

pub(crate) fn canonical_spec(sample_rate_hz: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate: sample_rate_hz,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

pub(crate) fn write_canonical_wav(
    file: File,
    samples: &[f32],
    sample_rate_hz: u32,
) -> Result<(), NormalizeError> {
    let mut writer = WavWriter::new(BufWriter::new(file), canonical_spec(sample_rate_hz))
        .map_err(NormalizeError::Encode)?;
    for sample in samples {
        let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(scaled).map_err(NormalizeError::Encode)?;
    }
    writer.finalize().map_err(NormalizeError::Encode)
}

/// Read a WAV artifact into mono f32 samples. Multi-channel input is averaged.
pub fn load_pcm_samples(path: &Path) -> Result<PcmAudio, NormalizeError> {
    let reader = WavReader::open(path).map_err(|e| NormalizeError::Decode(e.to_string()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| NormalizeError::Decode(e.to_string()))?,
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| NormalizeError::Decode(e.to_string()))?
        }
    };

    let samples = if channels > 1 {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        interleaved
    };

    Ok(PcmAudio {
        samples,
        sample_rate_hz: spec.sample_rate,
    })
}

/// Duration from the WAV header alone, without reading samples.
pub fn wav_duration_ms(path: &Path) -> Result<u64, NormalizeError> {
    let reader = WavReader::open(path).map_err(|e| NormalizeError::Decode(e.to_string()))?;
    let sample_rate = reader.spec().sample_rate as u64;
    if sample_rate == 0 {
        return Err(NormalizeError::Decode("sample rate is zero".to_string()));
    }
    Ok(reader.duration() as u64 * 1000 / sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_file_reads_back_canonical() {
        let named = tempfile::NamedTempFile::new().unwrap();
        let (file, path) = named.into_parts();
        let samples: Vec<f32> = (0..8_000).map(|i| ((i % 50) as f32 / 50.0) - 0.5).collect();
        write_canonical_wav(file, &samples, 16_000).unwrap();

        let reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.spec(), canonical_spec(16_000));
        drop(reader);

        assert_eq!(wav_duration_ms(&path).unwrap(), 500);
        let pcm = load_pcm_samples(&path).unwrap();
        assert_eq!(pcm.samples.len(), 8_000);
        assert!((pcm.samples[10] - samples[10]).abs() < 1e-3);
        assert_eq!(pcm.duration_ms(), 500);
    }
}
