use std::io::Cursor;

use infer::MatcherType;

use crate::NormalizeError;

/// What the leading bytes of an upload say it is, regardless of its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffedMedia {
    pub mime: &'static str,
    pub extension: &'static str,
}

impl SniffedMedia {
    pub fn is_wav(&self) -> bool {
        self.extension == "wav"
    }
}

pub fn sniff_media(bytes: &[u8]) -> Result<SniffedMedia, NormalizeError> {
    if bytes.is_empty() {
        return Err(NormalizeError::Empty);
    }
    let kind = infer::get(bytes).ok_or(NormalizeError::Unrecognized)?;
    match kind.matcher_type() {
        MatcherType::Audio | MatcherType::Video => Ok(SniffedMedia {
            mime: kind.mime_type(),
            extension: kind.extension(),
        }),
        _ => Err(NormalizeError::UnsupportedMedia(kind.mime_type())),
    }
}

/// True when `bytes` already hold 16-bit integer PCM, mono, at `sample_rate_hz`.
pub fn is_canonical_wav(bytes: &[u8], sample_rate_hz: u32) -> bool {
    let Ok(reader) = hound::WavReader::new(Cursor::new(bytes)) else {
        return false;
    };
    let spec = reader.spec();
    spec.channels == 1
        && spec.sample_rate == sample_rate_hz
        && spec.bits_per_sample == 16
        && spec.sample_format == hound::SampleFormat::Int
        && reader.len() > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(channels: u16, sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..(sample_rate / 10) * channels as u32 {
                writer.write_sample((i % 100) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn wav_is_detected_from_bytes() {
        let media = sniff_media(&wav_bytes(1, 16_000)).unwrap();
        assert!(media.is_wav());
        assert!(media.mime.contains("wav"));
    }

    #[test]
    fn text_is_not_audio() {
        let err = sniff_media(b"definitely not audio, just some text").unwrap_err();
        assert!(matches!(err, NormalizeError::Unrecognized));
    }

    #[test]
    fn images_are_rejected() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let err = sniff_media(&png).unwrap_err();
        assert!(matches!(err, NormalizeError::UnsupportedMedia(_)));
    }

    #[test]
    fn canonical_check_requires_exact_spec() {
        assert!(is_canonical_wav(&wav_bytes(1, 16_000), 16_000));
        assert!(!is_canonical_wav(&wav_bytes(2, 16_000), 16_000));
        assert!(!is_canonical_wav(&wav_bytes(1, 44_100), 16_000));
        assert!(!is_canonical_wav(b"RIFF", 16_000));
    }
}
