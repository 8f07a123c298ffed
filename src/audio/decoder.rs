//! Random-access audio sources for the segmenter.

use crate::error::{LongscribeError, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Random-access view of a decoded audio source.
///
/// The segmenter cuts at arbitrary offsets, so a decoder exposes sample
/// indexing instead of a one-shot stream. Implementations are not required
/// to hold the whole source in memory.
pub trait AudioDecoder: Send {
    /// Sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Total number of samples in the source.
    fn total_samples(&self) -> u64;

    /// Reads up to `len` samples starting at `start`. Ranges past the end
    /// of the source are clamped, so callers never over-read.
    fn read_range(&mut self, start: u64, len: u64) -> Result<Vec<i16>>;

    /// Total source duration in milliseconds.
    fn duration_ms(&self) -> u64 {
        let rate = self.sample_rate() as u64;
        if rate == 0 {
            0
        } else {
            self.total_samples() * 1000 / rate
        }
    }
}

/// WAV file decoder with seek-based random access.
///
/// Only 16-bit mono PCM is accepted; anything else is a format error rather
/// than a silent resample.
pub struct WavFileDecoder {
    reader: hound::WavReader<BufReader<File>>,
    sample_rate: u32,
    total: u64,
}

impl WavFileDecoder {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = hound::WavReader::open(path).map_err(|e| LongscribeError::SourceUnreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let spec = reader.spec();
        if spec.channels != 1
            || spec.bits_per_sample != 16
            || spec.sample_format != hound::SampleFormat::Int
        {
            return Err(LongscribeError::AudioFormatMismatch {
                expected: "16-bit mono PCM WAV".to_string(),
                actual: format!(
                    "{}-bit {}ch {:?}",
                    spec.bits_per_sample, spec.channels, spec.sample_format
                ),
            });
        }

        let total = reader.duration() as u64;
        Ok(Self {
            reader,
            sample_rate: spec.sample_rate,
            total,
        })
    }
}

impl AudioDecoder for WavFileDecoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_samples(&self) -> u64 {
        self.total
    }

    fn read_range(&mut self, start: u64, len: u64) -> Result<Vec<i16>> {
        if start >= self.total {
            return Ok(Vec::new());
        }
        let len = len.min(self.total - start);

        self.reader.seek(start as u32)?;
        self.reader
            .samples::<i16>()
            .take(len as usize)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| LongscribeError::AudioDecode {
                message: e.to_string(),
            })
    }
}

/// In-memory decoder over a sample buffer.
///
/// Used by tests and by callers that already hold decoded audio.
pub struct MemoryDecoder {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl MemoryDecoder {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }
}

impl AudioDecoder for MemoryDecoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_samples(&self) -> u64 {
        self.samples.len() as u64
    }

    fn read_range(&mut self, start: u64, len: u64) -> Result<Vec<i16>> {
        let total = self.samples.len() as u64;
        if start >= total {
            return Ok(Vec::new());
        }
        let end = (start + len).min(total);
        Ok(self.samples[start as usize..end as usize].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::encode_wav;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_memory_decoder_duration() {
        let decoder = MemoryDecoder::new(vec![0i16; 16000], 16000);
        assert_eq!(decoder.duration_ms(), 1000);
        assert_eq!(decoder.total_samples(), 16000);
    }

    #[test]
    fn test_memory_decoder_read_range() {
        let mut decoder = MemoryDecoder::new(vec![1, 2, 3, 4, 5], 16000);
        assert_eq!(decoder.read_range(1, 3).unwrap(), vec![2, 3, 4]);
    }

    #[test]
    fn test_memory_decoder_read_range_clamps() {
        let mut decoder = MemoryDecoder::new(vec![1, 2, 3], 16000);
        assert_eq!(decoder.read_range(2, 10).unwrap(), vec![3]);
        assert!(decoder.read_range(5, 10).unwrap().is_empty());
    }

    #[test]
    fn test_wav_file_decoder_reads_back_samples() {
        let samples: Vec<i16> = (0..4800).map(|i| (i % 256) as i16).collect();
        let bytes = encode_wav(&samples, 16000).unwrap();

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let mut decoder = WavFileDecoder::open(file.path()).unwrap();
        assert_eq!(decoder.sample_rate(), 16000);
        assert_eq!(decoder.total_samples(), 4800);
        assert_eq!(decoder.duration_ms(), 300);

        let range = decoder.read_range(100, 50).unwrap();
        assert_eq!(range, samples[100..150].to_vec());
    }

    #[test]
    fn test_wav_file_decoder_random_access_is_repeatable() {
        let samples: Vec<i16> = (0..1600).map(|i| i as i16).collect();
        let bytes = encode_wav(&samples, 16000).unwrap();

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let mut decoder = WavFileDecoder::open(file.path()).unwrap();
        let first = decoder.read_range(1000, 100).unwrap();
        let _later = decoder.read_range(0, 10).unwrap();
        let again = decoder.read_range(1000, 100).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_wav_file_decoder_missing_file() {
        let result = WavFileDecoder::open(Path::new("/nonexistent/audio.wav"));
        assert!(matches!(
            result,
            Err(LongscribeError::SourceUnreadable { .. })
        ));
    }
}
