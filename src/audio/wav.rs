//! In-memory WAV encoding and decoding for chunk payloads.

use crate::error::{LongscribeError, Result};
use std::io::Cursor;

fn wav_error(e: hound::Error) -> LongscribeError {
    LongscribeError::AudioDecode {
        message: e.to_string(),
    }
}

/// Encodes 16-bit mono PCM samples into an in-memory WAV file.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_error)?;
    for sample in samples {
        writer.write_sample(*sample).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)?;

    Ok(cursor.into_inner())
}

/// Decodes an in-memory WAV file into samples and its sample rate.
///
/// Only 16-bit mono PCM is accepted, the format the rest of the pipeline
/// assumes.
pub fn decode_wav(bytes: &[u8]) -> Result<(Vec<i16>, u32)> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).map_err(wav_error)?;
    let spec = reader.spec();

    if spec.channels != 1
        || spec.bits_per_sample != 16
        || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(LongscribeError::AudioFormatMismatch {
            expected: "16-bit mono PCM".to_string(),
            actual: format!(
                "{}-bit {}ch {:?}",
                spec.bits_per_sample, spec.channels, spec.sample_format
            ),
        });
    }

    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(wav_error)?;

    Ok((samples, spec.sample_rate))
}
