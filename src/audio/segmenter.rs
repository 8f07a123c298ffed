//! Silence-aware audio segmenter.
//!
//! Splits a source into ordered, time-bounded chunks. Cuts land on silence
//! boundaries where possible so words are not split; a hard duration/byte
//! ceiling guarantees bounded chunks even for silence-free audio.

use crate::audio::decoder::AudioDecoder;
use crate::audio::wav::encode_wav;
use crate::defaults;
use crate::error::{LongscribeError, Result};

/// Configuration for the segmenter.
#[derive(Debug, Clone, Copy)]
pub struct SegmenterConfig {
    /// Maximum chunk duration in milliseconds (hard ceiling).
    pub max_chunk_ms: u64,
    /// Maximum chunk payload size in bytes (hard ceiling).
    pub max_chunk_bytes: u64,
    /// Minimum silence run length for a cut candidate (ms).
    pub silence_gap_ms: u64,
    /// RMS threshold below which a frame counts as silence (0.0 to 1.0).
    pub silence_threshold: f32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_chunk_ms: defaults::MAX_CHUNK_MS,
            max_chunk_bytes: defaults::MAX_CHUNK_BYTES,
            silence_gap_ms: defaults::SILENCE_GAP_MS,
            silence_threshold: defaults::SILENCE_THRESHOLD,
        }
    }
}

/// One planned slice of the source timeline.
///
/// Spans are contiguous: each span's end equals the next span's start, and
/// together they cover `[0, total_duration)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl ChunkSpan {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// A materialized chunk: one span plus its sample payload.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }

    /// Renders the payload as an in-memory WAV file for upload.
    pub fn wav_bytes(&self) -> Result<Vec<u8>> {
        encode_wav(&self.samples, self.sample_rate)
    }
}

/// Computes the RMS level of a frame, normalized to 0.0..1.0.
fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
    let mean = sum_squares / samples.len() as f64;
    (mean.sqrt() / i16::MAX as f64) as f32
}

/// Plans and materializes chunk sequences over a decoded source.
pub struct AudioSegmenter {
    config: SegmenterConfig,
}

impl AudioSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    /// Plans the full chunk sequence for a source.
    ///
    /// Scans for silence runs at least `silence_gap_ms` long, then walks the
    /// timeline: each cut lands on the start of the latest qualifying silence
    /// run within the hard ceiling, or on the ceiling itself when no run
    /// qualifies. A zero-length source yields an empty plan.
    pub fn plan(&self, decoder: &mut dyn AudioDecoder) -> Result<Vec<ChunkSpan>> {
        let total_ms = decoder.duration_ms();
        if total_ms == 0 {
            return Ok(Vec::new());
        }

        let hard_ms = self.hard_limit_ms(decoder.sample_rate())?;
        let runs = self.silence_runs(decoder)?;

        let mut spans = Vec::new();
        let mut cursor = 0u64;
        while cursor < total_ms {
            let limit = cursor + hard_ms;
            let end = if total_ms <= limit {
                total_ms
            } else {
                runs.iter()
                    .rev()
                    .find(|(start, _)| *start > cursor && *start <= limit)
                    .map(|(start, _)| *start)
                    .unwrap_or(limit)
            };
            spans.push(ChunkSpan {
                index: spans.len(),
                start_ms: cursor,
                end_ms: end,
            });
            cursor = end;
        }

        Ok(spans)
    }

    /// Returns a lazy reader that materializes chunks one at a time.
    ///
    /// The plan can be re-iterated with a fresh reader; nothing is consumed.
    pub fn chunks<'a>(
        &self,
        decoder: &'a mut dyn AudioDecoder,
        plan: &'a [ChunkSpan],
    ) -> ChunkReader<'a> {
        ChunkReader {
            decoder,
            spans: plan.iter(),
        }
    }

    /// Effective per-chunk duration ceiling: the stricter of the duration
    /// limit and what the byte limit allows at this sample rate.
    fn hard_limit_ms(&self, sample_rate: u32) -> Result<u64> {
        let bytes_per_ms = sample_rate as u64 * 2 / 1000;
        if bytes_per_ms == 0 {
            return Err(LongscribeError::ConfigInvalidValue {
                key: "sample_rate".to_string(),
                message: format!("{} Hz is too low to segment", sample_rate),
            });
        }
        let byte_limit_ms = self.config.max_chunk_bytes / bytes_per_ms;
        let hard_ms = self.config.max_chunk_ms.min(byte_limit_ms);
        if hard_ms == 0 {
            return Err(LongscribeError::ConfigInvalidValue {
                key: "max_chunk_bytes".to_string(),
                message: "limit is below one millisecond of audio".to_string(),
            });
        }
        Ok(hard_ms)
    }

    /// Scans the source for silence runs of at least `silence_gap_ms`.
    ///
    /// Returns `(start_ms, end_ms)` pairs in timeline order. Reads the source
    /// in one-second blocks so long files never load fully into memory.
    fn silence_runs(&self, decoder: &mut dyn AudioDecoder) -> Result<Vec<(u64, u64)>> {
        let rate = decoder.sample_rate() as u64;
        let total = decoder.total_samples();
        let frame_len = (rate * defaults::FRAME_MS / 1000).max(1);
        let block_len = rate.max(frame_len);

        let mut runs = Vec::new();
        let mut run_start: Option<u64> = None;
        let mut offset = 0u64;

        while offset < total {
            let len = block_len.min(total - offset);
            let block = decoder.read_range(offset, len)?;

            for (i, frame) in block.chunks(frame_len as usize).enumerate() {
                let frame_start_ms = (offset + i as u64 * frame_len) * 1000 / rate;
                if rms(frame) < self.config.silence_threshold {
                    if run_start.is_none() {
                        run_start = Some(frame_start_ms);
                    }
                } else if let Some(start) = run_start.take()
                    && frame_start_ms - start >= self.config.silence_gap_ms
                {
                    runs.push((start, frame_start_ms));
                }
            }

            offset += len;
        }

        if let Some(start) = run_start {
            let end_ms = total * 1000 / rate;
            if end_ms - start >= self.config.silence_gap_ms {
                runs.push((start, end_ms));
            }
        }

        Ok(runs)
    }
}

/// Lazy iterator materializing `AudioChunk`s from a plan.
pub struct ChunkReader<'a> {
    decoder: &'a mut dyn AudioDecoder,
    spans: std::slice::Iter<'a, ChunkSpan>,
}

impl Iterator for ChunkReader<'_> {
    type Item = Result<AudioChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        let span = self.spans.next()?;
        let sample_rate = self.decoder.sample_rate();
        let rate = sample_rate as u64;
        let start_sample = span.start_ms * rate / 1000;
        let len = span.duration_ms() * rate / 1000;

        Some(
            self.decoder
                .read_range(start_sample, len)
                .map(|samples| AudioChunk {
                    index: span.index,
                    start_ms: span.start_ms,
                    end_ms: span.end_ms,
                    samples,
                    sample_rate,
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decoder::MemoryDecoder;

    // Small sample rate keeps test vectors small: 1 sample per millisecond.
    const RATE: u32 = 1000;
    const LOUD: i16 = 10000;

    fn config(max_chunk_ms: u64) -> SegmenterConfig {
        SegmenterConfig {
            max_chunk_ms,
            max_chunk_bytes: u64::MAX,
            silence_gap_ms: 1000,
            silence_threshold: 0.01,
        }
    }

    /// Builds samples that are loud everywhere except the given silent spans.
    fn audio_with_silence(total_ms: u64, silent: &[(u64, u64)]) -> Vec<i16> {
        let mut samples = vec![LOUD; total_ms as usize];
        for (start, end) in silent {
            for sample in &mut samples[*start as usize..*end as usize] {
                *sample = 0;
            }
        }
        samples
    }

    fn assert_contiguous(spans: &[ChunkSpan], total_ms: u64) {
        assert_eq!(spans.first().map(|s| s.start_ms), Some(0));
        assert_eq!(spans.last().map(|s| s.end_ms), Some(total_ms));
        for pair in spans.windows(2) {
            assert_eq!(
                pair[0].end_ms, pair[1].start_ms,
                "gap or overlap between chunks {} and {}",
                pair[0].index, pair[1].index
            );
        }
        for (i, span) in spans.iter().enumerate() {
            assert_eq!(span.index, i);
        }
    }

    #[test]
    fn test_rms_of_silence_is_zero() {
        assert_eq!(rms(&[0; 100]), 0.0);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_of_loud_signal() {
        let level = rms(&[LOUD; 100]);
        assert!(level > 0.3 && level < 0.31, "unexpected RMS: {}", level);
    }

    #[test]
    fn test_empty_source_yields_empty_plan() {
        let segmenter = AudioSegmenter::new(config(60_000));
        let mut decoder = MemoryDecoder::new(Vec::new(), RATE);
        let plan = segmenter.plan(&mut decoder).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_short_source_yields_single_chunk() {
        let segmenter = AudioSegmenter::new(config(60_000));
        let mut decoder = MemoryDecoder::new(vec![LOUD; 5000], RATE);
        let plan = segmenter.plan(&mut decoder).unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].start_ms, 0);
        assert_eq!(plan[0].end_ms, 5000);
    }

    #[test]
    fn test_cuts_at_silence_boundaries() {
        // 150s of speech with silence runs starting at 58s and 110s.
        // With a 60s ceiling the cuts land on the silence starts.
        let samples = audio_with_silence(150_000, &[(58_000, 59_500), (110_000, 111_500)]);
        let segmenter = AudioSegmenter::new(config(60_000));
        let mut decoder = MemoryDecoder::new(samples, RATE);

        let plan = segmenter.plan(&mut decoder).unwrap();

        assert_eq!(plan.len(), 3);
        assert_eq!((plan[0].start_ms, plan[0].end_ms), (0, 58_000));
        assert_eq!((plan[1].start_ms, plan[1].end_ms), (58_000, 110_000));
        assert_eq!((plan[2].start_ms, plan[2].end_ms), (110_000, 150_000));
        assert_contiguous(&plan, 150_000);
    }

    #[test]
    fn test_silence_free_audio_forces_cuts_at_ceiling() {
        let segmenter = AudioSegmenter::new(config(60_000));
        let mut decoder = MemoryDecoder::new(vec![LOUD; 150_000], RATE);

        let plan = segmenter.plan(&mut decoder).unwrap();

        assert_eq!(plan.len(), 3);
        assert_eq!((plan[0].start_ms, plan[0].end_ms), (0, 60_000));
        assert_eq!((plan[1].start_ms, plan[1].end_ms), (60_000, 120_000));
        assert_eq!((plan[2].start_ms, plan[2].end_ms), (120_000, 150_000));
    }

    #[test]
    fn test_every_chunk_respects_duration_ceiling() {
        let samples = audio_with_silence(
            300_000,
            &[(20_000, 21_200), (95_000, 96_500), (170_000, 172_000)],
        );
        let segmenter = AudioSegmenter::new(config(60_000));
        let mut decoder = MemoryDecoder::new(samples, RATE);

        let plan = segmenter.plan(&mut decoder).unwrap();

        assert_contiguous(&plan, 300_000);
        for span in &plan {
            assert!(
                span.duration_ms() <= 60_000,
                "chunk {} exceeds ceiling: {}ms",
                span.index,
                span.duration_ms()
            );
        }
    }

    #[test]
    fn test_byte_ceiling_limits_chunk_duration() {
        // At 1000 Hz mono 16-bit, 2 bytes per millisecond: 4000 bytes = 2s.
        let segmenter = AudioSegmenter::new(SegmenterConfig {
            max_chunk_ms: 60_000,
            max_chunk_bytes: 4000,
            silence_gap_ms: 1000,
            silence_threshold: 0.01,
        });
        let mut decoder = MemoryDecoder::new(vec![LOUD; 5000], RATE);

        let plan = segmenter.plan(&mut decoder).unwrap();

        assert_eq!(plan.len(), 3);
        assert_eq!((plan[0].start_ms, plan[0].end_ms), (0, 2000));
        assert_eq!((plan[1].start_ms, plan[1].end_ms), (2000, 4000));
        assert_eq!((plan[2].start_ms, plan[2].end_ms), (4000, 5000));
    }

    #[test]
    fn test_short_silence_run_is_not_a_cut_candidate() {
        // 500ms of silence is below the 1000ms gap threshold, so the cut
        // falls back to the hard ceiling.
        let samples = audio_with_silence(10_000, &[(4_000, 4_500)]);
        let segmenter = AudioSegmenter::new(config(6_000));
        let mut decoder = MemoryDecoder::new(samples, RATE);

        let plan = segmenter.plan(&mut decoder).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].end_ms, 6_000);
    }

    #[test]
    fn test_trailing_silence_is_covered() {
        let samples = audio_with_silence(8_000, &[(6_000, 8_000)]);
        let segmenter = AudioSegmenter::new(config(60_000));
        let mut decoder = MemoryDecoder::new(samples, RATE);

        let plan = segmenter.plan(&mut decoder).unwrap();
        assert_contiguous(&plan, 8_000);
    }

    #[test]
    fn test_chunk_reader_materializes_payloads() {
        let samples: Vec<i16> = (0..5000).map(|i| (i % 321) as i16 * 30 + 1000).collect();
        let segmenter = AudioSegmenter::new(config(2_000));
        let mut decoder = MemoryDecoder::new(samples.clone(), RATE);

        let plan = segmenter.plan(&mut decoder).unwrap();
        let chunks: Vec<AudioChunk> = segmenter
            .chunks(&mut decoder, &plan)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].samples, samples[0..2000].to_vec());
        assert_eq!(chunks[1].samples, samples[2000..4000].to_vec());
        assert_eq!(chunks[2].samples, samples[4000..5000].to_vec());
        assert_eq!(chunks[2].duration_ms(), 1000);
    }

    #[test]
    fn test_plan_is_restartable() {
        let samples = audio_with_silence(20_000, &[(9_000, 10_500)]);
        let segmenter = AudioSegmenter::new(config(15_000));
        let mut decoder = MemoryDecoder::new(samples, RATE);

        let plan = segmenter.plan(&mut decoder).unwrap();

        let first: Vec<usize> = segmenter
            .chunks(&mut decoder, &plan)
            .map(|c| c.unwrap().index)
            .collect();
        let second: Vec<usize> = segmenter
            .chunks(&mut decoder, &plan)
            .map(|c| c.unwrap().index)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_chunk_wav_bytes() {
        let chunk = AudioChunk {
            index: 0,
            start_ms: 0,
            end_ms: 100,
            samples: vec![5; 100],
            sample_rate: RATE,
        };
        let bytes = chunk.wav_bytes().unwrap();
        assert_eq!(bytes.len(), 44 + 200);
    }
}
