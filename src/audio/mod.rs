//! Audio source access and silence-aware segmentation.

pub mod decoder;
pub mod segmenter;
pub mod wav;

pub use decoder::{AudioDecoder, MemoryDecoder, WavFileDecoder};
pub use segmenter::{AudioChunk, AudioSegmenter, ChunkReader, ChunkSpan, SegmenterConfig};
