//! Transcript rendering and artifact persistence.
//!
//! Every job writes two files: the transcript in the requested format and a
//! manifest sidecar at the same path plus a fixed suffix. The sidecar is
//! written even for degraded, failed, or cancelled runs.

use crate::defaults;
use crate::error::{LongscribeError, Result};
use crate::pipeline::manifest::TranscriptionResult;
use crate::pipeline::types::{ChunkStatus, TranscriptSegment};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Transcript output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Txt,
    Srt,
    Vtt,
}

impl FromStr for OutputFormat {
    type Err = LongscribeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "txt" => Ok(OutputFormat::Txt),
            "srt" => Ok(OutputFormat::Srt),
            "vtt" => Ok(OutputFormat::Vtt),
            other => Err(LongscribeError::ConfigInvalidValue {
                key: "format".to_string(),
                message: format!("'{}' is not one of: txt, srt, vtt", other),
            }),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Srt => "srt",
            OutputFormat::Vtt => "vtt",
        };
        write!(f, "{}", s)
    }
}

/// Path of the manifest sidecar for a transcript path.
pub fn manifest_path(output: &Path) -> PathBuf {
    PathBuf::from(format!(
        "{}{}",
        output.display(),
        defaults::MANIFEST_SUFFIX
    ))
}

/// Renders a result in the requested format.
pub fn render(result: &TranscriptionResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Txt => {
            if result.text.is_empty() {
                String::new()
            } else {
                format!("{}\n", result.text)
            }
        }
        OutputFormat::Srt => render_srt(&result.segments),
        OutputFormat::Vtt => render_vtt(&result.segments),
    }
}

/// Writes the transcript and its manifest sidecar.
pub fn write_result(
    result: &TranscriptionResult,
    output: &Path,
    format: OutputFormat,
) -> Result<()> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(output, render(result, format))?;

    let manifest = serde_json::to_string_pretty(&result.manifest)?;
    std::fs::write(manifest_path(output), manifest + "\n")?;

    Ok(())
}

fn subtitle_segments(segments: &[TranscriptSegment]) -> impl Iterator<Item = &TranscriptSegment> {
    segments.iter().filter(|s| {
        matches!(s.status, ChunkStatus::Ok | ChunkStatus::Degraded) && !s.text.is_empty()
    })
}

fn render_srt(segments: &[TranscriptSegment]) -> String {
    let mut out = String::new();
    for (sequence, segment) in subtitle_segments(segments).enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            sequence + 1,
            format_srt_timestamp(segment.start_ms),
            format_srt_timestamp(segment.end_ms),
            segment.text
        ));
    }
    out
}

fn render_vtt(segments: &[TranscriptSegment]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for segment in subtitle_segments(segments) {
        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_vtt_timestamp(segment.start_ms),
            format_vtt_timestamp(segment.end_ms),
            segment.text
        ));
    }
    out
}

/// Format timestamp for SRT (HH:MM:SS,mmm)
fn format_srt_timestamp(ms: u64) -> String {
    let total_seconds = ms / 1000;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60,
        ms % 1000
    )
}

/// Format timestamp for VTT (HH:MM:SS.mmm)
fn format_vtt_timestamp(ms: u64) -> String {
    let total_seconds = ms / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60,
        ms % 1000
    )
}
