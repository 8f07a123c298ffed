//! Command-line interface for longscribe
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Long-audio transcription with chunking and provider fallback
#[derive(Parser, Debug)]
#[command(
    name = "longscribe",
    version,
    about = "Long-audio transcription with chunking and provider fallback"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: progress log, -vv: per-attempt diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe an audio file
    Transcribe {
        /// Source audio file (16-bit mono PCM WAV)
        input: PathBuf,

        /// Transcript output path (default: input path with the format extension)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Provider id to use (overrides config)
        #[arg(long, value_name = "ID")]
        provider: Option<String>,

        /// Fallback provider id, may be repeated (overrides config)
        #[arg(long = "fallback", value_name = "ID")]
        fallbacks: Vec<String>,

        /// Output format: txt, srt, vtt
        #[arg(long, value_name = "FORMAT")]
        format: Option<String>,

        /// Language code for transcription (default: auto-detect)
        #[arg(long, value_name = "LANG")]
        language: Option<String>,

        /// Maximum chunk duration (e.g. 45s, 1m30s)
        #[arg(long, value_name = "DURATION", value_parser = parse_secs)]
        max_chunk: Option<u64>,

        /// Worker pool size for concurrent chunk dispatch
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
    },

    /// List configured providers
    Providers,

    /// Check configuration and staging setup
    Check,
}

/// Parse a duration string into seconds.
///
/// Supports any duration format accepted by `humantime`: bare numbers
/// (seconds), single-unit (`30s`, `5m`, `2h`), and compound (`1h30m`).
fn parse_secs(s: &str) -> Result<u64, String> {
    let s = s.trim();
    // Bare number → seconds
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_secs())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_secs_bare_number() {
        assert_eq!(parse_secs("45"), Ok(45));
    }

    #[test]
    fn test_parse_secs_units() {
        assert_eq!(parse_secs("30s"), Ok(30));
        assert_eq!(parse_secs("5m"), Ok(300));
        assert_eq!(parse_secs("1h30m"), Ok(5400));
    }

    #[test]
    fn test_parse_secs_rejects_garbage() {
        assert!(parse_secs("soon").is_err());
    }

    #[test]
    fn test_cli_parses_transcribe_command() {
        let cli = Cli::try_parse_from([
            "longscribe",
            "transcribe",
            "talk.wav",
            "--provider",
            "azure",
            "--fallback",
            "whisper",
            "--fallback",
            "volc",
            "--format",
            "srt",
            "--max-chunk",
            "45s",
        ])
        .unwrap();

        match cli.command {
            Commands::Transcribe {
                input,
                provider,
                fallbacks,
                format,
                max_chunk,
                ..
            } => {
                assert_eq!(input, PathBuf::from("talk.wav"));
                assert_eq!(provider.as_deref(), Some("azure"));
                assert_eq!(fallbacks, vec!["whisper", "volc"]);
                assert_eq!(format.as_deref(), Some("srt"));
                assert_eq!(max_chunk, Some(45));
            }
            other => panic!("Expected Transcribe, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from(["longscribe", "-q", "-vv", "providers"]).unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Providers));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["longscribe"]).is_err());
    }
}
