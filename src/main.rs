use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use longscribe::Orchestrator;
use longscribe::cli::{Cli, Commands};
use longscribe::config::Config;
use longscribe::pipeline::manifest::JobOutcome;
use longscribe::pipeline::progress::{LogProgress, ProgressObserver};
use longscribe::pipeline::types::{ChunkStatus, JobState};
use longscribe::resilience::{AttemptObserver, AttemptOutcome};
use longscribe::staging::{LocalBlobStore, StagingStore};
use longscribe::stt::registry_from_config;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Transcribe {
            input,
            output,
            provider,
            fallbacks,
            format,
            language,
            max_chunk,
            workers,
        } => {
            let mut config = config;
            if let Some(provider) = provider {
                config.job.provider = provider;
            }
            if !fallbacks.is_empty() {
                config.job.fallbacks = fallbacks;
            }
            if let Some(format) = format {
                config.job.format = format;
            }
            if let Some(language) = language {
                config.job.language = language;
            }
            if let Some(max_chunk) = max_chunk {
                config.job.max_chunk_secs = max_chunk;
            }
            if let Some(workers) = workers {
                config.job.workers = workers;
            }
            run_transcribe(&config, &input, output, cli.quiet, cli.verbose)?;
        }
        Commands::Providers => list_providers(&config),
        Commands::Check => run_check(&config)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            Config::load(path).with_context(|| format!("loading config {}", path.display()))?
        }
        None => Config::load_or_default(&Config::default_path()),
    };
    Ok(config.with_env_overrides())
}

fn staging_dir(config: &Config) -> PathBuf {
    config.staging.dir.clone().unwrap_or_else(|| {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("longscribe")
            .join("staging")
    })
}

/// Attempt observer that swallows everything (quiet mode).
struct SilentAttempts;

impl AttemptObserver for SilentAttempts {
    fn on_attempt(&self, _provider: &str, _outcome: &AttemptOutcome, _latency: Duration) {}
}

/// Attempt observer that logs every attempt, successes included (-vv).
struct VerboseAttempts;

impl AttemptObserver for VerboseAttempts {
    fn on_attempt(&self, provider: &str, outcome: &AttemptOutcome, latency: Duration) {
        match outcome {
            AttemptOutcome::Succeeded => {
                eprintln!("longscribe: [{}] ok in {:?}", provider, latency);
            }
            AttemptOutcome::Retryable(msg) => {
                eprintln!("longscribe: [{}] retryable after {:?}: {}", provider, latency, msg);
            }
            AttemptOutcome::Fatal(msg) => {
                eprintln!("longscribe: [{}] fatal after {:?}: {}", provider, latency, msg);
            }
        }
    }
}

/// Progress bar over chunk completions.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template("{msg:12} {bar:32} {pos}/{len}") {
            bar.set_style(style);
        }
        Self { bar }
    }
}

impl ProgressObserver for BarProgress {
    fn on_state(&self, state: JobState) {
        self.bar.set_message(state.to_string());
    }

    fn on_plan(&self, chunk_count: usize) {
        self.bar.set_length(chunk_count as u64);
    }

    fn on_chunk(&self, _index: usize, _status: ChunkStatus, _provider: Option<&str>) {
        self.bar.inc(1);
    }
}

fn run_transcribe(
    config: &Config,
    input: &Path,
    output: Option<PathBuf>,
    quiet: bool,
    verbose: u8,
) -> Result<()> {
    let output = output.unwrap_or_else(|| input.with_extension(config.job.format.clone()));
    let job = config.audio_job(input, &output)?;

    let registry = registry_from_config(config)?;
    if registry.is_empty() {
        bail!(
            "no providers configured — add a [providers.<id>] section to {}",
            Config::default_path().display()
        );
    }

    let store = LocalBlobStore::new(staging_dir(config))?;
    let staging = StagingStore::new(Arc::new(store)).with_ttl(config.staging_ttl());

    let mut orchestrator = Orchestrator::new(Arc::new(registry))
        .with_staging(Arc::new(staging))
        .with_resilience(config.resilience_config());

    let bar = Arc::new(BarProgress::new());
    if quiet {
        orchestrator = orchestrator.with_attempt_observer(Arc::new(SilentAttempts));
    } else if verbose >= 1 {
        orchestrator = orchestrator.with_progress(Arc::new(LogProgress));
        if verbose >= 2 {
            orchestrator = orchestrator.with_attempt_observer(Arc::new(VerboseAttempts));
        }
    } else {
        orchestrator = orchestrator.with_progress(bar.clone());
    }

    let result = orchestrator.submit(job)?.wait()?;
    bar.bar.finish_and_clear();

    let ok = result.status_count(ChunkStatus::Ok);
    let degraded = result.status_count(ChunkStatus::Degraded);
    let failed = result.status_count(ChunkStatus::Failed);
    let cancelled = result.status_count(ChunkStatus::Cancelled);

    if !quiet {
        let summary = format!(
            "{} chunks: {} ok, {} degraded, {} failed, {} cancelled",
            result.manifest.chunk_count, ok, degraded, failed, cancelled
        );
        match result.manifest.outcome {
            JobOutcome::Done if failed == 0 => eprintln!("{} {}", "done".green(), summary),
            JobOutcome::Done => eprintln!("{} {}", "done".yellow(), summary),
            JobOutcome::Failed { ref reason } => {
                eprintln!("{} {} ({})", "failed".red(), summary, reason)
            }
        }
        eprintln!("  transcript: {}", output.display());
        eprintln!(
            "  manifest:   {}",
            longscribe::output::manifest_path(&output).display()
        );
    }

    if let JobOutcome::Failed { reason } = result.manifest.outcome {
        bail!("job failed: {}", reason);
    }

    Ok(())
}

fn list_providers(config: &Config) {
    if config.providers.is_empty() {
        eprintln!("No providers configured.");
        return;
    }

    for (id, entry) in &config.providers {
        let staging = if entry.requires_staging {
            "staged"
        } else {
            "inline"
        };
        println!(
            "{:<16} {:<8} model={} endpoint={}",
            id.bold(),
            staging,
            entry.model,
            entry.endpoint
        );
    }
}

fn run_check(config: &Config) -> Result<()> {
    let mut failures = 0;

    if config.providers.is_empty() {
        eprintln!("{} no providers configured", "fail".red());
        failures += 1;
    } else {
        match registry_from_config(config) {
            Ok(registry) => {
                eprintln!(
                    "{} {} provider(s): {}",
                    "ok".green(),
                    registry.len(),
                    registry.provider_ids().join(", ")
                );
            }
            Err(e) => {
                eprintln!("{} provider configuration: {}", "fail".red(), e);
                failures += 1;
            }
        }
    }

    let dir = staging_dir(config);
    match LocalBlobStore::new(dir.clone()) {
        Ok(_) => eprintln!("{} staging dir {}", "ok".green(), dir.display()),
        Err(e) => {
            eprintln!("{} staging dir {}: {}", "fail".red(), dir.display(), e);
            failures += 1;
        }
    }

    if config.job.provider.is_empty() {
        eprintln!(
            "{} no default provider (job.provider) — pass --provider per run",
            "note".yellow()
        );
    } else if !config.providers.contains_key(&config.job.provider) {
        eprintln!(
            "{} default provider '{}' is not in the provider table",
            "fail".red(),
            config.job.provider
        );
        failures += 1;
    }

    if failures > 0 {
        bail!("{} check(s) failed", failures);
    }
    Ok(())
}
