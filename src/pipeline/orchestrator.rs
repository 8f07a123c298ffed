//! Job orchestration: segmentation → staging → transcription → assembly.
//!
//! One orchestrator drives one job at a time through a bounded worker pool.
//! Chunks are dispatched concurrently but a chunk failure never aborts the
//! job; it is absorbed as a `failed` segment and the manifest records it.

use crate::audio::decoder::{AudioDecoder, WavFileDecoder};
use crate::audio::segmenter::{AudioChunk, AudioSegmenter};
use crate::error::{LongscribeError, Result};
use crate::output;
use crate::pipeline::manifest::{ChunkSizes, JobOutcome, ManifestBuilder, TranscriptionResult};
use crate::pipeline::progress::{NullProgress, ProgressObserver};
use crate::pipeline::types::{AudioJob, ChunkStatus, JobState, TranscriptSegment};
use crate::resilience::{
    AttemptObserver, Clock, LogAttemptObserver, ResilienceConfig, ResiliencePolicy, SystemClock,
};
use crate::staging::{StagedObject, StagingStore};
use crate::stt::registry::TranscriberRegistry;
use crate::stt::transcriber::{ChunkPayload, TranscribeOptions, Transcriber};
use crossbeam_channel::{Receiver, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Drives transcription jobs end to end.
pub struct Orchestrator {
    registry: Arc<TranscriberRegistry>,
    staging: Option<Arc<StagingStore>>,
    resilience: ResilienceConfig,
    progress: Arc<dyn ProgressObserver>,
    attempts: Arc<dyn AttemptObserver>,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(registry: Arc<TranscriberRegistry>) -> Self {
        Self {
            registry,
            staging: None,
            resilience: ResilienceConfig::default(),
            progress: Arc::new(NullProgress),
            attempts: Arc::new(LogAttemptObserver),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the staging store used for providers that require a remote
    /// reference.
    pub fn with_staging(mut self, staging: Arc<StagingStore>) -> Self {
        self.staging = Some(staging);
        self
    }

    pub fn with_resilience(mut self, resilience: ResilienceConfig) -> Self {
        self.resilience = resilience;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_attempt_observer(mut self, attempts: Arc<dyn AttemptObserver>) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets a custom clock (for deterministic testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Submits a job, opening its source as a WAV file.
    pub fn submit(&self, job: AudioJob) -> Result<JobHandle> {
        let decoder = WavFileDecoder::open(&job.source)?;
        self.submit_with_decoder(job, Box::new(decoder))
    }

    /// Submits a job with a caller-supplied decoder.
    ///
    /// Setup failures (invalid parameters, unknown providers, missing
    /// staging store) are returned here; once a handle exists the job always
    /// reaches a terminal state with a manifest.
    pub fn submit_with_decoder(
        &self,
        job: AudioJob,
        decoder: Box<dyn AudioDecoder>,
    ) -> Result<JobHandle> {
        job.validate()?;

        // Resolve the whole chain up front so unknown providers fail before
        // any audio is read.
        let chain: Vec<Arc<dyn Transcriber>> = job
            .chain()
            .iter()
            .map(|id| self.registry.resolve(id))
            .collect::<Result<_>>()?;

        if chain.iter().any(|t| t.requires_staging()) && self.staging.is_none() {
            return Err(LongscribeError::ConfigInvalidValue {
                key: "staging".to_string(),
                message: "provider chain requires staging but no staging store is configured"
                    .to_string(),
            });
        }

        let context = JobContext {
            job,
            chain,
            staging: self.staging.clone(),
            resilience: self.resilience,
            progress: self.progress.clone(),
            attempts: self.attempts.clone(),
            clock: self.clock.clone(),
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let (result_tx, result_rx) = bounded(1);
        let thread_cancel = cancel.clone();
        let handle = thread::spawn(move || {
            let result = context.run(decoder, thread_cancel);
            let _sent = result_tx.send(result);
        });

        Ok(JobHandle {
            cancel,
            result_rx,
            thread: Some(handle),
        })
    }
}

/// Handle to a running job.
pub struct JobHandle {
    cancel: Arc<AtomicBool>,
    result_rx: Receiver<Result<TranscriptionResult>>,
    thread: Option<JoinHandle<()>>,
}

impl JobHandle {
    /// Signals cancellation: no new chunks are dispatched, undispatched
    /// chunks are recorded as `cancelled`, and completed chunks keep their
    /// results. The job's terminal outcome becomes `Failed`.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Blocks until the job reaches a terminal state.
    pub fn wait(mut self) -> Result<TranscriptionResult> {
        let result = self.result_rx.recv().unwrap_or_else(|_| {
            Err(LongscribeError::Permanent {
                message: "job thread terminated without producing a result".to_string(),
            })
        });

        if let Some(handle) = self.thread.take()
            && let Err(panic) = handle.join()
        {
            eprintln!("longscribe: job thread panicked: {}", panic_message(&panic));
        }

        result
    }
}

/// Everything one job needs, moved onto the job thread.
struct JobContext {
    job: AudioJob,
    chain: Vec<Arc<dyn Transcriber>>,
    staging: Option<Arc<StagingStore>>,
    resilience: ResilienceConfig,
    progress: Arc<dyn ProgressObserver>,
    attempts: Arc<dyn AttemptObserver>,
    clock: Arc<dyn Clock>,
}

/// Terminal result for one chunk, plus bookkeeping.
struct ChunkOutcome {
    segment: TranscriptSegment,
    sizes: ChunkSizes,
    staged: Option<StagedObject>,
}

impl JobContext {
    fn run(
        &self,
        decoder: Box<dyn AudioDecoder>,
        cancel: Arc<AtomicBool>,
    ) -> Result<TranscriptionResult> {
        match self.run_inner(decoder, cancel) {
            Ok(result) => Ok(result),
            Err(e) => {
                self.progress.on_state(JobState::Failed);
                Err(e)
            }
        }
    }

    fn run_inner(
        &self,
        mut decoder: Box<dyn AudioDecoder>,
        cancel: Arc<AtomicBool>,
    ) -> Result<TranscriptionResult> {
        self.progress.on_state(JobState::Segmenting);

        let segmenter = AudioSegmenter::new(self.job.segmenter_config());
        let plan = segmenter.plan(decoder.as_mut())?;
        let source_duration_ms = decoder.duration_ms();
        self.progress.on_plan(plan.len());

        let builder = ManifestBuilder::new().with_separator(&self.job.separator);
        let source_label = self.job.source.display().to_string();

        if plan.is_empty() {
            self.progress.on_state(JobState::Assembling);
            let result = builder.build(
                &source_label,
                &self.job.provider,
                source_duration_ms,
                Vec::new(),
                &[],
                JobOutcome::Done,
            );
            output::write_result(&result, &self.job.output, self.job.format)?;
            self.progress.on_state(JobState::Done);
            return Ok(result);
        }

        self.progress.on_state(JobState::Dispatching);

        let policy = Arc::new(
            ResiliencePolicy::new(self.resilience)
                .with_clock(self.clock.clone())
                .with_observer(self.attempts.clone()),
        );
        let (chunk_tx, chunk_rx) = bounded::<AudioChunk>(self.job.workers);
        let (out_tx, out_rx) = bounded::<ChunkOutcome>(plan.len());

        let mut workers = Vec::new();
        for _ in 0..self.job.workers {
            let chunk_rx = chunk_rx.clone();
            let out_tx = out_tx.clone();
            let chain = self.chain.clone();
            let staging = self.staging.clone();
            let policy = policy.clone();
            let cancel = cancel.clone();
            let options = TranscribeOptions {
                language: self.job.language.clone(),
            };

            workers.push(thread::spawn(move || {
                while let Ok(chunk) = chunk_rx.recv() {
                    let outcome = if cancel.load(Ordering::SeqCst) {
                        cancelled_outcome(chunk.index, chunk.start_ms, chunk.end_ms)
                    } else {
                        process_chunk(&chunk, &chain, staging.as_deref(), &policy, &options)
                    };
                    if out_tx.send(outcome).is_err() {
                        break;
                    }
                }
            }));
        }
        drop(chunk_rx);
        drop(out_tx);

        // Dispatcher reads chunk payloads lazily so only queued chunks hold
        // samples in memory. It returns outcomes for chunks it never handed
        // to a worker.
        let dispatcher = {
            let plan = plan.clone();
            let config = self.job.segmenter_config();
            let cancel = cancel.clone();
            thread::spawn(move || -> Vec<ChunkOutcome> {
                let segmenter = AudioSegmenter::new(config);
                let mut undispatched = Vec::new();
                let mut produced = 0usize;

                {
                    let mut reader = segmenter.chunks(decoder.as_mut(), &plan);
                    while produced < plan.len() {
                        if cancel.load(Ordering::SeqCst) {
                            break;
                        }
                        match reader.next() {
                            Some(Ok(chunk)) => {
                                if chunk_tx.send(chunk).is_err() {
                                    break;
                                }
                                produced += 1;
                            }
                            Some(Err(e)) => {
                                let span = plan[produced];
                                undispatched.push(failed_outcome(
                                    span.index,
                                    span.start_ms,
                                    span.end_ms,
                                    e.to_string(),
                                ));
                                produced += 1;
                            }
                            None => break,
                        }
                    }
                }

                for span in &plan[produced..] {
                    undispatched.push(cancelled_outcome(span.index, span.start_ms, span.end_ms));
                }
                undispatched
            })
        };

        self.progress.on_state(JobState::Collecting);
        let mut outcomes: Vec<ChunkOutcome> = Vec::with_capacity(plan.len());
        while outcomes.len() < plan.len() {
            match out_rx.recv() {
                Ok(outcome) => {
                    self.progress.on_chunk(
                        outcome.segment.index,
                        outcome.segment.status,
                        outcome.segment.provider.as_deref(),
                    );
                    outcomes.push(outcome);
                }
                Err(_) => break,
            }
        }

        let undispatched = match dispatcher.join() {
            Ok(outcomes) => outcomes,
            Err(panic) => {
                eprintln!(
                    "longscribe: dispatcher thread panicked: {}",
                    panic_message(&panic)
                );
                Vec::new()
            }
        };
        for outcome in undispatched {
            self.progress.on_chunk(
                outcome.segment.index,
                outcome.segment.status,
                outcome.segment.provider.as_deref(),
            );
            outcomes.push(outcome);
        }

        for handle in workers {
            if let Err(panic) = handle.join() {
                eprintln!(
                    "longscribe: worker thread panicked: {}",
                    panic_message(&panic)
                );
            }
        }

        // Safety net: a chunk must always reach a terminal status.
        for span in &plan {
            if !outcomes.iter().any(|o| o.segment.index == span.index) {
                outcomes.push(failed_outcome(
                    span.index,
                    span.start_ms,
                    span.end_ms,
                    "worker terminated before producing a result".to_string(),
                ));
            }
        }

        if let Some(staging) = &self.staging {
            for outcome in &outcomes {
                if let Some(object) = &outcome.staged
                    && let Err(e) = staging.delete(object)
                {
                    eprintln!(
                        "longscribe: failed to delete staged object {}: {}",
                        object.key, e
                    );
                }
            }
        }

        let cancelled = cancel.load(Ordering::SeqCst);
        self.progress.on_state(JobState::Assembling);

        let sizes: Vec<ChunkSizes> = outcomes.iter().map(|o| o.sizes).collect();
        let segments: Vec<TranscriptSegment> = outcomes.into_iter().map(|o| o.segment).collect();
        let outcome = if cancelled {
            JobOutcome::Failed {
                reason: "cancelled by caller".to_string(),
            }
        } else {
            JobOutcome::Done
        };

        let result = builder.build(
            &source_label,
            &self.job.provider,
            source_duration_ms,
            segments,
            &sizes,
            outcome,
        );
        output::write_result(&result, &self.job.output, self.job.format)?;

        self.progress.on_state(if cancelled {
            JobState::Failed
        } else {
            JobState::Done
        });

        Ok(result)
    }
}

/// Runs one chunk's unit of work (stage when required, then transcribe)
/// through the resilience policy.
fn process_chunk(
    chunk: &AudioChunk,
    chain: &[Arc<dyn Transcriber>],
    staging: Option<&StagingStore>,
    policy: &ResiliencePolicy,
    options: &TranscribeOptions,
) -> ChunkOutcome {
    let wav = match chunk.wav_bytes() {
        Ok(wav) => wav,
        Err(e) => {
            return failed_outcome(chunk.index, chunk.start_ms, chunk.end_ms, e.to_string());
        }
    };
    let bytes_original = wav.len() as u64;
    let labels: Vec<&str> = chain.iter().map(|t| t.provider_id()).collect();
    let mut staged: Option<StagedObject> = None;

    let executed = policy.execute(&labels, |provider_id| {
        let transcriber = chain
            .iter()
            .find(|t| t.provider_id() == provider_id)
            .ok_or_else(|| LongscribeError::UnknownProvider {
                provider: provider_id.to_string(),
                known: labels.join(", "),
            })?;

        let payload = if transcriber.requires_staging() {
            let store = staging.ok_or_else(|| LongscribeError::Staging {
                message: "no staging store configured".to_string(),
            })?;
            // Staging is content-addressed, so retries reuse the object
            // already uploaded for this chunk.
            let object = match &staged {
                Some(object) => object.clone(),
                None => {
                    let object = store.put(&wav)?;
                    staged = Some(object.clone());
                    object
                }
            };
            ChunkPayload::Staged {
                url: store.url(&object)?,
            }
        } else {
            ChunkPayload::Inline { wav: wav.clone() }
        };

        transcriber.transcribe(&payload, options)
    });

    match executed {
        Ok(executed) => ChunkOutcome {
            segment: TranscriptSegment {
                index: chunk.index,
                start_ms: chunk.start_ms,
                end_ms: chunk.end_ms,
                text: executed.value.text,
                timestamps: executed.value.timestamps,
                provider: Some(executed.provider),
                status: if executed.fell_back {
                    ChunkStatus::Degraded
                } else {
                    ChunkStatus::Ok
                },
                error: None,
            },
            sizes: ChunkSizes {
                index: chunk.index,
                bytes_original,
                bytes_staged: staged.as_ref().map(|s| s.size),
            },
            staged,
        },
        Err(e) => ChunkOutcome {
            segment: TranscriptSegment {
                index: chunk.index,
                start_ms: chunk.start_ms,
                end_ms: chunk.end_ms,
                text: String::new(),
                timestamps: None,
                provider: None,
                status: ChunkStatus::Failed,
                error: Some(e.to_string()),
            },
            sizes: ChunkSizes {
                index: chunk.index,
                bytes_original,
                bytes_staged: staged.as_ref().map(|s| s.size),
            },
            staged,
        },
    }
}

fn failed_outcome(index: usize, start_ms: u64, end_ms: u64, error: String) -> ChunkOutcome {
    ChunkOutcome {
        segment: TranscriptSegment {
            index,
            start_ms,
            end_ms,
            text: String::new(),
            timestamps: None,
            provider: None,
            status: ChunkStatus::Failed,
            error: Some(error),
        },
        sizes: ChunkSizes {
            index,
            bytes_original: 0,
            bytes_staged: None,
        },
        staged: None,
    }
}

fn cancelled_outcome(index: usize, start_ms: u64, end_ms: u64) -> ChunkOutcome {
    ChunkOutcome {
        segment: TranscriptSegment {
            index,
            start_ms,
            end_ms,
            text: String::new(),
            timestamps: None,
            provider: None,
            status: ChunkStatus::Cancelled,
            error: Some("job cancelled".to_string()),
        },
        sizes: ChunkSizes {
            index,
            bytes_original: 0,
            bytes_staged: None,
        },
        staged: None,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
