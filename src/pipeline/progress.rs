//! Progress reporting for running jobs.

use crate::pipeline::types::{ChunkStatus, JobState};

/// Receives job progress events.
///
/// Chunk events arrive in completion order, which under concurrent dispatch
/// is not index order; the final transcript is ordered regardless.
pub trait ProgressObserver: Send + Sync {
    /// The job entered a new state.
    fn on_state(&self, _state: JobState) {}

    /// Segmentation finished; `chunk_count` chunks will be dispatched.
    fn on_plan(&self, _chunk_count: usize) {}

    /// A chunk reached a terminal status.
    fn on_chunk(&self, _index: usize, _status: ChunkStatus, _provider: Option<&str>) {}
}

/// Observer that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressObserver for NullProgress {}

/// Observer that logs chunk completions to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_plan(&self, chunk_count: usize) {
        eprintln!("longscribe: dispatching {} chunk(s)", chunk_count);
    }

    fn on_chunk(&self, index: usize, status: ChunkStatus, provider: Option<&str>) {
        match provider {
            Some(provider) => {
                eprintln!("longscribe: chunk {} {} via {}", index, status, provider);
            }
            None => eprintln!("longscribe: chunk {} {}", index, status),
        }
    }
}
