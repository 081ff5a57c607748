//! Chunked execution of independent work items.
//!
//! Items are split into contiguous chunks and a callback runs over each chunk,
//! either inline or on a pool of scoped worker threads. Outputs come back in
//! chunk order regardless of completion order, so serial and threaded runs are
//! interchangeable.

use std::fmt::Display;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ExecutionMode {
    Serial,
    Threaded { num_threads: usize },
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Threaded { num_threads: default_threads() }
    }
}

impl ExecutionMode {
    pub fn worker_count(self) -> usize {
        match self {
            Self::Serial => 1,
            Self::Threaded { num_threads } => num_threads,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub chunk_id: usize,
    pub start: usize,
    pub end: usize,
}

impl ChunkRange {
    pub fn len(self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParallelError {
    #[error("invalid parallel config: {0}")]
    InvalidConfig(&'static str),
    #[error("callback failed in chunk {chunk_id}: {message}")]
    CallbackFailed { chunk_id: usize, message: String },
    #[error("parallel worker panicked")]
    WorkerPanic,
    #[error("channel unexpectedly closed while {0}")]
    ChannelClosed(&'static str),
}

pub type ParallelResult<T> = Result<T, ParallelError>;

/// Splits `item_count` items into at most `target_chunks` contiguous,
/// non-empty, equally sized ranges.
pub fn partition_items(item_count: usize, target_chunks: usize) -> ParallelResult<Vec<ChunkRange>> {
    if item_count == 0 {
        return Ok(Vec::new());
    }
    if target_chunks == 0 {
        return Err(ParallelError::InvalidConfig("target_chunks must be > 0"));
    }
    let chunks = target_chunks.min(item_count);
    Ok((0..chunks)
        .map(|chunk_id| ChunkRange {
            chunk_id,
            start: chunk_id * item_count / chunks,
            end: (chunk_id + 1) * item_count / chunks,
        })
        .collect())
}

/// Runs `callback` over chunks of `items` and returns one output per chunk,
/// ordered by chunk. `chunks_per_worker` oversubscribes the pool so that
/// uneven chunks do not leave workers idle.
pub fn run_chunked<A, R, F, E>(
    items: &[A],
    mode: ExecutionMode,
    chunks_per_worker: usize,
    callback: F,
) -> ParallelResult<Vec<R>>
where
    A: Sync,
    R: Send,
    F: Fn(&[A]) -> Result<R, E> + Send + Sync,
    E: Display,
{
    if chunks_per_worker == 0 {
        return Err(ParallelError::InvalidConfig("chunks_per_worker must be > 0"));
    }
    let workers = mode.worker_count();
    if workers == 0 {
        return Err(ParallelError::InvalidConfig("num_threads must be > 0"));
    }
    let chunks = partition_items(items.len(), workers.saturating_mul(chunks_per_worker))?;
    tracing::debug!(items = items.len(), chunks = chunks.len(), workers, "dispatching chunked run");

    match mode {
        ExecutionMode::Serial => chunks
            .iter()
            .map(|chunk| {
                callback(&items[chunk.start..chunk.end]).map_err(|err| {
                    ParallelError::CallbackFailed {
                        chunk_id: chunk.chunk_id,
                        message: err.to_string(),
                    }
                })
            })
            .collect(),
        ExecutionMode::Threaded { num_threads } => {
            run_threaded(items, &chunks, num_threads.min(chunks.len().max(1)), callback)
        }
    }
}

fn run_threaded<A, R, F, E>(
    items: &[A],
    chunks: &[ChunkRange],
    num_threads: usize,
    callback: F,
) -> ParallelResult<Vec<R>>
where
    A: Sync,
    R: Send,
    F: Fn(&[A]) -> Result<R, E> + Send + Sync,
    E: Display,
{
    let total = chunks.len();
    let callback = Arc::new(callback);

    let (job_tx, job_rx) = mpsc::channel::<ChunkRange>();
    let job_rx = Arc::new(Mutex::new(job_rx));
    let (result_tx, result_rx) = mpsc::channel::<(ChunkRange, ParallelResult<R>)>();

    thread::scope(|scope| {
        let mut workers = Vec::with_capacity(num_threads);
        for _ in 0..num_threads {
            let rx = Arc::clone(&job_rx);
            let tx = result_tx.clone();
            let cb = Arc::clone(&callback);
            workers.push(scope.spawn(move || loop {
                let next = match rx.lock() {
                    Ok(guard) => guard.recv(),
                    Err(_) => break,
                };
                let chunk = match next {
                    Ok(chunk) => chunk,
                    Err(_) => break,
                };
                let res = cb(&items[chunk.start..chunk.end]).map_err(|err| {
                    ParallelError::CallbackFailed {
                        chunk_id: chunk.chunk_id,
                        message: err.to_string(),
                    }
                });
                if tx.send((chunk, res)).is_err() {
                    break;
                }
            }));
        }
        drop(result_tx);

        for chunk in chunks {
            if job_tx.send(*chunk).is_err() {
                return Err(ParallelError::ChannelClosed("queueing jobs"));
            }
        }
        drop(job_tx);

        let mut ordered: Vec<Option<R>> = (0..total).map(|_| None).collect();
        let mut first_error: Option<ParallelError> = None;
        for _ in 0..total {
            let (chunk, outcome) = result_rx
                .recv()
                .map_err(|_| ParallelError::ChannelClosed("receiving worker results"))?;
            match outcome {
                Ok(out) => ordered[chunk.chunk_id] = Some(out),
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        for worker in workers {
            if worker.join().is_err() {
                return Err(ParallelError::WorkerPanic);
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        ordered
            .into_iter()
            .map(|maybe| maybe.ok_or(ParallelError::ChannelClosed("assembling ordered results")))
            .collect()
    })
}

fn default_threads() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get().max(1))
}
