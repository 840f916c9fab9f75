//! Per-comparison trace capture for tournament runs.
//!
//! A [`TraceSink`] receives one [`ComparisonTrace`] per judged pair (and
//! one final record for a pair that exhausted its retries). The bundled
//! [`JsonlTraceSink`] hands records to a background writer thread over a
//! channel so the run loop never blocks on file IO.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::judgment::Judgment;
use crate::tournament::GroupKey;

/// One judged (or abandoned) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonTrace {
    pub timestamp_ms: i64,
    pub group: GroupKey,
    /// Position of the pair in the group's fixed traversal order.
    pub comparison_index: usize,
    pub first_index: usize,
    pub second_index: usize,
    /// Raw comparator text; absent when every attempt failed.
    pub raw_verdict: Option<String>,
    /// Parsed verdict; `neither` also covers unrecognized text.
    pub judgment: Option<Judgment>,
    /// Comparator invocations consumed, retries included.
    pub attempts: u32,
    pub first_rating_after: f64,
    pub second_rating_after: f64,
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("trace channel closed")]
    Closed,
    #[error("trace worker failed: {0}")]
    Join(String),
}

/// Receiver for comparison records. Implementations must be cheap per
/// call; a rejected record aborts the run that produced it.
pub trait TraceSink: Send + Sync {
    fn record(&self, event: ComparisonTrace) -> Result<(), TraceError>;
}

/// Sink writing one JSON object per line through a background thread.
#[derive(Clone)]
pub struct JsonlTraceSink {
    sender: mpsc::Sender<ComparisonTrace>,
}

/// Handle for the background writer. Drop every sink clone, then `join`
/// to flush the file and surface any write error.
pub struct TraceWorker {
    handle: Option<std::thread::JoinHandle<Result<(), TraceError>>>,
}

impl TraceWorker {
    pub fn join(mut self) -> Result<(), TraceError> {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(TraceError::Join("trace worker panicked".to_string())),
            },
            None => Ok(()),
        }
    }
}

impl JsonlTraceSink {
    pub fn new(path: impl AsRef<Path>) -> Result<(Self, TraceWorker), TraceError> {
        let file = std::fs::File::create(path)?;
        let (sender, receiver) = mpsc::channel::<ComparisonTrace>();
        let handle = std::thread::spawn(move || write_trace_loop(file, receiver));
        Ok((
            Self { sender },
            TraceWorker {
                handle: Some(handle),
            },
        ))
    }
}

impl TraceSink for JsonlTraceSink {
    fn record(&self, event: ComparisonTrace) -> Result<(), TraceError> {
        self.sender.send(event).map_err(|_| TraceError::Closed)
    }
}

fn write_trace_loop(
    file: std::fs::File,
    receiver: mpsc::Receiver<ComparisonTrace>,
) -> Result<(), TraceError> {
    let mut writer = BufWriter::new(file);
    for event in receiver {
        let line = serde_json::to_string(&event).map_err(|e| TraceError::Serde(e.to_string()))?;
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
