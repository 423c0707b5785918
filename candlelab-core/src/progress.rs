//! Progress notifications and cooperative cancellation.
//!
//! The loader and the bar loop push [`ProgressEvent`]s into a caller-supplied
//! [`ProgressSink`] and poll a [`CancellationToken`] at their checkpoints
//! (between network batches, and on every candle). Cancellation is never
//! preemptive: work in flight finishes, then the run stops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use serde::Serialize;

/// Shared flag; clones observe the same cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A loader batch finished (`batch` is 1-based).
    BatchFetched {
        batch: usize,
        total: usize,
        message: String,
    },
    /// Share of candles simulated so far, in `[0, 100]`.
    Simulating { percent: f64 },
}

impl ProgressEvent {
    pub fn batch_fetched(batch: usize, total: usize) -> Self {
        ProgressEvent::BatchFetched {
            batch,
            total,
            message: format!("batch {batch}/{total} fetched"),
        }
    }

    pub fn percent(&self) -> f64 {
        match self {
            ProgressEvent::BatchFetched { batch, total, .. } if *total > 0 => {
                *batch as f64 / *total as f64 * 100.0
            }
            ProgressEvent::BatchFetched { .. } => 100.0,
            ProgressEvent::Simulating { percent } => *percent,
        }
    }
}

/// Receiver of progress notifications.
pub trait ProgressSink {
    fn report(&mut self, event: ProgressEvent);
}

impl<F: FnMut(ProgressEvent)> ProgressSink for F {
    fn report(&mut self, event: ProgressEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _event: ProgressEvent) {}
}

/// Forwards events over an mpsc channel; a hung-up receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(tx: Sender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&mut self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}
