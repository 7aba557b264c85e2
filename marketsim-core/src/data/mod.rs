//! Market data sources — in-memory alignment, CSV ingest, synthetic
//! series.

pub mod csv;
pub mod synthetic;

pub use self::csv::load_bars_csv;
pub use self::synthetic::random_walk;

use crate::domain::{Bar, MultiBar};
use thiserror::Error;

/// Errors from data loading and streaming.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("no bars provided")]
    Empty,

    #[error("bars are not in chronological order at index {0}")]
    OutOfOrder(usize),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: ::csv::Error,
    },
}

/// A producer of time-aligned observation batches.
///
/// The sequence must be lazy, finite, and chronologically
/// non-decreasing; the engine iterates it exactly once and never
/// rewinds. Exhaustion (`Ok(None)`) is the engine's normal termination.
pub trait MarketDataSource {
    fn next_batch(&mut self) -> Result<Option<MultiBar>, DataError>;
}

/// In-memory source over pre-aligned batches.
pub struct MemorySource {
    batches: Vec<MultiBar>,
    cursor: usize,
}

impl MemorySource {
    pub fn new(batches: Vec<MultiBar>) -> Self {
        Self { batches, cursor: 0 }
    }

    /// Align a flat bar list into per-timestamp batches. The input must
    /// already be sorted by timestamp (the usual shape of an exported
    /// history file); bars sharing a timestamp land in one batch.
    pub fn from_bars(bars: Vec<Bar>) -> Result<Self, DataError> {
        if bars.is_empty() {
            return Err(DataError::Empty);
        }
        let mut batches: Vec<MultiBar> = Vec::new();
        for (index, bar) in bars.into_iter().enumerate() {
            match batches.last_mut() {
                Some(batch) => {
                    // All bars in a batch share one timestamp.
                    let batch_ts = batch
                        .values()
                        .next()
                        .map(|b| b.timestamp)
                        .unwrap_or(bar.timestamp);
                    if bar.timestamp == batch_ts {
                        batch.insert(bar.symbol.clone(), bar);
                    } else if bar.timestamp > batch_ts {
                        let mut next = MultiBar::new();
                        next.insert(bar.symbol.clone(), bar);
                        batches.push(next);
                    } else {
                        return Err(DataError::OutOfOrder(index));
                    }
                }
                None => {
                    let mut first = MultiBar::new();
                    first.insert(bar.symbol.clone(), bar);
                    batches.push(first);
                }
            }
        }
        Ok(Self::new(batches))
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

impl MarketDataSource for MemorySource {
    fn next_batch(&mut self) -> Result<Option<MultiBar>, DataError> {
        let batch = self.batches.get(self.cursor).cloned();
        if batch.is_some() {
            self.cursor += 1;
        }
        Ok(batch)
    }
}
