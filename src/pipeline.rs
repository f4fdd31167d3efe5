//! Per-worker aggregation and the global fold.
//!
//! Each worker event log is replayed into its own private aggregator by an
//! independent rayon task (no shared state, no locks), then the private
//! instances are folded sequentially into one global aggregator on the
//! calling thread. Fold order does not affect the result.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::events::EventReader;
use crate::quality::QualityAggregator;

/// Replay one worker's event log into a private aggregator.
pub fn aggregate_log(path: &Path) -> Result<QualityAggregator> {
    let file =
        File::open(path).with_context(|| format!("Failed to open event log {}", path.display()))?;

    let mut quality = QualityAggregator::new();
    for event in EventReader::new(BufReader::new(file)) {
        let event =
            event.with_context(|| format!("Failed to decode event log {}", path.display()))?;
        event.apply(&mut quality);
    }
    Ok(quality)
}

/// Replay many worker logs in parallel and fold them into one global
/// aggregator.
pub fn aggregate_logs(paths: &[PathBuf]) -> Result<QualityAggregator> {
    let parts: Vec<QualityAggregator> = paths
        .par_iter()
        .map(|path| aggregate_log(path))
        .collect::<Result<_>>()?;

    let mut global = QualityAggregator::new();
    for part in &parts {
        global.merge(part);
    }
    Ok(global)
}
