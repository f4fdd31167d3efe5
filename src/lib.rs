//! Butterfly-quality library
//!
//! Per-run data-quality aggregation for OSM routing graph builds. Build
//! workers each own a private [`QualityAggregator`], record anomalies and
//! volumetric counters while cutting their tiles, and the driver folds all
//! private instances into one global aggregate that is reported once at the
//! end of the run.
//!
//! The library also ships the event-stream plumbing around the aggregator:
//! NDJSON [`QualityEvent`] records emitted per worker, and a rayon-backed
//! pipeline that replays many worker logs and performs the global fold.

pub mod events;
pub mod pipeline;
pub mod quality;
pub mod tile;

pub use events::{EventError, QualityEvent};
pub use quality::{DuplicateWay, IssueKind, QualityAggregator};
pub use tile::TileId;
