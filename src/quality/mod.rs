//! Data-quality aggregation for a routing graph build.
//!
//! Gathers structural anomalies (duplicate ways, dangling ramp connections,
//! ramps with incompatible use, tiles crossed by geometry without an end
//! node) plus volumetric counters describing the resulting graph. Each build
//! worker owns a private [`QualityAggregator`]; the driver folds the private
//! instances into one global aggregate with [`QualityAggregator::merge`] and
//! reports it once at the end of the run.
//!
//! # Ownership model
//!
//! The aggregator has no internal synchronization. A private instance is
//! mutated by exactly one worker; the fold into the global instance runs on
//! a single thread. `merge` is total, associative and commutative in its
//! aggregate effect, so the driver may fold worker results in any order.

mod report;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::tile::TileId;

/// Number of buckets in the node degree histogram.
pub const DEGREE_BUCKETS: usize = 128;

/// Degrees at or above this fold into the last histogram bucket.
pub const MAX_TRACKED_DEGREE: u32 = DEGREE_BUCKETS as u32 - 1;

/// Anomaly categories gathered during the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    /// Two ways that overlap between the same pair of end nodes.
    DuplicateWays,
    /// Link (ramp) edge with no graph connection at one end.
    UnconnectedLinkEdge,
    /// Link (ramp) edge whose use classification is not a link use
    /// (e.g. a driveway marked as a ramp).
    IncompatibleLinkUse,
}

/// A pair of ways that overlap, with the number of overlapping edges.
/// Ids are stored canonicalized (smaller first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DuplicateWay {
    pub way_id1: u64,
    pub way_id2: u64,
    pub overlap_count: u64,
}

/// Reporting priority for duplicate ways: more overlapping edges first.
/// This is not a natural ordering, so it stays a named comparator rather
/// than an `Ord` impl. Ties break on the ascending id pair to keep report
/// order deterministic.
pub fn by_overlap_desc(a: &DuplicateWay, b: &DuplicateWay) -> Ordering {
    b.overlap_count
        .cmp(&a.overlap_count)
        .then_with(|| (a.way_id1, a.way_id2).cmp(&(b.way_id1, b.way_id2)))
}

/// Canonical key for an unordered way pair: smaller id first. Applied at
/// every insertion and at merge time so (a, b) and (b, a) always land on
/// the same entry.
pub fn canonical_pair(way_id1: u64, way_id2: u64) -> (u64, u64) {
    if way_id1 <= way_id2 {
        (way_id1, way_id2)
    } else {
        (way_id2, way_id1)
    }
}

/// Accumulates data-quality signals for one slice of the build.
///
/// The volumetric counters are public and may be bumped directly by the
/// processing loop, matching how tile cutting code updates them inline.
/// The issue registries stay private behind the record operations so the
/// canonicalization and idempotency rules cannot be bypassed.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityAggregator {
    /// Nodes added to the graph.
    pub node_count: u64,
    /// Directed edges added to the graph.
    pub directed_edge_count: u64,
    /// Simple (always-on) turn restrictions.
    pub simple_restriction_count: u64,
    /// Time-dependent turn restrictions.
    pub timed_restriction_count: u64,
    /// Dead-end node configurations.
    pub cul_de_sac_count: u64,
    /// Bucket `d` counts nodes observed with exactly `d` connecting edges;
    /// the last bucket also absorbs every degree above it.
    pub node_degrees: [u64; DEGREE_BUCKETS],

    /// Tiles crossed by edge geometry without either end node in the tile.
    intersected_tiles: FxHashSet<TileId>,
    /// Way ids flagged as unconnected link edges.
    unconnected_links: FxHashSet<u64>,
    /// Way ids flagged as links with incompatible use.
    incompatible_link_use: FxHashSet<u64>,
    /// Canonical way pair to accumulated overlap count.
    duplicate_ways: FxHashMap<(u64, u64), u64>,
}

impl QualityAggregator {
    pub fn new() -> Self {
        QualityAggregator {
            node_count: 0,
            directed_edge_count: 0,
            simple_restriction_count: 0,
            timed_restriction_count: 0,
            cul_de_sac_count: 0,
            node_degrees: [0; DEGREE_BUCKETS],
            intersected_tiles: FxHashSet::default(),
            unconnected_links: FxHashSet::default(),
            incompatible_link_use: FxHashSet::default(),
            duplicate_ways: FxHashMap::default(),
        }
    }

    /// Fold another aggregator's state into this one.
    ///
    /// Counters and histogram buckets add element-wise (saturating), the
    /// issue sets union, and duplicate-way counts accumulate per canonical
    /// pair. Always succeeds, and the aggregate effect is independent of
    /// fold order across workers.
    pub fn merge(&mut self, other: &QualityAggregator) {
        self.node_count = self.node_count.saturating_add(other.node_count);
        self.directed_edge_count = self
            .directed_edge_count
            .saturating_add(other.directed_edge_count);
        self.simple_restriction_count = self
            .simple_restriction_count
            .saturating_add(other.simple_restriction_count);
        self.timed_restriction_count = self
            .timed_restriction_count
            .saturating_add(other.timed_restriction_count);
        self.cul_de_sac_count = self.cul_de_sac_count.saturating_add(other.cul_de_sac_count);

        for (bucket, count) in self.node_degrees.iter_mut().zip(other.node_degrees.iter()) {
            *bucket = bucket.saturating_add(*count);
        }

        self.intersected_tiles
            .extend(other.intersected_tiles.iter().copied());
        self.unconnected_links
            .extend(other.unconnected_links.iter().copied());
        self.incompatible_link_use
            .extend(other.incompatible_link_use.iter().copied());

        for (&(id1, id2), &count) in &other.duplicate_ways {
            let entry = self
                .duplicate_ways
                .entry(canonical_pair(id1, id2))
                .or_insert(0);
            *entry = entry.saturating_add(count);
        }
    }

    /// Record one anomaly occurrence.
    ///
    /// `_tile` and `way_id2` are accepted for every kind so call sites stay
    /// uniform; only [`IssueKind::DuplicateWays`] uses the second way id,
    /// and the tile context is not aggregated today.
    pub fn record_issue(&mut self, kind: IssueKind, _tile: TileId, way_id1: u64, way_id2: u64) {
        match kind {
            IssueKind::DuplicateWays => {
                let pair = canonical_pair(way_id1, way_id2);
                let entry = self.duplicate_ways.entry(pair).or_insert(0);
                *entry = entry.saturating_add(1);
            }
            IssueKind::UnconnectedLinkEdge => {
                self.unconnected_links.insert(way_id1);
            }
            IssueKind::IncompatibleLinkUse => {
                self.incompatible_link_use.insert(way_id1);
            }
        }
    }

    /// Record a tile crossed by edge geometry with neither end node in the
    /// tile. Idempotent.
    pub fn record_intersected_tile(&mut self, tile: TileId) {
        self.intersected_tiles.insert(tile);
    }

    /// Count one node of the given degree. Degrees of
    /// [`MAX_TRACKED_DEGREE`] or more fold into the last bucket; the clamp
    /// lives here so no caller can index past the histogram.
    pub fn record_node(&mut self, degree: u32) {
        self.node_count = self.node_count.saturating_add(1);
        let bucket = degree.min(MAX_TRACKED_DEGREE) as usize;
        self.node_degrees[bucket] = self.node_degrees[bucket].saturating_add(1);
    }

    /// Count directed edges added to the graph.
    pub fn record_directed_edges(&mut self, count: u64) {
        self.directed_edge_count = self.directed_edge_count.saturating_add(count);
    }

    pub fn record_simple_restriction(&mut self) {
        self.simple_restriction_count = self.simple_restriction_count.saturating_add(1);
    }

    pub fn record_timed_restriction(&mut self) {
        self.timed_restriction_count = self.timed_restriction_count.saturating_add(1);
    }

    pub fn record_cul_de_sac(&mut self) {
        self.cul_de_sac_count = self.cul_de_sac_count.saturating_add(1);
    }

    /// Duplicate-way records in reporting order (descending overlap count).
    pub fn duplicate_ways(&self) -> Vec<DuplicateWay> {
        let mut records: Vec<DuplicateWay> = self
            .duplicate_ways
            .iter()
            .map(|(&(way_id1, way_id2), &overlap_count)| DuplicateWay {
                way_id1,
                way_id2,
                overlap_count,
            })
            .collect();
        records.sort_by(by_overlap_desc);
        records
    }

    pub fn duplicate_way_count(&self) -> usize {
        self.duplicate_ways.len()
    }

    pub fn unconnected_link_count(&self) -> usize {
        self.unconnected_links.len()
    }

    pub fn incompatible_link_use_count(&self) -> usize {
        self.incompatible_link_use.len()
    }

    pub fn intersected_tile_count(&self) -> usize {
        self.intersected_tiles.len()
    }

    /// True if any anomaly has been recorded (counters are not anomalies).
    pub fn has_issues(&self) -> bool {
        !self.duplicate_ways.is_empty()
            || !self.unconnected_links.is_empty()
            || !self.incompatible_link_use.is_empty()
            || !self.intersected_tiles.is_empty()
    }
}

impl Default for QualityAggregator {
    fn default() -> Self {
        QualityAggregator::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(level: u8, index: u32) -> TileId {
        TileId::new(level, index)
    }

    #[test]
    fn test_canonical_pair() {
        assert_eq!(canonical_pair(5, 9), (5, 9));
        assert_eq!(canonical_pair(9, 5), (5, 9));
        assert_eq!(canonical_pair(7, 7), (7, 7));
    }

    #[test]
    fn test_duplicate_pair_accumulates_one_entry() {
        let mut quality = QualityAggregator::new();
        quality.record_issue(IssueKind::DuplicateWays, tile(2, 1), 5, 9);
        quality.record_issue(IssueKind::DuplicateWays, tile(2, 1), 5, 9);
        quality.record_issue(IssueKind::DuplicateWays, tile(2, 2), 9, 5);

        assert_eq!(quality.duplicate_way_count(), 1);
        let records = quality.duplicate_ways();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].way_id1, 5);
        assert_eq!(records[0].way_id2, 9);
        assert_eq!(records[0].overlap_count, 3);
    }

    #[test]
    fn test_sets_are_idempotent() {
        let mut quality = QualityAggregator::new();
        for _ in 0..5 {
            quality.record_intersected_tile(tile(1, 42));
            quality.record_issue(IssueKind::UnconnectedLinkEdge, tile(1, 42), 17, 0);
            quality.record_issue(IssueKind::IncompatibleLinkUse, tile(1, 42), 23, 0);
        }
        assert_eq!(quality.intersected_tile_count(), 1);
        assert_eq!(quality.unconnected_link_count(), 1);
        assert_eq!(quality.incompatible_link_use_count(), 1);
    }

    #[test]
    fn test_degree_histogram_clamps() {
        let mut quality = QualityAggregator::new();
        quality.record_node(200);
        quality.record_node(127);
        quality.record_node(3);

        assert_eq!(quality.node_count, 3);
        assert_eq!(quality.node_degrees[127], 2);
        assert_eq!(quality.node_degrees[3], 1);
    }

    #[test]
    fn test_duplicate_ways_sorted_by_overlap_desc() {
        let mut quality = QualityAggregator::new();
        for (pair, overlaps) in [((1u64, 2u64), 3u64), ((3, 4), 10), ((5, 6), 1)] {
            for _ in 0..overlaps {
                quality.record_issue(IssueKind::DuplicateWays, tile(0, 0), pair.0, pair.1);
            }
        }

        let counts: Vec<u64> = quality
            .duplicate_ways()
            .iter()
            .map(|d| d.overlap_count)
            .collect();
        assert_eq!(counts, vec![10, 3, 1]);
    }

    #[test]
    fn test_comparator_breaks_ties_by_id() {
        let a = DuplicateWay {
            way_id1: 8,
            way_id2: 9,
            overlap_count: 2,
        };
        let b = DuplicateWay {
            way_id1: 1,
            way_id2: 2,
            overlap_count: 2,
        };
        let mut records = vec![a, b];
        records.sort_by(by_overlap_desc);
        assert_eq!(records, vec![b, a]);
    }

    fn sample_a() -> QualityAggregator {
        let mut q = QualityAggregator::new();
        q.record_node(2);
        q.record_node(200);
        q.record_directed_edges(10);
        q.record_simple_restriction();
        q.record_issue(IssueKind::DuplicateWays, tile(2, 1), 1, 2);
        q.record_issue(IssueKind::UnconnectedLinkEdge, tile(2, 1), 31, 0);
        q.record_intersected_tile(tile(1, 7));
        q
    }

    fn sample_b() -> QualityAggregator {
        let mut q = QualityAggregator::new();
        q.record_node(4);
        q.record_directed_edges(6);
        q.record_timed_restriction();
        q.record_cul_de_sac();
        q.record_issue(IssueKind::DuplicateWays, tile(2, 2), 2, 1);
        q.record_issue(IssueKind::UnconnectedLinkEdge, tile(2, 2), 31, 0);
        q.record_issue(IssueKind::IncompatibleLinkUse, tile(2, 2), 57, 0);
        q
    }

    fn sample_c() -> QualityAggregator {
        let mut q = QualityAggregator::new();
        q.record_node(2);
        q.record_directed_edges(1);
        q.record_issue(IssueKind::DuplicateWays, tile(2, 3), 9, 5);
        q.record_intersected_tile(tile(1, 7));
        q.record_intersected_tile(tile(1, 8));
        q
    }

    #[test]
    fn test_merge_is_associative_and_commutative() {
        // merge(merge(A, B), C)
        let mut left = sample_a();
        left.merge(&sample_b());
        left.merge(&sample_c());

        // merge(A, merge(B, C))
        let mut bc = sample_b();
        bc.merge(&sample_c());
        let mut right = sample_a();
        right.merge(&bc);

        // merge(merge(B, A), C)
        let mut swapped = sample_b();
        swapped.merge(&sample_a());
        swapped.merge(&sample_c());

        assert_eq!(left, right);
        assert_eq!(left, swapped);
    }

    #[test]
    fn test_merge_two_workers_scenario() {
        let mut worker_a = QualityAggregator::new();
        for _ in 0..100 {
            worker_a.record_node(2);
        }
        worker_a.record_directed_edges(40);
        worker_a.record_issue(IssueKind::DuplicateWays, tile(2, 1), 1, 2);

        let mut worker_b = QualityAggregator::new();
        for _ in 0..50 {
            worker_b.record_node(2);
        }
        worker_b.record_directed_edges(20);
        worker_b.record_issue(IssueKind::DuplicateWays, tile(2, 2), 2, 1);

        let mut global = QualityAggregator::new();
        global.merge(&worker_a);
        global.merge(&worker_b);

        assert_eq!(global.node_count, 150);
        assert_eq!(global.directed_edge_count, 60);
        let records = global.duplicate_ways();
        assert_eq!(records.len(), 1);
        assert_eq!((records[0].way_id1, records[0].way_id2), (1, 2));
        assert_eq!(records[0].overlap_count, 2);
    }

    #[test]
    fn test_merge_saturates_instead_of_wrapping() {
        let mut a = QualityAggregator::new();
        a.node_count = u64::MAX - 1;
        let mut b = QualityAggregator::new();
        b.node_count = 5;

        a.merge(&b);
        assert_eq!(a.node_count, u64::MAX);
    }
}
