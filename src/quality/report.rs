//! Rendering of the statistics and issue reports.
//!
//! The renderers are pure (they return the report lines) so tests can check
//! content without capturing a log sink; `log_statistics`/`log_issues` feed
//! the lines through `tracing` for the normal end-of-run path.

use serde_json::{json, Value};
use tracing::{info, warn};

use super::QualityAggregator;

impl QualityAggregator {
    /// Render the volumetric summary: scalar counters plus the non-empty
    /// degree histogram buckets.
    pub fn statistics_lines(&self) -> Vec<String> {
        let mut lines = vec![
            "Graph statistics:".to_string(),
            format!("  nodes:               {}", self.node_count),
            format!("  directed edges:      {}", self.directed_edge_count),
            format!("  simple restrictions: {}", self.simple_restriction_count),
            format!("  timed restrictions:  {}", self.timed_restriction_count),
            format!("  cul-de-sacs:         {}", self.cul_de_sac_count),
            "Node degree distribution:".to_string(),
        ];

        for (degree, &count) in self.node_degrees.iter().enumerate() {
            if count == 0 {
                continue;
            }
            if degree == self.node_degrees.len() - 1 {
                lines.push(format!("  degree {degree}+: {count} nodes"));
            } else {
                lines.push(format!("  degree {degree}: {count} nodes"));
            }
        }
        lines
    }

    /// Render the issue report. `top` bounds the duplicate-way records and
    /// the sampled way ids per link issue; 0 means no bound.
    pub fn issue_lines(&self, top: usize) -> Vec<String> {
        let bound = if top == 0 { usize::MAX } else { top };
        let mut lines = Vec::new();

        let duplicates = self.duplicate_ways();
        if duplicates.len() > bound {
            lines.push(format!(
                "Duplicate ways: {} pairs (showing top {})",
                duplicates.len(),
                bound
            ));
        } else {
            lines.push(format!("Duplicate ways: {} pairs", duplicates.len()));
        }
        for (i, dup) in duplicates.iter().take(bound).enumerate() {
            lines.push(format!(
                "  {}. ways {} and {} overlap on {} edges",
                i + 1,
                dup.way_id1,
                dup.way_id2,
                dup.overlap_count
            ));
        }

        lines.push(format!(
            "Unconnected link edges: {} ways",
            self.unconnected_links.len()
        ));
        if let Some(sample) = sample_ids(&self.unconnected_links, bound) {
            lines.push(sample);
        }

        lines.push(format!(
            "Incompatible link use: {} ways",
            self.incompatible_link_use.len()
        ));
        if let Some(sample) = sample_ids(&self.incompatible_link_use, bound) {
            lines.push(sample);
        }

        lines.push(format!(
            "Tiles intersected without an end node: {}",
            self.intersected_tiles.len()
        ));
        lines
    }

    /// Emit the statistics report through the log sink.
    pub fn log_statistics(&self) {
        for line in self.statistics_lines() {
            info!("{line}");
        }
    }

    /// Emit the issue report through the log sink. Issues are warnings; a
    /// clean run logs a single info line instead.
    pub fn log_issues(&self, top: usize) {
        if !self.has_issues() {
            info!("No data quality issues recorded");
            return;
        }
        for line in self.issue_lines(top) {
            warn!("{line}");
        }
    }

    /// Machine-readable summary of everything the text reports carry,
    /// without truncation.
    pub fn summary_json(&self) -> Value {
        let mut unconnected: Vec<u64> = self.unconnected_links.iter().copied().collect();
        unconnected.sort_unstable();
        let mut incompatible: Vec<u64> = self.incompatible_link_use.iter().copied().collect();
        incompatible.sort_unstable();
        let mut tiles: Vec<_> = self.intersected_tiles.iter().copied().collect();
        tiles.sort_unstable();
        let tiles: Vec<String> = tiles.iter().map(|t| t.to_string()).collect();

        json!({
            "nodes": self.node_count,
            "directed_edges": self.directed_edge_count,
            "simple_restrictions": self.simple_restriction_count,
            "timed_restrictions": self.timed_restriction_count,
            "cul_de_sacs": self.cul_de_sac_count,
            "node_degrees": self.node_degrees.to_vec(),
            "issues": {
                "duplicate_ways": self.duplicate_ways(),
                "unconnected_links": unconnected,
                "incompatible_link_use": incompatible,
                "intersected_tiles": tiles,
            },
        })
    }
}

/// Sorted, bounded id sample as a single report line.
fn sample_ids(ids: &rustc_hash::FxHashSet<u64>, bound: usize) -> Option<String> {
    if ids.is_empty() {
        return None;
    }
    let mut sorted: Vec<u64> = ids.iter().copied().collect();
    sorted.sort_unstable();

    let shown: Vec<String> = sorted.iter().take(bound).map(|id| id.to_string()).collect();
    let suffix = if sorted.len() > bound { ", ..." } else { "" };
    Some(format!("  way ids: {}{}", shown.join(", "), suffix))
}
