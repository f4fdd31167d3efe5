//! Quality event stream decoding.
//!
//! A build worker emits one NDJSON record per quality signal; this module
//! decodes those streams so they can be replayed into an aggregator:
//!
//! ```text
//! {"event":"node","degree":3}
//! {"event":"directed-edges","count":2}
//! {"event":"issue","kind":"duplicate-ways","tile":"2/1440","way_id1":5,"way_id2":9}
//! {"event":"intersected-tile","tile":"1/7"}
//! ```
//!
//! Blank lines are skipped. A malformed line is a typed error carrying the
//! line number so the pipeline can name the offending file and position.

use serde::{Deserialize, Serialize};
use std::io::BufRead;
use thiserror::Error;

use crate::quality::{IssueKind, QualityAggregator};
use crate::tile::TileId;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("read failed at line {line}")]
    Io {
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

/// One quality signal emitted by a build worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum QualityEvent {
    /// A node entered the graph with the given degree.
    Node { degree: u32 },
    /// Directed edges entered the graph.
    DirectedEdges { count: u64 },
    SimpleRestriction,
    TimedRestriction,
    CulDeSac,
    /// An anomaly was detected. `tile` and `way_id2` are optional since
    /// only duplicate-way issues carry a meaningful second way.
    Issue {
        kind: IssueKind,
        #[serde(default)]
        tile: TileId,
        way_id1: u64,
        #[serde(default)]
        way_id2: u64,
    },
    IntersectedTile { tile: TileId },
}

impl QualityEvent {
    /// Apply this event to an aggregator.
    pub fn apply(&self, quality: &mut QualityAggregator) {
        match *self {
            QualityEvent::Node { degree } => quality.record_node(degree),
            QualityEvent::DirectedEdges { count } => quality.record_directed_edges(count),
            QualityEvent::SimpleRestriction => quality.record_simple_restriction(),
            QualityEvent::TimedRestriction => quality.record_timed_restriction(),
            QualityEvent::CulDeSac => quality.record_cul_de_sac(),
            QualityEvent::Issue {
                kind,
                tile,
                way_id1,
                way_id2,
            } => quality.record_issue(kind, tile, way_id1, way_id2),
            QualityEvent::IntersectedTile { tile } => quality.record_intersected_tile(tile),
        }
    }
}

/// Streaming decoder over an NDJSON event log.
pub struct EventReader<R: BufRead> {
    reader: R,
    line: usize,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(reader: R) -> Self {
        EventReader { reader, line: 0 }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<QualityEvent, EventError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line += 1;
            let mut buf = String::new();
            match self.reader.read_line(&mut buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(source) => {
                    return Some(Err(EventError::Io {
                        line: self.line,
                        source,
                    }))
                }
            }

            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Some(serde_json::from_str(trimmed).map_err(|source| EventError::Malformed {
                line: self.line,
                source,
            }));
        }
    }
}

/// Decode a whole event log into memory. The pipeline streams instead; this
/// is for tests and small logs.
pub fn read_events<R: BufRead>(reader: R) -> Result<Vec<QualityEvent>, EventError> {
    EventReader::new(reader).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_event_stream() {
        let log = concat!(
            "{\"event\":\"node\",\"degree\":3}\n",
            "\n",
            "{\"event\":\"directed-edges\",\"count\":2}\n",
            "{\"event\":\"simple-restriction\"}\n",
            "{\"event\":\"issue\",\"kind\":\"duplicate-ways\",\"tile\":\"2/1440\",\"way_id1\":5,\"way_id2\":9}\n",
            "{\"event\":\"issue\",\"kind\":\"unconnected-link-edge\",\"way_id1\":17}\n",
            "{\"event\":\"intersected-tile\",\"tile\":\"1/7\"}\n",
        );

        let events = read_events(log.as_bytes()).unwrap();
        assert_eq!(events.len(), 6);
        assert_eq!(events[0], QualityEvent::Node { degree: 3 });
        assert_eq!(
            events[4],
            QualityEvent::Issue {
                kind: IssueKind::UnconnectedLinkEdge,
                tile: TileId::default(),
                way_id1: 17,
                way_id2: 0,
            }
        );
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let log = "{\"event\":\"node\",\"degree\":3}\nnot json\n";
        let err = read_events(log.as_bytes()).unwrap_err();
        match err {
            EventError::Malformed { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_events_round_trip_through_json() {
        let original = QualityEvent::Issue {
            kind: IssueKind::DuplicateWays,
            tile: TileId::new(2, 1440),
            way_id1: 9,
            way_id2: 5,
        };
        let encoded = serde_json::to_string(&original).unwrap();
        let decoded: QualityEvent = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_apply_replays_into_aggregator() {
        let log = concat!(
            "{\"event\":\"node\",\"degree\":3}\n",
            "{\"event\":\"node\",\"degree\":200}\n",
            "{\"event\":\"directed-edges\",\"count\":4}\n",
            "{\"event\":\"cul-de-sac\"}\n",
            "{\"event\":\"issue\",\"kind\":\"duplicate-ways\",\"way_id1\":9,\"way_id2\":5}\n",
        );

        let mut quality = QualityAggregator::new();
        for event in read_events(log.as_bytes()).unwrap() {
            event.apply(&mut quality);
        }

        assert_eq!(quality.node_count, 2);
        assert_eq!(quality.node_degrees[127], 1);
        assert_eq!(quality.directed_edge_count, 4);
        assert_eq!(quality.cul_de_sac_count, 1);
        let dups = quality.duplicate_ways();
        assert_eq!((dups[0].way_id1, dups[0].way_id2), (5, 9));
    }
}
