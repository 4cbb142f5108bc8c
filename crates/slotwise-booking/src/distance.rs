//! Symmetric distance graph over location keys.
//!
//! Each undirected edge is stored twice, once in the sorted set of each
//! endpoint, scored by distance in metres. A radius query is then a single
//! score-range read from the origin's set.

use slotwise_store::{Database, OptionalExt};
use slotwise_types::{edge_score, radius_score, DistanceEdge, DistanceKind};

use crate::error::BookingResult;

pub const DISTANCES_TABLE: &str = "distances";

/// A location reachable from the query origin.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor {
    pub key: String,
    /// Distance in metres.
    pub distance: i64,
}

impl Neighbor {
    pub fn distance_km(&self) -> f64 {
        self.distance as f64 / 1000.0
    }
}

pub struct DistanceIndex<'a> {
    db: &'a dyn Database,
}

impl<'a> DistanceIndex<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }

    /// Insert (or re-weight) edges in both directions; returns how many
    /// edges were written.
    pub fn add_edges(&self, kind: DistanceKind, edges: &[DistanceEdge]) -> BookingResult<usize> {
        for edge in edges {
            let score = edge_score(edge.distance);
            self.db
                .sorted_set(DISTANCES_TABLE, &origin_key(kind, &edge.from))
                .add(edge.to.as_bytes(), score)?;
            self.db
                .sorted_set(DISTANCES_TABLE, &origin_key(kind, &edge.to))
                .add(edge.from.as_bytes(), score)?;
        }
        tracing::info!(%kind, edges = edges.len(), "distance edges uploaded");
        Ok(edges.len())
    }

    /// Distance in metres between two keys, if an edge exists.
    pub fn distance(&self, kind: DistanceKind, from: &str, to: &str) -> BookingResult<Option<i64>> {
        if from == to {
            return Ok(Some(0));
        }
        Ok(self
            .db
            .sorted_set(DISTANCES_TABLE, &origin_key(kind, from))
            .score(to.as_bytes())
            .optional()?)
    }

    /// `origin` itself plus every key within `radius_km` of it, nearest
    /// first. The radius bound is inclusive; an edge even a fraction of a
    /// metre past it is excluded.
    pub fn neighbors(
        &self,
        kind: DistanceKind,
        origin: &str,
        radius_km: f64,
    ) -> BookingResult<Vec<Neighbor>> {
        let mut neighbors = vec![Neighbor {
            key: origin.to_string(),
            distance: 0,
        }];
        let entries = self
            .db
            .sorted_set(DISTANCES_TABLE, &origin_key(kind, origin))
            .range_by_score(0, radius_score(radius_km))?;
        for entry in entries {
            let key = String::from_utf8_lossy(&entry.member).into_owned();
            if key != origin {
                neighbors.push(Neighbor {
                    key,
                    distance: entry.score,
                });
            }
        }
        Ok(neighbors)
    }
}

fn origin_key(kind: DistanceKind, origin: &str) -> Vec<u8> {
    format!("{kind}:{origin}").into_bytes()
}
