use std::fmt;

use serde::{Deserialize, Serialize};

/// Which location keys a distance graph is built over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DistanceKind {
    #[default]
    ZipCode,
    ZipArea,
}

impl DistanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ZipCode => "zipCode",
            Self::ZipArea => "zipArea",
        }
    }
}

impl fmt::Display for DistanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Undirected weighted edge between two location keys, distance in km.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistanceEdge {
    pub from: String,
    pub to: String,
    pub distance: f64,
}

impl DistanceEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, distance: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            distance,
        }
    }
}

/// Float noise tolerated when converting kilometres to whole metres.
const METRE_EPSILON: f64 = 1e-6;

/// Sorted-set score of an edge, in metres. Rounded up, so an edge is never
/// stored nearer than it is.
pub fn edge_score(km: f64) -> i64 {
    (km * 1000.0 - METRE_EPSILON).ceil() as i64
}

/// Largest edge score a search radius covers, in metres. Rounded down, so
/// a radius never reaches past itself.
pub fn radius_score(km: f64) -> i64 {
    (km * 1000.0 + METRE_EPSILON).floor() as i64
}
