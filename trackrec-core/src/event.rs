//! Per-event cluster collection.

use crate::cluster::Cluster;
use crate::geometry::Point3;
use crate::hit::Hit;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Clusters of one event, the reaction points found so far and the hits
/// that extraction left unassigned.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackEvent {
    /// Ordered cluster collection.
    pub clusters: Vec<Cluster>,
    /// Reaction points (beam to reaction-product boundaries).
    #[cfg_attr(feature = "serde", serde(default))]
    pub reaction_points: Vec<Point3>,
    /// Hits no extraction pass assigned to a cluster.
    #[cfg_attr(feature = "serde", serde(default))]
    pub noise: Vec<Hit>,
}

impl TrackEvent {
    /// Builds an event from extracted clusters and noise.
    #[must_use]
    pub fn new(clusters: Vec<Cluster>, noise: Vec<Hit>) -> Self {
        let mut event = Self {
            clusters,
            reaction_points: Vec::new(),
            noise,
        };
        event.reset_ids();
        event
    }

    /// Re-densifies cluster ids to 0..N-1 in container order.
    pub fn reset_ids(&mut self) {
        for (idx, cluster) in self.clusters.iter_mut().enumerate() {
            cluster.id = idx;
        }
    }

    /// Removes every cluster flagged `to_delete`, returning how many went.
    pub fn purge_deleted(&mut self) -> usize {
        let before = self.clusters.len();
        self.clusters.retain(|c| !c.to_delete);
        before - self.clusters.len()
    }

    /// Number of clusters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// True if there are no clusters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Total number of hits held by clusters.
    #[must_use]
    pub fn clustered_hits(&self) -> usize {
        self.clusters.iter().map(Cluster::len).sum()
    }
}
