//! DBSCAN clustering on hit positions.
//!
//! Neighbourhoods are closed balls of radius `epsilon` in plain Euclidean
//! distance and include the query point itself. Charge plays no role.
//! Complexity is O(n²) in the number of hits.
#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

use log::{debug, trace};
use trackrec_core::{Cluster, FitMode, Hit};

use crate::processing::Extraction;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// DBSCAN configuration.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DbscanConfig {
    /// Neighbourhood radius.
    pub epsilon: f64,
    /// Minimum neighbourhood size (self included) for a core point.
    pub min_points: usize,
    /// Groups smaller than this are returned as noise.
    pub min_cluster_size: usize,
}

impl Default for DbscanConfig {
    fn default() -> Self {
        Self {
            epsilon: 5.0,
            min_points: 2,
            min_cluster_size: 1,
        }
    }
}

impl DbscanConfig {
    /// Sets the neighbourhood radius.
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Sets the core-point neighbourhood size.
    #[must_use]
    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    /// Sets the smallest group kept as a cluster.
    #[must_use]
    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }
}

/// Per-hit classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointLabel {
    /// Not visited yet.
    Unclassified,
    /// Not density-reachable from any core point (so far).
    Noise,
    /// Member of the cluster with this id (ids start at 1).
    Cluster(u32),
}

/// Outcome of trying to grow a cluster from one point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Expansion {
    Success,
    Failure,
}

/// Reusable buffers.
#[derive(Debug, Default)]
pub struct DbscanState {
    labels: Vec<PointLabel>,
    neighbors: Vec<usize>,
    seeds: Vec<usize>,
}

impl DbscanState {
    /// Labels from the last call to [`DbscanClustering::classify`].
    pub fn labels(&self) -> &[PointLabel] {
        &self.labels
    }
}

/// DBSCAN clustering.
#[derive(Clone, Debug, Default)]
pub struct DbscanClustering {
    config: DbscanConfig,
}

impl DbscanClustering {
    /// Creates the algorithm.
    pub fn new(config: DbscanConfig) -> Self {
        Self { config }
    }

    /// Fresh buffers for this algorithm.
    pub fn create_state(&self) -> DbscanState {
        DbscanState::default()
    }

    /// Current configuration.
    pub fn config(&self) -> &DbscanConfig {
        &self.config
    }

    /// Labels every hit, returning the number of clusters found.
    ///
    /// Cluster sizes are not filtered here; see [`DbscanClustering::cluster`].
    pub fn classify(&self, hits: &[Hit], state: &mut DbscanState) -> u32 {
        let DbscanState {
            labels,
            neighbors,
            seeds,
        } = state;
        labels.clear();
        labels.resize(hits.len(), PointLabel::Unclassified);

        let mut cluster_id = 1;
        for point in 0..hits.len() {
            if labels[point] != PointLabel::Unclassified {
                continue;
            }
            if self.expand_cluster(hits, point, cluster_id, labels, seeds, neighbors)
                == Expansion::Success
            {
                cluster_id += 1;
            }
        }
        cluster_id - 1
    }

    /// Clusters the hits and fits one line per cluster (unweighted).
    pub fn cluster(&self, hits: &[Hit], state: &mut DbscanState) -> Extraction {
        let found = self.classify(hits, state);

        let mut groups: Vec<Vec<Hit>> = vec![Vec::new(); found as usize];
        let mut noise = Vec::new();
        for (hit, label) in hits.iter().zip(&state.labels) {
            match label {
                PointLabel::Cluster(id) => groups[(*id - 1) as usize].push(*hit),
                _ => noise.push(*hit),
            }
        }

        let mut clusters = Vec::with_capacity(groups.len());
        let mut next_label = 1;
        let mut relabel = vec![PointLabel::Noise; groups.len()];
        for (old, group) in groups.into_iter().enumerate() {
            if group.len() < self.config.min_cluster_size {
                trace!("dbscan: dropping group {} with {} hits", old + 1, group.len());
                noise.extend(group);
                continue;
            }
            relabel[old] = PointLabel::Cluster(next_label);
            next_label += 1;
            clusters.push(Cluster::from_hits(clusters.len(), group, FitMode::Unweighted));
        }
        for label in &mut state.labels {
            if let PointLabel::Cluster(id) = *label {
                *label = relabel[(id - 1) as usize];
            }
        }

        debug!(
            "dbscan: {} clusters, {} noise hits (eps = {}, min_points = {})",
            clusters.len(),
            noise.len(),
            self.config.epsilon,
            self.config.min_points
        );
        Extraction { clusters, noise }
    }

    fn expand_cluster(
        &self,
        hits: &[Hit],
        point: usize,
        cluster_id: u32,
        labels: &mut [PointLabel],
        seeds: &mut Vec<usize>,
        neighbors: &mut Vec<usize>,
    ) -> Expansion {
        self.region_query_into(hits, point, seeds);
        if seeds.len() < self.config.min_points {
            labels[point] = PointLabel::Noise;
            return Expansion::Failure;
        }

        for &seed in seeds.iter() {
            labels[seed] = PointLabel::Cluster(cluster_id);
        }
        seeds.retain(|&s| s != point);

        let mut i = 0;
        while i < seeds.len() {
            let current = seeds[i];
            i += 1;

            self.region_query_into(hits, current, neighbors);
            if neighbors.len() < self.config.min_points {
                continue;
            }
            for &n in neighbors.iter() {
                match labels[n] {
                    PointLabel::Unclassified => {
                        seeds.push(n);
                        labels[n] = PointLabel::Cluster(cluster_id);
                    }
                    PointLabel::Noise => labels[n] = PointLabel::Cluster(cluster_id),
                    PointLabel::Cluster(_) => {}
                }
            }
        }
        Expansion::Success
    }

    /// All hits within `epsilon` of `idx`, `idx` included.
    fn region_query_into(&self, hits: &[Hit], idx: usize, out: &mut Vec<usize>) {
        let eps_sq = self.config.epsilon * self.config.epsilon;
        let center = hits[idx].pos;
        out.clear();
        out.extend(
            hits.iter()
                .enumerate()
                .filter(|(_, h)| h.pos.distance_squared(&center) <= eps_sq)
                .map(|(j, _)| j),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_border_point_reclaimed_from_noise() {
        let hits: Vec<Hit> = (0..4).map(|i| Hit::at(f64::from(i), 0.0, 0.0, 1.0)).collect();
        let algo = DbscanClustering::new(DbscanConfig {
            epsilon: 1.0,
            min_points: 3,
            min_cluster_size: 1,
        });
        let mut state = algo.create_state();
        assert_eq!(algo.classify(&hits, &mut state), 1);
        assert!(state.labels().iter().all(|l| *l == PointLabel::Cluster(1)));
    }

    #[test]
    fn test_radius_is_inclusive() {
        let hits = vec![Hit::at(0.0, 0.0, 0.0, 1.0), Hit::at(0.0, 0.0, 2.0, 1.0)];
        let algo = DbscanClustering::new(DbscanConfig {
            epsilon: 2.0,
            min_points: 2,
            min_cluster_size: 1,
        });
        let mut state = algo.create_state();
        assert_eq!(algo.classify(&hits, &mut state), 1);

        let tight = DbscanClustering::new(DbscanConfig {
            epsilon: 1.999,
            ..algo.config().clone()
        });
        assert_eq!(tight.classify(&hits, &mut state), 0);
        assert_eq!(state.labels(), &[PointLabel::Noise, PointLabel::Noise]);
    }

    #[test]
    fn test_isolated_points_are_noise() {
        let hits: Vec<Hit> = (0..5).map(|i| Hit::at(100.0 * f64::from(i), 0.0, 0.0, 1.0)).collect();
        let algo = DbscanClustering::default();
        let mut state = algo.create_state();
        let extraction = algo.cluster(&hits, &mut state);
        assert!(extraction.clusters.is_empty());
        assert_eq!(extraction.noise.len(), 5);
    }
}
