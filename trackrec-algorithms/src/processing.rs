//! High-level helpers that pick an extraction algorithm and run it.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use trackrec_core::{Cluster, Hit, TrackEvent};

use crate::error::Result;
use crate::{DbscanClustering, DbscanConfig, RansacConfig, RansacEngine};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Output of an extraction pass: clusters plus unassigned hits.
#[derive(Clone, Debug, Default)]
pub struct Extraction {
    /// Extracted clusters, ids 0..N-1.
    pub clusters: Vec<Cluster>,
    /// Hits not assigned to any cluster.
    pub noise: Vec<Hit>,
}

impl Extraction {
    /// Hands the result over to an event collection.
    #[must_use]
    pub fn into_event(self) -> TrackEvent {
        TrackEvent::new(self.clusters, self.noise)
    }
}

/// Initial extraction algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ExtractionAlgorithm {
    /// Random sample consensus.
    #[default]
    Ransac,
    /// Density-based clustering.
    Dbscan,
}

/// Parameters for [`extract_tracks`].
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExtractionParams {
    /// Which algorithm runs.
    pub algorithm: ExtractionAlgorithm,
    /// RANSAC settings.
    pub ransac: RansacConfig,
    /// DBSCAN settings.
    pub dbscan: DbscanConfig,
}

impl ExtractionParams {
    /// Selects the algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: ExtractionAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Replaces the RANSAC settings.
    #[must_use]
    pub fn with_ransac(mut self, ransac: RansacConfig) -> Self {
        self.ransac = ransac;
        self
    }

    /// Replaces the DBSCAN settings.
    #[must_use]
    pub fn with_dbscan(mut self, dbscan: DbscanConfig) -> Self {
        self.dbscan = dbscan;
        self
    }
}

/// Extracts the initial clusters of one event.
///
/// # Errors
/// RANSAC refuses events with fewer hits than its minimum pattern size.
pub fn extract_tracks<R: Rng + ?Sized>(
    hits: &[Hit],
    params: &ExtractionParams,
    rng: &mut R,
) -> Result<Extraction> {
    match params.algorithm {
        ExtractionAlgorithm::Ransac => RansacEngine::new(params.ransac.clone()).run(hits, rng),
        ExtractionAlgorithm::Dbscan => {
            let algo = DbscanClustering::new(params.dbscan.clone());
            let mut state = algo.create_state();
            Ok(algo.cluster(hits, &mut state))
        }
    }
}

/// Extracts many events in parallel.
///
/// Each event gets its own engine, sampler binding and RNG seeded with
/// `seed + index`, so results do not depend on thread scheduling.
#[must_use]
pub fn extract_events(
    events: &[Vec<Hit>],
    params: &ExtractionParams,
    seed: u64,
) -> Vec<Result<Extraction>> {
    debug!("extracting {} events with {:?}", events.len(), params.algorithm);
    events
        .par_iter()
        .enumerate()
        .map(|(idx, hits)| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(idx as u64));
            extract_tracks(hits, params, &mut rng)
        })
        .collect()
}
