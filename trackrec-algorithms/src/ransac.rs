//! RANSAC consensus engine for straight tracks.
//!
//! Per event:
//! 1. **Hypothesize**: sample two hits, build the line through them
//! 2. **Score**: count hits closer than `distance_threshold`; hypotheses with
//!    more than `min_pattern_points` inliers are kept with quality
//!    `1 / inliers`
//! 3. **Rank**: sort kept hypotheses best-first (stable)
//! 4. **Extract**: for each hypothesis, pull the first maximal *contiguous*
//!    run of qualifying hits out of the remaining hit sequence into a new
//!    cluster and refit it
//! 5. **Remainder**: whatever was never extracted is noise
//!
//! Extraction is positional: qualifying hits that are not adjacent to the
//! run in the current ordering stay behind for later hypotheses (or end up
//! as noise). Upstream hit ordering therefore matters.
#![allow(clippy::missing_errors_doc, clippy::cast_precision_loss)]

use log::{debug, trace};
use rand::Rng;
use trackrec_core::{Cluster, FitMode, Hit, Line};

use crate::error::ExtractionError;
use crate::processing::Extraction;
use crate::sampler::{Sampler, SamplerConfig};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// RANSAC configuration.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RansacConfig {
    /// Number of hypotheses drawn per event.
    pub iterations: usize,
    /// Minimum number of hits for a pattern to count.
    pub min_pattern_points: usize,
    /// Inlier distance to the hypothesis line.
    pub distance_threshold: f64,
    /// Charge floor applied when refitting extracted clusters.
    pub charge_threshold: Option<f64>,
    /// Hypothesis sampler.
    pub sampler: SamplerConfig,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            min_pattern_points: 30,
            distance_threshold: 15.0,
            charge_threshold: None,
            sampler: SamplerConfig::default(),
        }
    }
}

impl RansacConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the iteration count.
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets the minimum pattern size.
    #[must_use]
    pub fn with_min_pattern_points(mut self, points: usize) -> Self {
        self.min_pattern_points = points;
        self
    }

    /// Sets the inlier distance.
    #[must_use]
    pub fn with_distance_threshold(mut self, distance: f64) -> Self {
        self.distance_threshold = distance;
        self
    }

    /// Sets the refit charge floor.
    #[must_use]
    pub fn with_charge_threshold(mut self, threshold: f64) -> Self {
        self.charge_threshold = Some(threshold);
        self
    }

    /// Sets the sampler configuration.
    #[must_use]
    pub fn with_sampler(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }
}

/// RANSAC track extraction.
#[derive(Clone, Debug, Default)]
pub struct RansacEngine {
    config: RansacConfig,
}

impl RansacEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(config: RansacConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &RansacConfig {
        &self.config
    }

    /// Runs the full hypothesize/score/rank/extract cycle on one event.
    pub fn run<R: Rng + ?Sized>(
        &self,
        hits: &[Hit],
        rng: &mut R,
    ) -> Result<Extraction, ExtractionError> {
        let min_points = self.config.min_pattern_points;
        if hits.len() < min_points.max(2) {
            return Err(ExtractionError::NotEnoughData {
                found: hits.len(),
                required: min_points.max(2),
            });
        }

        let candidates = self.hypothesize(hits, rng)?;
        debug!(
            "ransac: {} of {} hypotheses accepted over {} hits",
            candidates.len(),
            self.config.iterations,
            hits.len()
        );

        let extraction = self.extract(hits, &candidates);
        debug!(
            "ransac: {} clusters, {} noise hits",
            extraction.clusters.len(),
            extraction.noise.len()
        );
        Ok(extraction)
    }

    /// Draws and scores hypotheses, returning the accepted ones best-first.
    pub fn hypothesize<R: Rng + ?Sized>(
        &self,
        hits: &[Hit],
        rng: &mut R,
    ) -> Result<Vec<Line>, ExtractionError> {
        let population = Sampler::new(self.config.sampler.clone()).bind(hits);
        let mut candidates = Vec::new();

        for iteration in 0..self.config.iterations {
            let picks = population.sample(rng, 2)?;
            let mut line = Line::from_points(hits[picks[0]].pos, hits[picks[1]].pos);
            if line.direction().has_nan() {
                // Both picks share a position.
                continue;
            }

            let inliers = self.count_inliers(&line, hits);
            if inliers > self.config.min_pattern_points {
                line.set_quality(1.0 / inliers as f64);
                trace!("ransac: iteration {iteration} accepted with {inliers} inliers");
                candidates.push(line);
            }
        }

        candidates.sort_by(|a, b| a.quality().total_cmp(&b.quality()));
        Ok(candidates)
    }

    /// Number of hits closer than the inlier distance.
    #[must_use]
    pub fn count_inliers(&self, line: &Line, hits: &[Hit]) -> usize {
        hits.iter().filter(|h| self.is_inlier(line, h)).count()
    }

    #[inline]
    fn is_inlier(&self, line: &Line, hit: &Hit) -> bool {
        line.distance_to(&hit.pos) < self.config.distance_threshold
    }

    /// Walks the ranked hypotheses and carves clusters out of `hits`.
    #[must_use]
    pub fn extract(&self, hits: &[Hit], candidates: &[Line]) -> Extraction {
        let fit_mode = FitMode::Weighted {
            charge_threshold: self.config.charge_threshold,
        };
        let mut remaining: Vec<Hit> = hits.to_vec();
        let mut clusters: Vec<Cluster> = Vec::new();

        for candidate in candidates {
            if remaining.len() < self.config.min_pattern_points {
                break;
            }
            let Some((start, end)) = self.contiguous_run(candidate, &remaining) else {
                continue;
            };
            if end - start < 2 {
                continue;
            }

            let run: Vec<Hit> = remaining.drain(start..end).collect();
            let mut cluster = Cluster::new(clusters.len());
            cluster.hits = run;
            cluster.fit_mode = fit_mode;
            // The hypothesis line is never kept: a failed refit leaves the
            // cluster unfitted.
            let _ = cluster.refit();
            trace!(
                "ransac: cluster {} takes hits [{start}, {end}) of the remaining sequence",
                cluster.id
            );
            clusters.push(cluster);
        }

        Extraction {
            clusters,
            noise: remaining,
        }
    }

    /// First maximal run `[start, end)` of consecutive inliers.
    fn contiguous_run(&self, line: &Line, hits: &[Hit]) -> Option<(usize, usize)> {
        let start = hits.iter().position(|h| self.is_inlier(line, h))?;
        let end = hits[start..]
            .iter()
            .position(|h| !self.is_inlier(line, h))
            .map_or(hits.len(), |k| start + k);
        Some((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use trackrec_core::Point3;

    #[test]
    fn test_not_enough_data() {
        let hits = vec![Hit::at(0.0, 0.0, 0.0, 1.0); 5];
        let engine = RansacEngine::new(RansacConfig::default().with_min_pattern_points(10));
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            engine.run(&hits, &mut rng).unwrap_err(),
            ExtractionError::NotEnoughData {
                found: 5,
                required: 10
            }
        );
    }

    #[test]
    fn test_contiguous_run_stops_at_first_outlier() {
        let mut hits: Vec<Hit> = (0..5).map(|i| Hit::at(f64::from(i), 0.0, 0.0, 1.0)).collect();
        hits.push(Hit::at(2.0, 50.0, 0.0, 1.0));
        hits.extend((5..8).map(|i| Hit::at(f64::from(i), 0.0, 0.0, 1.0)));

        let engine = RansacEngine::new(RansacConfig::default().with_distance_threshold(1.0));
        let line = Line::from_points(Point3::zero(), Point3::new(1.0, 0.0, 0.0));
        assert_eq!(engine.contiguous_run(&line, &hits), Some((0, 5)));
        assert_eq!(engine.contiguous_run(&line, &hits[5..]), Some((1, 4)));
        assert_eq!(engine.count_inliers(&line, &hits), 8);
    }

    #[test]
    fn test_hypotheses_ranked_best_first() {
        let mut hits: Vec<Hit> = (0..40).map(|i| Hit::at(f64::from(i), 0.0, 0.0, 1.0)).collect();
        hits.extend((0..15).map(|i| Hit::at(f64::from(i), 100.0, 0.0, 1.0)));
        let engine = RansacEngine::new(
            RansacConfig::default()
                .with_iterations(300)
                .with_min_pattern_points(10)
                .with_distance_threshold(1.0),
        );
        let mut rng = StdRng::seed_from_u64(42);
        let candidates = engine.hypothesize(&hits, &mut rng).unwrap();
        assert!(!candidates.is_empty());
        for pair in candidates.windows(2) {
            assert!(pair[0].quality() <= pair[1].quality());
        }
        assert!((candidates[0].quality() - 1.0 / 40.0).abs() < 1e-12);
    }
}
