//! Splits clusters whose fit is poor by peeling off far-away hits.

use log::debug;
use trackrec_core::{Cluster, TrackEvent};

use crate::action::{Action, ActionContext};
use crate::error::Result;
use crate::options::ActionOptions;

/// Repeatedly strips hits farther than `max_distance` from the line of a
/// cluster whose quality exceeds `max_quality`.
///
/// Stripped hits form a new cluster when there are at least `min_hits` of
/// them, otherwise they become noise. New clusters keep the parent's region
/// and are examined in turn.
#[derive(Debug, Clone)]
pub struct BreakChi2 {
    max_quality: f64,
    max_distance: f64,
    min_hits: usize,
}

impl BreakChi2 {
    /// Registry name.
    pub const NAME: &'static str = "break-chi2";
}

impl Default for BreakChi2 {
    fn default() -> Self {
        Self {
            max_quality: 4.0,
            max_distance: 6.0,
            min_hits: 3,
        }
    }
}

impl Action for BreakChi2 {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, options: &ActionOptions, _ctx: &ActionContext<'_>) -> Result<()> {
        let mut reader = options.reader(Self::NAME);
        self.max_quality = reader.f64_or("max_quality", self.max_quality)?;
        self.max_distance = reader.f64_or("max_distance", self.max_distance)?;
        self.min_hits = reader.usize_or("min_hits", self.min_hits)?.max(2);
        reader.finish();
        Ok(())
    }

    fn run(&mut self, event: &mut TrackEvent) -> Result<()> {
        let mut idx = 0;
        while idx < event.clusters.len() {
            loop {
                let cluster = &event.clusters[idx];
                if !cluster.line.is_fitted() || cluster.line.quality() <= self.max_quality {
                    break;
                }
                let line = cluster.line;
                let outliers = cluster
                    .iter()
                    .filter(|h| line.distance_to(&h.pos) > self.max_distance)
                    .count();
                if outliers == 0 || cluster.len() - outliers < self.min_hits {
                    break;
                }

                let cluster = &mut event.clusters[idx];
                let (fit_mode, region) = (cluster.fit_mode, cluster.region);
                let removed =
                    cluster.retain_hits(|h| line.distance_to(&h.pos) <= self.max_distance);
                debug!(
                    "{}: cluster {} shed {} hits (quality was {:.3})",
                    Self::NAME,
                    cluster.id,
                    removed.len(),
                    line.quality()
                );
                if removed.len() >= self.min_hits {
                    let mut split = Cluster::from_hits(event.clusters.len(), removed, fit_mode);
                    split.region = region;
                    event.clusters.push(split);
                } else {
                    event.noise.extend(removed);
                }
            }
            idx += 1;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "{}: split clusters with quality > {} at distance {} (min {} hits)",
            Self::NAME,
            self.max_quality,
            self.max_distance,
            self.min_hits
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use trackrec_core::{FitMode, Hit};

    fn run(options: ActionOptions, event: &mut TrackEvent) {
        let regions = BTreeMap::new();
        let mut action = BreakChi2::default();
        action
            .configure(&options, &ActionContext::new(&regions, &[]))
            .unwrap();
        action.run(event).unwrap();
    }

    #[test]
    fn test_splits_two_parallel_tracks() {
        // 40 hits on y = 0 and 10 on y = 30, fitted as one cluster.
        let mut hits: Vec<Hit> = (0..40)
            .map(|i| Hit::at(f64::from(i) * 2.0, 0.0, 0.0, 1.0))
            .collect();
        hits.extend((0..10).map(|i| Hit::at(f64::from(i) * 8.0, 30.0, 0.0, 1.0)));
        let mut event = TrackEvent::new(
            vec![Cluster::from_hits(0, hits, FitMode::Unweighted)],
            Vec::new(),
        );

        run(ActionOptions::new().with("max_distance", 15.0), &mut event);

        assert_eq!(event.len(), 2);
        assert_eq!(event.clusters[0].len(), 40);
        assert_eq!(event.clusters[1].len(), 10);
        assert!(event.clusters[0].line.quality() < 1e-9);
        assert!(event.clusters[1].hits.iter().all(|h| (h.pos.y - 30.0).abs() < 1e-12));
        assert!(event.noise.is_empty());
    }

    #[test]
    fn test_few_outliers_become_noise() {
        let mut hits: Vec<Hit> = (0..20)
            .map(|i| Hit::at(f64::from(i) * 3.0, 0.0, 0.0, 1.0))
            .collect();
        hits.push(Hit::at(30.0, 40.0, 0.0, 1.0));
        let mut event = TrackEvent::new(
            vec![Cluster::from_hits(0, hits, FitMode::Unweighted)],
            Vec::new(),
        );

        run(ActionOptions::new().with("max_distance", 15.0), &mut event);

        assert_eq!(event.len(), 1);
        assert_eq!(event.clusters[0].len(), 20);
        assert_eq!(event.noise.len(), 1);
    }

    #[test]
    fn test_good_fit_untouched() {
        let hits: Vec<Hit> = (0..20).map(|i| Hit::at(f64::from(i), 0.0, 0.0, 1.0)).collect();
        let before = TrackEvent::new(
            vec![Cluster::from_hits(0, hits, FitMode::Unweighted)],
            Vec::new(),
        );
        let mut event = before.clone();
        run(ActionOptions::new(), &mut event);
        assert_eq!(event, before);
    }
}
