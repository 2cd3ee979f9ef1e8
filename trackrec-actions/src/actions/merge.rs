//! Merges cluster pairs that describe the same straight track.

use log::debug;
use trackrec_core::{Cluster, TrackEvent};

use crate::action::{Action, ActionContext};
use crate::error::Result;
use crate::options::ActionOptions;

/// Merges fitted clusters of the same region whose lines are parallel
/// within `max_angle_deg` and pass within `max_distance` of each other's
/// centroid. The larger cluster absorbs the smaller one; pairs are merged
/// until none qualifies.
#[derive(Debug, Clone)]
pub struct MergeSimilar {
    max_angle_deg: f64,
    max_distance: f64,
}

impl MergeSimilar {
    /// Registry name.
    pub const NAME: &'static str = "merge";

    fn similar(&self, a: &Cluster, b: &Cluster) -> bool {
        if a.region != b.region || !a.line.is_fitted() || !b.line.is_fitted() {
            return false;
        }
        let (Some(ca), Some(cb)) = (a.centroid(), b.centroid()) else {
            return false;
        };
        let cos = a.line.direction().unit().dot(&b.line.direction().unit()).abs();
        cos >= self.max_angle_deg.to_radians().cos()
            && a.line.distance_to(&cb) <= self.max_distance
            && b.line.distance_to(&ca) <= self.max_distance
    }

    fn find_pair(&self, clusters: &[Cluster]) -> Option<(usize, usize)> {
        for (i, a) in clusters.iter().enumerate() {
            for (j, b) in clusters.iter().enumerate().skip(i + 1) {
                if self.similar(a, b) {
                    return Some((i, j));
                }
            }
        }
        None
    }
}

impl Default for MergeSimilar {
    fn default() -> Self {
        Self {
            max_angle_deg: 5.0,
            max_distance: 5.0,
        }
    }
}

impl Action for MergeSimilar {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, options: &ActionOptions, _ctx: &ActionContext<'_>) -> Result<()> {
        let mut reader = options.reader(Self::NAME);
        self.max_angle_deg = reader.f64_or("max_angle_deg", self.max_angle_deg)?;
        self.max_distance = reader.f64_or("max_distance", self.max_distance)?;
        reader.finish();
        Ok(())
    }

    fn run(&mut self, event: &mut TrackEvent) -> Result<()> {
        while let Some((i, j)) = self.find_pair(&event.clusters) {
            let (keep, gone) = if event.clusters[j].len() > event.clusters[i].len() {
                (j, i)
            } else {
                (i, j)
            };
            let absorbed = event.clusters.remove(gone);
            let keep = if gone < keep { keep - 1 } else { keep };
            debug!(
                "{}: cluster {} absorbs cluster {} ({} hits)",
                Self::NAME,
                event.clusters[keep].id,
                absorbed.id,
                absorbed.len()
            );
            let target = &mut event.clusters[keep];
            target.beam_like |= absorbed.beam_like;
            target.absorb(absorbed);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "{}: merge clusters within {} deg and {} distance",
            Self::NAME,
            self.max_angle_deg,
            self.max_distance
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use trackrec_core::{FitMode, Hit, RegionType};

    fn segment(x0: u32, n: u32, y: f64) -> Cluster {
        let hits = (x0..x0 + n).map(|i| Hit::at(f64::from(i), y, 0.0, 1.0)).collect();
        Cluster::from_hits(0, hits, FitMode::Unweighted)
    }

    fn run(event: &mut TrackEvent) {
        let regions = BTreeMap::new();
        let mut action = MergeSimilar::default();
        action
            .configure(&ActionOptions::new(), &ActionContext::new(&regions, &[]))
            .unwrap();
        action.run(event).unwrap();
    }

    #[test]
    fn test_merges_collinear_segments() {
        let mut event = TrackEvent::new(
            vec![segment(0, 5, 0.0), segment(20, 10, 0.0), segment(0, 10, 50.0)],
            Vec::new(),
        );
        run(&mut event);

        assert_eq!(event.len(), 2);
        assert_eq!(event.clusters[0].len(), 15);
        assert_eq!(event.clusters[1].len(), 10);
        assert!(event.clusters[0].line.quality() < 1e-9);
    }

    #[test]
    fn test_regions_must_match() {
        let mut other = segment(20, 10, 0.0);
        other.region = RegionType::Beam;
        let mut event = TrackEvent::new(vec![segment(0, 5, 0.0), other], Vec::new());
        run(&mut event);
        assert_eq!(event.len(), 2);
    }

    #[test]
    fn test_crossing_tracks_kept_apart() {
        let vertical: Vec<Hit> = (0..10).map(|i| Hit::at(5.0, f64::from(i), 0.0, 1.0)).collect();
        let mut event = TrackEvent::new(
            vec![segment(0, 10, 0.0), Cluster::from_hits(0, vertical, FitMode::Unweighted)],
            Vec::new(),
        );
        run(&mut event);
        assert_eq!(event.len(), 2);
    }
}
