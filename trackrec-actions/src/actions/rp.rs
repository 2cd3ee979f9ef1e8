//! Reaction point search between the beam and the other tracks.

use log::debug;
use trackrec_core::TrackEvent;

use crate::action::{Action, ActionContext};
use crate::error::Result;
use crate::options::ActionOptions;

/// Stores the closest approach between the beam track and every other
/// fitted cluster as a reaction point when the lines pass within
/// `max_distance`.
///
/// The reaction point list and the `has_rp` / `recoil` flags are rebuilt
/// from scratch on every run.
#[derive(Debug, Clone)]
pub struct FindRp {
    max_distance: f64,
}

impl FindRp {
    /// Registry name.
    pub const NAME: &'static str = "find-rp";
}

impl Default for FindRp {
    fn default() -> Self {
        Self { max_distance: 10.0 }
    }
}

impl Action for FindRp {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, options: &ActionOptions, _ctx: &ActionContext<'_>) -> Result<()> {
        let mut reader = options.reader(Self::NAME);
        self.max_distance = reader.f64_or("max_distance", self.max_distance)?;
        reader.finish();
        Ok(())
    }

    fn run(&mut self, event: &mut TrackEvent) -> Result<()> {
        event.reaction_points.clear();
        for cluster in &mut event.clusters {
            cluster.has_rp = false;
            cluster.recoil = false;
        }

        let Some(beam_idx) = event
            .clusters
            .iter()
            .position(|c| c.beam_like && c.line.is_fitted())
        else {
            return Ok(());
        };
        let beam = event.clusters[beam_idx].line;

        for (idx, cluster) in event.clusters.iter_mut().enumerate() {
            if idx == beam_idx || !cluster.line.is_fitted() {
                continue;
            }
            let Some((point, distance)) = beam.closest_approach(&cluster.line) else {
                continue;
            };
            if distance <= self.max_distance {
                debug!(
                    "{}: cluster {} meets the beam at ({:.1}, {:.1}, {:.1}), gap {distance:.2}",
                    Self::NAME,
                    cluster.id,
                    point.x,
                    point.y,
                    point.z
                );
                event.reaction_points.push(point);
                cluster.has_rp = true;
                cluster.recoil = true;
            }
        }
        if !event.reaction_points.is_empty() {
            event.clusters[beam_idx].has_rp = true;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "{}: reaction points within {} of the beam",
            Self::NAME,
            self.max_distance
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::collections::BTreeMap;
    use trackrec_core::{Cluster, FitMode, Hit};

    fn track(hits: Vec<Hit>, beam_like: bool) -> Cluster {
        let mut cluster = Cluster::from_hits(0, hits, FitMode::Unweighted);
        cluster.beam_like = beam_like;
        cluster
    }

    #[test]
    fn test_vertex_of_crossing_tracks() {
        let beam: Vec<Hit> = (0..20).map(|i| Hit::at(f64::from(i), 0.0, 0.0, 1.0)).collect();
        let recoil: Vec<Hit> = (1..10)
            .map(|i| Hit::at(10.0 + f64::from(i), f64::from(i), 1.0, 1.0))
            .collect();
        let far: Vec<Hit> = (0..10)
            .map(|i| Hit::at(f64::from(i), 50.0, 90.0 + f64::from(i), 1.0))
            .collect();
        let mut event = TrackEvent::new(
            vec![track(beam, true), track(recoil, false), track(far, false)],
            Vec::new(),
        );

        let regions = BTreeMap::new();
        let mut action = FindRp::default();
        action
            .configure(&ActionOptions::new(), &ActionContext::new(&regions, &[]))
            .unwrap();
        action.run(&mut event).unwrap();

        assert_eq!(event.reaction_points.len(), 1);
        let rp = event.reaction_points[0];
        assert_abs_diff_eq!(rp.x, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(rp.y, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(rp.z, 0.5, epsilon = 1e-9);
        assert!(event.clusters[0].has_rp);
        assert!(event.clusters[1].has_rp && event.clusters[1].recoil);
        assert!(!event.clusters[2].has_rp && !event.clusters[2].recoil);

        let first = event.clone();
        action.run(&mut event).unwrap();
        assert_eq!(event, first);
    }

    #[test]
    fn test_no_beam_no_points() {
        let hits: Vec<Hit> = (0..10).map(|i| Hit::at(f64::from(i), 0.0, 0.0, 1.0)).collect();
        let mut event = TrackEvent::new(vec![track(hits, false)], Vec::new());
        event.reaction_points.push(trackrec_core::Point3::zero());
        FindRp::default().run(&mut event).unwrap();
        assert!(event.reaction_points.is_empty());
    }
}
