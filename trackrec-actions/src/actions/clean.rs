//! Actions that delete whole clusters failing a quality predicate.

use log::debug;
use trackrec_core::{Cluster, TrackEvent};

use crate::action::{Action, ActionContext};
use crate::error::Result;
use crate::options::ActionOptions;

/// Flags clusters matching `doomed` and erases them.
fn delete_where<F>(event: &mut TrackEvent, action: &str, mut doomed: F)
where
    F: FnMut(&Cluster) -> bool,
{
    for cluster in &mut event.clusters {
        cluster.to_delete = doomed(cluster);
    }
    let removed = event.purge_deleted();
    if removed > 0 {
        debug!("{action}: deleted {removed} clusters");
    }
}

/// Deletes clusters with too few hits.
#[derive(Debug, Clone)]
pub struct Clean {
    min_hits: usize,
}

impl Clean {
    /// Registry name.
    pub const NAME: &'static str = "clean";
}

impl Default for Clean {
    fn default() -> Self {
        Self { min_hits: 3 }
    }
}

impl Action for Clean {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, options: &ActionOptions, _ctx: &ActionContext<'_>) -> Result<()> {
        let mut reader = options.reader(Self::NAME);
        self.min_hits = reader.usize_or("min_hits", self.min_hits)?;
        reader.finish();
        Ok(())
    }

    fn run(&mut self, event: &mut TrackEvent) -> Result<()> {
        let min_hits = self.min_hits;
        delete_where(event, Self::NAME, |c| c.len() < min_hits);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{}: delete clusters with fewer than {} hits", Self::NAME, self.min_hits)
    }
}

/// Deletes clusters whose line is unfitted or fits too badly.
#[derive(Debug, Clone, Default)]
pub struct CleanBadFits {
    max_quality: Option<f64>,
}

impl CleanBadFits {
    /// Registry name.
    pub const NAME: &'static str = "clean-bad-fits";
}

impl Action for CleanBadFits {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, options: &ActionOptions, _ctx: &ActionContext<'_>) -> Result<()> {
        let mut reader = options.reader(Self::NAME);
        self.max_quality = reader.opt_f64("max_quality")?;
        reader.finish();
        Ok(())
    }

    fn run(&mut self, event: &mut TrackEvent) -> Result<()> {
        let max_quality = self.max_quality;
        delete_where(event, Self::NAME, |c| {
            !c.line.is_fitted() || max_quality.is_some_and(|m| c.line.quality() > m)
        });
        Ok(())
    }

    fn describe(&self) -> String {
        match self.max_quality {
            Some(m) => format!("{}: delete unfitted clusters and quality > {m}", Self::NAME),
            None => format!("{}: delete unfitted clusters", Self::NAME),
        }
    }
}

/// Deletes pile-up: tracks parallel to the beam axis lying outside the
/// beam's drift window.
#[derive(Debug, Clone)]
pub struct CleanPileup {
    min_alignment: f64,
    z_min: f64,
    z_max: f64,
}

impl CleanPileup {
    /// Registry name.
    pub const NAME: &'static str = "clean-pileup";
}

impl Default for CleanPileup {
    fn default() -> Self {
        Self {
            min_alignment: 0.95,
            z_min: f64::NEG_INFINITY,
            z_max: f64::INFINITY,
        }
    }
}

impl Action for CleanPileup {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, options: &ActionOptions, _ctx: &ActionContext<'_>) -> Result<()> {
        let mut reader = options.reader(Self::NAME);
        self.min_alignment = reader.f64_or("min_beam_alignment", self.min_alignment)?;
        self.z_min = reader.required_f64("z_min")?;
        self.z_max = reader.required_f64("z_max")?;
        reader.finish();
        Ok(())
    }

    fn run(&mut self, event: &mut TrackEvent) -> Result<()> {
        let (min_alignment, z_min, z_max) = (self.min_alignment, self.z_min, self.z_max);
        delete_where(event, Self::NAME, |c| {
            if !c.line.is_fitted() {
                return false;
            }
            let along_beam = c.line.direction().unit().x.abs() >= min_alignment;
            let z = c.centroid().map_or(f64::NAN, |p| p.z);
            along_beam && !(z_min..=z_max).contains(&z)
        });
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "{}: delete beam-parallel clusters (|ux| >= {}) outside z in [{}, {}]",
            Self::NAME,
            self.min_alignment,
            self.z_min,
            self.z_max
        )
    }
}

/// Deletes delta-electron blobs: short clusters with a poor line fit.
#[derive(Debug, Clone)]
pub struct CleanDeltas {
    max_quality: f64,
    max_length: f64,
}

impl CleanDeltas {
    /// Registry name.
    pub const NAME: &'static str = "clean-deltas";
}

impl Default for CleanDeltas {
    fn default() -> Self {
        Self {
            max_quality: 2.0,
            max_length: 20.0,
        }
    }
}

impl Action for CleanDeltas {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, options: &ActionOptions, _ctx: &ActionContext<'_>) -> Result<()> {
        let mut reader = options.reader(Self::NAME);
        self.max_quality = reader.f64_or("max_quality", self.max_quality)?;
        self.max_length = reader.f64_or("max_length", self.max_length)?;
        reader.finish();
        Ok(())
    }

    fn run(&mut self, event: &mut TrackEvent) -> Result<()> {
        let (max_quality, max_length) = (self.max_quality, self.max_length);
        delete_where(event, Self::NAME, |c| {
            c.line.is_fitted() && c.line.quality() > max_quality && c.length() < max_length
        });
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "{}: delete clusters with quality > {} and length < {}",
            Self::NAME,
            self.max_quality,
            self.max_length
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use trackrec_core::{FitMode, Hit};

    fn line_cluster(n: u32, y: f64, z: f64) -> Cluster {
        let hits = (0..n).map(|i| Hit::at(f64::from(i), y, z, 1.0)).collect();
        Cluster::from_hits(0, hits, FitMode::Unweighted)
    }

    fn blob(spread: f64) -> Cluster {
        let mut hits = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                hits.push(Hit::at(f64::from(i) * spread, f64::from(j) * spread * 1.5, 0.0, 1.0));
            }
        }
        Cluster::from_hits(0, hits, FitMode::Unweighted)
    }

    fn configure(action: &mut dyn Action, options: &ActionOptions) {
        let regions = BTreeMap::new();
        action
            .configure(options, &ActionContext::new(&regions, &[]))
            .unwrap();
    }

    #[test]
    fn test_clean_min_hits() {
        let mut event = TrackEvent::new(
            vec![line_cluster(2, 0.0, 0.0), line_cluster(5, 5.0, 0.0)],
            Vec::new(),
        );
        let mut action = Clean::default();
        configure(&mut action, &ActionOptions::new().with("min_hits", 3u32));
        action.run(&mut event).unwrap();
        assert_eq!(event.len(), 1);
        assert_eq!(event.clusters[0].len(), 5);
    }

    #[test]
    fn test_clean_bad_fits() {
        let mut unfitted = Cluster::new(0);
        unfitted.hits.push(Hit::at(0.0, 0.0, 0.0, 1.0));
        let mut event = TrackEvent::new(
            vec![unfitted, line_cluster(5, 0.0, 0.0), blob(3.0)],
            Vec::new(),
        );
        let mut action = CleanBadFits::default();
        configure(&mut action, &ActionOptions::new().with("max_quality", 1.0));
        action.run(&mut event).unwrap();
        assert_eq!(event.len(), 1);
        assert_eq!(event.clusters[0].len(), 5);
    }

    #[test]
    fn test_clean_pileup_keeps_tracks_inside_window() {
        let mut event = TrackEvent::new(
            vec![line_cluster(10, 0.0, 50.0), line_cluster(10, 0.0, 200.0)],
            Vec::new(),
        );
        let mut action = CleanPileup::default();
        configure(
            &mut action,
            &ActionOptions::new().with("z_min", 30.0).with("z_max", 70.0),
        );
        action.run(&mut event).unwrap();
        assert_eq!(event.len(), 1);
        assert!((event.clusters[0].hits[0].pos.z - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clean_pileup_requires_window() {
        let mut action = CleanPileup::default();
        let regions = BTreeMap::new();
        assert!(action
            .configure(&ActionOptions::new(), &ActionContext::new(&regions, &[]))
            .is_err());
    }

    #[test]
    fn test_clean_deltas() {
        let mut event = TrackEvent::new(vec![blob(3.0), line_cluster(30, 0.0, 0.0)], Vec::new());
        let mut action = CleanDeltas::default();
        configure(&mut action, &ActionOptions::new());
        action.run(&mut event).unwrap();
        assert_eq!(event.len(), 1);
        assert_eq!(event.clusters[0].len(), 30);
    }
}
