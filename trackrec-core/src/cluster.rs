//! Cluster type: a group of hits and the line fitted to them.

use log::debug;

use crate::error::FitError;
use crate::geometry::Point3;
use crate::hit::Hit;
use crate::line::{FitMode, Line};
use crate::region::RegionType;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A set of hits believed to belong to one track, with its fitted line.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cluster {
    /// Position in the owning event collection.
    pub id: usize,
    /// Hits belonging to this cluster.
    pub hits: Vec<Hit>,
    /// Line fitted to `hits`.
    pub line: Line,
    /// Weighting used by [`Cluster::refit`].
    pub fit_mode: FitMode,
    /// Looks like the beam track.
    pub beam_like: bool,
    /// Recoil / reaction product candidate.
    pub recoil: bool,
    /// Region membership.
    pub region: RegionType,
    /// A reaction point was attached to this cluster.
    pub has_rp: bool,
    /// Transient marker set by actions.
    pub to_merge: bool,
    /// Transient marker set by actions.
    pub to_delete: bool,
}

impl Cluster {
    /// Creates an empty cluster.
    #[must_use]
    pub fn new(id: usize) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Creates a cluster from hits and fits its line.
    ///
    /// A failed fit is logged; the line then stays unfitted.
    #[must_use]
    pub fn from_hits(id: usize, hits: Vec<Hit>, fit_mode: FitMode) -> Self {
        let mut cluster = Self {
            id,
            hits,
            fit_mode,
            ..Self::default()
        };
        // Failure is already logged and the line stays unfitted.
        let _ = cluster.refit();
        cluster
    }

    /// Refits the line to the current hits using `fit_mode`.
    ///
    /// On failure the previous line is kept.
    pub fn refit(&mut self) -> Result<(), FitError> {
        let result = self.line.fit(&self.hits, self.fit_mode);
        if let Err(err) = result {
            debug!(
                "cluster {}: refit over {} hits failed ({err}), keeping previous line",
                self.id,
                self.hits.len()
            );
        }
        result
    }

    /// Returns the number of hits in the cluster.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if the cluster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Returns an iterator over the hits.
    pub fn iter(&self) -> impl Iterator<Item = &Hit> {
        self.hits.iter()
    }

    /// Moves all hits of `other` into this cluster and refits.
    pub fn absorb(&mut self, other: Cluster) {
        self.hits.extend(other.hits);
        let _ = self.refit();
    }

    /// Keeps only the hits matching `keep`, returning the removed ones.
    ///
    /// Refits when anything was removed.
    pub fn retain_hits<F>(&mut self, mut keep: F) -> Vec<Hit>
    where
        F: FnMut(&Hit) -> bool,
    {
        let (kept, removed): (Vec<Hit>, Vec<Hit>) = self.hits.drain(..).partition(|h| keep(h));
        self.hits = kept;
        if !removed.is_empty() {
            let _ = self.refit();
        }
        removed
    }

    /// Unweighted centroid of the hits, `None` when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn centroid(&self) -> Option<Point3> {
        if self.hits.is_empty() {
            return None;
        }
        let mut sum = Point3::zero();
        for hit in &self.hits {
            sum += hit.pos;
        }
        Some(sum / self.hits.len() as f64)
    }

    /// Minimum and maximum X over the hits.
    #[must_use]
    pub fn x_range(&self) -> Option<(f64, f64)> {
        self.hits.iter().fold(None, |acc, h| match acc {
            None => Some((h.pos.x, h.pos.x)),
            Some((lo, hi)) => Some((f64::min(lo, h.pos.x), f64::max(hi, h.pos.x))),
        })
    }

    /// Extent of the hits projected on the cluster's own line.
    #[must_use]
    pub fn length(&self) -> f64 {
        if !self.line.is_fitted() {
            return 0.0;
        }
        let (lo, hi) = self
            .hits
            .iter()
            .map(|h| self.line.parameter(&h.pos))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
                (lo.min(t), hi.max(t))
            });
        if lo > hi {
            0.0
        } else {
            hi - lo
        }
    }

    /// Total charge of the hits.
    #[must_use]
    pub fn charge(&self) -> f64 {
        crate::hit::total_charge(&self.hits)
    }
}

impl FromIterator<Hit> for Cluster {
    fn from_iter<I: IntoIterator<Item = Hit>>(iter: I) -> Self {
        Self::from_hits(0, iter.into_iter().collect(), FitMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn track(n: u32, y: f64) -> Vec<Hit> {
        (0..n).map(|i| Hit::at(f64::from(i), y, 0.0, 10.0)).collect()
    }

    #[test]
    fn test_from_hits_fits_line() {
        let cluster = Cluster::from_hits(3, track(10, 4.0), FitMode::Unweighted);
        assert_eq!(cluster.len(), 10);
        assert!(cluster.line.is_fitted());
        assert_abs_diff_eq!(cluster.line.direction().x, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cluster.length(), 9.0, epsilon = 1e-9);
        assert_eq!(cluster.x_range(), Some((0.0, 9.0)));
    }

    #[test]
    fn test_failed_refit_keeps_previous_line() {
        let mut cluster = Cluster::from_hits(0, track(5, 0.0), FitMode::default());
        let before = cluster.line;
        cluster.hits.truncate(1);
        assert!(cluster.refit().is_err());
        assert_eq!(cluster.line, before);
    }

    #[test]
    fn test_absorb_and_retain() {
        let mut a = Cluster::from_hits(0, track(6, 0.0), FitMode::Unweighted);
        let b = Cluster::from_hits(1, track(4, 0.5), FitMode::Unweighted);
        a.absorb(b);
        assert_eq!(a.len(), 10);
        assert_abs_diff_eq!(a.charge(), 100.0, epsilon = 1e-9);

        let removed = a.retain_hits(|h| h.pos.y < 0.25);
        assert_eq!(removed.len(), 4);
        assert_eq!(a.len(), 6);
        assert_abs_diff_eq!(a.line.point().y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_centroid_empty() {
        assert!(Cluster::new(0).centroid().is_none());
        assert!(Cluster::new(0).x_range().is_none());
        assert_abs_diff_eq!(Cluster::new(0).length(), 0.0);
    }
}
