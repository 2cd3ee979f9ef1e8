//! Hit type for TPC point clouds.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::geometry::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single detector reading: position, deposited charge, channel id.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hit {
    /// Reconstructed position.
    pub pos: Point3,
    /// Deposited charge (arbitrary units).
    pub charge: f64,
    /// Channel identifier.
    pub id: i32,
    /// Whether the channel saturated.
    #[cfg_attr(feature = "serde", serde(default))]
    pub saturated: bool,
}

impl Hit {
    /// Creates an unsaturated hit.
    #[inline]
    #[must_use]
    pub fn new(pos: Point3, charge: f64, id: i32) -> Self {
        Self {
            pos,
            charge,
            id,
            saturated: false,
        }
    }

    /// Creates an unsaturated hit from raw coordinates.
    #[inline]
    #[must_use]
    pub fn at(x: f64, y: f64, z: f64, charge: f64) -> Self {
        Self::new(Point3::new(x, y, z), charge, -1)
    }

    /// Marks the hit as saturated.
    #[inline]
    #[must_use]
    pub fn with_saturation(mut self, saturated: bool) -> Self {
        self.saturated = saturated;
        self
    }

    /// Folds another reading of the same voxel into this one.
    ///
    /// Charge adds, the id and position of `self` are kept.
    #[inline]
    pub fn accumulate(&mut self, other: &Hit) {
        self.charge += other.charge;
        self.saturated |= other.saturated;
    }
}

/// Collapses readings that fall into the same voxel of size `pitch`.
///
/// The first reading of each voxel keeps its place in the output; later
/// readings only add their charge to it.
///
/// # Errors
/// [`Error::Config`] unless `pitch` is finite and positive.
#[allow(clippy::cast_possible_truncation)]
pub fn coalesce_hits(hits: &[Hit], pitch: f64) -> Result<Vec<Hit>> {
    if !(pitch > 0.0 && pitch.is_finite()) {
        return Err(Error::Config(format!(
            "coalescing pitch must be finite and positive, got {pitch}"
        )));
    }
    let key = |p: &Point3| {
        (
            (p.x / pitch).floor() as i64,
            (p.y / pitch).floor() as i64,
            (p.z / pitch).floor() as i64,
        )
    };

    let mut slots: HashMap<(i64, i64, i64), usize> = HashMap::with_capacity(hits.len());
    let mut out: Vec<Hit> = Vec::with_capacity(hits.len());
    for hit in hits {
        match slots.get(&key(&hit.pos)) {
            Some(&idx) => out[idx].accumulate(hit),
            None => {
                slots.insert(key(&hit.pos), out.len());
                out.push(*hit);
            }
        }
    }
    Ok(out)
}

/// Total charge of a set of hits.
#[must_use]
pub fn total_charge(hits: &[Hit]) -> f64 {
    hits.iter().map(|h| h.charge).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_keeps_id() {
        let mut a = Hit::new(Point3::new(1.0, 2.0, 3.0), 10.0, 7);
        let b = Hit::new(Point3::new(1.2, 2.1, 3.3), 5.0, 9).with_saturation(true);
        a.accumulate(&b);
        assert!((a.charge - 15.0).abs() < f64::EPSILON);
        assert_eq!(a.id, 7);
        assert!(a.saturated);
        assert_eq!(a.pos, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_coalesce_same_voxel() {
        let hits = vec![
            Hit::new(Point3::new(0.1, 0.1, 0.1), 1.0, 0),
            Hit::new(Point3::new(5.0, 0.0, 0.0), 2.0, 1),
            Hit::new(Point3::new(0.9, 0.4, 0.2), 3.0, 2),
        ];
        let merged = coalesce_hits(&hits, 1.0).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, 0);
        assert!((merged[0].charge - 4.0).abs() < f64::EPSILON);
        assert_eq!(merged[1].id, 1);
        assert!((total_charge(&merged) - total_charge(&hits)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_coalesce_rejects_bad_pitch() {
        let hits = vec![Hit::at(0.0, 0.0, 0.0, 1.0), Hit::at(50.0, 0.0, 0.0, 1.0)];
        for pitch in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(coalesce_hits(&hits, pitch), Err(Error::Config(_))));
        }
    }
}
