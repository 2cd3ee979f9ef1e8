//! Geometric regions used to classify hits and clusters.

use crate::geometry::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Region membership of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum RegionType {
    /// Not classified yet.
    #[default]
    None,
    /// Inside the beam region.
    Beam,
    /// Outside the beam region.
    NotBeam,
}

/// Closed interval along one axis; a missing bound is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AxisRange {
    /// Lower bound (inclusive).
    #[cfg_attr(feature = "serde", serde(default))]
    pub min: Option<f64>,
    /// Upper bound (inclusive).
    #[cfg_attr(feature = "serde", serde(default))]
    pub max: Option<f64>,
}

impl AxisRange {
    /// Bounded on both sides.
    #[must_use]
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Bounded from below only.
    #[must_use]
    pub fn above(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// Bounded from above only.
    #[must_use]
    pub fn below(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// True if `v` lies within the range.
    #[inline]
    #[must_use]
    pub fn contains(&self, v: f64) -> bool {
        self.min.is_none_or(|m| v >= m) && self.max.is_none_or(|m| v <= m)
    }
}

/// An axis-aligned slab (or half-space) in detector coordinates.
///
/// Unset axes place no constraint, so `Region::new(RegionType::Beam)` with
/// only `z` set is a horizontal slab.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    /// Classification given to hits inside the region.
    pub kind: RegionType,
    /// Bounds along X.
    #[cfg_attr(feature = "serde", serde(default))]
    pub x: AxisRange,
    /// Bounds along Y.
    #[cfg_attr(feature = "serde", serde(default))]
    pub y: AxisRange,
    /// Bounds along Z.
    #[cfg_attr(feature = "serde", serde(default))]
    pub z: AxisRange,
}

impl Region {
    /// Unbounded region of the given kind.
    #[must_use]
    pub fn new(kind: RegionType) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Sets the X range.
    #[must_use]
    pub fn with_x(mut self, range: AxisRange) -> Self {
        self.x = range;
        self
    }

    /// Sets the Y range.
    #[must_use]
    pub fn with_y(mut self, range: AxisRange) -> Self {
        self.y = range;
        self
    }

    /// Sets the Z range.
    #[must_use]
    pub fn with_z(mut self, range: AxisRange) -> Self {
        self.z = range;
        self
    }

    /// True if the point satisfies every configured bound.
    #[inline]
    #[must_use]
    pub fn contains(&self, p: &Point3) -> bool {
        self.x.contains(p.x) && self.y.contains(p.y) && self.z.contains(p.z)
    }
}
