//! 3D straight lines and the total-least-squares line fitter.
//!
//! The fit minimises the sum of squared orthogonal distances. Tracks are not
//! single-valued in any coordinate, so no coordinate is treated as the
//! independent variable.
//!
//! 1. Weighted centroid and central second moments (Sxx, Syy, Szz, Sxy, Sxz, Syz)
//! 2. Inertia tensor of the cloud about its centroid
//! 3. Eigenvalues from the closed-form cubic characteristic equation
//! 4. Direction = eigenvector of the smallest inertia eigenvalue
//! 5. Quality = smallest eigenvalue / total weight (mean squared residual)
#![allow(clippy::many_single_char_names, clippy::similar_names)]

use std::f64::consts::PI;

use crate::error::FitError;
use crate::geometry::Point3;
use crate::hit::Hit;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a cluster's hits are weighted when its line is (re)fitted.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FitMode {
    /// Weight = charge; hits below the threshold (if any) are ignored.
    Weighted { charge_threshold: Option<f64> },
    /// Every hit weighs 1.
    Unweighted,
}

impl Default for FitMode {
    fn default() -> Self {
        Self::Weighted {
            charge_threshold: None,
        }
    }
}

/// A line in 3D: reference point, direction and fit quality.
///
/// Quality is a normalised residual; lower is better. A NaN quality means
/// the line has not been fitted (or is a provisional hypothesis).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Line {
    point: Point3,
    direction: Point3,
    quality: f64,
}

impl Default for Line {
    fn default() -> Self {
        Self {
            point: Point3::zero(),
            direction: Point3::zero(),
            quality: f64::NAN,
        }
    }
}

impl Line {
    /// Creates a line from its parts.
    #[must_use]
    pub fn new(point: Point3, direction: Point3, quality: f64) -> Self {
        Self {
            point,
            direction,
            quality,
        }
    }

    /// Hypothesis line through two points. Quality stays provisional (NaN).
    #[must_use]
    pub fn from_points(a: Point3, b: Point3) -> Self {
        Self {
            point: a,
            direction: (b - a).unit(),
            quality: f64::NAN,
        }
    }

    /// Reference point (the weighted centroid after a fit).
    #[inline]
    #[must_use]
    pub fn point(&self) -> Point3 {
        self.point
    }

    /// Direction vector.
    #[inline]
    #[must_use]
    pub fn direction(&self) -> Point3 {
        self.direction
    }

    /// Fit quality.
    #[inline]
    #[must_use]
    pub fn quality(&self) -> f64 {
        self.quality
    }

    /// Overrides the quality value (RANSAC scores hypotheses this way).
    #[inline]
    pub fn set_quality(&mut self, quality: f64) {
        self.quality = quality;
    }

    /// True once a fit (or a scoring pass) has produced a usable line.
    #[inline]
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        !self.quality.is_nan() && !self.direction.has_nan() && self.direction.norm_squared() > 0.0
    }

    /// Perpendicular distance from `p` to the line.
    #[must_use]
    pub fn distance_to(&self, p: &Point3) -> f64 {
        (*p - self.point).cross(&self.direction).norm() / self.direction.norm()
    }

    /// Signed position of the projection of `p` along the direction.
    #[must_use]
    pub fn parameter(&self, p: &Point3) -> f64 {
        (*p - self.point).dot(&self.direction) / self.direction.norm()
    }

    /// Orthogonal projection of `p` onto the line.
    #[must_use]
    pub fn project(&self, p: &Point3) -> Point3 {
        let t = (*p - self.point).dot(&self.direction) / self.direction.norm_squared();
        self.point + self.direction * t
    }

    /// Midpoint and length of the shortest segment joining two lines.
    ///
    /// Returns `None` for (nearly) parallel lines.
    #[must_use]
    pub fn closest_approach(&self, other: &Line) -> Option<(Point3, f64)> {
        let d1 = self.direction;
        let d2 = other.direction;
        let w0 = self.point - other.point;
        let a = d1.dot(&d1);
        let b = d1.dot(&d2);
        let c = d2.dot(&d2);
        let d = d1.dot(&w0);
        let e = d2.dot(&w0);
        let denom = a * c - b * b;
        if !(denom > 1e-12 * a * c) {
            return None;
        }
        let t = (b * e - c * d) / denom;
        let s = (a * e - b * d) / denom;
        let on_self = self.point + d1 * t;
        let on_other = other.point + d2 * s;
        Some(((on_self + on_other) * 0.5, on_self.distance(&on_other)))
    }

    /// Flips the direction so that it points along `reference`.
    pub fn align_with(&mut self, reference: &Point3) {
        if self.direction.dot(reference) < 0.0 {
            self.direction = -self.direction;
        }
    }

    /// Fits the line to `hits` in the given mode.
    pub fn fit(&mut self, hits: &[Hit], mode: FitMode) -> Result<(), FitError> {
        match mode {
            FitMode::Weighted { charge_threshold } => self.fit_weighted(hits, charge_threshold),
            FitMode::Unweighted => self.fit_unweighted(hits),
        }
    }

    /// Charge-weighted fit. Hits with charge below `charge_threshold` are skipped.
    pub fn fit_weighted(
        &mut self,
        hits: &[Hit],
        charge_threshold: Option<f64>,
    ) -> Result<(), FitError> {
        let points: Vec<(Point3, f64)> = hits
            .iter()
            .filter(|h| charge_threshold.is_none_or(|t| h.charge >= t))
            .map(|h| (h.pos, h.charge))
            .collect();
        self.fit_points(&points)
    }

    /// Unweighted fit: every hit weighs 1.
    pub fn fit_unweighted(&mut self, hits: &[Hit]) -> Result<(), FitError> {
        let points: Vec<(Point3, f64)> = hits.iter().map(|h| (h.pos, 1.0)).collect();
        self.fit_points(&points)
    }

    /// Fits weighted points. `self` is left untouched on error.
    pub fn fit_points(&mut self, points: &[(Point3, f64)]) -> Result<(), FitError> {
        if points.len() < 2 {
            return Err(FitError::NotEnoughPoints {
                found: points.len(),
            });
        }

        let mut sw = 0.0;
        let mut weighted = Point3::zero();
        for (p, w) in points {
            sw += w;
            weighted += *p * *w;
        }
        if !(sw > 0.0) || !sw.is_finite() {
            return Err(FitError::Degenerate);
        }
        let centroid = weighted / sw;

        let (mut sxx, mut syy, mut szz) = (0.0, 0.0, 0.0);
        let (mut sxy, mut sxz, mut syz) = (0.0, 0.0, 0.0);
        for (p, w) in points {
            let d = *p - centroid;
            sxx += w * d.x * d.x;
            syy += w * d.y * d.y;
            szz += w * d.z * d.z;
            sxy += w * d.x * d.y;
            sxz += w * d.x * d.z;
            syz += w * d.y * d.z;
        }

        let inertia = [
            [syy + szz, -sxy, -sxz],
            [-sxy, sxx + szz, -syz],
            [-sxz, -syz, sxx + syy],
        ];
        let lambda = smallest_eigenvalue(&inertia);
        if !lambda.is_finite() {
            return Err(FitError::Degenerate);
        }
        let Some(direction) = null_vector(&inertia, lambda) else {
            return Err(FitError::Degenerate);
        };

        self.point = centroid;
        self.direction = canonical_sign(direction);
        self.quality = (lambda / sw).max(0.0);
        Ok(())
    }
}

/// Smallest root of the characteristic polynomial of a symmetric 3x3 matrix.
fn smallest_eigenvalue(m: &[[f64; 3]; 3]) -> f64 {
    // λ³ + aλ² + bλ + c = 0
    let trace = m[0][0] + m[1][1] + m[2][2];
    let minors = m[0][0] * m[1][1] - m[0][1] * m[1][0] + m[0][0] * m[2][2] - m[0][2] * m[2][0]
        + m[1][1] * m[2][2]
        - m[1][2] * m[2][1];
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);

    let roots = solve_cubic(-trace, minors, -det);
    roots.into_iter().fold(f64::INFINITY, f64::min)
}

/// Real roots of λ³ + aλ² + bλ + c for a cubic known to have three real roots.
fn solve_cubic(a: f64, b: f64, c: f64) -> [f64; 3] {
    let shift = a / 3.0;
    let p = b - a * a / 3.0;
    let q = 2.0 * a * a * a / 27.0 - a * b / 3.0 + c;
    let disc = (q / 2.0).powi(2) + (p / 3.0).powi(3);

    if disc < 0.0 {
        // Three distinct real roots: trigonometric form.
        let r = (-p / 3.0).sqrt();
        let cos_arg = (-q / 2.0 / (r * r * r)).clamp(-1.0, 1.0);
        let phi = cos_arg.acos();
        [
            2.0 * r * (phi / 3.0).cos() - shift,
            2.0 * r * ((phi - 2.0 * PI) / 3.0).cos() - shift,
            2.0 * r * ((phi - 4.0 * PI) / 3.0).cos() - shift,
        ]
    } else {
        // Repeated roots (disc is zero up to rounding for symmetric input).
        let sq = disc.sqrt();
        let u = (-q / 2.0 + sq).cbrt();
        let v = (-q / 2.0 - sq).cbrt();
        let t1 = u + v;
        let t2 = -t1 / 2.0;
        [t1 - shift, t2 - shift, t2 - shift]
    }
}

/// Eigenvector of `m` for eigenvalue `lambda`, as the best-conditioned cross
/// product of two rows of `m - λI`.
fn null_vector(m: &[[f64; 3]; 3], lambda: f64) -> Option<Point3> {
    let row = |i: usize| {
        let mut r = Point3::new(m[i][0], m[i][1], m[i][2]);
        match i {
            0 => r.x -= lambda,
            1 => r.y -= lambda,
            _ => r.z -= lambda,
        }
        r
    };
    let (r0, r1, r2) = (row(0), row(1), row(2));
    let candidates = [r0.cross(&r1), r0.cross(&r2), r1.cross(&r2)];
    let best = candidates
        .into_iter()
        .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))?;

    let trace = m[0][0] + m[1][1] + m[2][2];
    let norm = best.norm();
    if !(norm > 1e-12 * trace * trace) || !norm.is_finite() {
        return None;
    }
    Some(best / norm)
}

/// Picks the sign with the first non-zero component positive.
fn canonical_sign(d: Point3) -> Point3 {
    let lead = if d.x != 0.0 {
        d.x
    } else if d.y != 0.0 {
        d.y
    } else {
        d.z
    };
    if lead < 0.0 {
        -d
    } else {
        d
    }
}
