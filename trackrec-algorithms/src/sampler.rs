//! Hit samplers used to seed line hypotheses.
//!
//! A [`Sampler`] only holds configuration. Binding it to a hit population
//! with [`Sampler::bind`] yields a [`PopulationSampler`] that owns any
//! per-population cache (the charge CDF) and borrows the hits, so the cache
//! can never outlive or drift from the population it was built for.
//!
//! Strategies:
//! - **Uniform**: indices drawn uniformly.
//! - **Gaussian**: reference drawn uniformly, the rest accepted with a
//!   Gaussian density of their distance to the reference.
//! - **Charge**: inverse-CDF sampling on normalised charge.
//! - **`WeightedGaussian`**: charge-weighted reference, Gaussian rest.
//!
//! Acceptance-based strategies give up after `max_attempts` draws per slot
//! and fill the remaining slots uniformly.
#![allow(clippy::missing_errors_doc)]

use log::trace;
use rand::seq::index;
use rand::Rng;
use trackrec_core::{Hit, Point3};

use crate::error::SamplingError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Probability model used to pick hits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum SamplingMethod {
    /// Uniform over indices.
    #[default]
    Uniform,
    /// Gaussian in distance around a uniform reference.
    Gaussian,
    /// Proportional to charge.
    Charge,
    /// Gaussian in distance around a charge-weighted reference.
    WeightedGaussian,
}

/// Sampler configuration.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SamplerConfig {
    /// Strategy.
    pub method: SamplingMethod,
    /// Width of the Gaussian acceptance (same units as hit positions).
    pub sigma: f64,
    /// Allow the same hit to be returned twice.
    pub with_replacement: bool,
    /// Draws per slot before falling back to uniform sampling.
    pub max_attempts: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            method: SamplingMethod::Uniform,
            sigma: 30.0,
            with_replacement: false,
            max_attempts: 100,
        }
    }
}

impl SamplerConfig {
    /// Sets the sampling method.
    #[must_use]
    pub fn with_method(mut self, method: SamplingMethod) -> Self {
        self.method = method;
        self
    }

    /// Sets the Gaussian width.
    #[must_use]
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// Enables or disables sampling with replacement.
    #[must_use]
    pub fn with_replacement(mut self, with_replacement: bool) -> Self {
        self.with_replacement = with_replacement;
        self
    }

    /// Sets the per-slot attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }
}

/// Sampler factory; see the module docs.
#[derive(Clone, Debug, Default)]
pub struct Sampler {
    config: SamplerConfig,
}

impl Sampler {
    /// Creates a sampler.
    #[must_use]
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Binds the sampler to one hit population, building its caches.
    #[must_use]
    pub fn bind<'a>(&self, hits: &'a [Hit]) -> PopulationSampler<'a> {
        let needs_cdf = matches!(
            self.config.method,
            SamplingMethod::Charge | SamplingMethod::WeightedGaussian
        );
        let (weights, cdf) = if needs_cdf {
            charge_cdf(hits)
        } else {
            (Vec::new(), Vec::new())
        };
        PopulationSampler {
            hits,
            config: self.config.clone(),
            weights,
            cdf,
        }
    }
}

/// Normalised charge weights and their running sum. Both are empty when the
/// population carries no positive charge.
fn charge_cdf(hits: &[Hit]) -> (Vec<f64>, Vec<f64>) {
    let total: f64 = hits.iter().map(|h| h.charge.max(0.0)).sum();
    if !(total > 0.0) || !total.is_finite() {
        return (Vec::new(), Vec::new());
    }
    let weights: Vec<f64> = hits.iter().map(|h| h.charge.max(0.0) / total).collect();
    let mut acc = 0.0;
    let cdf = weights
        .iter()
        .map(|w| {
            acc += w;
            acc
        })
        .collect();
    (weights, cdf)
}

/// A sampler bound to one hit population.
#[derive(Debug)]
pub struct PopulationSampler<'a> {
    hits: &'a [Hit],
    config: SamplerConfig,
    weights: Vec<f64>,
    cdf: Vec<f64>,
}

impl PopulationSampler<'_> {
    /// Size of the bound population.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// True if the bound population is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Draws `count` hit indices.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
    ) -> Result<Vec<usize>, SamplingError> {
        let n = self.hits.len();
        if n == 0 {
            return Err(SamplingError::EmptyPopulation);
        }
        if !self.config.with_replacement && count > n {
            return Err(SamplingError::PopulationTooSmall {
                requested: count,
                available: n,
            });
        }

        let mut chosen = Vec::with_capacity(count);
        if count == 0 {
            return Ok(chosen);
        }

        match self.config.method {
            SamplingMethod::Uniform => self.fill_uniform(rng, &mut chosen, count),
            SamplingMethod::Gaussian => {
                chosen.push(rng.random_range(0..n));
                self.fill_gaussian(rng, &mut chosen, count);
            }
            SamplingMethod::Charge => self.fill_charge(rng, &mut chosen, count),
            SamplingMethod::WeightedGaussian => {
                let reference = self
                    .draw_charge(rng, &[])
                    .unwrap_or_else(|| rng.random_range(0..n));
                chosen.push(reference);
                self.fill_gaussian(rng, &mut chosen, count);
            }
        }
        Ok(chosen)
    }

    /// Draws `count` hit positions.
    pub fn sample_points<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
    ) -> Result<Vec<Point3>, SamplingError> {
        Ok(self
            .sample(rng, count)?
            .into_iter()
            .map(|i| self.hits[i].pos)
            .collect())
    }

    fn fill_uniform<R: Rng + ?Sized>(&self, rng: &mut R, chosen: &mut Vec<usize>, count: usize) {
        let n = self.hits.len();
        let needed = count - chosen.len();
        if self.config.with_replacement {
            chosen.extend((0..needed).map(|_| rng.random_range(0..n)));
        } else if chosen.is_empty() {
            chosen.extend(index::sample(rng, n, needed));
        } else {
            let available: Vec<usize> = (0..n).filter(|i| !chosen.contains(i)).collect();
            let picks = index::sample(rng, available.len(), needed);
            chosen.extend(picks.into_iter().map(|k| available[k]));
        }
    }

    fn fill_gaussian<R: Rng + ?Sized>(&self, rng: &mut R, chosen: &mut Vec<usize>, count: usize) {
        let reference = self.hits[chosen[0]].pos;
        let two_sigma_sq = 2.0 * self.config.sigma * self.config.sigma;
        while chosen.len() < count {
            match self.accept_gaussian(rng, &reference, two_sigma_sq, chosen) {
                Some(idx) => chosen.push(idx),
                None => {
                    trace!(
                        "gaussian sampler exhausted {} attempts, falling back to uniform",
                        self.config.max_attempts
                    );
                    self.fill_uniform(rng, chosen, count);
                }
            }
        }
    }

    fn accept_gaussian<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        reference: &Point3,
        two_sigma_sq: f64,
        chosen: &[usize],
    ) -> Option<usize> {
        let n = self.hits.len();
        for _ in 0..self.config.max_attempts {
            let idx = rng.random_range(0..n);
            if !self.config.with_replacement && chosen.contains(&idx) {
                continue;
            }
            let d2 = self.hits[idx].pos.distance_squared(reference);
            let density = (-d2 / two_sigma_sq).exp();
            if density >= rng.random::<f64>() {
                return Some(idx);
            }
        }
        None
    }

    fn fill_charge<R: Rng + ?Sized>(&self, rng: &mut R, chosen: &mut Vec<usize>, count: usize) {
        while chosen.len() < count {
            let excluded: &[usize] = if self.config.with_replacement {
                &[]
            } else {
                chosen
            };
            match self.draw_charge(rng, excluded) {
                Some(idx) => chosen.push(idx),
                None => {
                    trace!("no charge left to sample, falling back to uniform");
                    self.fill_uniform(rng, chosen, count);
                }
            }
        }
    }

    /// Inverse-CDF draw. Excluded indices have their mass removed and the
    /// rest renormalised.
    fn draw_charge<R: Rng + ?Sized>(&self, rng: &mut R, excluded: &[usize]) -> Option<usize> {
        if self.cdf.is_empty() {
            return None;
        }
        let n = self.cdf.len();
        if excluded.is_empty() {
            let u = rng.random::<f64>();
            let idx = self.cdf.partition_point(|&c| c <= u);
            // Rounding can leave the last cumulative value a hair below 1.
            return Some(self.last_positive(idx.min(n - 1)));
        }

        let removed: f64 = excluded.iter().map(|&i| self.weights[i]).sum();
        let remaining = 1.0 - removed;
        if remaining <= f64::EPSILON {
            return None;
        }
        let u = rng.random::<f64>() * remaining;
        let mut acc = 0.0;
        let mut last = None;
        for (i, w) in self.weights.iter().enumerate() {
            if *w <= 0.0 || excluded.contains(&i) {
                continue;
            }
            acc += w;
            last = Some(i);
            if acc > u {
                return Some(i);
            }
        }
        last
    }

    /// Steps back from `idx` to the nearest index with positive weight.
    fn last_positive(&self, idx: usize) -> usize {
        (0..=idx)
            .rev()
            .find(|&i| self.weights[i] > 0.0)
            .unwrap_or(idx)
    }
}
