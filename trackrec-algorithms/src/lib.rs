//! trackrec-algorithms: Track extraction algorithms for TPC point clouds.
//!
//! This crate provides:
//! - **Sampler** - uniform, Gaussian, charge-weighted and weighted-Gaussian
//!   hit sampling for line hypotheses
//! - **RANSAC** - consensus-based straight track extraction
//! - **DBSCAN** - density-based clustering with noise handling
//!
#![warn(missing_docs)]

mod dbscan;
mod error;
mod processing;
mod ransac;
pub mod sampler;

pub use dbscan::{DbscanClustering, DbscanConfig, DbscanState, PointLabel};
pub use error::{ExtractionError, Result, SamplingError};
pub use processing::{
    extract_events, extract_tracks, Extraction, ExtractionAlgorithm, ExtractionParams,
};
pub use ransac::{RansacConfig, RansacEngine};
pub use sampler::{PopulationSampler, Sampler, SamplerConfig, SamplingMethod};
