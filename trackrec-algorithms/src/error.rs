//! Extraction error types.

use thiserror::Error;

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Errors raised by the hypothesis samplers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplingError {
    /// Nothing to sample from.
    #[error("cannot sample from an empty hit population")]
    EmptyPopulation,

    /// Sampling without replacement asked for more hits than exist.
    #[error("requested {requested} distinct hits from a population of {available}")]
    PopulationTooSmall {
        /// Hits asked for.
        requested: usize,
        /// Hits in the population.
        available: usize,
    },
}

/// Errors raised by the extraction engines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The event has fewer hits than the smallest acceptable pattern.
    #[error("not enough data: {found} hits, at least {required} required")]
    NotEnoughData {
        /// Hits in the event.
        found: usize,
        /// Smallest acceptable event.
        required: usize,
    },

    /// Sampler failure.
    #[error("sampling error: {0}")]
    Sampling(#[from] SamplingError),
}

impl From<ExtractionError> for trackrec_core::Error {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::NotEnoughData { found, required } => {
                trackrec_core::Error::NotEnoughData { found, required }
            }
            ExtractionError::Sampling(e) => trackrec_core::Error::Sampling(e.to_string()),
        }
    }
}
