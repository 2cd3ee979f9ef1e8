//! Error types for trackrec-core.

use thiserror::Error;

/// Result type alias for trackrec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for trackrec operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Fewer hits than an algorithm needs to run at all.
    #[error("not enough data: {found} hits, at least {required} required")]
    NotEnoughData { found: usize, required: usize },

    /// Line fit error.
    #[error("fit error: {0}")]
    Fit(#[from] FitError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Sampling error.
    #[error("sampling error: {0}")]
    Sampling(String),
}

/// Reasons a line fit can be refused.
///
/// The line being fitted is never modified when one of these is returned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitError {
    /// Fewer than two points survived the charge threshold.
    #[error("cannot fit a line to {found} point(s)")]
    NotEnoughPoints { found: usize },

    /// The point cloud has no dominant axis (coincident points, zero weight).
    #[error("degenerate point cloud")]
    Degenerate,
}
