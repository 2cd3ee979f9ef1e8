//! Pipeline error types.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while assembling or running a pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// No factory is registered under this name.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// An option has the wrong type or an out-of-range value.
    #[error("{action}: invalid option '{key}': {reason}")]
    InvalidOption {
        /// Action being configured.
        action: String,
        /// Option name.
        key: String,
        /// What was wrong with the value.
        reason: String,
    },

    /// An action refers to a region the pipeline does not define.
    #[error("{action}: unknown region '{region}'")]
    UnknownRegion {
        /// Action being configured.
        action: String,
        /// Region name as written in the configuration.
        region: String,
    },

    /// An action failed while processing an event.
    #[error("{action}: {reason}")]
    Action {
        /// Action that failed.
        action: String,
        /// Failure description.
        reason: String,
    },
}
