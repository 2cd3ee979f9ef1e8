//! trackrec-actions: configurable refinement pipeline over extracted clusters.
//!
//! A [`Pipeline`] is assembled from a [`PipelineConfig`] by looking every
//! action name up in an [`ActionRegistry`]. Each action mutates the event's
//! cluster collection in turn and refits whatever it touched; cluster ids are
//! re-densified between steps.
//!
//! Built-in actions:
//! - **clean**, **clean-bad-fits**, **clean-pileup**, **clean-deltas** - delete failing clusters
//! - **break-chi2** - peel outliers off badly fitted clusters
//! - **merge** - join parallel, overlapping clusters
//! - **split-region**, **merge-fix**, **delete-region** - region classification
//! - **find-rp** - reaction points between the beam and other tracks
//!
#![warn(missing_docs)]

mod action;
pub mod actions;
mod error;
mod options;
mod pipeline;
mod registry;

pub use action::{Action, ActionContext};
pub use error::{PipelineError, Result};
pub use options::{ActionOptions, OptionReader, OptionValue};
pub use pipeline::{ActionConfig, Pipeline, PipelineConfig};
pub use registry::{ActionFactory, ActionRegistry};
