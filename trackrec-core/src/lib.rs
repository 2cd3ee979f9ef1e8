//! trackrec-core: Core types for TPC track reconstruction.
//!
//! This crate provides the foundational data model shared by the
//! extraction algorithms and the refinement pipeline: hits, the
//! total-least-squares line fitter, clusters, regions and the per-event
//! cluster collection.
//!

pub mod cluster;
pub mod error;
pub mod event;
pub mod geometry;
pub mod hit;
pub mod line;
pub mod region;

pub use cluster::Cluster;
pub use error::{Error, FitError, Result};
pub use event::TrackEvent;
pub use geometry::Point3;
pub use hit::{coalesce_hits, total_charge, Hit};
pub use line::{FitMode, Line};
pub use region::{AxisRange, Region, RegionType};
