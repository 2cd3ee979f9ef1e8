//! Built-in actions.

mod break_chi2;
mod clean;
mod merge;
mod region;
mod rp;

pub use break_chi2::BreakChi2;
pub use clean::{Clean, CleanBadFits, CleanDeltas, CleanPileup};
pub use merge::MergeSimilar;
pub use region::{DeleteRegion, MergeFix, SplitRegion};
pub use rp::FindRp;
