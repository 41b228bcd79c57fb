//! Shared types for the learnloop run history.

mod insight;
mod pattern;
mod run;
mod stats;

pub use insight::*;
pub use pattern::*;
pub use run::*;
pub use stats::*;
