//! Core Module - Screening Logic
//!
//! Volume scoring, the persistent blacklist and the decision pipeline.

pub mod blacklist;
pub mod pipeline;
pub mod volume;

pub use blacklist::*;
pub use pipeline::*;
pub use volume::*;
