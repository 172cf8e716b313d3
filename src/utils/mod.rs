//! Utils Module - Shared Helpers
//!
//! Constants, the risk report cache and screening telemetry.

pub mod cache;
pub mod constants;
pub mod telemetry;

pub use cache::*;
pub use constants::*;
pub use telemetry::*;
