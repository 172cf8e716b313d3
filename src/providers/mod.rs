//! Providers Module - Risk Lookup Backends
//!
//! The `RiskClassifier` seam plus its HTTP and deterministic implementations.

pub mod classifier;
pub mod http;

pub use classifier::*;
pub use http::*;
