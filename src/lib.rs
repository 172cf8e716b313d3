//! Token Sentry - fail-closed token screening
//!
//! Screens candidate token listings before they reach a trading or listing
//! workflow:
//! - Volume legitimacy scoring (wash-trading heuristics)
//! - Contract risk classification through pluggable backends
//! - Persistent blacklist of tokens and developers
//!
//! Every failure path ends in a rejection or a HIGH_RISK default, never in
//! an error escaping the pipeline.
//!
//! ## Modules
//! - `models`: token records, verdicts, errors, configuration
//! - `core`: volume scorer, blacklist store, analysis pipeline
//! - `providers`: risk classifier trait, HTTP and stub backends
//! - `utils`: constants, report cache, telemetry

pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::{
    Blacklist, BlacklistStore, BlockingPipeline, TokenAnalysisPipeline, VolumeScorer,
};
pub use models::{
    AnalysisMode, AnalyzedToken, BackendOutcome, BlacklistCategory, ContractAnalysis,
    ErrorCode, HttpClassifierConfig, Rejection, RejectionReason, RiskLevel, RiskLevelPolicy,
    RiskReport, ScreenError, ScreenResult, ScreenerConfig, TokenRecord, Verdict, VolumeMetrics,
};
pub use providers::{HttpRiskClassifier, RiskClassifier, StaticClassifier};
pub use utils::{CacheStats, CachedClassifier, RiskCache, ScreeningTelemetry, TelemetryStats};
