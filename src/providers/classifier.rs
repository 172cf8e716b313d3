//! Risk classifier seam
//!
//! A classifier answers "how dangerous is this contract?" for one address.
//! `lookup` surfaces backend failures. `classify_outcome` is the one place a
//! failure becomes the fail-closed HIGH_RISK analysis; `classify` drops the
//! error and keeps the analysis.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error};

use crate::models::{ContractAnalysis, RiskLevel, RiskReport, ScreenError, ScreenResult};
use crate::utils::constants::STUB_BACKEND_NAME;

#[async_trait]
pub trait RiskClassifier: Send + Sync {
    /// Backend name, used as the key in advisory output
    fn name(&self) -> &str;

    /// Raw backend answer for `address`
    async fn lookup(&self, address: &str) -> ScreenResult<RiskReport>;

    /// Fail-closed classification plus the lookup error it replaced, if any
    async fn classify_outcome(&self, address: &str) -> (ContractAnalysis, Option<ScreenError>) {
        match self.lookup(address).await {
            Ok(report) => (ContractAnalysis::from_report(address, report), None),
            Err(e) => {
                error!(
                    "❌ [{}] Contract analysis failed for {}: {}",
                    self.name(),
                    address,
                    e
                );
                (ContractAnalysis::fail_closed(address), Some(e))
            }
        }
    }

    /// Fail-closed classification
    async fn classify(&self, address: &str) -> ContractAnalysis {
        self.classify_outcome(address).await.0
    }
}

/// Deterministic in-process backend.
///
/// Answers LOW_RISK, verified, not bundled unless an override is registered
/// for the address. Used when no HTTP backend is configured, and in tests.
#[derive(Debug)]
pub struct StaticClassifier {
    name: String,
    default_report: Option<RiskReport>,
    overrides: HashMap<String, RiskReport>,
    failure: Option<String>,
    calls: AtomicU64,
}

impl Default for StaticClassifier {
    fn default() -> Self {
        Self::new(RiskReport::new(RiskLevel::LowRisk).verified())
    }
}

impl StaticClassifier {
    pub fn new(default_report: RiskReport) -> Self {
        Self {
            name: STUB_BACKEND_NAME.to_string(),
            default_report: Some(default_report),
            overrides: HashMap::new(),
            failure: None,
            calls: AtomicU64::new(0),
        }
    }

    /// A backend whose every lookup fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            name: STUB_BACKEND_NAME.to_string(),
            default_report: None,
            overrides: HashMap::new(),
            failure: Some(message.into()),
            calls: AtomicU64::new(0),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Fixed answer for one address (case-insensitive)
    pub fn with_override(mut self, address: &str, report: RiskReport) -> Self {
        self.overrides.insert(address.to_lowercase(), report);
        self
    }

    /// Number of lookups served so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RiskClassifier for StaticClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, address: &str) -> ScreenResult<RiskReport> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if let Some(report) = self.overrides.get(&address.to_lowercase()) {
            debug!("[{}] override hit for {}", self.name, address);
            return Ok(report.clone());
        }

        match (&self.default_report, &self.failure) {
            (_, Some(message)) => Err(ScreenError::classifier_unavailable(message.clone())),
            (Some(report), None) => Ok(report.clone()),
            (None, None) => Err(ScreenError::classifier_unavailable("no report configured")),
        }
    }
}
