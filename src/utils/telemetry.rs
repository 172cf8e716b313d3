//! Screening telemetry
//!
//! Lock-free counters shared by every pipeline worker. Nothing here holds
//! token addresses; only outcome counts and latencies.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::{RejectionReason, RiskLevel};

/// Snapshot of the counters for reporting
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryStats {
    pub total_analyzed: u64,
    pub accepted: u64,
    pub rejected_blacklisted: u64,
    pub rejected_volume: u64,
    pub rejected_security: u64,
    pub faults: u64,
    /// Risk levels seen from the hard-cutoff classifier
    pub risk_levels: BTreeMap<String, u64>,
    pub backend_failures: u64,
    pub blacklist_additions: u64,
    pub avg_latency_ms: f64,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

impl TelemetryStats {
    pub fn rejected(&self) -> u64 {
        self.rejected_blacklisted + self.rejected_volume + self.rejected_security + self.faults
    }

    /// Percentage of analyzed tokens that survived
    pub fn acceptance_rate(&self) -> f64 {
        if self.total_analyzed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.total_analyzed as f64 * 100.0
        }
    }

    pub fn summary(&self) -> String {
        let seconds = (self.period_end - self.period_start).num_milliseconds() as f64 / 1000.0;
        format!(
            r#"
╔══════════════════════════════════════════════╗
║        🛡️ TOKEN SENTRY - SCREENING REPORT     ║
╠══════════════════════════════════════════════╣
║   ⏱️ Elapsed:               {:>10.2}s        ║
║   🔍 Tokens analyzed:       {:>10}         ║
║   ✅ Accepted:              {:>10}         ║
║   🚫 Blacklisted:           {:>10}         ║
║   📉 Suspicious volume:     {:>10}         ║
║   🔴 Security concern:      {:>10}         ║
║   ❌ Faults:                {:>10}         ║
║   ⚠️ Backend failures:      {:>10}         ║
║   📋 Blacklist additions:   {:>10}         ║
║   ⚡ Avg latency:           {:>10.2}ms       ║
╚══════════════════════════════════════════════╝
"#,
            seconds,
            self.total_analyzed,
            self.accepted,
            self.rejected_blacklisted,
            self.rejected_volume,
            self.rejected_security,
            self.faults,
            self.backend_failures,
            self.blacklist_additions,
            self.avg_latency_ms,
        )
    }
}

pub struct ScreeningTelemetry {
    total_analyzed: AtomicU64,
    accepted: AtomicU64,
    rejected_blacklisted: AtomicU64,
    rejected_volume: AtomicU64,
    rejected_security: AtomicU64,
    faults: AtomicU64,
    /// Indexed by `RiskLevel::ordinal() - 1`
    risk_levels: [AtomicU64; 5],
    backend_failures: AtomicU64,
    blacklist_additions: AtomicU64,
    total_latency_ms: AtomicU64,
    session_start: DateTime<Utc>,
}

impl Default for ScreeningTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreeningTelemetry {
    pub fn new() -> Self {
        Self {
            total_analyzed: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            rejected_blacklisted: AtomicU64::new(0),
            rejected_volume: AtomicU64::new(0),
            rejected_security: AtomicU64::new(0),
            faults: AtomicU64::new(0),
            risk_levels: Default::default(),
            backend_failures: AtomicU64::new(0),
            blacklist_additions: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    pub fn record_accepted(&self, latency_ms: u64) {
        self.total_analyzed.fetch_add(1, Ordering::Relaxed);
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, reason: &RejectionReason, latency_ms: u64) {
        self.total_analyzed.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);

        let counter = match reason {
            RejectionReason::Blacklisted { .. } => &self.rejected_blacklisted,
            RejectionReason::SuspiciousVolume { .. } => &self.rejected_volume,
            RejectionReason::SecurityConcern { .. } => &self.rejected_security,
            RejectionReason::Fault { .. } => &self.faults,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_risk_level(&self, level: RiskLevel) {
        self.risk_levels[usize::from(level.ordinal() - 1)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backend_failure(&self) {
        self.backend_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blacklist_addition(&self) {
        self.blacklist_additions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> TelemetryStats {
        let total_analyzed = self.total_analyzed.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);
        let avg_latency_ms = if total_analyzed > 0 {
            total_latency as f64 / total_analyzed as f64
        } else {
            0.0
        };

        let risk_levels = RiskLevel::ALL
            .iter()
            .zip(self.risk_levels.iter())
            .map(|(level, count)| (level.name().to_string(), count.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();

        TelemetryStats {
            total_analyzed,
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected_blacklisted: self.rejected_blacklisted.load(Ordering::Relaxed),
            rejected_volume: self.rejected_volume.load(Ordering::Relaxed),
            rejected_security: self.rejected_security.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            risk_levels,
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
            blacklist_additions: self.blacklist_additions.load(Ordering::Relaxed),
            avg_latency_ms,
            period_start: self.session_start,
            period_end: Utc::now(),
        }
    }

    pub fn summary(&self) -> String {
        self.stats().summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlacklistCategory;

    #[test]
    fn test_counters() {
        let telemetry = ScreeningTelemetry::new();
        telemetry.record_accepted(10);
        telemetry.record_rejection(&RejectionReason::SuspiciousVolume { score: 0.2 }, 20);
        telemetry.record_rejection(
            &RejectionReason::Blacklisted {
                category: BlacklistCategory::Tokens,
            },
            0,
        );
        telemetry.record_rejection(
            &RejectionReason::Fault {
                message: "boom".into(),
            },
            0,
        );
        telemetry.record_risk_level(RiskLevel::LowRisk);
        telemetry.record_risk_level(RiskLevel::LowRisk);
        telemetry.record_blacklist_addition();

        let stats = telemetry.stats();
        assert_eq!(stats.total_analyzed, 4);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected(), 3);
        assert_eq!(stats.rejected_volume, 1);
        assert_eq!(stats.rejected_blacklisted, 1);
        assert_eq!(stats.faults, 1);
        assert_eq!(stats.risk_levels.get("LOW_RISK"), Some(&2));
        assert!(!stats.risk_levels.contains_key("SAFE"));
        assert_eq!(stats.blacklist_additions, 1);
        assert_eq!(stats.avg_latency_ms, 7.5);
        assert_eq!(stats.acceptance_rate(), 25.0);
    }

    #[test]
    fn test_empty_stats_serialize() {
        let stats = ScreeningTelemetry::new().stats();
        assert_eq!(stats.acceptance_rate(), 0.0);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_analyzed"], 0);
        assert!(json["period_start"].is_string());
        assert!(stats.summary().contains("SCREENING REPORT"));
    }
}
