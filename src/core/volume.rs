//! Volume legitimacy scoring
//!
//! Five equal-weight checks; the score is the fraction that pass, so it is
//! always one of {0.0, 0.2, 0.4, 0.6, 0.8, 1.0}.

use tracing::error;

use crate::models::VolumeMetrics;
use crate::utils::constants::{MAX_VOLUME_SPIKE_RATIO, MIN_TOTAL_VOLUME, MIN_VOLUME_LIQUIDITY_RATIO};

/// One named legitimacy check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeCheck {
    pub name: &'static str,
    pub passed: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeScorer;

impl VolumeScorer {
    pub fn new() -> Self {
        Self
    }

    /// Legitimacy score in [0, 1]. Fails closed (0.0) on non-finite input.
    pub fn score(&self, metrics: &VolumeMetrics) -> f64 {
        if let Some(field) = Self::non_finite_field(metrics) {
            error!("Volume analysis error: `{}` is not a finite number", field);
            return 0.0;
        }

        let checks = self.checks(metrics);
        let passed = checks.iter().filter(|c| c.passed).count();
        passed as f64 / checks.len() as f64
    }

    pub fn checks(&self, metrics: &VolumeMetrics) -> [VolumeCheck; 5] {
        [
            VolumeCheck {
                name: "total_volume",
                passed: metrics.total_volume > MIN_TOTAL_VOLUME,
            },
            VolumeCheck {
                name: "volume_1h",
                passed: metrics.volume_1h > 0.0,
            },
            VolumeCheck {
                name: "volume_24h",
                passed: metrics.volume_24h > 0.0,
            },
            VolumeCheck {
                name: "volume_liquidity_ratio",
                passed: metrics.volume_liquidity_ratio > MIN_VOLUME_LIQUIDITY_RATIO,
            },
            VolumeCheck {
                name: "volume_spike_ratio",
                passed: metrics.volume_spike_ratio < MAX_VOLUME_SPIKE_RATIO,
            },
        ]
    }

    fn non_finite_field(metrics: &VolumeMetrics) -> Option<&'static str> {
        [
            ("total_volume", metrics.total_volume),
            ("volume_1h", metrics.volume_1h),
            ("volume_24h", metrics.volume_24h),
            ("volume_liquidity_ratio", metrics.volume_liquidity_ratio),
            ("volume_spike_ratio", metrics.volume_spike_ratio),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite())
        .map(|(name, _)| name)
    }
}
