//! Constants Module - Single Source of Truth
//!
//! Policy thresholds, defaults and retry tuning shared across the crate.

use std::time::Duration;

// ============================================
// APPLICATION CONSTANTS
// ============================================

pub const APP_NAME: &str = "TokenSentry";

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for risk API requests
pub const USER_AGENT: &str = concat!("TokenSentry/", env!("CARGO_PKG_VERSION"));

// ============================================
// SCREENING POLICY
// ============================================

/// Minimum volume legitimacy score a token needs to pass (inclusive)
pub const VOLUME_SCORE_THRESHOLD: f64 = 0.5;

/// Total volume a legitimate listing trades above
pub const MIN_TOTAL_VOLUME: f64 = 1000.0;

/// Volume/liquidity ratio a legitimate listing trades above
pub const MIN_VOLUME_LIQUIDITY_RATIO: f64 = 0.1;

/// Spike ratio at or above which volume looks manufactured
pub const MAX_VOLUME_SPIKE_RATIO: f64 = 2.0;

// ============================================
// STORAGE
// ============================================

pub const DEFAULT_BLACKLIST_FILE: &str = "blacklists.json";

// ============================================
// RISK API
// ============================================

/// Default request timeout (seconds)
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

/// Default attempts per lookup, including the first
pub const DEFAULT_API_MAX_RETRIES: u32 = 3;

/// First backoff delay; doubles per attempt
pub const DEFAULT_RETRY_BASE_MS: u64 = 500;

/// Backoff cap
pub const MAX_RETRY_DELAY_MS: u64 = 8_000;

/// Random jitter applied to each backoff delay (±percent)
pub const RETRY_JITTER_PERCENT: u64 = 20;

/// Name reported by the deterministic stub backend
pub const STUB_BACKEND_NAME: &str = "stub";

// ============================================
// PIPELINE
// ============================================

pub const DEFAULT_CONCURRENCY: usize = 8;

pub const MAX_CONCURRENCY: usize = 64;

/// Default verdict cache TTL (seconds)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Cache misses between sweeps of expired entries
pub const CACHE_CLEANUP_INTERVAL: u64 = 256;

/// Backoff delay before attempt `attempt` (1-based retries), without jitter
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
    let millis = (base.as_millis() as u64).saturating_mul(factor);
    Duration::from_millis(millis.min(MAX_RETRY_DELAY_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let base = Duration::from_millis(500);
        assert_eq!(retry_delay(base, 1), Duration::from_millis(500));
        assert_eq!(retry_delay(base, 2), Duration::from_millis(1000));
        assert_eq!(retry_delay(base, 3), Duration::from_millis(2000));
        assert_eq!(retry_delay(base, 10), Duration::from_millis(MAX_RETRY_DELAY_MS));
    }
}
