//! Configuration module for the token screener
//!
//! Settings come from environment variables (a `.env` file is honoured).
//! Malformed numbers and booleans fall back to defaults; unknown mode or
//! policy names and half-configured backends are errors.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::errors::{ScreenError, ScreenResult};
use super::types::RiskLevel;
use crate::utils::constants::{
    DEFAULT_API_MAX_RETRIES, DEFAULT_API_TIMEOUT_SECS, DEFAULT_BLACKLIST_FILE,
    DEFAULT_CACHE_TTL_SECS, DEFAULT_CONCURRENCY, DEFAULT_RETRY_BASE_MS, MAX_CONCURRENCY,
};

/// Which risk-evaluation path the pipeline runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisMode {
    /// Single classifier, reject + blacklist on security concern
    #[default]
    HardCutoff,
    /// Every backend queried concurrently, results attached, no risk cutoff
    Advisory,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::HardCutoff => "hard_cutoff",
            AnalysisMode::Advisory => "advisory",
        }
    }
}

impl FromStr for AnalysisMode {
    type Err = ScreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "hard_cutoff" => Ok(AnalysisMode::HardCutoff),
            "advisory" => Ok(AnalysisMode::Advisory),
            other => Err(ScreenError::invalid_config(format!(
                "Unknown analysis mode: {} (expected hard_cutoff or advisory)",
                other
            ))),
        }
    }
}

/// Overall risk level attached in advisory mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevelPolicy {
    /// Always the same level
    Constant(RiskLevel),
    /// Most severe level among backends that answered; fail-closed if none did
    WorstBackend,
}

impl Default for RiskLevelPolicy {
    fn default() -> Self {
        RiskLevelPolicy::Constant(RiskLevel::MediumRisk)
    }
}

impl FromStr for RiskLevelPolicy {
    type Err = ScreenError;

    /// `constant`, `constant:<LEVEL>` or `worst_backend`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.split_once(':') {
            Some(("constant", level)) => Ok(RiskLevelPolicy::Constant(level.parse()?)),
            None if normalized == "constant" => Ok(RiskLevelPolicy::default()),
            None if normalized == "worst_backend" => Ok(RiskLevelPolicy::WorstBackend),
            _ => Err(ScreenError::invalid_config(format!(
                "Unknown risk level policy: {}",
                s
            ))),
        }
    }
}

/// One HTTP risk-lookup backend
#[derive(Clone)]
pub struct HttpClassifierConfig {
    pub name: String,
    /// Base URL; lookups go to `{endpoint}/tokens/{address}`
    pub endpoint: String,
    /// Bearer credential (never logged)
    pub api_key: String,
    pub timeout: Duration,
    /// Maximum attempts per lookup, including the first
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl HttpClassifierConfig {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
            max_retries: DEFAULT_API_MAX_RETRIES,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }
}

impl fmt::Debug for HttpClassifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClassifierConfig")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"***HIDDEN***")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .finish()
    }
}

/// Top-level screener configuration
#[derive(Debug, Clone)]
pub struct ScreenerConfig {
    pub blacklist_path: PathBuf,
    pub mode: AnalysisMode,
    pub risk_policy: RiskLevelPolicy,
    /// Reject tokens whose address or developer is already blacklisted. Off by default
    pub reject_blacklisted: bool,
    pub concurrency: usize,
    /// 0 disables the verdict cache
    pub cache_ttl_secs: u64,
    /// Empty means the deterministic stub backend
    pub backends: Vec<HttpClassifierConfig>,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            blacklist_path: PathBuf::from(DEFAULT_BLACKLIST_FILE),
            mode: AnalysisMode::default(),
            risk_policy: RiskLevelPolicy::default(),
            reject_blacklisted: false,
            concurrency: DEFAULT_CONCURRENCY,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            backends: Vec::new(),
        }
    }
}

impl ScreenerConfig {
    /// Load configuration from the process environment (and `.env`)
    pub fn from_env() -> ScreenResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ScreenResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mode = match get("ANALYSIS_MODE") {
            Some(raw) => raw.parse()?,
            None => defaults.mode,
        };

        let risk_policy = match get("RISK_LEVEL_POLICY") {
            Some(raw) => raw.parse()?,
            None => defaults.risk_policy,
        };

        let backends = match get("RISK_BACKENDS") {
            Some(names) => names
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| Self::backend_from_lookup(name, &get))
                .collect::<ScreenResult<Vec<_>>>()?,
            None => Vec::new(),
        };

        let config = Self {
            blacklist_path: get("BLACKLIST_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.blacklist_path),
            mode,
            risk_policy,
            reject_blacklisted: get("REJECT_BLACKLISTED")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reject_blacklisted),
            concurrency: get("SCREENER_CONCURRENCY")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(defaults.concurrency)
                .clamp(1, MAX_CONCURRENCY),
            cache_ttl_secs: get("RISK_CACHE_TTL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cache_ttl_secs),
            backends,
        };

        info!(
            "⚙️ Config: mode={}, backends={}, blacklist={}",
            config.mode.as_str(),
            config.backends.len(),
            config.blacklist_path.display()
        );

        Ok(config)
    }

    fn backend_from_lookup<G>(name: &str, get: &G) -> ScreenResult<HttpClassifierConfig>
    where
        G: Fn(&str) -> Option<String>,
    {
        let prefix = name.to_ascii_uppercase().replace('-', "_");
        let endpoint_key = format!("{}_API_ENDPOINT", prefix);
        let api_key_key = format!("{}_API_KEY", prefix);

        let endpoint = get(&endpoint_key).ok_or_else(|| ScreenError::missing_env(&endpoint_key))?;
        let api_key = get(&api_key_key).ok_or_else(|| ScreenError::missing_env(&api_key_key))?;

        let timeout_secs = get(&format!("{}_API_TIMEOUT_SECS", prefix))
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_API_TIMEOUT_SECS);
        let max_retries = get(&format!("{}_API_MAX_RETRIES", prefix))
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_API_MAX_RETRIES);

        Ok(HttpClassifierConfig::new(name, endpoint, api_key)
            .with_timeout(Duration::from_secs(timeout_secs))
            .with_max_retries(max_retries))
    }
}
