//! Type definitions for the token screener
//! All core data structures for token analysis

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::config::AnalysisMode;
use super::errors::{ScreenError, ScreenResult};

// ============================================
// Risk Level
// ============================================

/// Contract risk classification, ordered by increasing severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// No significant risks detected
    Safe,
    /// Minor concerns
    LowRisk,
    /// Proceed with caution
    MediumRisk,
    /// Significant caution required
    HighRisk,
    /// Avoid interaction
    Dangerous,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 5] = [
        RiskLevel::Safe,
        RiskLevel::LowRisk,
        RiskLevel::MediumRisk,
        RiskLevel::HighRisk,
        RiskLevel::Dangerous,
    ];

    /// Level assumed when no trustworthy lookup result exists
    pub fn fail_closed() -> Self {
        RiskLevel::HighRisk
    }

    /// Numeric projection: Safe=1 ... Dangerous=5
    pub fn ordinal(&self) -> u8 {
        match self {
            RiskLevel::Safe => 1,
            RiskLevel::LowRisk => 2,
            RiskLevel::MediumRisk => 3,
            RiskLevel::HighRisk => 4,
            RiskLevel::Dangerous => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::LowRisk => "LOW_RISK",
            RiskLevel::MediumRisk => "MEDIUM_RISK",
            RiskLevel::HighRisk => "HIGH_RISK",
            RiskLevel::Dangerous => "DANGEROUS",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "No significant risks detected.",
            RiskLevel::LowRisk => "Minor risks present, but generally safe.",
            RiskLevel::MediumRisk => "Moderate risks present, caution advised.",
            RiskLevel::HighRisk => "High risks present, significant caution required.",
            RiskLevel::Dangerous => "Severe risks present, avoid interaction.",
        }
    }

    pub fn log_message(&self) -> String {
        format!("Contract risk level: {} - {}", self.name(), self.description())
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "✅",
            RiskLevel::LowRisk => "🟡",
            RiskLevel::MediumRisk => "🟠",
            RiskLevel::HighRisk => "🔴",
            RiskLevel::Dangerous => "💀",
        }
    }

    /// Levels that reject a token in hard-cutoff mode
    pub fn is_blocking(&self) -> bool {
        matches!(self, RiskLevel::HighRisk | RiskLevel::Dangerous)
    }
}

impl Ord for RiskLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal().cmp(&other.ordinal())
    }
}

impl PartialOrd for RiskLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RiskLevel {
    type Err = ScreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        RiskLevel::ALL
            .into_iter()
            .find(|level| level.name() == wanted)
            .ok_or_else(|| ScreenError::invalid_config(format!("Unknown risk level: {}", s)))
    }
}

// ============================================
// Backend report & contract analysis
// ============================================

/// Response shape of a risk-lookup backend.
/// Missing `risk_level` deserializes fail-closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    #[serde(default = "RiskLevel::fail_closed")]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub is_honeypot: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_bundled: bool,
    #[serde(default)]
    pub potential_issues: Vec<String>,
}

impl RiskReport {
    pub fn new(risk_level: RiskLevel) -> Self {
        Self {
            risk_level,
            is_honeypot: false,
            is_verified: false,
            is_bundled: false,
            potential_issues: Vec::new(),
        }
    }

    pub fn verified(mut self) -> Self {
        self.is_verified = true;
        self
    }

    pub fn bundled(mut self) -> Self {
        self.is_bundled = true;
        self
    }

    pub fn honeypot(mut self) -> Self {
        self.is_honeypot = true;
        self
    }

    pub fn with_issue(mut self, issue: impl Into<String>) -> Self {
        self.potential_issues.push(issue.into());
        self
    }
}

/// Security assessment of a single contract address
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractAnalysis {
    pub address: String,
    pub risk_level: RiskLevel,
    pub is_honeypot: bool,
    pub is_verified: bool,
    pub is_bundled: bool,
    pub volume_legitimacy_score: f64,
    pub potential_issues: Vec<String>,
}

impl ContractAnalysis {
    /// Result used whenever the lookup is unavailable
    pub fn fail_closed(address: &str) -> Self {
        Self {
            address: address.to_string(),
            risk_level: RiskLevel::fail_closed(),
            is_honeypot: false,
            is_verified: false,
            is_bundled: false,
            volume_legitimacy_score: 0.0,
            potential_issues: Vec::new(),
        }
    }

    pub fn from_report(address: &str, report: RiskReport) -> Self {
        Self {
            address: address.to_string(),
            risk_level: report.risk_level,
            is_honeypot: report.is_honeypot,
            is_verified: report.is_verified,
            is_bundled: report.is_bundled,
            volume_legitimacy_score: 0.0,
            potential_issues: report.potential_issues,
        }
    }

    /// Bundled or high-severity contracts get rejected and blacklisted
    pub fn is_security_concern(&self) -> bool {
        self.is_bundled || self.risk_level.is_blocking()
    }
}

// ============================================
// Blacklist category
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlacklistCategory {
    Tokens,
    Developers,
    Contracts,
    Domains,
}

impl BlacklistCategory {
    pub const ALL: [BlacklistCategory; 4] = [
        BlacklistCategory::Tokens,
        BlacklistCategory::Developers,
        BlacklistCategory::Contracts,
        BlacklistCategory::Domains,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlacklistCategory::Tokens => "tokens",
            BlacklistCategory::Developers => "developers",
            BlacklistCategory::Contracts => "contracts",
            BlacklistCategory::Domains => "domains",
        }
    }

    /// Exact, case-sensitive key match
    pub fn parse(name: &str) -> Option<Self> {
        BlacklistCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == name)
    }
}

impl fmt::Display for BlacklistCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Token record & volume metrics
// ============================================

/// Raw token listing: a required `address` plus pass-through fields,
/// kept in their original order.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRecord {
    address: String,
    fields: Map<String, Value>,
}

impl TokenRecord {
    pub fn from_value(value: Value) -> ScreenResult<Self> {
        match value {
            Value::Object(fields) => Self::from_fields(fields),
            other => Err(ScreenError::malformed_token(format!(
                "token record must be an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_fields(fields: Map<String, Value>) -> ScreenResult<Self> {
        let address = match fields.get("address") {
            Some(Value::String(address)) => address.clone(),
            Some(other) => {
                return Err(ScreenError::missing_address(format!(
                    "`address` must be a string, got {}",
                    json_kind(other)
                )))
            }
            None => return Err(ScreenError::missing_address("token record has no `address`")),
        };

        Ok(Self { address, fields })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn symbol(&self) -> &str {
        self.fields
            .get("symbol")
            .and_then(Value::as_str)
            .unwrap_or("Unknown Token")
    }

    pub fn developer_address(&self) -> Option<&str> {
        self.fields.get("developer_address").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn volume_metrics(&self) -> VolumeMetrics {
        VolumeMetrics::from_fields(&self.fields)
    }
}

impl TryFrom<Value> for TokenRecord {
    type Error = ScreenError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl Serialize for TokenRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Volume view of a token record, recomputed per call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeMetrics {
    pub total_volume: f64,
    pub volume_1h: f64,
    pub volume_24h: f64,
    pub volume_liquidity_ratio: f64,
    /// 1.0 means "no spike"
    pub volume_spike_ratio: f64,
}

impl Default for VolumeMetrics {
    fn default() -> Self {
        Self {
            total_volume: 0.0,
            volume_1h: 0.0,
            volume_24h: 0.0,
            volume_liquidity_ratio: 0.0,
            volume_spike_ratio: 1.0,
        }
    }
}

impl VolumeMetrics {
    /// Missing or non-numeric fields fall back to their neutral defaults
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        let numeric = |key: &str, default: f64| {
            fields.get(key).and_then(Value::as_f64).unwrap_or(default)
        };

        Self {
            total_volume: numeric("volume", defaults.total_volume),
            volume_1h: numeric("volume_1h", defaults.volume_1h),
            volume_24h: numeric("volume_24h", defaults.volume_24h),
            volume_liquidity_ratio: numeric(
                "volume_liquidity_ratio",
                defaults.volume_liquidity_ratio,
            ),
            volume_spike_ratio: numeric("volume_spike", defaults.volume_spike_ratio),
        }
    }
}

// ============================================
// Analysis output
// ============================================

/// Per-backend lookup outcome recorded in advisory mode
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BackendOutcome {
    Report(RiskReport),
    Failed { error: String },
}

impl BackendOutcome {
    pub fn report(&self) -> Option<&RiskReport> {
        match self {
            BackendOutcome::Report(report) => Some(report),
            BackendOutcome::Failed { .. } => None,
        }
    }
}

/// A token that survived screening, enriched with risk metadata
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedToken {
    record: TokenRecord,
    mode: AnalysisMode,
    volume_score: f64,
    risk_level: RiskLevel,
    backend_results: BTreeMap<String, BackendOutcome>,
}

impl AnalyzedToken {
    pub fn hard_cutoff(record: TokenRecord, volume_score: f64, risk_level: RiskLevel) -> Self {
        Self {
            record,
            mode: AnalysisMode::HardCutoff,
            volume_score,
            risk_level,
            backend_results: BTreeMap::new(),
        }
    }

    pub fn advisory(
        record: TokenRecord,
        volume_score: f64,
        risk_level: RiskLevel,
        backend_results: BTreeMap<String, BackendOutcome>,
    ) -> Self {
        Self {
            record,
            mode: AnalysisMode::Advisory,
            volume_score,
            risk_level,
            backend_results,
        }
    }

    pub fn address(&self) -> &str {
        self.record.address()
    }

    pub fn symbol(&self) -> &str {
        self.record.symbol()
    }

    pub fn record(&self) -> &TokenRecord {
        &self.record
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    pub fn volume_score(&self) -> f64 {
        self.volume_score
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    pub fn backend_results(&self) -> &BTreeMap<String, BackendOutcome> {
        &self.backend_results
    }

    /// Output document: original fields plus the mode's enrichment keys
    pub fn to_map(&self) -> Map<String, Value> {
        let mut out = self.record.fields().clone();
        match self.mode {
            AnalysisMode::HardCutoff => {
                out.insert("volume_legitimacy_score".into(), Value::from(self.volume_score));
                out.insert("contract_risk_level".into(), Value::from(self.risk_level.name()));
            }
            AnalysisMode::Advisory => {
                let api_analysis: Map<String, Value> = self
                    .backend_results
                    .iter()
                    .map(|(name, outcome)| {
                        (name.clone(), serde_json::to_value(outcome).unwrap_or_default())
                    })
                    .collect();
                out.insert("api_analysis".into(), Value::Object(api_analysis));
                out.insert("volume_score".into(), Value::from(self.volume_score));
                out.insert("risk_level".into(), Value::from(self.risk_level.name()));
            }
        }
        out
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.to_map())
    }
}

impl Serialize for AnalyzedToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

/// Why a token was dropped
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    /// Address or developer already on a blacklist
    Blacklisted { category: BlacklistCategory },
    /// Volume legitimacy score under the threshold
    SuspiciousVolume { score: f64 },
    /// Bundled contract or blocking risk level
    SecurityConcern { risk_level: RiskLevel, is_bundled: bool },
    /// Malformed input or internal fault
    Fault { message: String },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Blacklisted { category } => {
                write!(f, "blacklisted ({})", category)
            }
            RejectionReason::SuspiciousVolume { score } => {
                write!(f, "suspicious volume (score {:.1})", score)
            }
            RejectionReason::SecurityConcern { risk_level, is_bundled } => {
                write!(f, "security concern ({}, bundled: {})", risk_level, is_bundled)
            }
            RejectionReason::Fault { message } => write!(f, "analysis fault: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// None when the record had no usable address
    pub address: Option<String>,
    pub symbol: String,
    pub reason: RejectionReason,
}

/// Terminal state of one token's pipeline run
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted(AnalyzedToken),
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }

    pub fn accepted(self) -> Option<AnalyzedToken> {
        match self {
            Verdict::Accepted(token) => Some(token),
            Verdict::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Verdict::Accepted(_) => None,
            Verdict::Rejected(rejection) => Some(rejection),
        }
    }
}
