//! Token analysis pipeline
//!
//! Per token: blacklist pre-check → volume score → risk evaluation → verdict.
//! Two risk paths exist:
//! - hard cutoff: the primary classifier decides; bundled or HIGH_RISK and
//!   above rejects the token and blacklists its address and developer
//! - advisory: every backend is queried concurrently and the per-backend
//!   results are attached; no risk cutoff, no blacklist writes
//!
//! Nothing escapes `analyze_one`: errors and panics become fault rejections.

use futures_util::future::{join_all, ready};
use futures_util::stream::{self, StreamExt};
use futures_util::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use super::blacklist::BlacklistStore;
use super::volume::VolumeScorer;
use crate::models::{
    AnalysisMode, AnalyzedToken, BackendOutcome, BlacklistCategory, ContractAnalysis,
    ErrorCode, Rejection, RejectionReason, RiskLevel, RiskLevelPolicy, ScreenError,
    ScreenResult, ScreenerConfig, TokenRecord, Verdict,
};
use crate::providers::{HttpRiskClassifier, RiskClassifier, StaticClassifier};
use crate::utils::cache::CachedClassifier;
use crate::utils::constants::{MAX_CONCURRENCY, VOLUME_SCORE_THRESHOLD};
use crate::utils::telemetry::ScreeningTelemetry;

pub struct TokenAnalysisPipeline {
    mode: AnalysisMode,
    risk_policy: RiskLevelPolicy,
    reject_blacklisted: bool,
    scorer: VolumeScorer,
    blacklist: Arc<BlacklistStore>,
    /// First entry is the hard-cutoff classifier; never empty
    classifiers: Vec<Arc<dyn RiskClassifier>>,
    telemetry: Arc<ScreeningTelemetry>,
}

impl TokenAnalysisPipeline {
    /// Hard-cutoff pipeline; the blacklist pre-check is off until
    /// [`with_blacklist_precheck`](Self::with_blacklist_precheck) enables it.
    /// An empty classifier list falls back to the deterministic stub.
    pub fn new(blacklist: Arc<BlacklistStore>, classifiers: Vec<Arc<dyn RiskClassifier>>) -> Self {
        let classifiers = if classifiers.is_empty() {
            vec![Arc::new(StaticClassifier::default()) as Arc<dyn RiskClassifier>]
        } else {
            classifiers
        };

        Self {
            mode: AnalysisMode::default(),
            risk_policy: RiskLevelPolicy::default(),
            reject_blacklisted: false,
            scorer: VolumeScorer::new(),
            blacklist,
            classifiers,
            telemetry: Arc::new(ScreeningTelemetry::new()),
        }
    }

    /// Wire the pipeline from configuration: opens the blacklist file and
    /// builds one (optionally cached) HTTP classifier per backend.
    pub fn from_config(config: &ScreenerConfig) -> ScreenResult<Self> {
        let blacklist = Arc::new(BlacklistStore::open(config.blacklist_path.clone()));

        let mut classifiers: Vec<Arc<dyn RiskClassifier>> = Vec::new();
        for backend in &config.backends {
            let http: Arc<dyn RiskClassifier> = Arc::new(HttpRiskClassifier::new(backend.clone())?);
            classifiers.push(Self::with_cache(http, config.cache_ttl_secs));
        }
        if classifiers.is_empty() {
            info!("No risk backends configured, using the deterministic stub");
        }

        Ok(Self::new(blacklist, classifiers)
            .with_mode(config.mode)
            .with_risk_policy(config.risk_policy)
            .with_blacklist_precheck(config.reject_blacklisted))
    }

    fn with_cache(classifier: Arc<dyn RiskClassifier>, ttl_secs: u64) -> Arc<dyn RiskClassifier> {
        if ttl_secs == 0 {
            classifier
        } else {
            Arc::new(CachedClassifier::new(classifier, Duration::from_secs(ttl_secs)))
        }
    }

    pub fn with_mode(mut self, mode: AnalysisMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_risk_policy(mut self, policy: RiskLevelPolicy) -> Self {
        self.risk_policy = policy;
        self
    }

    pub fn with_blacklist_precheck(mut self, enabled: bool) -> Self {
        self.reject_blacklisted = enabled;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<ScreeningTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    pub fn blacklist(&self) -> &Arc<BlacklistStore> {
        &self.blacklist
    }

    pub fn telemetry(&self) -> &Arc<ScreeningTelemetry> {
        &self.telemetry
    }

    /// Screen one raw token record
    pub async fn analyze_one(&self, token: &Value) -> Verdict {
        let address = token.get("address").and_then(Value::as_str).map(str::to_string);
        let symbol = token
            .get("symbol")
            .and_then(Value::as_str)
            .unwrap_or("Unknown Token")
            .to_string();

        let work = async {
            let record = TokenRecord::from_value(token.clone())?;
            self.evaluate(record).await
        };
        self.guarded(work, address, symbol).await
    }

    /// Screen an already-parsed record
    pub async fn analyze_record(&self, record: TokenRecord) -> Verdict {
        let address = Some(record.address().to_string());
        let symbol = record.symbol().to_string();
        self.guarded(self.evaluate(record), address, symbol).await
    }

    /// Sequential batch; survivors in input order
    pub async fn analyze_many(&self, tokens: &[Value]) -> Vec<AnalyzedToken> {
        let mut accepted = Vec::with_capacity(tokens.len());
        for token in tokens {
            if let Verdict::Accepted(analyzed) = self.analyze_one(token).await {
                accepted.push(analyzed);
            }
        }
        Self::log_batch(accepted.len(), tokens.len());
        accepted
    }

    /// Up to `concurrency` tokens in flight at once; survivors in input
    /// order. Dropping the future cancels the pending lookups.
    pub async fn analyze_many_concurrent(
        &self,
        tokens: &[Value],
        concurrency: usize,
    ) -> Vec<AnalyzedToken> {
        let verdicts = tokens.iter().map(|token| self.analyze_one(token));
        let accepted: Vec<AnalyzedToken> = stream::iter(verdicts)
            .buffered(concurrency.clamp(1, MAX_CONCURRENCY))
            .filter_map(|verdict| ready(verdict.accepted()))
            .collect()
            .await;
        Self::log_batch(accepted.len(), tokens.len());
        accepted
    }

    fn log_batch(accepted: usize, total: usize) {
        info!("📊 Analysis complete: {}/{} tokens passed screening", accepted, total);
    }

    async fn guarded<F>(&self, work: F, address: Option<String>, symbol: String) -> Verdict
    where
        F: Future<Output = ScreenResult<Verdict>>,
    {
        let started = Instant::now();

        let verdict = match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                error!("❌ Error analyzing token {}: {}", symbol, e);
                Self::fault(address, symbol, e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("❌ Analysis of token {} panicked: {}", symbol, message);
                Self::fault(address, symbol, message)
            }
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        match &verdict {
            Verdict::Accepted(_) => self.telemetry.record_accepted(latency_ms),
            Verdict::Rejected(rejection) => {
                self.telemetry.record_rejection(&rejection.reason, latency_ms)
            }
        }
        verdict
    }

    fn fault(address: Option<String>, symbol: String, message: String) -> Verdict {
        Verdict::Rejected(Rejection {
            address,
            symbol,
            reason: RejectionReason::Fault { message },
        })
    }

    async fn evaluate(&self, record: TokenRecord) -> ScreenResult<Verdict> {
        let symbol = record.symbol().to_string();
        info!("🔍 Analyzing token: {} ({})", symbol, record.address());

        if self.reject_blacklisted {
            if let Some(category) = self.blacklisted_category(&record) {
                warn!("🚫 Token {} rejected: {} already blacklisted", symbol, category);
                return Ok(Self::reject(&record, RejectionReason::Blacklisted { category }));
            }
        }

        let score = self.scorer.score(&record.volume_metrics());
        if score < VOLUME_SCORE_THRESHOLD {
            warn!("⚠️ Token {} failed volume analysis (score: {:.1})", symbol, score);
            return Ok(Self::reject(&record, RejectionReason::SuspiciousVolume { score }));
        }

        match self.mode {
            AnalysisMode::HardCutoff => Ok(self.hard_cutoff(record, score).await),
            AnalysisMode::Advisory => Ok(self.advisory(record, score).await),
        }
    }

    fn blacklisted_category(&self, record: &TokenRecord) -> Option<BlacklistCategory> {
        if self.blacklist.contains(BlacklistCategory::Tokens.as_str(), record.address()) {
            return Some(BlacklistCategory::Tokens);
        }
        record
            .developer_address()
            .filter(|developer| !developer.is_empty())
            .filter(|developer| {
                self.blacklist
                    .contains(BlacklistCategory::Developers.as_str(), developer)
            })
            .map(|_| BlacklistCategory::Developers)
    }

    async fn hard_cutoff(&self, record: TokenRecord, score: f64) -> Verdict {
        let mut analysis = self.classify_primary(record.address()).await;
        analysis.volume_legitimacy_score = score;

        let level = analysis.risk_level;
        self.telemetry.record_risk_level(level);
        info!("{} {}", level.emoji(), level.log_message());

        if analysis.is_security_concern() {
            warn!(
                "🚫 Token {} rejected due to security concerns (risk: {}, bundled: {})",
                record.symbol(),
                level,
                analysis.is_bundled
            );
            self.blacklist
                .add(BlacklistCategory::Tokens.as_str(), record.address());
            self.blacklist.add(
                BlacklistCategory::Developers.as_str(),
                record.developer_address().unwrap_or_default(),
            );
            self.telemetry.record_blacklist_addition();

            return Self::reject(
                &record,
                RejectionReason::SecurityConcern {
                    risk_level: level,
                    is_bundled: analysis.is_bundled,
                },
            );
        }

        info!("✅ Token {} passed screening", record.symbol());
        Verdict::Accepted(AnalyzedToken::hard_cutoff(record, score, level))
    }

    /// Primary classifier's fail-closed answer; failures are counted
    async fn classify_primary(&self, address: &str) -> ContractAnalysis {
        let (analysis, failure) = match self.classifiers.first() {
            Some(classifier) => classifier.classify_outcome(address).await,
            None => (
                ContractAnalysis::fail_closed(address),
                Some(ScreenError::classifier_unavailable("No risk classifier configured")),
            ),
        };

        if failure.is_some() {
            self.telemetry.record_backend_failure();
        }
        analysis
    }

    async fn advisory(&self, record: TokenRecord, score: f64) -> Verdict {
        let address = record.address();
        let lookups = self.classifiers.iter().map(|classifier| async move {
            (classifier.name().to_string(), classifier.lookup(address).await)
        });

        let mut results = BTreeMap::new();
        for (name, outcome) in join_all(lookups).await {
            let outcome = match outcome {
                Ok(report) => BackendOutcome::Report(report),
                Err(e) => {
                    warn!("⚠️ Risk backend {} failed for {}: {}", name, address, e);
                    self.telemetry.record_backend_failure();
                    BackendOutcome::Failed { error: e.to_string() }
                }
            };
            results.insert(name, outcome);
        }

        let level = self.overall_risk_level(&results);
        info!("✅ Token {} enriched by {} backends", record.symbol(), results.len());
        Verdict::Accepted(AnalyzedToken::advisory(record, score, level, results))
    }

    fn overall_risk_level(&self, results: &BTreeMap<String, BackendOutcome>) -> RiskLevel {
        match self.risk_policy {
            RiskLevelPolicy::Constant(level) => level,
            RiskLevelPolicy::WorstBackend => results
                .values()
                .filter_map(BackendOutcome::report)
                .map(|report| report.risk_level)
                .max()
                .unwrap_or_else(RiskLevel::fail_closed),
        }
    }

    fn reject(record: &TokenRecord, reason: RejectionReason) -> Verdict {
        Verdict::Rejected(Rejection {
            address: Some(record.address().to_string()),
            symbol: record.symbol().to_string(),
            reason,
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Synchronous facade over [`TokenAnalysisPipeline`].
///
/// Owns a current-thread runtime, so it must not be used from inside an
/// async context.
pub struct BlockingPipeline {
    inner: TokenAnalysisPipeline,
    runtime: tokio::runtime::Runtime,
}

impl BlockingPipeline {
    pub fn new(inner: TokenAnalysisPipeline) -> ScreenResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ScreenError::with_source(ErrorCode::Unknown, "Cannot start runtime", e))?;
        Ok(Self { inner, runtime })
    }

    pub fn analyze_one(&self, token: &Value) -> Verdict {
        self.runtime.block_on(self.inner.analyze_one(token))
    }

    pub fn analyze_many(&self, tokens: &[Value]) -> Vec<AnalyzedToken> {
        self.runtime.block_on(self.inner.analyze_many(tokens))
    }

    pub fn pipeline(&self) -> &TokenAnalysisPipeline {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::blacklist::Blacklist;
    use crate::models::RiskReport;
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    fn good_token(address: &str) -> Value {
        json!({
            "address": address,
            "symbol": "GOOD",
            "volume": 5000,
            "volume_1h": 500,
            "volume_24h": 10000,
            "volume_liquidity_ratio": 0.2,
            "volume_spike": 1.5,
        })
    }

    fn bad_volume_token(address: &str) -> Value {
        json!({
            "address": address,
            "symbol": "WASH",
            "volume": 100,
            "volume_1h": 0,
            "volume_24h": 0,
            "volume_liquidity_ratio": 0.05,
            "volume_spike": 3,
        })
    }

    struct Fixture {
        _dir: TempDir,
        store: Arc<BlacklistStore>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BlacklistStore::open(dir.path().join("blacklists.json")));
        Fixture { _dir: dir, store }
    }

    fn pipeline_with(fx: &Fixture, classifier: Arc<StaticClassifier>) -> TokenAnalysisPipeline {
        TokenAnalysisPipeline::new(fx.store.clone(), vec![classifier as Arc<dyn RiskClassifier>])
    }

    #[tokio::test]
    async fn test_accepts_legitimate_low_risk_token() {
        let fx = fixture();
        let stub = Arc::new(StaticClassifier::new(RiskReport::new(RiskLevel::LowRisk)));
        let pipeline = pipeline_with(&fx, stub.clone());

        let verdict = pipeline.analyze_one(&good_token("0xAAA")).await;
        let token = verdict.accepted().unwrap();
        let out = token.to_value();

        assert_eq!(out["volume_legitimacy_score"], json!(1.0));
        assert_eq!(out["contract_risk_level"], json!("LOW_RISK"));
        assert_eq!(out["symbol"], json!("GOOD"));
        assert_eq!(stub.calls(), 1);
        assert!(fx.store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_suspicious_volume_skips_classifier() {
        let fx = fixture();
        let stub = Arc::new(StaticClassifier::default());
        let pipeline = pipeline_with(&fx, stub.clone());

        let verdict = pipeline.analyze_one(&bad_volume_token("0xBBB")).await;

        assert!(!verdict.is_accepted());
        assert!(matches!(
            verdict.rejection().unwrap().reason,
            RejectionReason::SuspiciousVolume { .. }
        ));
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_high_risk_rejects_and_blacklists() {
        let fx = fixture();
        let stub = Arc::new(StaticClassifier::new(RiskReport::new(RiskLevel::HighRisk)));
        let pipeline = pipeline_with(&fx, stub);

        let mut token = good_token("0xCCC");
        token["developer_address"] = json!("0xDEV");
        let verdict = pipeline.analyze_one(&token).await;

        assert!(!verdict.is_accepted());
        assert!(fx.store.contains("tokens", "0xCCC"));
        assert!(fx.store.contains("developers", "0xdev"));
        assert_eq!(pipeline.telemetry().stats().rejected_security, 1);
    }

    #[tokio::test]
    async fn test_bundled_low_risk_is_still_rejected() {
        let fx = fixture();
        let stub = Arc::new(StaticClassifier::new(RiskReport::new(RiskLevel::Safe).bundled()));
        let pipeline = pipeline_with(&fx, stub);

        let verdict = pipeline.analyze_one(&good_token("0xBUN")).await;

        match &verdict.rejection().unwrap().reason {
            RejectionReason::SecurityConcern { risk_level, is_bundled } => {
                assert_eq!(*risk_level, RiskLevel::Safe);
                assert!(*is_bundled);
            }
            other => panic!("unexpected reason: {:?}", other),
        }
        assert!(fx.store.contains("tokens", "0xbun"));
    }

    #[tokio::test]
    async fn test_medium_risk_passes_hard_cutoff() {
        let fx = fixture();
        let stub = Arc::new(StaticClassifier::new(RiskReport::new(RiskLevel::MediumRisk)));
        let pipeline = pipeline_with(&fx, stub);

        let token = pipeline.analyze_one(&good_token("0xMED")).await.accepted().unwrap();
        assert_eq!(token.risk_level(), RiskLevel::MediumRisk);

        let record = TokenRecord::from_value(good_token("0xMED2")).unwrap();
        let token = pipeline.analyze_record(record).await.accepted().unwrap();
        assert_eq!(token.address(), "0xMED2");
        assert_eq!(token.mode(), AnalysisMode::HardCutoff);
    }

    #[tokio::test]
    async fn test_classifier_failure_fails_closed() {
        let fx = fixture();
        let pipeline = pipeline_with(&fx, Arc::new(StaticClassifier::failing("down")));

        let verdict = pipeline.analyze_one(&good_token("0xDDD")).await;

        assert!(!verdict.is_accepted());
        assert!(fx.store.contains("tokens", "0xddd"));
        assert_eq!(pipeline.telemetry().stats().backend_failures, 1);
    }

    #[tokio::test]
    async fn test_score_boundary() {
        let fx = fixture();
        let pipeline = pipeline_with(&fx, Arc::new(StaticClassifier::default()));

        // 0.4: only the 1h and 24h checks pass
        let two_of_five = json!({
            "address": "0x04",
            "volume_1h": 1,
            "volume_24h": 1,
            "volume_spike": 5,
        });
        // 0.6: 1h, 24h and spike pass
        let three_of_five = json!({ "address": "0x06", "volume_1h": 1, "volume_24h": 1 });

        assert!(!pipeline.analyze_one(&two_of_five).await.is_accepted());
        let accepted = pipeline.analyze_one(&three_of_five).await.accepted().unwrap();
        assert_eq!(accepted.volume_score(), 0.6);
    }

    #[tokio::test]
    async fn test_missing_address_is_a_fault() {
        let fx = fixture();
        let pipeline = pipeline_with(&fx, Arc::new(StaticClassifier::default()));

        let verdict = pipeline.analyze_one(&json!({ "symbol": "ANON", "volume": 5000 })).await;
        let rejection = verdict.rejection().unwrap();

        assert_eq!(rejection.address, None);
        assert_eq!(rejection.symbol, "ANON");
        assert!(matches!(rejection.reason, RejectionReason::Fault { .. }));
        assert_eq!(pipeline.telemetry().stats().faults, 1);
    }

    struct PanickingClassifier;

    #[async_trait]
    impl RiskClassifier for PanickingClassifier {
        fn name(&self) -> &str {
            "panicky"
        }

        async fn lookup(&self, _address: &str) -> ScreenResult<RiskReport> {
            panic!("classifier bug")
        }
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let fx = fixture();
        let panicky: Arc<dyn RiskClassifier> = Arc::new(PanickingClassifier);
        let pipeline = TokenAnalysisPipeline::new(fx.store.clone(), vec![panicky]);

        let verdict = pipeline.analyze_one(&good_token("0xEEE")).await;
        match &verdict.rejection().unwrap().reason {
            RejectionReason::Fault { message } => assert_eq!(message, "classifier bug"),
            other => panic!("unexpected reason: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blacklisted_token_rejected_before_scoring() {
        let fx = fixture();
        fx.store.add("tokens", "0xFFF");
        fx.store.add("developers", "0xBADDEV");
        let stub = Arc::new(StaticClassifier::default());
        let pipeline = pipeline_with(&fx, stub.clone()).with_blacklist_precheck(true);

        let by_token = pipeline.analyze_one(&good_token("0xfff")).await;
        let mut dev_token = good_token("0x123");
        dev_token["developer_address"] = json!("0xbaddev");
        let by_dev = pipeline.analyze_one(&dev_token).await;

        assert_eq!(
            by_token.rejection().unwrap().reason,
            RejectionReason::Blacklisted { category: BlacklistCategory::Tokens }
        );
        assert_eq!(
            by_dev.rejection().unwrap().reason,
            RejectionReason::Blacklisted { category: BlacklistCategory::Developers }
        );
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_blacklisted_token_accepted_by_default() {
        let fx = fixture();
        fx.store.add("tokens", "0xAAA");
        let stub = Arc::new(StaticClassifier::new(RiskReport::new(RiskLevel::LowRisk)));
        let pipeline = pipeline_with(&fx, stub.clone());

        let token = pipeline.analyze_one(&good_token("0xAAA")).await.accepted().unwrap();
        let out = token.to_value();

        assert_eq!(out["volume_legitimacy_score"], json!(1.0));
        assert_eq!(out["contract_risk_level"], json!("LOW_RISK"));
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_batch_keeps_order_of_survivors() {
        let fx = fixture();
        let stub = Arc::new(
            StaticClassifier::default()
                .with_override("0xRISKY", RiskReport::new(RiskLevel::Dangerous)),
        );
        let pipeline = pipeline_with(&fx, stub);

        let tokens = vec![
            bad_volume_token("0x1"),
            good_token("0x2"),
            good_token("0xRISKY"),
            json!("not an object"),
            good_token("0x3"),
        ];

        let sequential: Vec<String> = pipeline
            .analyze_many(&tokens)
            .await
            .iter()
            .map(|t| t.address().to_string())
            .collect();
        assert_eq!(sequential, vec!["0x2", "0x3"]);
    }

    #[tokio::test]
    async fn test_concurrent_batch_matches_sequential() {
        let fx = fixture();
        let pipeline = pipeline_with(&fx, Arc::new(StaticClassifier::default()));

        let tokens: Vec<Value> = (0..40)
            .map(|i| {
                if i % 3 == 0 {
                    bad_volume_token(&format!("0x{:02}", i))
                } else {
                    good_token(&format!("0x{:02}", i))
                }
            })
            .collect();

        let concurrent: Vec<String> = pipeline
            .analyze_many_concurrent(&tokens, 8)
            .await
            .iter()
            .map(|t| t.address().to_string())
            .collect();
        let expected: Vec<String> = (0..40)
            .filter(|i| i % 3 != 0)
            .map(|i| format!("0x{:02}", i))
            .collect();
        assert_eq!(concurrent, expected);
    }

    /// Never answers for `0xhang*`; HIGH_RISK for everything else
    struct StallingClassifier;

    #[async_trait]
    impl RiskClassifier for StallingClassifier {
        fn name(&self) -> &str {
            "stalling"
        }

        async fn lookup(&self, address: &str) -> ScreenResult<RiskReport> {
            if address.starts_with("0xhang") {
                std::future::pending::<()>().await;
            }
            Ok(RiskReport::new(RiskLevel::HighRisk))
        }
    }

    #[tokio::test]
    async fn test_dropped_batch_leaves_blacklist_file_consistent() {
        let fx = fixture();
        let stalling: Arc<dyn RiskClassifier> = Arc::new(StallingClassifier);
        let pipeline = TokenAnalysisPipeline::new(fx.store.clone(), vec![stalling]);

        let tokens: Vec<Value> = (0..8)
            .map(|i| {
                let prefix = if i == 1 { "0xhang" } else { "0xrej" };
                let mut token = good_token(&format!("{}{}", prefix, i));
                token["developer_address"] = json!(format!("0xdev{}", i));
                token
            })
            .collect();

        let batch = pipeline.analyze_many_concurrent(&tokens, 4);
        let outcome = tokio::time::timeout(Duration::from_millis(200), batch).await;
        assert!(outcome.is_err());

        // work finished before the drop is kept; the stalled slot blocked the tail
        assert!(fx.store.contains("tokens", "0xrej0"));
        assert!(fx.store.contains("developers", "0xdev0"));
        assert!(!fx.store.contains("tokens", "0xhang1"));
        assert!(!fx.store.contains("tokens", "0xrej7"));

        let path = fx.store.path().to_path_buf();
        let on_disk = Blacklist::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, fx.store.snapshot());
        assert_eq!(BlacklistStore::open(&path).snapshot(), fx.store.snapshot());
        assert!(!path.with_file_name(".blacklists.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_advisory_records_each_backend() {
        let fx = fixture();
        let classifiers: Vec<Arc<dyn RiskClassifier>> = vec![
            Arc::new(StaticClassifier::new(RiskReport::new(RiskLevel::Dangerous)).named("alpha")),
            Arc::new(StaticClassifier::failing("timeout").named("beta")),
        ];
        let pipeline = TokenAnalysisPipeline::new(fx.store.clone(), classifiers)
            .with_mode(AnalysisMode::Advisory);

        let token = pipeline.analyze_one(&good_token("0xADV")).await.accepted().unwrap();
        let out = token.to_value();

        assert_eq!(out["api_analysis"]["alpha"]["risk_level"], json!("DANGEROUS"));
        assert!(out["api_analysis"]["beta"]["error"].as_str().unwrap().contains("timeout"));
        assert_eq!(out["volume_score"], json!(1.0));
        assert_eq!(out["risk_level"], json!("MEDIUM_RISK"));
        assert!(out.get("contract_risk_level").is_none());
        // advisory mode never writes to the blacklist
        assert!(fx.store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_advisory_still_rejects_bad_volume() {
        let fx = fixture();
        let pipeline = pipeline_with(&fx, Arc::new(StaticClassifier::default()))
            .with_mode(AnalysisMode::Advisory);

        assert!(!pipeline.analyze_one(&bad_volume_token("0xWASH")).await.is_accepted());
    }

    #[tokio::test]
    async fn test_worst_backend_policy() {
        let fx = fixture();
        let classifiers: Vec<Arc<dyn RiskClassifier>> = vec![
            Arc::new(StaticClassifier::new(RiskReport::new(RiskLevel::Safe)).named("alpha")),
            Arc::new(StaticClassifier::new(RiskReport::new(RiskLevel::HighRisk)).named("beta")),
        ];
        let pipeline = TokenAnalysisPipeline::new(fx.store.clone(), classifiers)
            .with_mode(AnalysisMode::Advisory)
            .with_risk_policy(RiskLevelPolicy::WorstBackend);
        let token = pipeline.analyze_one(&good_token("0xW1")).await.accepted().unwrap();
        assert_eq!(token.risk_level(), RiskLevel::HighRisk);

        let failing: Arc<dyn RiskClassifier> = Arc::new(StaticClassifier::failing("down"));
        let all_failed = TokenAnalysisPipeline::new(fx.store.clone(), vec![failing])
            .with_mode(AnalysisMode::Advisory)
            .with_risk_policy(RiskLevelPolicy::WorstBackend);
        let token = all_failed.analyze_one(&good_token("0xW2")).await.accepted().unwrap();
        assert_eq!(token.risk_level(), RiskLevel::HighRisk);
    }

    #[test]
    fn test_blocking_pipeline() {
        let fx = fixture();
        let inner = pipeline_with(&fx, Arc::new(StaticClassifier::default()));
        let pipeline = BlockingPipeline::new(inner).unwrap();

        let survivors = pipeline.analyze_many(&[good_token("0x1"), bad_volume_token("0x2")]);
        assert_eq!(survivors.len(), 1);
        assert!(pipeline.analyze_one(&good_token("0x3")).is_accepted());
        assert_eq!(pipeline.pipeline().telemetry().stats().total_analyzed, 3);
    }
}
