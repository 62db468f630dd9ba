//! Multi-method classification engine.
//!
//! A request moves through `Dispatched → Collecting → Merging → Done`.
//! Validation is the only step that can reject it; every classification
//! method runs under its own deadline inside the request budget, and a
//! method that fails or times out is recorded in the breakdown and
//! otherwise ignored.

use futures::future::{join_all, FutureExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::config::Settings;
use crate::core::geo::{self, GeoAdjuster};
use crate::core::keyword::{KeywordClassifier, KeywordOutcome};
use crate::core::ml::{IndustryModel, MlClassifier, ModelError, RemoteModel, TermWeightModel};
use crate::core::risk::{RiskMatcher, RiskScorer};
use crate::core::scoring::{self, CodeCandidate};
use crate::models::{
    Classification, ClassificationRequest, ClassificationResult, CodeFamily, EvidenceSource,
    IndustryScore, MethodKind, MethodOutcome, MethodScore, MethodStatus, RegionInfo, RiskAssessment,
    RiskFinding,
};
use crate::services::cache::{CacheError, CacheKey, CacheLookup, CacheManager, CacheStats};
use crate::services::store::{DataSource, RiskKeywordStore, StoreError, TaxonomyStore};
use crate::services::website::{WebsiteAnalysis, WebsiteError, WebsitePipeline};

const INSUFFICIENT_EVIDENCE: &str = "insufficient evidence: no classification method produced a match";

/// The only error `classify` returns
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Errors raised while assembling an engine
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid settings: {0}")]
    Settings(String),

    #[error("Data source error: {0}")]
    Store(#[from] StoreError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Website pipeline error: {0}")]
    Website(#[from] WebsiteError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Terminal state of a timed method run
enum MethodRun<T> {
    Completed(T),
    Failed(String),
    TimedOut,
}

struct Timed<T> {
    run: MethodRun<T>,
    elapsed_ms: u64,
}

async fn run_timed<T, F>(deadline: Instant, fut: F) -> Timed<T>
where
    F: Future<Output = Result<T, String>>,
{
    let started = Instant::now();
    let run = match tokio::time::timeout_at(deadline, fut).await {
        Ok(Ok(value)) => MethodRun::Completed(value),
        Ok(Err(e)) => MethodRun::Failed(e),
        Err(_) => MethodRun::TimedOut,
    };
    Timed {
        run,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

fn outcome(method: MethodKind, status: MethodStatus, elapsed_ms: u64) -> MethodOutcome {
    MethodOutcome {
        method,
        status,
        scores: Vec::new(),
        elapsed_ms,
        error: None,
        note: None,
    }
}

fn skipped(method: MethodKind, note: &str) -> MethodOutcome {
    MethodOutcome {
        note: Some(note.to_string()),
        ..outcome(method, MethodStatus::Skipped, 0)
    }
}

/// Breakdown record for a method whose result is a list of scores
fn scored_outcome(method: MethodKind, timed: Timed<(Vec<MethodScore>, Option<String>)>) -> MethodOutcome {
    match timed.run {
        MethodRun::Completed((scores, note)) => MethodOutcome {
            scores,
            note,
            ..outcome(method, MethodStatus::Succeeded, timed.elapsed_ms)
        },
        MethodRun::Failed(e) => MethodOutcome {
            error: Some(e),
            ..outcome(method, MethodStatus::Failed, timed.elapsed_ms)
        },
        MethodRun::TimedOut => MethodOutcome {
            error: Some("timed out".to_string()),
            ..outcome(method, MethodStatus::TimedOut, timed.elapsed_ms)
        },
    }
}

/// Breakdown record for a risk scan, plus the findings it produced
fn risk_outcome(method: MethodKind, timed: Timed<Vec<RiskFinding>>) -> (MethodOutcome, Vec<RiskFinding>) {
    match timed.run {
        MethodRun::Completed(findings) => (
            MethodOutcome {
                note: Some(format!("{} findings", findings.len())),
                ..outcome(method, MethodStatus::Succeeded, timed.elapsed_ms)
            },
            findings,
        ),
        MethodRun::Failed(e) => (
            MethodOutcome {
                error: Some(e),
                ..outcome(method, MethodStatus::Failed, timed.elapsed_ms)
            },
            Vec::new(),
        ),
        MethodRun::TimedOut => (
            MethodOutcome {
                error: Some("timed out".to_string()),
                ..outcome(method, MethodStatus::TimedOut, timed.elapsed_ms)
            },
            Vec::new(),
        ),
    }
}

/// Everything the website round produced
struct WebRound {
    analysis: Option<WebsiteAnalysis>,
    outcomes: Vec<MethodOutcome>,
    findings: Vec<RiskFinding>,
}

/// Classifies businesses by combining keyword, model, website and risk
/// signals. Build one with [`ClassificationEngine::builder`].
pub struct ClassificationEngine {
    settings: Settings,
    taxonomy: Arc<dyn TaxonomyStore>,
    risk_keywords: Arc<dyn RiskKeywordStore>,
    source_kind: &'static str,
    keyword: KeywordClassifier,
    ml: MlClassifier,
    website: Option<WebsitePipeline>,
    geo: GeoAdjuster,
    risk: RiskScorer,
    cache: Option<CacheManager>,
}

impl ClassificationEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// "live", "fallback" or "custom"
    pub fn data_source_kind(&self) -> &'static str {
        self.source_kind
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(CacheManager::stats)
    }

    /// Classify a business.
    ///
    /// Fails only when the request itself is invalid; every other problem
    /// shows up as missing contributions in the method breakdown.
    pub async fn classify(&self, request: &ClassificationRequest) -> Result<Classification, ClassifyError> {
        request
            .validate()
            .map_err(|e| ClassifyError::InvalidInput(e.to_string()))?;
        let request = request.normalized();
        if request.business_name().is_empty() {
            return Err(ClassifyError::InvalidInput("businessName must not be empty".into()));
        }

        let fingerprint = CacheKey::fingerprint(&request);
        let short = &fingerprint[fingerprint.len().saturating_sub(12)..];
        info!("Classify dispatched ({})", short);

        let Some(cache) = &self.cache else {
            return Ok(self.run(&request).await);
        };

        let (entry, lookup) = cache.get_or_compute(&fingerprint, self.run(&request)).await;
        match lookup {
            CacheLookup::Computed => debug!("Cache miss, computed ({})", short),
            CacheLookup::Shared => debug!("Served from cache or in-flight computation ({})", short),
        }
        Ok(entry.classification.clone())
    }

    /// Collect, merge and assemble one classification
    async fn run(&self, request: &ClassificationRequest) -> Classification {
        let started = Instant::now();
        let request_deadline = started + self.settings.engine.request_budget();
        let method_deadline = (started + self.settings.engine.method_timeout()).min(request_deadline);
        let business_text = request.business_text();
        let radius = self.risk.settings().snippet_radius;

        // Compiled once and shared by the business-text and website risk scans
        let matcher = {
            let store = self.risk_keywords.clone();
            async move { RiskMatcher::load(&*store).await.map(Arc::new) }
                .boxed()
                .shared()
        };

        let keyword_run = run_timed(method_deadline, async {
            let KeywordOutcome { scores, note } = self
                .keyword
                .classify(&*self.taxonomy, &business_text, MethodKind::Keyword)
                .await;
            Ok((scores, note))
        });

        let ml_run = run_timed(method_deadline, async {
            self.ml
                .classify(&business_text)
                .await
                .map(|scores| (scores, Some(format!("model {}", self.ml.model_name()))))
                .map_err(|e| e.to_string())
        });

        let risk_run = run_timed(method_deadline, {
            let matcher = matcher.clone();
            let text = business_text.as_str();
            async move {
                let matcher = matcher.await.map_err(|e| e.to_string())?;
                Ok(matcher.scan(text, EvidenceSource::BusinessText, radius))
            }
        });

        let web_round = self.web_round(request, request_deadline, matcher.clone());

        let (keyword, ml, risk, web) = tokio::join!(keyword_run, ml_run, risk_run, web_round);

        // Merging
        let mut breakdown = vec![
            scored_outcome(MethodKind::Keyword, keyword),
            scored_outcome(MethodKind::MachineLearning, ml),
        ];
        let (risk_record, mut findings) = risk_outcome(MethodKind::Risk, risk);
        breakdown.push(risk_record);
        breakdown.extend(web.outcomes);
        findings.extend(web.findings);

        for record in &breakdown {
            debug!(
                "Method {} finished {:?} in {}ms{}",
                record.method,
                record.status,
                record.elapsed_ms,
                record.error.as_deref().map(|e| format!(": {}", e)).unwrap_or_default()
            );
        }

        let web_text = web
            .analysis
            .as_ref()
            .filter(|a| a.has_evidence())
            .map(|a| a.cleaned_text.as_str());
        let region = geo::infer_region(request.declared_region(), request.website_url(), web_text);

        let result = self.merge(&breakdown, region, request_deadline).await;

        // Late risk keywords are discarded like any other late result
        let risk = match tokio::time::timeout_at(request_deadline, matcher).await {
            Ok(Ok(matcher)) => {
                self.risk
                    .assess(findings, &matcher, &*self.taxonomy, request_deadline)
                    .await
            }
            Ok(Err(e)) => {
                warn!("Risk keywords unavailable, risk assessment is empty: {}", e);
                RiskAssessment::empty()
            }
            Err(_) => {
                warn!("Risk keywords not loaded within the request budget, risk assessment is empty");
                RiskAssessment::empty()
            }
        };

        info!(
            "Classified as {} ({:.3}), risk {:?} in {}ms",
            result.primary_industry,
            result.overall_confidence,
            risk.risk_level,
            started.elapsed().as_millis()
        );

        Classification { result, risk }
    }

    /// Website fetch followed by keyword and risk scoring of the site text
    async fn web_round<M>(&self, request: &ClassificationRequest, request_deadline: Instant, matcher: M) -> WebRound
    where
        M: Future<Output = Result<Arc<RiskMatcher>, StoreError>>,
    {
        let Some(url) = request.website_url() else {
            return WebRound {
                analysis: None,
                outcomes: Vec::new(),
                findings: Vec::new(),
            };
        };

        let Some(pipeline) = &self.website else {
            return WebRound {
                analysis: None,
                outcomes: vec![
                    skipped(MethodKind::Website, "website analysis disabled"),
                    skipped(MethodKind::WebKeyword, "website analysis disabled"),
                    skipped(MethodKind::WebRisk, "website analysis disabled"),
                ],
                findings: Vec::new(),
            };
        };

        let site_deadline = (Instant::now() + self.settings.website.overall_deadline()).min(request_deadline);
        let fetched = run_timed(site_deadline, async { Ok::<_, String>(pipeline.analyze(url).await) }).await;

        let (website_record, analysis) = match fetched.run {
            MethodRun::Completed(analysis) => {
                let record = match &analysis.error {
                    None => MethodOutcome {
                        note: Some(format!(
                            "{} pages, {} keywords",
                            analysis.pages_visited.len(),
                            analysis.extracted_keywords.len()
                        )),
                        ..outcome(MethodKind::Website, MethodStatus::Succeeded, fetched.elapsed_ms)
                    },
                    Some(WebsiteError::Timeout(e)) => MethodOutcome {
                        error: Some(e.clone()),
                        ..outcome(MethodKind::Website, MethodStatus::TimedOut, fetched.elapsed_ms)
                    },
                    Some(e) => MethodOutcome {
                        error: Some(e.to_string()),
                        ..outcome(MethodKind::Website, MethodStatus::Failed, fetched.elapsed_ms)
                    },
                };
                (record, Some(analysis))
            }
            MethodRun::Failed(e) => (
                MethodOutcome {
                    error: Some(e),
                    ..outcome(MethodKind::Website, MethodStatus::Failed, fetched.elapsed_ms)
                },
                None,
            ),
            MethodRun::TimedOut => (
                MethodOutcome {
                    error: Some("request budget exhausted".to_string()),
                    ..outcome(MethodKind::Website, MethodStatus::TimedOut, fetched.elapsed_ms)
                },
                None,
            ),
        };

        let Some(site) = analysis.as_ref().filter(|a| a.has_evidence()) else {
            if let Some(error) = &website_record.error {
                debug!("No web evidence for {}: {}", url, error);
            }
            return WebRound {
                analysis,
                outcomes: vec![
                    website_record,
                    skipped(MethodKind::WebKeyword, "no web evidence"),
                    skipped(MethodKind::WebRisk, "no web evidence"),
                ],
                findings: Vec::new(),
            };
        };

        let deadline = (Instant::now() + self.settings.engine.method_timeout()).min(request_deadline);
        let radius = self.risk.settings().snippet_radius;
        let keywords_text = site.extracted_keywords.join(" ");

        let web_keyword = run_timed(deadline, async {
            let KeywordOutcome { scores, note } = self
                .keyword
                .classify(&*self.taxonomy, &keywords_text, MethodKind::WebKeyword)
                .await;
            Ok((scores, note))
        });
        let web_risk = run_timed(deadline, async {
            let matcher = matcher.await.map_err(|e| e.to_string())?;
            Ok(matcher.scan(&site.cleaned_text, EvidenceSource::Website, radius))
        });

        let (web_keyword, web_risk) = tokio::join!(web_keyword, web_risk);
        let (risk_record, findings) = risk_outcome(MethodKind::WebRisk, web_risk);

        WebRound {
            outcomes: vec![
                website_record,
                scored_outcome(MethodKind::WebKeyword, web_keyword),
                risk_record,
            ],
            findings,
            analysis,
        }
    }

    async fn merge(
        &self,
        breakdown: &[MethodOutcome],
        region: Option<RegionInfo>,
        request_deadline: Instant,
    ) -> ClassificationResult {
        let scores: Vec<MethodScore> = breakdown
            .iter()
            .filter(|o| o.succeeded())
            .flat_map(|o| o.scores.iter().cloned())
            .collect();

        let merged = scoring::merge_method_scores(
            &scores,
            &self.settings.weights,
            scoring::dispatched_weight(&self.settings.weights, breakdown),
        );
        let adjusted = self.geo.adjust(&merged, region.as_ref().map(|r| r.code.as_str()));
        let industries: Vec<IndustryScore> = scoring::rank_industries(adjusted)
            .into_iter()
            .filter(|i| i.confidence > 0.0)
            .collect();

        let Some(top) = industries.first() else {
            return ClassificationResult {
                primary_industry: self.settings.engine.unknown_industry_label.clone(),
                overall_confidence: 0.0,
                classifications: Vec::new(),
                industries: Vec::new(),
                method_breakdown: breakdown.to_vec(),
                region,
                note: Some(INSUFFICIENT_EVIDENCE.to_string()),
            };
        };

        let candidates = self.code_candidates(&industries, &scores, request_deadline).await;

        ClassificationResult {
            primary_industry: top.industry.clone(),
            overall_confidence: top.confidence,
            classifications: scoring::attach_codes(&industries, &candidates),
            method_breakdown: breakdown.to_vec(),
            industries,
            region,
            note: None,
        }
    }

    /// Codes matched by keyword methods, completed from the taxonomy for
    /// industries missing a code family
    async fn code_candidates(
        &self,
        industries: &[IndustryScore],
        scores: &[MethodScore],
        request_deadline: Instant,
    ) -> HashMap<String, Vec<CodeCandidate>> {
        let mut candidates = scoring::code_candidates(scores);

        let incomplete: Vec<&str> = industries
            .iter()
            .filter(|industry| {
                let known = candidates.get(&industry.industry);
                CodeFamily::ALL
                    .iter()
                    .any(|family| !known.map_or(false, |c| c.iter().any(|code| code.family == *family)))
            })
            .map(|industry| industry.industry.as_str())
            .collect();

        if incomplete.is_empty() {
            return candidates;
        }

        let lookups = join_all(incomplete.into_iter().map(|industry| async move {
            (industry, self.taxonomy.lookup_by_industry(industry).await)
        }));
        let deadline = (Instant::now() + self.settings.engine.method_timeout()).min(request_deadline);

        match tokio::time::timeout_at(deadline, lookups).await {
            Ok(results) => {
                for (industry, result) in results {
                    let entries = match result {
                        Ok(entries) => entries,
                        Err(e) => {
                            warn!("Code lookup for {} failed: {}", industry, e);
                            continue;
                        }
                    };
                    let list = candidates.entry(industry.to_string()).or_default();
                    for entry in entries {
                        if !list.iter().any(|c| c.family == entry.family && c.code == entry.code) {
                            list.push(CodeCandidate {
                                family: entry.family,
                                code: entry.code,
                                evidence: 0.0,
                            });
                        }
                    }
                }
            }
            Err(_) => warn!("Code lookups timed out; reporting keyword-matched codes only"),
        }
        candidates
    }
}

/// Assembles a [`ClassificationEngine`]; `build` hands out only a fully
/// initialized engine
pub struct EngineBuilder {
    settings: Option<Settings>,
    taxonomy: Option<Arc<dyn TaxonomyStore>>,
    risk_keywords: Option<Arc<dyn RiskKeywordStore>>,
    model: Option<Arc<dyn IndustryModel>>,
    cache_enabled: bool,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            settings: None,
            taxonomy: None,
            risk_keywords: None,
            model: None,
            cache_enabled: true,
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn taxonomy_store(mut self, store: Arc<dyn TaxonomyStore>) -> Self {
        self.taxonomy = Some(store);
        self
    }

    pub fn risk_keyword_store(mut self, store: Arc<dyn RiskKeywordStore>) -> Self {
        self.risk_keywords = Some(store);
        self
    }

    pub fn model(mut self, model: Arc<dyn IndustryModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub async fn build(self) -> Result<ClassificationEngine, BuildError> {
        let settings = self.settings.unwrap_or_default();
        settings.validate().map_err(|e| BuildError::Settings(e.to_string()))?;

        let (taxonomy, risk_keywords, source_kind) = match (self.taxonomy, self.risk_keywords) {
            (Some(taxonomy), Some(risk)) => (taxonomy, risk, "custom"),
            (taxonomy, risk) => {
                let source = Arc::new(DataSource::from_settings(&settings.data_source).await?);
                let kind = source.kind();
                (
                    taxonomy.unwrap_or_else(|| source.clone() as Arc<dyn TaxonomyStore>),
                    risk.unwrap_or_else(|| source.clone() as Arc<dyn RiskKeywordStore>),
                    kind,
                )
            }
        };

        let model: Arc<dyn IndustryModel> = match self.model {
            Some(model) => model,
            None => match (settings.ml.endpoint.as_deref(), settings.ml.model_path.as_deref()) {
                (Some(endpoint), _) if !endpoint.trim().is_empty() => Arc::new(RemoteModel::new(
                    endpoint,
                    Duration::from_millis(settings.ml.timeout_ms),
                )?),
                (_, Some(path)) => Arc::new(TermWeightModel::from_path(path)?),
                _ => Arc::new(TermWeightModel::embedded()?),
            },
        };

        let website = if settings.website.enabled {
            Some(WebsitePipeline::new(settings.website.clone())?)
        } else {
            None
        };

        let cache = if !self.cache_enabled {
            None
        } else {
            let ttl = Duration::from_secs(settings.cache.ttl_secs);
            match settings.cache.redis_url.as_deref().filter(|u| !u.trim().is_empty()) {
                Some(url) => Some(CacheManager::with_redis(url, settings.cache.l1_cache_size, ttl).await?),
                None => Some(CacheManager::in_memory(settings.cache.l1_cache_size, ttl)),
            }
        };

        info!(
            "Classification engine ready (data source: {}, model: {}, website: {}, cache: {})",
            source_kind,
            model.name(),
            if website.is_some() { "enabled" } else { "disabled" },
            match (&cache, settings.cache.redis_url.is_some()) {
                (None, _) => "disabled",
                (Some(_), true) => "memory+redis",
                (Some(_), false) => "memory",
            }
        );

        Ok(ClassificationEngine {
            keyword: KeywordClassifier::new(settings.keyword),
            ml: MlClassifier::new(model, settings.ml.min_confidence),
            geo: GeoAdjuster::new(&settings.geo),
            risk: RiskScorer::new(settings.risk),
            taxonomy,
            risk_keywords,
            source_kind,
            website,
            cache,
            settings,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
