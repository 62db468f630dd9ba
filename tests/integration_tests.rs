// Integration tests for the KYB classifier

use async_trait::async_trait;
use kyb_classifier::config::Settings;
use kyb_classifier::core::geo::GeoAdjuster;
use kyb_classifier::core::ml::{IndustryModel, MlClassifier, ModelError, Prediction, RemoteModel};
use kyb_classifier::models::{
    Classification, ClassificationRequest, CodeFamily, EvidenceSource, MethodKind, MethodStatus, RegionSource,
    RiskAssessment, RiskKeywordEntry, Severity,
};
use kyb_classifier::services::{DataSource, RiskKeywordStore, StaticDataset, StoreError, TaxonomyStore};
use kyb_classifier::{ClassificationEngine, ClassifyError};
use mockito::{Matcher, Server};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.website.page_timeout_ms = 1_500;
    settings.website.overall_deadline_ms = 2_000;
    settings
}

async fn engine_with(settings: Settings) -> ClassificationEngine {
    ClassificationEngine::builder()
        .settings(settings)
        .cache(false)
        .build()
        .await
        .unwrap()
}

async fn engine() -> ClassificationEngine {
    engine_with(test_settings()).await
}

fn statuses(classification: &Classification) -> Vec<(MethodKind, MethodStatus)> {
    classification
        .result
        .method_breakdown
        .iter()
        .map(|o| (o.method, o.status))
        .collect()
}

/// Model that counts calls and answers after a short delay
#[derive(Default)]
struct CountingModel {
    calls: AtomicUsize,
}

#[async_trait]
impl IndustryModel for CountingModel {
    fn name(&self) -> &str {
        "counting"
    }

    async fn predict(&self, _text: &str) -> Result<Vec<Prediction>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(vec![Prediction {
            industry: "Technology".to_string(),
            probability: 0.9,
        }])
    }
}

/// Model that never answers in time
struct StalledModel;

#[async_trait]
impl IndustryModel for StalledModel {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn predict(&self, _text: &str) -> Result<Vec<Prediction>, ModelError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }
}

/// Risk-keyword store that answers long after any request budget
struct StalledRiskStore;

#[async_trait]
impl RiskKeywordStore for StalledRiskStore {
    async fn lookup_all(&self, _active_only: bool) -> Result<Vec<RiskKeywordEntry>, StoreError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }
}

/// Risk-keyword store that is always down
struct DownRiskStore;

#[async_trait]
impl RiskKeywordStore for DownRiskStore {
    async fn lookup_all(&self, _active_only: bool) -> Result<Vec<RiskKeywordEntry>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

async fn engine_with_risk_store(settings: Settings, store: Arc<dyn RiskKeywordStore>) -> ClassificationEngine {
    ClassificationEngine::builder()
        .settings(settings)
        .taxonomy_store(Arc::new(StaticDataset::embedded().unwrap()))
        .risk_keyword_store(store)
        .cache(false)
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_techcorp_end_to_end() {
    let request = ClassificationRequest::new(
        "TechCorp Solutions",
        "Enterprise software development and cloud solutions",
    );
    let classification = engine().await.classify(&request).await.unwrap();
    let result = &classification.result;

    assert_eq!(result.primary_industry, "Technology");
    assert!(result.overall_confidence >= 0.3 && result.overall_confidence <= 1.0);
    for family in CodeFamily::ALL {
        let top = result.top_for_family(family).expect("code for every family");
        assert_eq!(top.industry, "Technology");
    }
    assert_eq!(
        statuses(&classification),
        vec![
            (MethodKind::Keyword, MethodStatus::Succeeded),
            (MethodKind::MachineLearning, MethodStatus::Succeeded),
            (MethodKind::Risk, MethodStatus::Succeeded),
        ]
    );
    assert!(classification.risk.findings.is_empty());
    assert_eq!(classification.risk.risk_level, Severity::Low);

    // Ranked entries never increase in confidence
    for pair in result.classifications.windows(2) {
        assert!(pair[0].confidence >= pair[1].confidence);
    }
}

#[tokio::test]
async fn test_securebank_is_financial_without_findings() {
    let request = ClassificationRequest::new("SecureBank", "Digital banking and financial services");
    let classification = engine().await.classify(&request).await.unwrap();

    assert_eq!(classification.result.primary_industry, "Financial Services");
    assert!(classification.risk.findings.is_empty());
    assert!(classification.risk.restrictions.is_empty());
    assert_ne!(classification.risk.risk_level, Severity::Critical);
}

#[tokio::test]
async fn test_no_evidence_is_unknown_not_error() {
    let classification = engine()
        .await
        .classify(&ClassificationRequest::new("Zyx Qwv", ""))
        .await
        .unwrap();
    let result = &classification.result;

    assert!(result.is_unknown());
    assert_eq!(result.primary_industry, "Unknown");
    assert_eq!(result.overall_confidence, 0.0);
    assert!(result.classifications.is_empty());
    assert!(result.note.is_some());
}

#[tokio::test]
async fn test_invalid_requests_rejected() {
    let engine = engine().await;

    let blank = engine.classify(&ClassificationRequest::new("", "bakery")).await;
    assert!(matches!(blank, Err(ClassifyError::InvalidInput(_))));

    let bad_url = ClassificationRequest::new("Acme", "bakery").with_website("ftp://acme.example");
    assert!(matches!(engine.classify(&bad_url).await, Err(ClassifyError::InvalidInput(_))));

    let bad_region = ClassificationRequest::new("Acme", "bakery").with_region("GBR");
    assert!(matches!(engine.classify(&bad_region).await, Err(ClassifyError::InvalidInput(_))));
}

#[tokio::test]
async fn test_results_are_deterministic() {
    let request = ClassificationRequest::new(
        "Harbor Freight Lines",
        "Trucking, freight shipping and warehousing across the region",
    );
    let first = engine().await.classify(&request).await.unwrap();
    let second = engine().await.classify(&request).await.unwrap();

    assert_eq!(first.result.primary_industry, "Transportation & Logistics");
    assert_eq!(first.result.primary_industry, second.result.primary_industry);
    assert_eq!(first.result.industries, second.result.industries);
    assert_eq!(first.result.classifications, second.result.classifications);
    assert_eq!(first.risk, second.risk);
}

#[tokio::test]
async fn test_risk_synonyms_count_once() {
    let request = ClassificationRequest::new("Night Market", "We supply cocaine, also sold as crack cocaine or yayo");
    let classification = engine().await.classify(&request).await.unwrap();

    let cocaine: Vec<_> = classification
        .risk
        .findings
        .iter()
        .filter(|f| f.matched_keyword == "cocaine")
        .collect();
    assert_eq!(cocaine.len(), 1);
    assert_eq!(classification.risk.risk_level, Severity::Critical);
    assert!(classification.risk.risk_score <= 1.0);
}

#[tokio::test]
async fn test_unreachable_website_degrades() {
    let request = ClassificationRequest::new(
        "TechCorp Solutions",
        "Enterprise software development and cloud solutions",
    )
    .with_website("http://127.0.0.1:9/");
    let classification = engine().await.classify(&request).await.unwrap();
    let result = &classification.result;

    assert_eq!(result.primary_industry, "Technology");
    let website = result.outcome(MethodKind::Website).unwrap();
    assert!(matches!(website.status, MethodStatus::Failed | MethodStatus::TimedOut));
    assert!(website.error.is_some());
    assert_eq!(result.outcome(MethodKind::WebKeyword).unwrap().status, MethodStatus::Skipped);
    assert_eq!(result.outcome(MethodKind::WebRisk).unwrap().status, MethodStatus::Skipped);
}

#[tokio::test]
async fn test_website_disabled_skips_web_methods() {
    let mut settings = test_settings();
    settings.website.enabled = false;
    let request = ClassificationRequest::new("Golden Crust", "Bakery and cafe").with_website("https://goldencrust.example");
    let classification = engine_with(settings).await.classify(&request).await.unwrap();

    for method in [MethodKind::Website, MethodKind::WebKeyword, MethodKind::WebRisk] {
        let outcome = classification.result.outcome(method).unwrap();
        assert_eq!(outcome.status, MethodStatus::Skipped);
        assert_eq!(outcome.note.as_deref(), Some("website analysis disabled"));
    }
    assert_eq!(classification.result.primary_industry, "Food & Beverage");
}

#[tokio::test]
async fn test_website_evidence_classifies_business() {
    let mut server = Server::new_async().await;

    let robots = server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("User-agent: *\nDisallow: /private\n")
        .create_async()
        .await;
    let home = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(
            r#"<html><head><title>Golden Crust Bakery</title>
            <meta name="description" content="Artisan bakery and cafe">
            <script>window.dataLayer = [];</script></head>
            <body><p>Fresh bread, pastries and coffee. We also offer catering.</p>
            <a href="/about">About us</a>
            <a href="/private/about">Staff about</a></body></html>"#,
        )
        .create_async()
        .await;
    let about = server
        .mock("GET", "/about")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body><p>Golden Crust is a family bakery.</p></body></html>")
        .expect(1)
        .create_async()
        .await;
    let private = server
        .mock("GET", "/private/about")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body>hidden</body></html>")
        .expect(0)
        .create_async()
        .await;

    let request = ClassificationRequest::new("Golden Crust", "").with_website(server.url());
    let classification = engine().await.classify(&request).await.unwrap();
    let result = &classification.result;

    let website = result.outcome(MethodKind::Website).unwrap();
    assert_eq!(website.status, MethodStatus::Succeeded);
    assert!(website.note.as_deref().unwrap().starts_with("2 pages"));

    let web_keyword = result.outcome(MethodKind::WebKeyword).unwrap();
    assert_eq!(web_keyword.status, MethodStatus::Succeeded);
    assert!(!web_keyword.scores.is_empty());

    assert_eq!(result.primary_industry, "Food & Beverage");
    assert!(result.industries[0].contributing_methods.contains(&MethodKind::WebKeyword));
    assert!(result.region.is_none());

    robots.assert_async().await;
    home.assert_async().await;
    about.assert_async().await;
    private.assert_async().await;
}

#[tokio::test]
async fn test_website_risk_findings_merge_with_business_text() {
    let mut server = Server::new_async().await;
    let _home = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(
            "<html><head><title>Lucky Star Casino</title></head>\
             <body><p>Casino games, poker and sportsbook betting.</p></body></html>",
        )
        .create_async()
        .await;

    let request = ClassificationRequest::new("Lucky Star", "Online gambling").with_website(server.url());
    let classification = engine().await.classify(&request).await.unwrap();

    assert_eq!(classification.result.primary_industry, "Gambling");
    assert_eq!(
        classification.result.outcome(MethodKind::WebRisk).unwrap().status,
        MethodStatus::Succeeded
    );

    // Business text and website both hit the gambling concept
    let risk = &classification.risk;
    assert_eq!(risk.findings.len(), 1);
    assert_eq!(risk.findings[0].matched_keyword, "gambling");
    assert_eq!(risk.findings[0].source, EvidenceSource::BusinessText);
    assert_eq!(risk.risk_level, Severity::Medium);

    let mcc = risk
        .restrictions
        .iter()
        .find(|r| r.family == CodeFamily::Mcc && r.code == "7995")
        .expect("gambling MCC restriction");
    assert_eq!(mcc.industry.as_deref(), Some("Gambling"));
    assert!(risk.restrictions.iter().any(|r| r.family == CodeFamily::Naics && r.code == "713210"));
}

#[tokio::test]
async fn test_non_html_website_is_rejected() {
    let mut server = Server::new_async().await;
    let _home = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_body("%PDF-1.4")
        .create_async()
        .await;

    let request = ClassificationRequest::new("Golden Crust", "bakery").with_website(server.url());
    let classification = engine().await.classify(&request).await.unwrap();
    let result = &classification.result;

    let website = result.outcome(MethodKind::Website).unwrap();
    assert_eq!(website.status, MethodStatus::Failed);
    assert!(website.error.as_deref().unwrap().contains("application/pdf"));

    let web_keyword = result.outcome(MethodKind::WebKeyword).unwrap();
    assert_eq!(web_keyword.status, MethodStatus::Skipped);
    assert_eq!(web_keyword.note.as_deref(), Some("no web evidence"));
    assert_eq!(result.primary_industry, "Food & Beverage");
}

#[tokio::test]
async fn test_website_server_error_is_recorded() {
    let mut server = Server::new_async().await;
    let _home = server.mock("GET", "/").with_status(500).create_async().await;

    let request = ClassificationRequest::new("Golden Crust", "bakery").with_website(server.url());
    let classification = engine().await.classify(&request).await.unwrap();

    let website = classification.result.outcome(MethodKind::Website).unwrap();
    assert_eq!(website.status, MethodStatus::Failed);
    assert!(website.error.as_deref().unwrap().contains("500"));
}

#[tokio::test]
async fn test_live_store_backs_engine() {
    let mut server = Server::new_async().await;

    let _health = server
        .mock("GET", "/health")
        .match_header("x-api-key", "secret")
        .with_status(200)
        .create_async()
        .await;
    let _lookup = server
        .mock("GET", Matcher::Regex(r"^/taxonomy/lookup".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"entries": [{"family": "MCC", "code": "5999", "industryName": "Manufacturing",
                "keywordSet": ["Widgets", "industrial", "fabrication"]}]}"#,
        )
        .create_async()
        .await;
    let _industries = server
        .mock("GET", Matcher::Regex(r"^/taxonomy/industries/".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"entries": [
                {"family": "NAICS", "code": "332999", "industryName": "Manufacturing", "keywordSet": []},
                {"family": "SIC", "code": "3999", "industryName": "Manufacturing", "keywordSet": []}
            ]}"#,
        )
        .create_async()
        .await;
    let risk_keywords = server
        .mock("GET", Matcher::Regex(r"^/risk-keywords".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"keywords": [
                {"keyword": "counterfeit", "category": "illegal", "severity": "high"},
                {"keyword": "broken entry"}
            ]}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let mut settings = test_settings();
    settings.data_source.live_url = Some(server.url());
    settings.data_source.api_key = Some("secret".to_string());
    let engine = engine_with(settings).await;
    assert_eq!(engine.data_source_kind(), "live");

    let request = ClassificationRequest::new("Acme Widgets", "Industrial widgets, no counterfeit parts");
    let classification = engine.classify(&request).await.unwrap();
    let result = &classification.result;

    assert_eq!(result.primary_industry, "Manufacturing");
    assert_eq!(result.top_for_family(CodeFamily::Mcc).unwrap().code, "5999");
    assert_eq!(result.top_for_family(CodeFamily::Naics).unwrap().code, "332999");
    assert_eq!(result.top_for_family(CodeFamily::Sic).unwrap().code, "3999");

    assert_eq!(classification.risk.findings.len(), 1);
    assert_eq!(classification.risk.risk_level, Severity::High);
    // One risk keyword fetch serves both the scan and the assessment
    risk_keywords.assert_async().await;
}

#[tokio::test]
async fn test_unhealthy_live_store_falls_back() {
    let mut server = Server::new_async().await;
    let _health = server.mock("GET", "/health").with_status(503).create_async().await;

    let mut settings = test_settings();
    settings.data_source.live_url = Some(server.url());
    let source = DataSource::from_settings(&settings.data_source).await.unwrap();
    assert_eq!(source.kind(), "fallback");

    let entries = source.lookup_by_industry("Technology").await.unwrap();
    assert!(!entries.is_empty());

    settings.data_source.live_url = Some("http://127.0.0.1:9".to_string());
    settings.data_source.timeout_ms = 300;
    let engine = engine_with(settings).await;
    assert_eq!(engine.data_source_kind(), "fallback");
}

#[tokio::test]
async fn test_live_store_outage_after_startup() {
    let mut server = Server::new_async().await;
    let _health = server.mock("GET", "/health").with_status(200).create_async().await;
    let _everything_else = server
        .mock("GET", Matcher::Regex(r"^/(taxonomy|risk-keywords)".to_string()))
        .with_status(502)
        .create_async()
        .await;

    let mut settings = test_settings();
    settings.data_source.live_url = Some(server.url());
    let source = DataSource::from_settings(&settings.data_source).await.unwrap();
    assert_eq!(source.kind(), "live");
    assert!(matches!(
        source.lookup_by_keywords(&["bakery".to_string()]).await,
        Err(StoreError::Unavailable(_))
    ));

    // The engine keeps answering from the model alone
    let engine = engine_with(settings).await;
    let classification = engine
        .classify(&ClassificationRequest::new("TechCorp", "Enterprise software and cloud"))
        .await
        .unwrap();
    let keyword = classification.result.outcome(MethodKind::Keyword).unwrap();
    assert!(keyword.scores.is_empty());
    assert!(keyword.note.as_deref().unwrap().starts_with("taxonomy unavailable"));
    assert_eq!(
        classification.result.outcome(MethodKind::Risk).unwrap().status,
        MethodStatus::Failed
    );
    assert_eq!(classification.result.primary_industry, "Technology");
}

#[tokio::test]
async fn test_remote_model() {
    let mut server = Server::new_async().await;
    let _predict = server
        .mock("POST", "/predict")
        .match_body(Matcher::PartialJsonString(r#"{"text": "family shoe store"}"#.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"predictions": [
                {"industry": "Retail", "probability": 0.7},
                {"industry": "Retail", "probability": 0.4},
                {"industry": "Education", "probability": 0.01}
            ]}"#,
        )
        .create_async()
        .await;

    let model = RemoteModel::new(&format!("{}/predict", server.url()), Duration::from_secs(1)).unwrap();
    let classifier = MlClassifier::new(Arc::new(model), 0.05);
    let scores = classifier.classify("Family shoe store").await.unwrap();

    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].industry, "Retail");
    assert!((scores[0].confidence - 0.7).abs() < 1e-9);
}

#[tokio::test]
async fn test_remote_model_error_marks_method_failed() {
    let mut server = Server::new_async().await;
    let _predict = server.mock("POST", "/predict").with_status(500).create_async().await;

    let mut settings = test_settings();
    settings.ml.endpoint = Some(format!("{}/predict", server.url()));
    let engine = engine_with(settings).await;

    let classification = engine
        .classify(&ClassificationRequest::new(
            "TechCorp Solutions",
            "Enterprise software development and cloud solutions",
        ))
        .await
        .unwrap();
    let ml = classification.result.outcome(MethodKind::MachineLearning).unwrap();

    assert_eq!(ml.status, MethodStatus::Failed);
    assert!(ml.error.is_some());
    assert_eq!(classification.result.primary_industry, "Technology");
    // Keyword evidence alone, diluted by the failed model's weight
    assert!(classification.result.overall_confidence < 0.5);
}

#[tokio::test]
async fn test_slow_model_times_out() {
    let mut settings = test_settings();
    settings.engine.method_timeout_ms = 200;
    let engine = ClassificationEngine::builder()
        .settings(settings)
        .model(Arc::new(StalledModel))
        .cache(false)
        .build()
        .await
        .unwrap();

    let started = std::time::Instant::now();
    let classification = engine
        .classify(&ClassificationRequest::new("TechCorp", "Enterprise software and cloud"))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(
        classification.result.outcome(MethodKind::MachineLearning).unwrap().status,
        MethodStatus::TimedOut
    );
    assert_eq!(classification.result.primary_industry, "Technology");
}

#[tokio::test]
async fn test_stalled_risk_store_respects_request_budget() {
    let mut settings = test_settings();
    settings.engine.request_budget_ms = 1_000;
    settings.engine.method_timeout_ms = 500;
    let engine = engine_with_risk_store(settings, Arc::new(StalledRiskStore)).await;

    let started = std::time::Instant::now();
    let classification = engine
        .classify(&ClassificationRequest::new("TechCorp", "Enterprise software and cloud"))
        .await
        .unwrap();

    assert!(
        started.elapsed() < Duration::from_secs(3),
        "classify took {:?} with a 1s request budget",
        started.elapsed()
    );
    assert_eq!(
        statuses(&classification),
        vec![
            (MethodKind::Keyword, MethodStatus::Succeeded),
            (MethodKind::MachineLearning, MethodStatus::Succeeded),
            (MethodKind::Risk, MethodStatus::TimedOut),
        ]
    );
    assert_eq!(classification.result.primary_industry, "Technology");
    assert_eq!(classification.risk, RiskAssessment::empty());
}

#[tokio::test]
async fn test_risk_store_down_gives_empty_assessment() {
    let engine = engine_with_risk_store(test_settings(), Arc::new(DownRiskStore)).await;
    let classification = engine
        .classify(&ClassificationRequest::new("Cocaine Kings", "We sell cocaine"))
        .await
        .unwrap();

    let risk = classification.result.outcome(MethodKind::Risk).unwrap();
    assert_eq!(risk.status, MethodStatus::Failed);
    assert!(risk.error.as_deref().unwrap().contains("connection refused"));
    assert_eq!(classification.risk, RiskAssessment::empty());
}

#[tokio::test]
async fn test_concurrent_identical_requests_compute_once() {
    let model = Arc::new(CountingModel::default());
    let engine = ClassificationEngine::builder()
        .settings(test_settings())
        .model(model.clone())
        .build()
        .await
        .unwrap();

    let request = ClassificationRequest::new("TechCorp", "Enterprise software and cloud");
    // Trivially different input that normalizes to the same fingerprint
    let padded = ClassificationRequest::new("  TechCorp ", "Enterprise software and cloud  ");

    let (first, second) = tokio::join!(engine.classify(&request), engine.classify(&padded));
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first, second);
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    let ml = first.result.outcome(MethodKind::MachineLearning).unwrap();
    assert_eq!(ml.note.as_deref(), Some("model counting"));

    // Served from cache afterwards
    let third = engine.classify(&request).await.unwrap();
    assert_eq!(third, first);
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);

    let stats = engine.cache_stats().unwrap();
    assert_eq!(stats.computations, 1);
    assert!(stats.hit_count >= 1);
}

#[tokio::test]
async fn test_region_adjusts_confidence() {
    let mut settings = test_settings();
    settings.geo.factors = HashMap::from([(
        "GB".to_string(),
        HashMap::from([("Gambling".to_string(), 0.5)]),
    )]);
    let engine = engine_with(settings).await;

    let base = ClassificationRequest::new("Lucky Star", "Online casino and sportsbook betting");
    let plain = engine.classify(&base).await.unwrap();
    let regional = engine.classify(&base.clone().with_region("gb")).await.unwrap();

    assert_eq!(plain.result.primary_industry, "Gambling");
    assert!(plain.result.region.is_none());

    let region = regional.result.region.as_ref().unwrap();
    assert_eq!(region.code, "GB");
    assert_eq!(region.source, RegionSource::Declared);

    let gambling = |c: &Classification| {
        c.result
            .industries
            .iter()
            .find(|i| i.industry == "Gambling")
            .map(|i| i.confidence)
            .unwrap()
    };
    assert!((gambling(&regional) - gambling(&plain) * 0.5).abs() < 1e-9);
}

#[test]
fn test_default_config_file_loads() {
    let settings = Settings::load_from("config/default.toml").unwrap();
    assert_eq!(settings.weights.keyword, 0.35);
    assert_eq!(settings.website.max_followed_pages, 3);

    let geo = GeoAdjuster::new(&settings.geo);
    assert_eq!(geo.factor("GB", "Gambling"), 1.2);
    assert_eq!(geo.factor("US", "Gambling"), 1.0);
}
