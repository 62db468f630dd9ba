// Unit tests for the KYB classifier building blocks

use kyb_classifier::config::{GeoSettings, KeywordSettings, RiskSettings, WeightsConfig};
use kyb_classifier::core::geo::{infer_region, region_from_tld, GeoAdjuster};
use kyb_classifier::core::keyword::{keyword_matches, score_entries};
use kyb_classifier::core::risk::{RiskMatcher, RiskScorer};
use kyb_classifier::core::scoring::{attach_codes, code_candidates, merge_method_scores, method_weight};
use kyb_classifier::core::text;
use kyb_classifier::models::{
    CodeFamily, DetectionKind, EvidenceSource, MethodKind, MethodScore, RegionSource, RiskCategory,
    RiskKeywordEntry, Severity, TaxonomyEntry,
};
use kyb_classifier::services::{RobotsRules, StaticDataset};
use std::collections::{BTreeSet, HashMap};

fn entry(family: CodeFamily, code: &str, industry: &str, keywords: &[&str]) -> TaxonomyEntry {
    TaxonomyEntry {
        family,
        code: code.to_string(),
        industry: industry.to_string(),
        description: None,
        keywords: keywords.iter().map(|k| k.to_string()).collect::<BTreeSet<_>>(),
    }
}

fn risk_entry(keyword: &str, category: RiskCategory, severity: Severity, synonyms: &[&str]) -> RiskKeywordEntry {
    RiskKeywordEntry {
        keyword: keyword.to_string(),
        category,
        severity,
        synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
        patterns: vec![],
        active: true,
        restricted_codes: vec![],
    }
}

/// Active risk keywords of the embedded dataset
fn embedded_matcher() -> RiskMatcher {
    let dataset = StaticDataset::embedded().unwrap();
    tokio_test::block_on(RiskMatcher::load(&dataset)).unwrap()
}

#[test]
fn test_normalize_strips_punctuation_and_case() {
    assert_eq!(text::normalize("Joe's Café & Bar!"), "joes café bar");
    assert_eq!(text::normalize("  E-Commerce -- Platform  "), "e-commerce platform");
    assert_eq!(text::normalize("!!!"), "");
}

#[test]
fn test_phrase_matching_respects_word_boundaries() {
    let normalized = text::normalize("Online banking services");
    assert!(text::contains_phrase(&normalized, "banking services"));
    assert!(!text::contains_phrase(&normalized, "bank"));
    assert!(!text::contains_phrase(&normalized, "king ser"));
}

#[test]
fn test_code_tokens_removed_from_page_text() {
    let cleaned = text::strip_code_tokens("We bake bread daily() window.dataLayer {x} getElementById fresh pastries");
    assert_eq!(cleaned, "We bake bread fresh pastries");
}

#[test]
fn test_extract_keywords_by_frequency() {
    let keywords = text::extract_keywords("Bakery bread, bakery cakes. Bread and the bakery!", 2);
    assert_eq!(keywords, vec!["bakery".to_string(), "bread".to_string()]);

    let none = text::extract_keywords("the and for with 42 a", 10);
    assert!(none.is_empty());
}

#[test]
fn test_keyword_substring_minimum_length() {
    let normalized = text::normalize("SecureBank ai-powered");
    let tokens = text::unique_tokens(&normalized);

    assert!(keyword_matches("bank", &normalized, &tokens, 3));
    // Too short to match inside "ai-powered" as a substring, and not a token
    assert!(!keyword_matches("ai", &normalized, &tokens, 3));
    assert!(keyword_matches("ai", &normalized, &tokens, 2));
}

#[test]
fn test_score_entries_saturates_and_caps() {
    let settings = KeywordSettings::default();
    let entries = vec![
        entry(
            CodeFamily::Mcc,
            "7372",
            "Technology",
            &["software", "cloud", "saas", "platform", "developer", "hosting"],
        ),
        entry(CodeFamily::Mcc, "5812", "Food & Beverage", &["restaurant", "bakery"]),
    ];
    let normalized = text::normalize("Cloud software platform for developer teams, saas and hosting");
    let scores = score_entries(&normalized, &entries, &settings, MethodKind::Keyword);

    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].industry, "Technology");
    // six matches would be 1.2 before the ceiling
    assert!((scores[0].confidence - 0.9).abs() < 1e-9);
    assert_eq!(scores[0].code.as_deref(), Some("7372"));
    assert!(scores[0].evidence_note.contains("MCC 7372"));
}

#[test]
fn test_score_entries_keeps_ties_in_stable_order() {
    let settings = KeywordSettings::default();
    let entries = vec![
        entry(CodeFamily::Sic, "5812", "Food & Beverage", &["bakery"]),
        entry(CodeFamily::Mcc, "5462", "Food & Beverage", &["bakery"]),
        entry(CodeFamily::Mcc, "5411", "Retail", &["bakery"]),
    ];
    let scores = score_entries("artisan bakery", &entries, &settings, MethodKind::Keyword);

    let order: Vec<(&str, &str)> = scores
        .iter()
        .map(|s| (s.industry.as_str(), s.code.as_deref().unwrap_or("")))
        .collect();
    assert_eq!(
        order,
        vec![("Food & Beverage", "5462"), ("Food & Beverage", "5812"), ("Retail", "5411")]
    );
}

#[test]
fn test_per_code_scores_merge_to_one_industry() {
    let settings = KeywordSettings::default();
    let weights = WeightsConfig::default();
    let entries = vec![
        entry(CodeFamily::Mcc, "5462", "Food & Beverage", &["bakery", "bread"]),
        entry(CodeFamily::Naics, "311811", "Food & Beverage", &["bakery"]),
        entry(CodeFamily::Sic, "5461", "Food & Beverage", &["pastries"]),
    ];
    let normalized = text::normalize("Artisan bakery with fresh bread");
    let scores = score_entries(&normalized, &entries, &settings, MethodKind::Keyword);

    assert_eq!(scores.len(), 2);
    assert!(scores.iter().all(|s| s.industry == "Food & Beverage"));

    let merged = merge_method_scores(&scores, &weights, 0.35);
    assert_eq!(merged.len(), 1);
    assert!((merged[0].confidence - 2.0 / 5.0).abs() < 1e-9);

    let ranked = attach_codes(&merged, &code_candidates(&scores));
    let codes: Vec<&str> = ranked.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["5462", "311811"]);
}

#[test]
fn test_method_weights() {
    let weights = WeightsConfig::default();
    assert_eq!(method_weight(&weights, MethodKind::Keyword), Some(0.35));
    assert_eq!(method_weight(&weights, MethodKind::WebKeyword), Some(0.20));
    assert_eq!(method_weight(&weights, MethodKind::Risk), None);
    assert_eq!(method_weight(&weights, MethodKind::Website), None);
}

#[test]
fn test_failed_method_still_dilutes_merge() {
    let weights = WeightsConfig::default();
    let scores = vec![MethodScore::new(MethodKind::Keyword, "Retail", 0.8)];

    // Keyword alone vs keyword with a dispatched-but-failed model
    let alone = merge_method_scores(&scores, &weights, 0.35);
    let diluted = merge_method_scores(&scores, &weights, 0.80);

    assert!((alone[0].confidence - 0.8).abs() < 1e-9);
    assert!((diluted[0].confidence - 0.35 * 0.8 / 0.8).abs() < 1e-9);
}

#[test]
fn test_codes_follow_industry_rank() {
    let weights = WeightsConfig::default();
    let scores = vec![
        MethodScore::new(MethodKind::Keyword, "Retail", 0.4).with_code(CodeFamily::Mcc, "5311"),
        MethodScore::new(MethodKind::Keyword, "Technology", 0.6).with_code(CodeFamily::Mcc, "7372"),
        MethodScore::new(MethodKind::MachineLearning, "Technology", 0.9),
    ];
    let industries = merge_method_scores(&scores, &weights, 0.8);
    let ranked = attach_codes(&industries, &code_candidates(&scores));

    assert_eq!(ranked[0].code, "7372");
    assert_eq!(ranked[0].industry, "Technology");
    assert!(ranked[0].contributing_methods.contains(&MethodKind::MachineLearning));
    assert_eq!(ranked[1].code, "5311");
    assert!(ranked[0].confidence >= ranked[1].confidence);
}

#[test]
fn test_geo_adjustment_keeps_bounds() {
    let mut factors = HashMap::new();
    factors.insert(
        "GB".to_string(),
        HashMap::from([("Gambling".to_string(), 2.0)]),
    );
    let adjuster = GeoAdjuster::new(&GeoSettings { factors });

    let scores = vec![
        MethodScore::new(MethodKind::Keyword, "Gambling", 0.9),
        MethodScore::new(MethodKind::Keyword, "Travel & Hospitality", 0.9),
    ];
    let adjusted = adjuster.adjust(&scores, Some("gb"));

    assert!((adjusted[0].confidence - 1.0).abs() < 1e-9);
    assert!((adjusted[1].confidence - 0.5).abs() < 1e-9);
    assert_eq!(adjuster.adjust(&scores, Some("FR")), scores);
}

#[test]
fn test_region_inference_order() {
    let tld = infer_region(None, Some("https://www.example.co.uk"), Some("a GmbH company")).unwrap();
    assert_eq!(tld.code, "GB");
    assert_eq!(tld.source, RegionSource::WebsiteTld);

    let content = infer_region(None, Some("https://example.com"), Some("Acme GmbH, Berlin")).unwrap();
    assert_eq!(content.code, "DE");
    assert_eq!(content.source, RegionSource::WebsiteContent);

    assert_eq!(region_from_tld("https://acme.ai"), None);
    assert_eq!(region_from_tld("https://acme.fr.").as_deref(), Some("FR"));
}

#[test]
fn test_risk_scan_one_finding_per_concept() {
    let matcher = RiskMatcher::compile(&[risk_entry(
        "cocaine",
        RiskCategory::Illegal,
        Severity::Critical,
        &["crack cocaine", "yayo"],
    )]);

    let findings = matcher.scan("Yayo, crack cocaine and more cocaine", EvidenceSource::BusinessText, 20);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].detection, DetectionKind::Exact);
    assert_eq!(findings[0].matched_keyword, "cocaine");
}

#[test]
fn test_risk_scan_patterns_on_raw_text() {
    let findings = embedded_matcher().scan(
        "Invest now: GUARANTEED income every month!",
        EvidenceSource::Website,
        30,
    );
    let finding = findings
        .iter()
        .find(|f| f.matched_keyword == "guaranteed returns")
        .expect("pattern finding");
    assert_eq!(finding.detection, DetectionKind::Pattern);
    assert_eq!(finding.category, RiskCategory::Fraud);
    assert_eq!(finding.source, EvidenceSource::Website);
    assert_eq!(finding.matched_term, "guaranteed income");
    assert!(finding.source_text.contains("GUARANTEED income"));

    let percent = embedded_matcher().scan("Members earn 12.5% weekly profits.", EvidenceSource::Website, 30);
    let finding = percent
        .iter()
        .find(|f| f.matched_keyword == "guaranteed returns")
        .expect("percentage pattern finding");
    assert_eq!(finding.matched_term, "12.5% weekly profits");
}

#[test]
fn test_inactive_risk_keywords_not_loaded() {
    let findings = embedded_matcher().scan("We help sellers buy reviews", EvidenceSource::BusinessText, 20);
    assert!(findings.iter().all(|f| f.matched_keyword != "fake reviews"));
}

#[test]
fn test_high_findings_escalate_to_critical() {
    let scorer = RiskScorer::new(RiskSettings::default());
    let findings = RiskScorer::dedupe(embedded_matcher().scan(
        "Firearms, counterfeit handbags and narcotics shipped worldwide",
        EvidenceSource::BusinessText,
        20,
    ));

    assert_eq!(findings.len(), 3);
    assert!(findings.iter().all(|f| f.severity == Severity::High));
    assert_eq!(scorer.level(&findings), Severity::Critical);
    // illegal 0.7 + prohibited 0.7, capped
    assert_eq!(scorer.score(&findings), 1.0);
}

#[test]
fn test_clean_text_has_no_findings() {
    let findings = embedded_matcher().scan(
        "SecureBank digital banking and financial services",
        EvidenceSource::BusinessText,
        20,
    );
    assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
}

#[test]
fn test_robots_wildcard_group_only() {
    let rules = RobotsRules::parse("User-agent: *\nDisallow: /admin\n# comment\nAllow: /admin/about\n");
    assert!(rules.is_allowed("/about"));
    assert!(!rules.is_allowed("/admin/settings"));
    assert!(rules.is_allowed("/admin/about"));
}
