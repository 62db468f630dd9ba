use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::WeightsConfig;
use crate::models::{
    CodeFamily, IndustryScore, MethodKind, MethodOutcome, MethodScore, MethodStatus, RankedClassification,
};

/// Merge weight of a method, `None` for methods that carry no industry signal
pub fn method_weight(weights: &WeightsConfig, method: MethodKind) -> Option<f64> {
    match method {
        MethodKind::Keyword => Some(weights.keyword),
        MethodKind::MachineLearning => Some(weights.ml),
        MethodKind::WebKeyword => Some(weights.web_keyword),
        MethodKind::Website | MethodKind::Risk | MethodKind::WebRisk => None,
    }
}

/// Total weight of the weighted methods a request dispatched: everything in
/// the breakdown except skipped methods
pub fn dispatched_weight(weights: &WeightsConfig, breakdown: &[MethodOutcome]) -> f64 {
    breakdown
        .iter()
        .filter(|o| o.status != MethodStatus::Skipped)
        .filter_map(|o| method_weight(weights, o.method))
        .sum()
}

/// Combine per-method scores into one score per industry
///
/// combined(industry) = Σ_m weight(m) · max_conf(m, industry) / denominator
///
/// `denominator` is the total weight of the weighted methods that were
/// dispatched, so a method that failed still dilutes the result while one
/// that never applied (web keyword without a URL) does not.
pub fn merge_method_scores(
    scores: &[MethodScore],
    weights: &WeightsConfig,
    denominator: f64,
) -> Vec<IndustryScore> {
    if denominator <= 0.0 {
        return Vec::new();
    }

    // industry -> method -> best confidence
    let mut best: BTreeMap<&str, BTreeMap<MethodKind, f64>> = BTreeMap::new();
    let mut keywords: HashMap<&str, Vec<String>> = HashMap::new();

    for score in scores {
        if method_weight(weights, score.method).is_none() || score.confidence <= 0.0 {
            continue;
        }
        let slot = best
            .entry(score.industry.as_str())
            .or_default()
            .entry(score.method)
            .or_insert(0.0);
        *slot = slot.max(score.confidence);

        let seen = keywords.entry(score.industry.as_str()).or_default();
        for keyword in &score.matched_keywords {
            if !seen.contains(keyword) {
                seen.push(keyword.clone());
            }
        }
    }

    let merged = best
        .into_iter()
        .map(|(industry, per_method)| {
            let total: f64 = per_method
                .iter()
                .filter_map(|(method, confidence)| method_weight(weights, *method).map(|w| w * confidence))
                .sum();
            IndustryScore {
                industry: industry.to_string(),
                confidence: (total / denominator).clamp(0.0, 1.0),
                contributing_methods: per_method.keys().copied().collect(),
                matched_keywords: keywords.remove(industry).unwrap_or_default(),
            }
        })
        .collect();

    rank_industries(merged)
}

/// Higher confidence first, then more contributing methods, then industry
/// name
#[inline]
pub fn compare_industries(a: &IndustryScore, b: &IndustryScore) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.contributing_methods.len().cmp(&a.contributing_methods.len()))
        .then_with(|| a.industry.cmp(&b.industry))
}

pub fn rank_industries(mut industries: Vec<IndustryScore>) -> Vec<IndustryScore> {
    industries.sort_by(compare_industries);
    industries
}

/// A code an industry can be reported under
#[derive(Debug, Clone, PartialEq)]
pub struct CodeCandidate {
    pub family: CodeFamily,
    pub code: String,
    /// Strength of the code's own evidence, 0 for codes known only by industry
    pub evidence: f64,
}

/// Collect the codes keyword methods matched, per industry
pub fn code_candidates(scores: &[MethodScore]) -> HashMap<String, Vec<CodeCandidate>> {
    let mut candidates: HashMap<String, Vec<CodeCandidate>> = HashMap::new();
    for score in scores {
        let (Some(family), Some(code)) = (score.family, score.code.as_ref()) else {
            continue;
        };
        let list = candidates.entry(score.industry.clone()).or_default();
        match list.iter_mut().find(|c| c.family == family && &c.code == code) {
            Some(existing) => existing.evidence = existing.evidence.max(score.confidence),
            None => list.push(CodeCandidate {
                family,
                code: code.clone(),
                evidence: score.confidence,
            }),
        }
    }
    candidates
}

/// Expand ranked industries into ranked (family, code) entries.
///
/// Industries keep their rank; within an industry codes are ordered by
/// family, then evidence, then code. Each (family, code) is reported once,
/// under its highest-ranked industry.
pub fn attach_codes(
    industries: &[IndustryScore],
    candidates: &HashMap<String, Vec<CodeCandidate>>,
) -> Vec<RankedClassification> {
    let mut emitted: HashSet<(CodeFamily, String)> = HashSet::new();
    let mut ranked = Vec::new();

    for industry in industries {
        let Some(codes) = candidates.get(&industry.industry) else {
            continue;
        };
        let mut codes = codes.clone();
        codes.sort_by(|a, b| {
            a.family
                .cmp(&b.family)
                .then_with(|| b.evidence.total_cmp(&a.evidence))
                .then_with(|| a.code.cmp(&b.code))
        });

        for code in codes {
            if !emitted.insert((code.family, code.code.clone())) {
                continue;
            }
            ranked.push(RankedClassification {
                family: code.family,
                code: code.code,
                industry: industry.industry.clone(),
                confidence: industry.confidence,
                contributing_methods: industry.contributing_methods.clone(),
            });
        }
    }
    ranked
}
