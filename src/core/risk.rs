use regex::{Regex, RegexBuilder};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::time::Instant;

use crate::config::RiskSettings;
use crate::core::text;
use crate::models::{
    clamp_unit, CodeRef, DetectionKind, EvidenceSource, Restriction, RiskAssessment, RiskCategory,
    RiskFinding, RiskKeywordEntry, Severity,
};
use crate::services::store::{RiskKeywordStore, StoreError, TaxonomyStore};

/// One risk concept prepared for matching
#[derive(Debug, Clone)]
struct CompiledKeyword {
    keyword: String,
    category: RiskCategory,
    severity: Severity,
    synonyms: Vec<String>,
    patterns: Vec<Regex>,
    restricted_codes: Vec<CodeRef>,
}

/// Risk keywords with their patterns compiled, built once per request
#[derive(Debug, Clone, Default)]
pub struct RiskMatcher {
    keywords: Vec<CompiledKeyword>,
}

impl RiskMatcher {
    /// Compile entries; patterns that fail to compile are skipped
    pub fn compile(entries: &[RiskKeywordEntry]) -> Self {
        let keywords = entries
            .iter()
            .filter_map(|entry| {
                let keyword = text::normalize(&entry.keyword);
                if keyword.is_empty() {
                    return None;
                }

                let patterns = entry
                    .patterns
                    .iter()
                    .filter_map(|pattern| {
                        match RegexBuilder::new(pattern).case_insensitive(true).build() {
                            Ok(regex) => Some(regex),
                            Err(e) => {
                                tracing::warn!("Skipping invalid pattern for {}: {}", entry.keyword, e);
                                None
                            }
                        }
                    })
                    .collect();

                Some(CompiledKeyword {
                    keyword,
                    category: entry.category,
                    severity: entry.severity,
                    synonyms: entry
                        .synonyms
                        .iter()
                        .map(|s| text::normalize(s))
                        .filter(|s| !s.is_empty())
                        .collect(),
                    patterns,
                    restricted_codes: entry.restricted_codes.clone(),
                })
            })
            .collect();

        Self { keywords }
    }

    pub async fn load<S>(store: &S) -> Result<Self, StoreError>
    where
        S: RiskKeywordStore + ?Sized,
    {
        let entries = store.lookup_all(true).await?;
        Ok(Self::compile(&entries))
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    fn restricted_codes(&self, category: RiskCategory, keyword: &str) -> &[CodeRef] {
        self.keywords
            .iter()
            .find(|k| k.category == category && k.keyword == keyword)
            .map(|k| k.restricted_codes.as_slice())
            .unwrap_or(&[])
    }

    /// At most one finding per risk concept: the keyword itself, else the
    /// first matching synonym, else the first matching pattern.
    ///
    /// Keywords and synonyms match on normalized text; declared patterns run
    /// case-insensitively on the raw text so they can use punctuation such as
    /// `%` or `.`. Snippets are cut from the raw text.
    pub fn scan(&self, raw_text: &str, source: EvidenceSource, snippet_radius: usize) -> Vec<RiskFinding> {
        let normalized = text::normalize(raw_text);
        if normalized.is_empty() {
            return Vec::new();
        }

        self.keywords
            .iter()
            .filter_map(|concept| {
                let (term, detection, span) = detect(concept, raw_text, &normalized)?;
                let source_text = match span {
                    Span::Raw(start, end) => text::snippet(raw_text, start, end, snippet_radius),
                    Span::Normalized(start, end) => text::snippet(&normalized, start, end, snippet_radius),
                };
                Some(RiskFinding {
                    category: concept.category,
                    severity: concept.severity,
                    matched_keyword: concept.keyword.clone(),
                    matched_term: term,
                    detection,
                    source,
                    source_text,
                })
            })
            .collect()
    }
}

/// Where a match was found
enum Span {
    Raw(usize, usize),
    /// Term matched only after normalization folded it together
    Normalized(usize, usize),
}

fn detect(concept: &CompiledKeyword, raw: &str, normalized: &str) -> Option<(String, DetectionKind, Span)> {
    let phrase_span = |term: &str| {
        let (start, end) = text::find_phrase(normalized, term)?;
        Some(match text::find_phrase_raw(raw, term) {
            Some((start, end)) => Span::Raw(start, end),
            None => Span::Normalized(start, end),
        })
    };

    if let Some(span) = phrase_span(&concept.keyword) {
        return Some((concept.keyword.clone(), DetectionKind::Exact, span));
    }
    for synonym in &concept.synonyms {
        if let Some(span) = phrase_span(synonym) {
            return Some((synonym.clone(), DetectionKind::Synonym, span));
        }
    }
    for pattern in &concept.patterns {
        if let Some(found) = pattern.find(raw) {
            if !found.as_str().trim().is_empty() {
                return Some((
                    found.as_str().to_lowercase(),
                    DetectionKind::Pattern,
                    Span::Raw(found.start(), found.end()),
                ));
            }
        }
    }
    None
}

/// Turns risk findings into a scored assessment
#[derive(Debug, Clone)]
pub struct RiskScorer {
    settings: RiskSettings,
}

impl RiskScorer {
    pub fn new(settings: RiskSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RiskSettings {
        &self.settings
    }

    pub fn severity_weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Critical => self.settings.critical_weight,
            Severity::High => self.settings.high_weight,
            Severity::Medium => self.settings.medium_weight,
            Severity::Low => self.settings.low_weight,
        }
    }

    /// Findings deduplicated by (category, keyword), first occurrence kept,
    /// ordered by severity then category then keyword
    pub fn dedupe(findings: impl IntoIterator<Item = RiskFinding>) -> Vec<RiskFinding> {
        let mut seen = HashSet::new();
        let mut unique: Vec<RiskFinding> = findings
            .into_iter()
            .filter(|f| seen.insert((f.category, f.matched_keyword.clone())))
            .collect();

        unique.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.category.cmp(&b.category))
                .then_with(|| a.matched_keyword.cmp(&b.matched_keyword))
        });
        unique
    }

    /// Σ over distinct categories of that category's highest severity weight,
    /// capped at 1.0
    pub fn score(&self, findings: &[RiskFinding]) -> f64 {
        let mut per_category: HashMap<RiskCategory, Severity> = HashMap::new();
        for finding in findings {
            let slot = per_category.entry(finding.category).or_insert(finding.severity);
            *slot = (*slot).max(finding.severity);
        }
        clamp_unit(per_category.values().map(|s| self.severity_weight(*s)).sum())
    }

    /// Highest severity, escalated to critical when enough distinct
    /// high-severity concepts co-occur
    pub fn level(&self, findings: &[RiskFinding]) -> Severity {
        let Some(max) = findings.iter().map(|f| f.severity).max() else {
            return Severity::Low;
        };

        let high_concepts: HashSet<(RiskCategory, &str)> = findings
            .iter()
            .filter(|f| f.severity >= Severity::High)
            .map(|f| (f.category, f.matched_keyword.as_str()))
            .collect();

        if high_concepts.len() >= self.settings.escalation_high_count {
            Severity::Critical
        } else {
            max
        }
    }

    /// Build the assessment for deduplicated findings, resolving restricted
    /// codes through the taxonomy until `deadline`. Codes still unresolved
    /// at the deadline are reported without an industry.
    pub async fn assess<S>(
        &self,
        findings: Vec<RiskFinding>,
        matcher: &RiskMatcher,
        taxonomy: &S,
        deadline: Instant,
    ) -> RiskAssessment
    where
        S: TaxonomyStore + ?Sized,
    {
        let findings = Self::dedupe(findings);
        if findings.is_empty() {
            return RiskAssessment::empty();
        }

        let mut expired = false;
        let mut restrictions: BTreeMap<CodeRef, Restriction> = BTreeMap::new();
        for finding in &findings {
            for code in matcher.restricted_codes(finding.category, &finding.matched_keyword) {
                if restrictions.contains_key(code) {
                    continue;
                }
                let industry = if expired {
                    None
                } else {
                    match tokio::time::timeout_at(deadline, taxonomy.get_by_code(code.family, &code.code)).await {
                        Ok(Ok(entry)) => entry.map(|e| e.industry),
                        Ok(Err(e)) => {
                            tracing::warn!("Could not resolve restricted code {} {}: {}", code.family, code.code, e);
                            None
                        }
                        Err(_) => {
                            tracing::warn!("Restricted code lookups ran past the request deadline");
                            expired = true;
                            None
                        }
                    }
                };
                restrictions.insert(
                    code.clone(),
                    Restriction {
                        family: code.family,
                        code: code.code.clone(),
                        industry,
                        reason: format!("{} keyword '{}' matched", finding.category, finding.matched_keyword),
                    },
                );
            }
        }

        RiskAssessment {
            risk_score: self.score(&findings),
            risk_level: self.level(&findings),
            findings,
            restrictions: restrictions.into_values().collect(),
        }
    }
}
