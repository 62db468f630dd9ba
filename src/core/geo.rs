use std::collections::HashMap;

use crate::config::GeoSettings;
use crate::core::text;
use crate::models::{clamp_unit, IndustryScore, MethodScore, RegionInfo, RegionSource};

/// Country-code TLDs commonly registered as generic or vanity domains
const GENERIC_CCTLDS: &[&str] = &["io", "ai", "co", "tv", "me", "ly", "fm", "gg", "eu", "cc", "to", "ws"];

/// Phrases in site text that reveal the country of incorporation
const CONTENT_HINTS: &[(&str, &str)] = &[
    ("registered in england and wales", "GB"),
    ("registered in scotland", "GB"),
    ("companies house", "GB"),
    ("gmbh", "DE"),
    ("handelsregister", "DE"),
    ("pty ltd", "AU"),
    ("private limited", "IN"),
    ("pvt ltd", "IN"),
    ("kabushiki kaisha", "JP"),
    ("sociedad limitada", "ES"),
];

/// Anything carrying an industry-level confidence the adjuster can rescale
pub trait IndustryWeighted: Clone {
    fn industry(&self) -> &str;
    fn confidence(&self) -> f64;
    /// Copy with a replaced confidence
    fn with_confidence(&self, confidence: f64) -> Self;
}

impl IndustryWeighted for MethodScore {
    fn industry(&self) -> &str {
        &self.industry
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn with_confidence(&self, confidence: f64) -> Self {
        Self {
            confidence: clamp_unit(confidence),
            ..self.clone()
        }
    }
}

impl IndustryWeighted for IndustryScore {
    fn industry(&self) -> &str {
        &self.industry
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn with_confidence(&self, confidence: f64) -> Self {
        Self {
            confidence: clamp_unit(confidence),
            ..self.clone()
        }
    }
}

/// Applies per-region, per-industry multiplicative factors
#[derive(Debug, Clone, Default)]
pub struct GeoAdjuster {
    /// region (upper-case) → industry (lower-case) → factor
    factors: HashMap<String, HashMap<String, f64>>,
}

impl GeoAdjuster {
    pub fn new(settings: &GeoSettings) -> Self {
        let factors = settings
            .factors
            .iter()
            .map(|(region, table)| {
                let table = table
                    .iter()
                    .map(|(industry, factor)| (industry.to_lowercase(), *factor))
                    .collect();
                (region.to_ascii_uppercase(), table)
            })
            .collect();
        Self { factors }
    }

    /// Factor for an industry in a region, 1.0 when not configured
    pub fn factor(&self, region: &str, industry: &str) -> f64 {
        self.factors
            .get(&region.to_ascii_uppercase())
            .and_then(|table| table.get(&industry.to_lowercase()))
            .copied()
            .unwrap_or(1.0)
    }

    /// Rescaled copies of `scores`.
    ///
    /// Without a region, or without factors for it, the scores pass through
    /// unchanged. Otherwise each confidence is multiplied by its factor and,
    /// if any result exceeds 1.0, all are divided by the maximum so relative
    /// order is kept.
    pub fn adjust<T: IndustryWeighted>(&self, scores: &[T], region: Option<&str>) -> Vec<T> {
        let Some(table) = region.and_then(|r| self.factors.get(&r.to_ascii_uppercase())) else {
            return scores.to_vec();
        };

        let scaled: Vec<f64> = scores
            .iter()
            .map(|s| {
                let factor = table.get(&s.industry().to_lowercase()).copied().unwrap_or(1.0);
                s.confidence() * factor
            })
            .collect();

        let max = scaled.iter().copied().fold(0.0_f64, f64::max);
        let divisor = if max > 1.0 { max } else { 1.0 };

        scores
            .iter()
            .zip(scaled)
            .map(|(score, value)| score.with_confidence(value / divisor))
            .collect()
    }
}

/// Region from the declared value, else the website's country-code TLD, else
/// incorporation hints in website text. Never guesses beyond those.
pub fn infer_region(declared: Option<&str>, website_url: Option<&str>, web_text: Option<&str>) -> Option<RegionInfo> {
    if let Some(code) = declared.map(str::trim).filter(|r| !r.is_empty()) {
        return Some(RegionInfo {
            code: code.to_ascii_uppercase(),
            source: RegionSource::Declared,
        });
    }

    if let Some(code) = website_url.and_then(region_from_tld) {
        return Some(RegionInfo {
            code,
            source: RegionSource::WebsiteTld,
        });
    }

    web_text.and_then(region_from_content).map(|code| RegionInfo {
        code,
        source: RegionSource::WebsiteContent,
    })
}

/// ISO region of a country-code top-level domain
pub fn region_from_tld(website_url: &str) -> Option<String> {
    let parsed = url::Url::parse(website_url.trim()).ok()?;
    let host = parsed.host_str()?;
    let tld = host.trim_end_matches('.').rsplit('.').next()?.to_ascii_lowercase();

    if tld.len() != 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if GENERIC_CCTLDS.contains(&tld.as_str()) {
        return None;
    }
    Some(match tld.as_str() {
        "uk" => "GB".to_string(),
        other => other.to_ascii_uppercase(),
    })
}

fn region_from_content(web_text: &str) -> Option<String> {
    let normalized = text::normalize(web_text);
    CONTENT_HINTS
        .iter()
        .find(|(phrase, _)| text::contains_phrase(&normalized, phrase))
        .map(|(_, region)| region.to_string())
}
