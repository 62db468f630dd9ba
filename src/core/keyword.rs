use std::collections::HashSet;

use crate::config::KeywordSettings;
use crate::core::text;
use crate::models::{MethodKind, MethodScore, TaxonomyEntry};
use crate::services::store::TaxonomyStore;

/// Keyword scores for one piece of text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordOutcome {
    pub scores: Vec<MethodScore>,
    /// Set when the taxonomy could not be consulted
    pub note: Option<String>,
}

/// Scores text against the taxonomy by keyword overlap
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    settings: KeywordSettings,
}

impl KeywordClassifier {
    pub fn new(settings: KeywordSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &KeywordSettings {
        &self.settings
    }

    /// Look up candidate entries for `text` and score them.
    ///
    /// An unavailable store yields no scores and an explanatory note.
    pub async fn classify<S>(&self, store: &S, text: &str, method: MethodKind) -> KeywordOutcome
    where
        S: TaxonomyStore + ?Sized,
    {
        let normalized = text::normalize(text);
        if normalized.is_empty() {
            return KeywordOutcome::default();
        }

        let mut tokens: Vec<String> = text::unique_tokens(&normalized)
            .into_iter()
            .map(str::to_string)
            .collect();
        tokens.sort();

        match store.lookup_by_keywords(&tokens).await {
            Ok(entries) => KeywordOutcome {
                scores: score_entries(&normalized, &entries, &self.settings, method),
                note: None,
            },
            Err(e) => {
                tracing::warn!("Taxonomy lookup failed, keyword method has no matches: {}", e);
                KeywordOutcome {
                    scores: Vec::new(),
                    note: Some(format!("taxonomy unavailable: {}", e)),
                }
            }
        }
    }
}

/// Whether `keyword` occurs in the normalized text.
///
/// Phrases match on word boundaries, single words match a whole token, and
/// keywords of at least `min_substring_len` characters may also match inside
/// a longer token.
pub fn keyword_matches(
    keyword: &str,
    normalized: &str,
    tokens: &HashSet<&str>,
    min_substring_len: usize,
) -> bool {
    if keyword.contains(' ') {
        return text::contains_phrase(normalized, keyword);
    }
    if tokens.contains(keyword) {
        return true;
    }
    keyword.chars().count() >= min_substring_len && tokens.iter().any(|token| token.contains(keyword))
}

/// Score each taxonomy entry with at least one keyword hit
///
/// confidence = min(distinct matches / saturation, ceiling)
///
/// Scores are per code, so an industry listed under MCC, NAICS and SIC can
/// appear up to three times, each score carrying its own code and evidence.
/// The merge keeps the best score per industry and method; the per-code
/// scores are what rank codes within a family.
///
/// Entries with equal confidence are all kept, ordered by industry name then
/// code so the output is reproducible.
pub fn score_entries(
    normalized: &str,
    entries: &[TaxonomyEntry],
    settings: &KeywordSettings,
    method: MethodKind,
) -> Vec<MethodScore> {
    let tokens = text::unique_tokens(normalized);

    let mut scores: Vec<MethodScore> = entries
        .iter()
        .filter_map(|entry| {
            let matched: Vec<String> = entry
                .keywords
                .iter()
                .filter(|k| keyword_matches(k, normalized, &tokens, settings.min_substring_len))
                .cloned()
                .collect();

            if matched.is_empty() {
                return None;
            }

            let confidence = (matched.len() as f64 / settings.saturation).min(settings.ceiling);
            let note = format!(
                "{} of {} {} {} keywords matched",
                matched.len(),
                entry.keywords.len(),
                entry.family,
                entry.code
            );

            Some(
                MethodScore::new(method, entry.industry.clone(), confidence)
                    .with_code(entry.family, entry.code.clone())
                    .with_keywords(matched)
                    .with_note(note),
            )
        })
        .collect();

    scores.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.industry.cmp(&b.industry))
            .then_with(|| a.family.cmp(&b.family))
            .then_with(|| a.code.cmp(&b.code))
    });
    scores
}
