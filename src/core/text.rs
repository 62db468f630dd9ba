//! Text normalization and keyword extraction shared by the scoring methods.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::collections::{HashMap, HashSet};

/// Characters that never appear in business prose but are everywhere in code
const CODE_SYMBOLS: &[char] = &[
    '{', '}', ';', '=', '<', '>', '[', ']', '|', '\\', '$', '#', '@', '*', '^', '~', '`', '_',
];

/// Multi-character operators that mark a token as code
const CODE_OPERATORS: &[&str] = &["=>", "::", "->", "//", "&&", "()", "/*", "*/"];

/// Punctuation allowed to wrap an ordinary word in prose
const PROSE_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ':', '"', '\'', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}', '(', ')',
];

static CAMEL_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]+[A-Z][A-Za-z0-9]*$").expect("valid camelCase regex"));

static DOTTED_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z]{2,}\.[A-Za-z]{2,}").expect("valid dotted identifier regex"));

pub static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // English function words
        "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
        "one", "our", "out", "has", "have", "him", "his", "how", "its", "may", "new", "now", "old",
        "see", "two", "way", "who", "did", "get", "let", "put", "say", "she", "too", "use", "with",
        "from", "that", "this", "they", "them", "then", "than", "there", "their", "these", "those",
        "what", "when", "where", "which", "while", "will", "would", "could", "should", "your",
        "yours", "about", "above", "after", "again", "also", "been", "being", "before", "below",
        "between", "both", "each", "more", "most", "much", "must", "only", "other", "over", "same",
        "some", "such", "very", "into", "just", "like", "make", "made", "many", "here", "were",
        "does", "doing", "because", "through", "during", "under", "until", "upon", "well", "what",
        "whom", "why", "within", "without", "every", "even", "ever", "first", "last", "next",
        "less", "least", "own", "per", "via", "yet", "off", "onto", "ours", "able", "across",
        // Web boilerplate
        "home", "menu", "login", "logout", "sign", "signup", "cookie", "cookies", "privacy",
        "policy", "terms", "conditions", "copyright", "rights", "reserved", "click", "read",
        "learn", "contact", "page", "pages", "skip", "content", "main", "navigation", "search",
        "toggle", "close", "open", "submit", "email", "phone", "address", "follow", "share",
        "subscribe", "newsletter", "accept", "decline", "loading", "javascript", "enable",
        "browser", "website", "site", "link", "links", "view", "show", "hide", "back", "top",
    ]
    .into_iter()
    .collect()
});

/// Lower-case the text, drop apostrophes and reduce everything that is not
/// alphanumeric or an inner hyphen to single spaces
pub fn normalize(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '-' {
            cleaned.extend(ch.to_lowercase());
        } else if ch == '\'' || ch == '\u{2019}' {
            continue;
        } else {
            cleaned.push(' ');
        }
    }

    cleaned
        .split_whitespace()
        .map(|t| t.trim_matches('-'))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Distinct tokens of an already normalized text
pub fn unique_tokens(normalized: &str) -> HashSet<&str> {
    normalized.split_whitespace().collect()
}

/// Byte range of the first whole-word occurrence of `phrase` in `normalized`
pub fn find_phrase(normalized: &str, phrase: &str) -> Option<(usize, usize)> {
    if phrase.is_empty() {
        return None;
    }
    let bytes = normalized.as_bytes();
    normalized.match_indices(phrase).find_map(|(start, _)| {
        let end = start + phrase.len();
        let left_ok = start == 0 || bytes[start - 1] == b' ';
        let right_ok = end == normalized.len() || bytes[end] == b' ';
        (left_ok && right_ok).then_some((start, end))
    })
}

pub fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    find_phrase(normalized, phrase).is_some()
}

/// Byte range of a normalized phrase inside the raw text it came from,
/// ignoring case and whatever punctuation or spacing separates its words
pub fn find_phrase_raw(raw: &str, phrase: &str) -> Option<(usize, usize)> {
    let words: Vec<String> = phrase.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        return None;
    }
    let pattern = format!(r"\b{}\b", words.join(r"[^\p{L}\p{N}]+"));
    let regex = RegexBuilder::new(&pattern).case_insensitive(true).build().ok()?;
    regex.find(raw).map(|m| (m.start(), m.end()))
}

fn trim_prose_punctuation(token: &str) -> &str {
    token.trim_matches(|c| PROSE_PUNCTUATION.contains(&c))
}

/// Whether a raw (un-normalized) token looks like a fragment of source code
/// rather than a word
pub fn is_code_like(raw: &str) -> bool {
    if CODE_OPERATORS.iter().any(|op| raw.contains(op)) {
        return true;
    }

    let token = trim_prose_punctuation(raw);
    if token.chars().count() <= 1 {
        return true;
    }
    if token.chars().any(|c| CODE_SYMBOLS.contains(&c)) {
        return true;
    }
    if token.chars().all(|c| c.is_ascii_digit() || c.is_ascii_punctuation()) {
        return true;
    }
    if token.contains('(') || token.contains(')') {
        return true;
    }
    CAMEL_CASE.is_match(token) || DOTTED_IDENTIFIER.is_match(token)
}

/// Drop code-like tokens from visible page text, collapsing whitespace
pub fn strip_code_tokens(text: &str) -> String {
    text.split_whitespace()
        .filter(|t| !is_code_like(t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lower-cased business term for a raw token, if it qualifies as a keyword
fn keyword_candidate(raw: &str) -> Option<String> {
    if is_code_like(raw) {
        return None;
    }
    let word = trim_prose_punctuation(raw).to_lowercase();
    let word = word.trim_matches('-');
    if word.chars().count() < 3 {
        return None;
    }
    if !word.chars().all(|c| c.is_alphabetic() || c == '-') {
        return None;
    }
    if STOP_WORDS.contains(word) {
        return None;
    }
    Some(word.to_string())
}

/// Deduplicated business terms ordered by frequency (first occurrence breaks
/// ties), capped at `max`
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, raw) in text.split_whitespace().enumerate() {
        if let Some(word) = keyword_candidate(raw) {
            counts.entry(word).or_insert((0, position)).0 += 1;
        }
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(word, (count, first))| (word, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.2.cmp(&b.2)));
    ranked.truncate(max);
    ranked.into_iter().map(|(word, _, _)| word).collect()
}

/// Excerpt of `text` around the byte range `start..end`, `radius` characters
/// on each side
pub fn snippet(text: &str, start: usize, end: usize, radius: usize) -> String {
    let begin = text[..start]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(start);
    let finish = text[end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    text[begin..finish].split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &mut String, max_chars: usize) {
    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
}
