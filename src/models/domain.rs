use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Classification code system
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CodeFamily {
    #[serde(rename = "MCC", alias = "mcc")]
    Mcc,
    #[serde(rename = "NAICS", alias = "naics")]
    Naics,
    #[serde(rename = "SIC", alias = "sic")]
    Sic,
}

impl CodeFamily {
    pub const ALL: [CodeFamily; 3] = [CodeFamily::Mcc, CodeFamily::Naics, CodeFamily::Sic];

    pub fn as_str(&self) -> &'static str {
        match self {
            CodeFamily::Mcc => "MCC",
            CodeFamily::Naics => "NAICS",
            CodeFamily::Sic => "SIC",
        }
    }
}

impl fmt::Display for CodeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MCC" => Ok(CodeFamily::Mcc),
            "NAICS" => Ok(CodeFamily::Naics),
            "SIC" => Ok(CodeFamily::Sic),
            other => Err(format!("unknown code family: {}", other)),
        }
    }
}

/// One row of the classification taxonomy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub family: CodeFamily,
    pub code: String,
    #[serde(rename = "industryName", alias = "industry")]
    pub industry: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "keywordSet", alias = "keywords", default)]
    pub keywords: BTreeSet<String>,
}

/// Reference to a code in a specific family
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CodeRef {
    pub family: CodeFamily,
    pub code: String,
}

/// Risk keyword category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RiskCategory {
    Illegal,
    Prohibited,
    HighRisk,
    Tbml,
    Sanctions,
    Fraud,
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskCategory::Illegal => "illegal",
            RiskCategory::Prohibited => "prohibited",
            RiskCategory::HighRisk => "highRisk",
            RiskCategory::Tbml => "tbml",
            RiskCategory::Sanctions => "sanctions",
            RiskCategory::Fraud => "fraud",
        };
        f.write_str(name)
    }
}

/// Severity of a risk finding, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Risk keyword with its detection metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskKeywordEntry {
    pub keyword: String,
    pub category: RiskCategory,
    pub severity: Severity,
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Regular expressions evaluated case-insensitively
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(rename = "restrictedCodes", alias = "restricted_codes", default)]
    pub restricted_codes: Vec<CodeRef>,
}

fn default_true() -> bool { true }

/// Identifies a classification method in the breakdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Keyword,
    MachineLearning,
    Website,
    WebKeyword,
    Risk,
    WebRisk,
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MethodKind::Keyword => "keyword",
            MethodKind::MachineLearning => "machine_learning",
            MethodKind::Website => "website",
            MethodKind::WebKeyword => "web_keyword",
            MethodKind::Risk => "risk",
            MethodKind::WebRisk => "web_risk",
        };
        f.write_str(name)
    }
}

/// One classifier's opinion about one industry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodScore {
    pub method: MethodKind,
    #[serde(rename = "industryName")]
    pub industry: String,
    pub family: Option<CodeFamily>,
    pub code: Option<String>,
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
    pub evidence_note: String,
}

impl MethodScore {
    pub fn new(method: MethodKind, industry: impl Into<String>, confidence: f64) -> Self {
        Self {
            method,
            industry: industry.into(),
            family: None,
            code: None,
            confidence: clamp_unit(confidence),
            matched_keywords: Vec::new(),
            evidence_note: String::new(),
        }
    }

    pub fn with_code(mut self, family: CodeFamily, code: impl Into<String>) -> Self {
        self.family = Some(family);
        self.code = Some(code.into());
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.matched_keywords = keywords;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.evidence_note = note.into();
        self
    }
}

/// Where a piece of risk evidence was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    BusinessText,
    Website,
}

/// How a risk keyword was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionKind {
    Exact,
    Synonym,
    Pattern,
}

/// A single risk keyword match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFinding {
    pub category: RiskCategory,
    pub severity: Severity,
    /// Canonical keyword of the matched concept
    pub matched_keyword: String,
    /// Surface form that actually matched (keyword, synonym or pattern match)
    pub matched_term: String,
    pub detection: DetectionKind,
    pub source: EvidenceSource,
    pub source_text: String,
}

/// Clamp a confidence value into [0, 1], mapping NaN to 0
#[inline]
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
