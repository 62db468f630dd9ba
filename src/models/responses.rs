use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::domain::{CodeFamily, MethodKind, MethodScore, RiskFinding, Severity};

/// Terminal state of one method run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodStatus {
    Succeeded,
    Failed,
    TimedOut,
    Skipped,
}

/// Breakdown record for one method of one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodOutcome {
    pub method: MethodKind,
    pub status: MethodStatus,
    pub scores: Vec<MethodScore>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub note: Option<String>,
}

impl MethodOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == MethodStatus::Succeeded
    }
}

/// One ranked (family, code) classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedClassification {
    pub family: CodeFamily,
    pub code: String,
    #[serde(rename = "industryName")]
    pub industry: String,
    pub confidence: f64,
    pub contributing_methods: BTreeSet<MethodKind>,
}

/// Combined score of one industry across methods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryScore {
    #[serde(rename = "industryName")]
    pub industry: String,
    pub confidence: f64,
    pub contributing_methods: BTreeSet<MethodKind>,
    pub matched_keywords: Vec<String>,
}

/// How the region used for adjustment was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionSource {
    Declared,
    WebsiteTld,
    WebsiteContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub code: String,
    pub source: RegionSource,
}

/// Aggregated classification output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub primary_industry: String,
    pub overall_confidence: f64,
    /// Ranked (family, code) entries across all families
    pub classifications: Vec<RankedClassification>,
    /// Ranked industries before code attachment
    pub industries: Vec<IndustryScore>,
    pub method_breakdown: Vec<MethodOutcome>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub region: Option<RegionInfo>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub note: Option<String>,
}

impl ClassificationResult {
    /// Top-ranked entry of a code family
    pub fn top_for_family(&self, family: CodeFamily) -> Option<&RankedClassification> {
        self.classifications.iter().find(|c| c.family == family)
    }

    pub fn is_unknown(&self) -> bool {
        self.industries.is_empty()
    }

    pub fn outcome(&self, method: MethodKind) -> Option<&MethodOutcome> {
        self.method_breakdown.iter().find(|o| o.method == method)
    }
}

/// Industry restriction implied by a matched risk keyword
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restriction {
    pub family: CodeFamily,
    pub code: String,
    #[serde(rename = "industryName")]
    pub industry: Option<String>,
    pub reason: String,
}

/// Aggregated risk output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub risk_level: Severity,
    pub findings: Vec<RiskFinding>,
    pub restrictions: Vec<Restriction>,
}

impl RiskAssessment {
    pub fn empty() -> Self {
        Self {
            risk_score: 0.0,
            risk_level: Severity::Low,
            findings: Vec::new(),
            restrictions: Vec::new(),
        }
    }
}

/// Full answer to a classify call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub result: ClassificationResult,
    pub risk: RiskAssessment,
}
