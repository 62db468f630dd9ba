// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    clamp_unit, CodeFamily, CodeRef, DetectionKind, EvidenceSource, MethodKind, MethodScore,
    RiskCategory, RiskFinding, RiskKeywordEntry, Severity, TaxonomyEntry,
};
pub use requests::ClassificationRequest;
pub use responses::{
    Classification, ClassificationResult, IndustryScore, MethodOutcome, MethodStatus,
    RankedClassification, RegionInfo, RegionSource, Restriction, RiskAssessment,
};
