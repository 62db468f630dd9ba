//! KYB Classifier - industry classification engine for business verification
//!
//! This library assigns MCC, NAICS and SIC codes and a risk assessment to a
//! business from its name, description and optional website. Keyword, model
//! and website signals are scored concurrently and merged into one ranked,
//! explainable result.

pub mod config;
pub mod core;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::Settings;
pub use core::{BuildError, ClassificationEngine, ClassifyError, EngineBuilder};
pub use models::{
    Classification, ClassificationRequest, ClassificationResult, CodeFamily, MethodKind, MethodStatus,
    RiskAssessment, Severity,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Verify that the library exports work correctly
        let request = ClassificationRequest::new("Acme", "widgets");
        assert_eq!(request.business_name(), "Acme");
        assert_eq!(CodeFamily::ALL.len(), 3);
    }
}
