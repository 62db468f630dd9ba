// Core algorithm exports
pub mod aggregator;
pub mod geo;
pub mod keyword;
pub mod ml;
pub mod risk;
pub mod scoring;
pub mod text;

pub use aggregator::{BuildError, ClassificationEngine, ClassifyError, EngineBuilder};
pub use geo::{infer_region, GeoAdjuster, IndustryWeighted};
pub use keyword::{KeywordClassifier, KeywordOutcome};
pub use ml::{IndustryModel, MlClassifier, ModelError, Prediction, RemoteModel, TermWeightModel};
pub use risk::{RiskMatcher, RiskScorer};
pub use scoring::{merge_method_scores, rank_industries};
