//! Model-based industry scoring.
//!
//! The engine only depends on [`IndustryModel`]: text in, a probability per
//! industry out. Two implementations ship with the crate, an embedded
//! term-weight model and a client for a remote model-serving endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::core::text;
use crate::models::{clamp_unit, MethodKind, MethodScore};

const EMBEDDED_MODEL: &str = include_str!("../../data/industry_model.toml");

/// Errors raised by industry models
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error("Invalid model definition: {0}")]
    InvalidModel(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        ModelError::Unavailable(err.to_string())
    }
}

/// Probability the model assigns to one industry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub industry: String,
    pub probability: f64,
}

/// A trained model producing a distribution over industries
#[async_trait]
pub trait IndustryModel: Send + Sync {
    fn name(&self) -> &str;

    /// Predictions for normalized business text, in any order
    async fn predict(&self, text: &str) -> Result<Vec<Prediction>, ModelError>;
}

#[derive(Debug, Clone, Deserialize)]
struct ModelClass {
    industry: String,
    #[serde(default)]
    bias: f64,
    terms: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ModelFile {
    name: String,
    background_bias: f64,
    classes: Vec<ModelClass>,
}

/// Linear term-weight model with a softmax output.
///
/// Each class scores `bias + Σ weight(term)` over the distinct terms present
/// in the text. A bias-only background class takes part in the softmax so
/// that weak evidence spreads probability away from every industry; text
/// that hits no term at all yields no predictions.
#[derive(Debug, Clone)]
pub struct TermWeightModel {
    name: String,
    background_bias: f64,
    classes: Vec<ModelClass>,
}

impl TermWeightModel {
    /// Model compiled into the binary
    pub fn embedded() -> Result<Self, ModelError> {
        Self::from_toml(EMBEDDED_MODEL)
    }

    pub fn from_toml(source: &str) -> Result<Self, ModelError> {
        let file: ModelFile = toml::from_str(source).map_err(|e| ModelError::InvalidModel(e.to_string()))?;
        if file.classes.is_empty() {
            return Err(ModelError::InvalidModel("model has no classes".into()));
        }

        let classes = file
            .classes
            .into_iter()
            .map(|class| ModelClass {
                terms: class
                    .terms
                    .into_iter()
                    .map(|(term, weight)| (text::normalize(&term), weight))
                    .collect(),
                ..class
            })
            .collect();

        Ok(Self {
            name: file.name,
            background_bias: file.background_bias,
            classes,
        })
    }

    pub fn from_path(path: &str) -> Result<Self, ModelError> {
        let source = std::fs::read_to_string(path).map_err(|e| ModelError::InvalidModel(format!("{}: {}", path, e)))?;
        Self::from_toml(&source)
    }

    fn class_score(class: &ModelClass, normalized: &str) -> (f64, usize) {
        let tokens = text::unique_tokens(normalized);
        class
            .terms
            .iter()
            .filter(|(term, _)| {
                if term.contains(' ') {
                    text::contains_phrase(normalized, term)
                } else {
                    tokens.contains(term.as_str())
                }
            })
            .fold((class.bias, 0), |(score, hits), (_, weight)| (score + weight, hits + 1))
    }

    fn softmax(&self, normalized: &str) -> Vec<Prediction> {
        let scored: Vec<(&str, f64, usize)> = self
            .classes
            .iter()
            .map(|class| {
                let (score, hits) = Self::class_score(class, normalized);
                (class.industry.as_str(), score, hits)
            })
            .collect();

        if scored.iter().all(|(_, _, hits)| *hits == 0) {
            return Vec::new();
        }

        let max = scored
            .iter()
            .map(|(_, score, _)| *score)
            .fold(self.background_bias, f64::max);
        let background = (self.background_bias - max).exp();
        let total: f64 = background + scored.iter().map(|(_, s, _)| (s - max).exp()).sum::<f64>();

        scored
            .into_iter()
            .map(|(industry, score, _)| Prediction {
                industry: industry.to_string(),
                probability: (score - max).exp() / total,
            })
            .collect()
    }
}

#[async_trait]
impl IndustryModel for TermWeightModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn predict(&self, text: &str) -> Result<Vec<Prediction>, ModelError> {
        Ok(self.softmax(&text::normalize(text)))
    }
}

#[derive(Debug, Serialize)]
struct RemoteRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct RemoteResponse {
    predictions: Vec<Prediction>,
}

/// Client for a model-serving endpoint
///
/// `POST {endpoint}` with `{"text": ...}`, expecting
/// `{"predictions": [{"industry": ..., "probability": ...}]}`.
pub struct RemoteModel {
    endpoint: String,
    client: Client,
}

impl RemoteModel {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }
}

#[async_trait]
impl IndustryModel for RemoteModel {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn predict(&self, text: &str) -> Result<Vec<Prediction>, ModelError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RemoteRequest { text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ModelError::Unavailable(format!("model endpoint returned {}", response.status())));
        }

        let body: RemoteResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        if body.predictions.iter().any(|p| !p.probability.is_finite()) {
            return Err(ModelError::InvalidResponse("non-finite probability".into()));
        }
        Ok(body.predictions)
    }
}

/// Turns model predictions into method scores above a confidence floor
#[derive(Clone)]
pub struct MlClassifier {
    model: Arc<dyn IndustryModel>,
    min_confidence: f64,
}

impl MlClassifier {
    pub fn new(model: Arc<dyn IndustryModel>, min_confidence: f64) -> Self {
        Self { model, min_confidence }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Scores sorted by confidence, predictions below the floor discarded
    pub async fn classify(&self, text: &str) -> Result<Vec<MethodScore>, ModelError> {
        let normalized = text::normalize(text);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let predictions = self.model.predict(&normalized).await?;

        let mut best: HashMap<String, f64> = HashMap::new();
        for prediction in predictions {
            let probability = clamp_unit(prediction.probability);
            if probability < self.min_confidence || prediction.industry.trim().is_empty() {
                continue;
            }
            let slot = best.entry(prediction.industry).or_insert(0.0);
            *slot = slot.max(probability);
        }

        let mut scores: Vec<MethodScore> = best
            .into_iter()
            .map(|(industry, probability)| {
                MethodScore::new(MethodKind::MachineLearning, industry, probability)
                    .with_note(format!("{} p={:.3}", self.model.name(), probability))
            })
            .collect();

        scores.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.industry.cmp(&b.industry))
        });
        Ok(scores)
    }
}
