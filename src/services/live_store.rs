use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::models::{CodeFamily, RiskKeywordEntry, TaxonomyEntry};
use crate::services::store::{RiskKeywordStore, StoreError, TaxonomyStore};

/// Errors that can occur when talking to the live taxonomy store
#[derive(Debug, Error)]
pub enum LiveStoreError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl From<LiveStoreError> for StoreError {
    fn from(err: LiveStoreError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// HTTP client for the external classification-code and risk-keyword store
///
/// Endpoints:
/// - `GET /health`
/// - `GET /taxonomy/lookup?tokens=<json array>`
/// - `GET /taxonomy/codes/{family}/{code}`
/// - `GET /taxonomy/industries/{name}`
/// - `GET /risk-keywords?active_only=true`
pub struct LiveStoreClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl LiveStoreClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, LiveStoreError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.header("X-Api-Key", key),
            None => request,
        }
    }

    async fn get_json(&self, path: &str) -> Result<Option<Value>, LiveStoreError> {
        tracing::debug!("Live store request: {}", path);

        let response = self.get(path).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(LiveStoreError::ApiError(format!(
                "{} returned {}",
                path,
                response.status()
            )));
        }

        Ok(Some(response.json().await?))
    }

    fn parse_entries(json: &Value, field: &str) -> Result<Vec<TaxonomyEntry>, LiveStoreError> {
        let entries = json
            .get(field)
            .and_then(|e| e.as_array())
            .ok_or_else(|| LiveStoreError::InvalidResponse(format!("Missing {} array", field)))?;

        entries
            .iter()
            .map(|entry| {
                serde_json::from_value::<TaxonomyEntry>(entry.clone())
                    .map(|mut e| {
                        e.keywords = e.keywords.iter().map(|k| k.to_lowercase()).collect();
                        e
                    })
                    .map_err(|e| LiveStoreError::InvalidResponse(format!("Failed to parse entry: {}", e)))
            })
            .collect()
    }

    /// Check whether the store answers its health probe
    pub async fn health_check(&self) -> Result<bool, LiveStoreError> {
        let response = self.get("/health").send().await?;
        Ok(response.status().is_success())
    }

    pub async fn fetch_by_keywords(&self, tokens: &[String]) -> Result<Vec<TaxonomyEntry>, LiveStoreError> {
        let tokens_json = serde_json::to_string(tokens)
            .map_err(|e| LiveStoreError::InvalidResponse(e.to_string()))?;
        let path = format!("/taxonomy/lookup?tokens={}", urlencoding::encode(&tokens_json));

        match self.get_json(&path).await? {
            Some(json) => Self::parse_entries(&json, "entries"),
            None => Ok(Vec::new()),
        }
    }

    pub async fn fetch_by_code(&self, family: CodeFamily, code: &str) -> Result<Option<TaxonomyEntry>, LiveStoreError> {
        let path = format!(
            "/taxonomy/codes/{}/{}",
            family.as_str().to_lowercase(),
            urlencoding::encode(code)
        );

        match self.get_json(&path).await? {
            Some(json) => {
                let data = json.get("entry").unwrap_or(&json);
                serde_json::from_value(data.clone())
                    .map(Some)
                    .map_err(|e| LiveStoreError::InvalidResponse(format!("Failed to parse entry: {}", e)))
            }
            None => Ok(None),
        }
    }

    pub async fn fetch_by_industry(&self, industry: &str) -> Result<Vec<TaxonomyEntry>, LiveStoreError> {
        let path = format!("/taxonomy/industries/{}", urlencoding::encode(industry));

        match self.get_json(&path).await? {
            Some(json) => Self::parse_entries(&json, "entries"),
            None => Ok(Vec::new()),
        }
    }

    pub async fn fetch_risk_keywords(&self, active_only: bool) -> Result<Vec<RiskKeywordEntry>, LiveStoreError> {
        let path = format!("/risk-keywords?active_only={}", active_only);

        let json = self
            .get_json(&path)
            .await?
            .ok_or_else(|| LiveStoreError::ApiError("risk keyword endpoint not found".into()))?;

        let keywords = json
            .get("keywords")
            .and_then(|k| k.as_array())
            .ok_or_else(|| LiveStoreError::InvalidResponse("Missing keywords array".into()))?;

        let parsed: Vec<RiskKeywordEntry> = keywords
            .iter()
            .filter_map(|k| match serde_json::from_value(k.clone()) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping malformed risk keyword from live store: {}", e);
                    None
                }
            })
            .collect();

        Ok(parsed
            .into_iter()
            .filter(|k: &RiskKeywordEntry| !active_only || k.active)
            .collect())
    }
}

#[async_trait]
impl TaxonomyStore for LiveStoreClient {
    async fn lookup_by_keywords(&self, tokens: &[String]) -> Result<Vec<TaxonomyEntry>, StoreError> {
        Ok(self.fetch_by_keywords(tokens).await?)
    }

    async fn get_by_code(&self, family: CodeFamily, code: &str) -> Result<Option<TaxonomyEntry>, StoreError> {
        Ok(self.fetch_by_code(family, code).await?)
    }

    async fn lookup_by_industry(&self, industry: &str) -> Result<Vec<TaxonomyEntry>, StoreError> {
        Ok(self.fetch_by_industry(industry).await?)
    }
}

#[async_trait]
impl RiskKeywordStore for LiveStoreClient {
    async fn lookup_all(&self, active_only: bool) -> Result<Vec<RiskKeywordEntry>, StoreError> {
        Ok(self.fetch_risk_keywords(active_only).await?)
    }
}
