use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::DataSourceSettings;
use crate::core::text;
use crate::models::{CodeFamily, RiskKeywordEntry, TaxonomyEntry};
use crate::services::live_store::LiveStoreClient;

const EMBEDDED_TAXONOMY: &str = include_str!("../../data/taxonomy.toml");
const EMBEDDED_RISK_KEYWORDS: &str = include_str!("../../data/risk_keywords.toml");

/// Errors surfaced by taxonomy and risk-keyword stores
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid store data: {0}")]
    InvalidData(String),
}

/// Read-only lookup of classification codes and their keyword sets
#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    /// Entries with at least one keyword related to the given tokens.
    ///
    /// The relation is deliberately coarse (token equality, phrase word
    /// equality or containment); callers apply their own matching rules.
    async fn lookup_by_keywords(&self, tokens: &[String]) -> Result<Vec<TaxonomyEntry>, StoreError>;

    async fn get_by_code(&self, family: CodeFamily, code: &str) -> Result<Option<TaxonomyEntry>, StoreError>;

    async fn lookup_by_industry(&self, industry: &str) -> Result<Vec<TaxonomyEntry>, StoreError>;
}

/// Read-only lookup of risk keywords
#[async_trait]
pub trait RiskKeywordStore: Send + Sync {
    async fn lookup_all(&self, active_only: bool) -> Result<Vec<RiskKeywordEntry>, StoreError>;
}

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    entries: Vec<TaxonomyEntry>,
}

#[derive(Debug, Deserialize)]
struct RiskKeywordFile {
    keywords: Vec<RiskKeywordEntry>,
}

/// In-memory taxonomy and risk-keyword snapshot
#[derive(Debug, Clone)]
pub struct StaticDataset {
    entries: Vec<TaxonomyEntry>,
    by_code: HashMap<(CodeFamily, String), usize>,
    by_industry: HashMap<String, Vec<usize>>,
    risk_keywords: Vec<RiskKeywordEntry>,
}

impl StaticDataset {
    pub fn new(entries: Vec<TaxonomyEntry>, risk_keywords: Vec<RiskKeywordEntry>) -> Self {
        let entries: Vec<TaxonomyEntry> = entries
            .into_iter()
            .map(|mut entry| {
                entry.keywords = entry
                    .keywords
                    .iter()
                    .map(|k| text::normalize(k))
                    .filter(|k| !k.is_empty())
                    .collect();
                entry
            })
            .collect();

        let mut by_code = HashMap::new();
        let mut by_industry: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            by_code.insert((entry.family, entry.code.clone()), idx);
            by_industry
                .entry(entry.industry.to_lowercase())
                .or_default()
                .push(idx);
        }

        Self {
            entries,
            by_code,
            by_industry,
            risk_keywords,
        }
    }

    /// Dataset compiled into the binary
    pub fn embedded() -> Result<Self, StoreError> {
        Self::from_toml(EMBEDDED_TAXONOMY, EMBEDDED_RISK_KEYWORDS)
    }

    pub fn from_toml(taxonomy: &str, risk_keywords: &str) -> Result<Self, StoreError> {
        let taxonomy: TaxonomyFile = toml::from_str(taxonomy)
            .map_err(|e| StoreError::InvalidData(format!("taxonomy: {}", e)))?;
        let risk: RiskKeywordFile = toml::from_str(risk_keywords)
            .map_err(|e| StoreError::InvalidData(format!("risk keywords: {}", e)))?;
        Ok(Self::new(taxonomy.entries, risk.keywords))
    }

    /// Load from override files, falling back to the embedded copy for any
    /// path not given
    pub fn from_paths(taxonomy_path: Option<&str>, risk_path: Option<&str>) -> Result<Self, StoreError> {
        let read = |path: &str| {
            std::fs::read_to_string(path)
                .map_err(|e| StoreError::InvalidData(format!("{}: {}", path, e)))
        };
        let taxonomy = match taxonomy_path {
            Some(path) => read(path)?,
            None => EMBEDDED_TAXONOMY.to_string(),
        };
        let risk = match risk_path {
            Some(path) => read(path)?,
            None => EMBEDDED_RISK_KEYWORDS.to_string(),
        };
        Self::from_toml(&taxonomy, &risk)
    }

    pub fn entries(&self) -> &[TaxonomyEntry] {
        &self.entries
    }

    pub fn risk_keywords(&self) -> &[RiskKeywordEntry] {
        &self.risk_keywords
    }

    fn keyword_related(keyword: &str, tokens: &HashSet<&str>) -> bool {
        if tokens.contains(keyword) {
            return true;
        }
        if keyword.contains(' ') {
            return keyword.split(' ').any(|word| tokens.contains(word));
        }
        tokens.iter().any(|token| token.contains(keyword))
    }
}

#[async_trait]
impl TaxonomyStore for StaticDataset {
    async fn lookup_by_keywords(&self, tokens: &[String]) -> Result<Vec<TaxonomyEntry>, StoreError> {
        let tokens: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.keywords.iter().any(|k| Self::keyword_related(k, &tokens)))
            .cloned()
            .collect())
    }

    async fn get_by_code(&self, family: CodeFamily, code: &str) -> Result<Option<TaxonomyEntry>, StoreError> {
        Ok(self
            .by_code
            .get(&(family, code.to_string()))
            .map(|&idx| self.entries[idx].clone()))
    }

    async fn lookup_by_industry(&self, industry: &str) -> Result<Vec<TaxonomyEntry>, StoreError> {
        Ok(self
            .by_industry
            .get(&industry.to_lowercase())
            .map(|indices| indices.iter().map(|&i| self.entries[i].clone()).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl RiskKeywordStore for StaticDataset {
    async fn lookup_all(&self, active_only: bool) -> Result<Vec<RiskKeywordEntry>, StoreError> {
        Ok(self
            .risk_keywords
            .iter()
            .filter(|k| !active_only || k.active)
            .cloned()
            .collect())
    }
}

/// Where taxonomy and risk keywords come from, chosen once at construction
pub enum DataSource {
    LiveStore(LiveStoreClient),
    FallbackStore(StaticDataset),
}

impl DataSource {
    /// Use the live store when configured and healthy, otherwise the static
    /// fallback dataset
    pub async fn from_settings(settings: &DataSourceSettings) -> Result<Self, StoreError> {
        if let Some(live_url) = settings.live_url.as_deref().filter(|u| !u.trim().is_empty()) {
            let client = LiveStoreClient::new(
                live_url,
                settings.api_key.clone(),
                Duration::from_millis(settings.timeout_ms),
            )
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

            match client.health_check().await {
                Ok(true) => {
                    info!("Using live taxonomy store at {}", live_url);
                    return Ok(DataSource::LiveStore(client));
                }
                Ok(false) => warn!("Live store at {} reported unhealthy, using fallback dataset", live_url),
                Err(e) => warn!("Live store at {} unreachable ({}), using fallback dataset", live_url, e),
            }
        }

        let dataset = StaticDataset::from_paths(
            settings.taxonomy_path.as_deref(),
            settings.risk_keywords_path.as_deref(),
        )?;
        info!(
            "Using fallback dataset ({} taxonomy entries, {} risk keywords)",
            dataset.entries().len(),
            dataset.risk_keywords().len()
        );
        Ok(DataSource::FallbackStore(dataset))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DataSource::LiveStore(_) => "live",
            DataSource::FallbackStore(_) => "fallback",
        }
    }
}

#[async_trait]
impl TaxonomyStore for DataSource {
    async fn lookup_by_keywords(&self, tokens: &[String]) -> Result<Vec<TaxonomyEntry>, StoreError> {
        match self {
            DataSource::LiveStore(store) => store.lookup_by_keywords(tokens).await,
            DataSource::FallbackStore(store) => store.lookup_by_keywords(tokens).await,
        }
    }

    async fn get_by_code(&self, family: CodeFamily, code: &str) -> Result<Option<TaxonomyEntry>, StoreError> {
        match self {
            DataSource::LiveStore(store) => store.get_by_code(family, code).await,
            DataSource::FallbackStore(store) => store.get_by_code(family, code).await,
        }
    }

    async fn lookup_by_industry(&self, industry: &str) -> Result<Vec<TaxonomyEntry>, StoreError> {
        match self {
            DataSource::LiveStore(store) => store.lookup_by_industry(industry).await,
            DataSource::FallbackStore(store) => store.lookup_by_industry(industry).await,
        }
    }
}

#[async_trait]
impl RiskKeywordStore for DataSource {
    async fn lookup_all(&self, active_only: bool) -> Result<Vec<RiskKeywordEntry>, StoreError> {
        match self {
            DataSource::LiveStore(store) => store.lookup_all(active_only).await,
            DataSource::FallbackStore(store) => store.lookup_all(active_only).await,
        }
    }
}
