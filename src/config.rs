use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub weights: WeightsConfig,
    #[serde(default)]
    pub keyword: KeywordSettings,
    #[serde(default)]
    pub ml: MlSettings,
    #[serde(default)]
    pub website: WebsiteSettings,
    #[serde(default)]
    pub risk: RiskSettings,
    #[serde(default)]
    pub geo: GeoSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub data_source: DataSourceSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_request_budget_ms")]
    pub request_budget_ms: u64,
    #[serde(default = "default_method_timeout_ms")]
    pub method_timeout_ms: u64,
    #[serde(default = "default_unknown_label")]
    pub unknown_industry_label: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            request_budget_ms: default_request_budget_ms(),
            method_timeout_ms: default_method_timeout_ms(),
            unknown_industry_label: default_unknown_label(),
        }
    }
}

impl EngineSettings {
    pub fn request_budget(&self) -> Duration {
        Duration::from_millis(self.request_budget_ms)
    }

    pub fn method_timeout(&self) -> Duration {
        Duration::from_millis(self.method_timeout_ms)
    }
}

fn default_request_budget_ms() -> u64 { 5_000 }
fn default_method_timeout_ms() -> u64 { 2_000 }
fn default_unknown_label() -> String { "Unknown".to_string() }

/// Per-method weights used when combining scores
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_keyword_weight")]
    pub keyword: f64,
    #[serde(default = "default_ml_weight")]
    pub ml: f64,
    #[serde(default = "default_web_keyword_weight")]
    pub web_keyword: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            keyword: default_keyword_weight(),
            ml: default_ml_weight(),
            web_keyword: default_web_keyword_weight(),
        }
    }
}

fn default_keyword_weight() -> f64 { 0.35 }
fn default_ml_weight() -> f64 { 0.45 }
fn default_web_keyword_weight() -> f64 { 0.20 }

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct KeywordSettings {
    /// Distinct matches needed to reach full lexical confidence
    #[serde(default = "default_saturation")]
    pub saturation: f64,
    /// Upper bound on keyword-only confidence
    #[serde(default = "default_ceiling")]
    pub ceiling: f64,
    /// Shortest keyword allowed to match inside a longer token
    #[serde(default = "default_min_substring_len")]
    pub min_substring_len: usize,
}

impl Default for KeywordSettings {
    fn default() -> Self {
        Self {
            saturation: default_saturation(),
            ceiling: default_ceiling(),
            min_substring_len: default_min_substring_len(),
        }
    }
}

fn default_saturation() -> f64 { 5.0 }
fn default_ceiling() -> f64 { 0.9 }
fn default_min_substring_len() -> usize { 3 }

#[derive(Debug, Clone, Deserialize)]
pub struct MlSettings {
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Remote model-serving endpoint; the embedded model is used when absent
    pub endpoint: Option<String>,
    #[serde(default = "default_ml_timeout_ms")]
    pub timeout_ms: u64,
    /// Alternative term-weight model file (TOML)
    pub model_path: Option<String>,
}

impl Default for MlSettings {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            endpoint: None,
            timeout_ms: default_ml_timeout_ms(),
            model_path: None,
        }
    }
}

fn default_min_confidence() -> f64 { 0.05 }
fn default_ml_timeout_ms() -> u64 { 1_500 }

#[derive(Debug, Clone, Deserialize)]
pub struct WebsiteSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_page_timeout_ms")]
    pub page_timeout_ms: u64,
    #[serde(default = "default_overall_deadline_ms")]
    pub overall_deadline_ms: u64,
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    #[serde(default = "default_max_followed_pages")]
    pub max_followed_pages: usize,
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_true")]
    pub verify_tls: bool,
    #[serde(default = "default_true")]
    pub respect_robots_txt: bool,
}

impl Default for WebsiteSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            page_timeout_ms: default_page_timeout_ms(),
            overall_deadline_ms: default_overall_deadline_ms(),
            max_response_bytes: default_max_response_bytes(),
            max_followed_pages: default_max_followed_pages(),
            max_keywords: default_max_keywords(),
            max_text_chars: default_max_text_chars(),
            user_agent: default_user_agent(),
            verify_tls: true,
            respect_robots_txt: true,
        }
    }
}

impl WebsiteSettings {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn overall_deadline(&self) -> Duration {
        Duration::from_millis(self.overall_deadline_ms)
    }
}

fn default_true() -> bool { true }
fn default_page_timeout_ms() -> u64 { 5_000 }
fn default_overall_deadline_ms() -> u64 { 4_500 }
fn default_max_response_bytes() -> usize { 2 * 1024 * 1024 }
fn default_max_followed_pages() -> usize { 3 }
fn default_max_keywords() -> usize { 20 }
fn default_max_text_chars() -> usize { 100_000 }
fn default_user_agent() -> String {
    format!("kyb-classifier/{} (+business verification)", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RiskSettings {
    #[serde(default = "default_critical_weight")]
    pub critical_weight: f64,
    #[serde(default = "default_high_weight")]
    pub high_weight: f64,
    #[serde(default = "default_medium_weight")]
    pub medium_weight: f64,
    #[serde(default = "default_low_weight")]
    pub low_weight: f64,
    /// Independent high-severity findings that escalate the level to critical
    #[serde(default = "default_escalation_high_count")]
    pub escalation_high_count: usize,
    #[serde(default = "default_snippet_radius")]
    pub snippet_radius: usize,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            critical_weight: default_critical_weight(),
            high_weight: default_high_weight(),
            medium_weight: default_medium_weight(),
            low_weight: default_low_weight(),
            escalation_high_count: default_escalation_high_count(),
            snippet_radius: default_snippet_radius(),
        }
    }
}

fn default_critical_weight() -> f64 { 1.0 }
fn default_high_weight() -> f64 { 0.7 }
fn default_medium_weight() -> f64 { 0.4 }
fn default_low_weight() -> f64 { 0.15 }
fn default_escalation_high_count() -> usize { 3 }
fn default_snippet_radius() -> usize { 40 }

/// Region → industry → multiplicative factor
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeoSettings {
    #[serde(default)]
    pub factors: HashMap<String, HashMap<String, f64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub redis_url: Option<String>,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_l1_cache_size")]
    pub l1_cache_size: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_secs: default_ttl_secs(),
            l1_cache_size: default_l1_cache_size(),
        }
    }
}

fn default_ttl_secs() -> u64 { 3_600 }
fn default_l1_cache_size() -> u64 { 10_000 }

#[derive(Debug, Clone, Deserialize)]
pub struct DataSourceSettings {
    pub live_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
    pub taxonomy_path: Option<String>,
    pub risk_keywords_path: Option<String>,
}

impl Default for DataSourceSettings {
    fn default() -> Self {
        Self {
            live_url: None,
            api_key: None,
            timeout_ms: default_store_timeout_ms(),
            taxonomy_path: None,
            risk_keywords_path: None,
        }
    }
}

fn default_store_timeout_ms() -> u64 { 3_000 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with KYB_)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., KYB__WEIGHTS__ML -> weights.ml
            .add_source(
                Environment::with_prefix("KYB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("KYB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject tuning values that would break the [0, 1] confidence bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.weights;
        if w.keyword < 0.0 || w.ml < 0.0 || w.web_keyword < 0.0 {
            return Err(ConfigError::Message("method weights must be non-negative".into()));
        }
        if w.keyword + w.ml + w.web_keyword <= 0.0 {
            return Err(ConfigError::Message("method weights must not all be zero".into()));
        }
        if self.keyword.saturation <= 0.0 {
            return Err(ConfigError::Message("keyword.saturation must be positive".into()));
        }
        if !(self.keyword.ceiling > 0.0 && self.keyword.ceiling <= 1.0) {
            return Err(ConfigError::Message("keyword.ceiling must be in (0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.ml.min_confidence) {
            return Err(ConfigError::Message("ml.min_confidence must be in [0, 1]".into()));
        }
        for (region, table) in &self.geo.factors {
            if table.values().any(|f| !f.is_finite() || *f < 0.0) {
                return Err(ConfigError::Message(format!(
                    "geo factors for {} must be finite and non-negative",
                    region
                )));
            }
        }
        Ok(())
    }
}
