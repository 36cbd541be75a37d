//! Configuration management for Peptrack services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Gateway server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Enrichment run configuration
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// External source endpoints
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Evidence grade thresholds
    #[serde(default)]
    pub grading: GradingConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Gateway rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds (trigger requests run a whole batch)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL
    #[serde(default)]
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Per-statement timeout in seconds
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnrichmentConfig {
    /// Entities processed per run when no limit is given
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between entities, in milliseconds
    #[serde(default = "default_entity_delay")]
    pub entity_delay_ms: u64,

    /// Adapters queried concurrently for one entity
    #[serde(default = "default_adapter_concurrency")]
    pub adapter_concurrency: usize,

    /// Upper bound on one adapter query, in seconds
    #[serde(default = "default_adapter_timeout")]
    pub adapter_timeout_secs: u64,

    /// Upper bound on processing one entity, in seconds
    #[serde(default = "default_entity_timeout")]
    pub entity_timeout_secs: u64,

    /// Global run deadline in seconds (0 disables)
    #[serde(default = "default_run_deadline")]
    pub run_deadline_secs: u64,

    /// Per-request timeout for outbound HTTP, in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Retries after the first attempt for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial retry interval in milliseconds
    #[serde(default = "default_retry_base")]
    pub retry_base_ms: u64,

    /// Outbound requests per second across all adapters
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// User-Agent sent to external sources
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Jurisdiction used for safety, dosing and use-case writes
    #[serde(default = "default_primary_jurisdiction")]
    pub primary_jurisdiction: String,

    /// TTL for the jurisdiction and use-case lookup caches, in seconds
    #[serde(default = "default_lookup_cache_ttl")]
    pub lookup_cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesConfig {
    #[serde(default = "default_clinical_trials_base")]
    pub clinical_trials_base: String,

    #[serde(default = "default_eutils_base")]
    pub eutils_base: String,

    /// NCBI API key (raises the E-utilities rate limit)
    pub ncbi_api_key: Option<String>,

    #[serde(default = "default_openfda_base")]
    pub openfda_base: String,

    pub openfda_api_key: Option<String>,

    #[serde(default = "default_pubchem_base")]
    pub pubchem_base: String,

    #[serde(default = "default_chembl_base")]
    pub chembl_base: String,

    #[serde(default = "default_reddit_base")]
    pub reddit_base: String,

    #[serde(default = "default_hackernews_base")]
    pub hackernews_base: String,

    /// Studies requested from the trial registry
    #[serde(default = "default_trial_page_size")]
    pub trial_page_size: u32,

    /// Literature records summarized per entity
    #[serde(default = "default_literature_summary_limit")]
    pub literature_summary_limit: u32,

    /// Posts requested per discussion source
    #[serde(default = "default_community_post_limit")]
    pub community_post_limit: u32,
}

/// Thresholds for evidence grade inference
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GradingConfig {
    /// Completed trials required alongside a label for grade A
    #[serde(default = "default_label_completed_trials")]
    pub label_completed_trials: u32,

    /// Development phase counted as top tier
    #[serde(default = "default_top_tier_phase")]
    pub top_tier_phase: f32,

    /// Total trials required alongside a top-tier phase for grade A
    #[serde(default = "default_top_tier_total_trials")]
    pub top_tier_total_trials: u32,

    /// Development phase counted as mid tier
    #[serde(default = "default_mid_tier_phase")]
    pub mid_tier_phase: f32,

    #[serde(default = "default_b_completed_trials")]
    pub b_completed_trials: u32,

    #[serde(default = "default_b_literature_count")]
    pub b_literature_count: u64,

    #[serde(default = "default_c_total_trials")]
    pub c_total_trials: u32,

    #[serde(default = "default_c_literature_count")]
    pub c_literature_count: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level or filter directive (debug, info, peptrack_enrichment=debug)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 900 }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_statement_timeout() -> u64 { 20 }
fn default_batch_size() -> usize { 25 }
fn default_entity_delay() -> u64 { 350 }
fn default_adapter_concurrency() -> usize { 3 }
fn default_adapter_timeout() -> u64 { 60 }
fn default_entity_timeout() -> u64 { 120 }
fn default_run_deadline() -> u64 { 3600 }
fn default_fetch_timeout() -> u64 { 18 }
fn default_max_retries() -> u32 { 3 }
fn default_retry_base() -> u64 { 750 }
fn default_requests_per_second() -> u32 { 4 }
fn default_user_agent() -> String { format!("peptrack-enrichment/{}", crate::VERSION) }
fn default_primary_jurisdiction() -> String { crate::DEFAULT_JURISDICTION.to_string() }
fn default_lookup_cache_ttl() -> u64 { 600 }
fn default_clinical_trials_base() -> String { "https://clinicaltrials.gov/api/v2".to_string() }
fn default_eutils_base() -> String { "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string() }
fn default_openfda_base() -> String { "https://api.fda.gov".to_string() }
fn default_pubchem_base() -> String { "https://pubchem.ncbi.nlm.nih.gov/rest/pug".to_string() }
fn default_chembl_base() -> String { "https://www.ebi.ac.uk/chembl/api/data".to_string() }
fn default_reddit_base() -> String { "https://www.reddit.com".to_string() }
fn default_hackernews_base() -> String { "https://hn.algolia.com/api/v1".to_string() }
fn default_trial_page_size() -> u32 { 100 }
fn default_literature_summary_limit() -> u32 { 5 }
fn default_community_post_limit() -> u32 { 25 }
fn default_label_completed_trials() -> u32 { 5 }
fn default_top_tier_phase() -> f32 { 3.0 }
fn default_top_tier_total_trials() -> u32 { 8 }
fn default_mid_tier_phase() -> f32 { 2.0 }
fn default_b_completed_trials() -> u32 { 3 }
fn default_b_literature_count() -> u64 { 40 }
fn default_c_total_trials() -> u32 { 5 }
fn default_c_literature_count() -> u64 { 12 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__ENRICHMENT__MAX_RETRIES=5
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load and validate; any failure here is fatal to the whole run
    pub fn load_validated() -> Result<Self> {
        let config = Self::load()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make a run meaningless or unbounded
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(AppError::configuration(
                "database.url is not set (APP__DATABASE__URL)",
            ));
        }
        if self.enrichment.adapter_concurrency == 0 {
            return Err(AppError::configuration(
                "enrichment.adapter_concurrency must be at least 1",
            ));
        }
        if self.enrichment.requests_per_second == 0 {
            return Err(AppError::configuration(
                "enrichment.requests_per_second must be at least 1",
            ));
        }
        if self.enrichment.fetch_timeout_secs == 0 || self.enrichment.entity_timeout_secs == 0 {
            return Err(AppError::configuration("enrichment timeouts must be non-zero"));
        }
        if self.enrichment.primary_jurisdiction.trim().is_empty() {
            return Err(AppError::configuration(
                "enrichment.primary_jurisdiction is empty",
            ));
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl EnrichmentConfig {
    pub fn entity_delay(&self) -> Duration {
        Duration::from_millis(self.entity_delay_ms)
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs)
    }

    pub fn entity_timeout(&self) -> Duration {
        Duration::from_secs(self.entity_timeout_secs)
    }

    /// Global run deadline, if one is configured
    pub fn run_deadline(&self) -> Option<Duration> {
        (self.run_deadline_secs > 0).then(|| Duration::from_secs(self.run_deadline_secs))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }

    pub fn lookup_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.lookup_cache_ttl_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            statement_timeout_secs: default_statement_timeout(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            entity_delay_ms: default_entity_delay(),
            adapter_concurrency: default_adapter_concurrency(),
            adapter_timeout_secs: default_adapter_timeout(),
            entity_timeout_secs: default_entity_timeout(),
            run_deadline_secs: default_run_deadline(),
            fetch_timeout_secs: default_fetch_timeout(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base(),
            requests_per_second: default_requests_per_second(),
            user_agent: default_user_agent(),
            primary_jurisdiction: default_primary_jurisdiction(),
            lookup_cache_ttl_secs: default_lookup_cache_ttl(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            clinical_trials_base: default_clinical_trials_base(),
            eutils_base: default_eutils_base(),
            ncbi_api_key: None,
            openfda_base: default_openfda_base(),
            openfda_api_key: None,
            pubchem_base: default_pubchem_base(),
            chembl_base: default_chembl_base(),
            reddit_base: default_reddit_base(),
            hackernews_base: default_hackernews_base(),
            trial_page_size: default_trial_page_size(),
            literature_summary_limit: default_literature_summary_limit(),
            community_post_limit: default_community_post_limit(),
        }
    }
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            label_completed_trials: default_label_completed_trials(),
            top_tier_phase: default_top_tier_phase(),
            top_tier_total_trials: default_top_tier_total_trials(),
            mid_tier_phase: default_mid_tier_phase(),
            b_completed_trials: default_b_completed_trials(),
            b_literature_count: default_b_literature_count(),
            c_total_trials: default_c_total_trials(),
            c_literature_count: default_c_literature_count(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: 0,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/peptrack".to_string(),
                ..DatabaseConfig::default()
            },
            enrichment: EnrichmentConfig::default(),
            sources: SourcesConfig::default(),
            grading: GradingConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
