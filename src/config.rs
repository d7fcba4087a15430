//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub instance: InstanceConfig,
    pub timeline: TimelineConfig,
    pub workers: WorkerConfig,
    pub logging: LoggingConfig,
}

/// Instance metadata
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    /// Public domain (e.g., "social.example.com")
    pub domain: String,
    pub title: String,
    /// Moderator contact addresses for report emails
    pub moderator_emails: Vec<String>,
    /// Forward anonymized reports about remote accounts to their instance
    #[serde(default)]
    pub forward_reports: bool,
}

impl InstanceConfig {
    /// true when the account lives on this instance
    pub fn is_local(&self, domain: Option<&str>) -> bool {
        match domain {
            None => true,
            Some(d) => d.eq_ignore_ascii_case(&self.domain),
        }
    }
}

/// Timeline engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineConfig {
    /// How many recently-inserted entries to walk when deciding whether a
    /// repeat boost of the same original should be suppressed.
    #[serde(default = "default_reinsertion_depth")]
    pub reinsertion_depth: usize,
    /// Maximum in-memory entries per timeline before tail eviction.
    /// Durable storage remains the source of truth; eviction only drops cache.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Page size clamp for cursor requests
    #[serde(default = "default_min_limit")]
    pub min_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

fn default_reinsertion_depth() -> usize {
    50
}

fn default_max_entries() -> usize {
    400
}

fn default_min_limit() -> usize {
    1
}

fn default_max_limit() -> usize {
    40
}

fn default_limit() -> usize {
    20
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            reinsertion_depth: default_reinsertion_depth(),
            max_entries: default_max_entries(),
            min_limit: default_min_limit(),
            max_limit: default_max_limit(),
            default_limit: default_limit(),
        }
    }
}

/// Worker queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Workers draining the client-API event queue
    #[serde(default = "default_worker_count")]
    pub client_workers: usize,
    /// Workers draining the federator event queue
    #[serde(default = "default_worker_count")]
    pub federator_workers: usize,
    /// Bounded capacity of each queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_worker_count() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            client_workers: default_worker_count(),
            federator_workers: default_worker_count(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (ROOKERY_*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("instance.title", "Rookery")?
            .set_default("instance.moderator_emails", Vec::<String>::new())?
            .set_default("instance.forward_reports", false)?
            .set_default("timeline.reinsertion_depth", 50)?
            .set_default("timeline.max_entries", 400)?
            .set_default("timeline.min_limit", 1)?
            .set_default("timeline.max_limit", 40)?
            .set_default("timeline.default_limit", 20)?
            .set_default("workers.client_workers", 4)?
            .set_default("workers.federator_workers", 4)?
            .set_default("workers.queue_capacity", 1024)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("ROOKERY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.instance.domain.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "instance.domain must be set".to_string(),
            ));
        }

        if self.timeline.min_limit == 0 || self.timeline.min_limit > self.timeline.max_limit {
            return Err(crate::error::AppError::Config(
                "timeline.min_limit must be >= 1 and <= timeline.max_limit".to_string(),
            ));
        }

        if self.timeline.default_limit < self.timeline.min_limit
            || self.timeline.default_limit > self.timeline.max_limit
        {
            return Err(crate::error::AppError::Config(
                "timeline.default_limit must fall within [min_limit, max_limit]".to_string(),
            ));
        }

        if self.timeline.reinsertion_depth > self.timeline.max_entries {
            return Err(crate::error::AppError::Config(
                "timeline.reinsertion_depth cannot exceed timeline.max_entries".to_string(),
            ));
        }

        if self.workers.client_workers == 0 || self.workers.federator_workers == 0 {
            return Err(crate::error::AppError::Config(
                "worker pool sizes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
