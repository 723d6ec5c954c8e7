use std::path::PathBuf;

use crate::core::error::ConfigError;

/// Table identifier as stored in the dataset schema. The backing store is
/// case-sensitive about it; generated SQL is normalized to this casing.
pub const CANONICAL_TABLE: &str = "PROJ_DASHBOARD";

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

/// No single project in the dashboard has a verified budget above this (MWK).
pub const DEFAULT_PLAUSIBLE_BUDGET_MAX: f64 = 1_000_000_000.0;
pub const DEFAULT_MAGNITUDE_FACTOR: f64 = 10.0;

const DEFAULT_MODEL: &str = "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo-128K";
const DEFAULT_BASE_URL: &str = "https://api.together.xyz";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Explicit dataset path; falls back to the data directory when unset.
    pub db_path: Option<PathBuf>,
    pub page_size: usize,
    pub session_ttl_secs: u64,
    pub llm: LlmConfig,
    pub budget: BudgetConfig,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct BudgetConfig {
    pub plausible_max: f64,
    pub magnitude_factor: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            page_size: DEFAULT_PAGE_SIZE,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            llm: LlmConfig::default(),
            budget: BudgetConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            max_tokens: 256,
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            plausible_max: DEFAULT_PLAUSIBLE_BUDGET_MAX,
            magnitude_factor: DEFAULT_MAGNITUDE_FACTOR,
        }
    }
}

impl AppConfig {
    pub fn data_path(&self) -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("infraquery")
    }

    pub fn db_path(&self) -> PathBuf {
        match &self.db_path {
            Some(path) => path.clone(),
            None => self.data_path().join("malawi_projects.db"),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be positive".into()));
        }
        if self.session_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "session_ttl_secs must be positive".into(),
            ));
        }
        if !self.budget.plausible_max.is_finite() || self.budget.plausible_max <= 0.0 {
            return Err(ConfigError::Invalid(
                "budget.plausible_max must be a positive amount".into(),
            ));
        }
        if self.budget.magnitude_factor < 1.0 {
            return Err(ConfigError::Invalid(
                "budget.magnitude_factor must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
