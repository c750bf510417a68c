//! Client and retrieval configuration

use std::time::Duration;

use crate::common::Database;
use crate::error::{Result, RetrievalError};
use crate::query::YearRange;
use crate::rate_limit::RateLimiter;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};

/// Default E-utilities endpoint
pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Default `tool` parameter sent to NCBI
pub const DEFAULT_TOOL: &str = "eutils-retrieval";

/// Identifiers requested per summary page unless configured otherwise
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Largest page the summary endpoint accepts
pub const MAX_PAGE_SIZE: usize = 10_000;

/// Longest query string accepted by the search endpoint
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 4000;

/// Configuration for the E-utilities client
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use eutils_retrieval::ClientConfig;
///
/// let config = ClientConfig::new()
///     .with_api_key("your_api_key_here")
///     .with_email("researcher@university.edu")
///     .with_timeout(Duration::from_secs(60));
///
/// assert_eq!(config.effective_rate_limit(), 10.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// NCBI API key, raises the rate limit to 10 requests/second
    pub api_key: Option<String>,
    /// Contact email sent with every request
    pub email: Option<String>,
    /// Tool name sent with every request
    pub tool: Option<String>,
    /// Explicit requests-per-second ceiling, overrides the key-based default
    pub rate_limit: Option<f64>,
    pub base_url: Option<String>,
    pub user_agent: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    pub retry_config: RetryConfig,
    /// Identifiers requested per summary page
    pub page_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            email: None,
            tool: None,
            rate_limit: None,
            base_url: None,
            user_agent: None,
            timeout: Duration::from_secs(30),
            retry_config: RetryConfig::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_tool<S: Into<String>>(mut self, tool: S) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Override the requests-per-second ceiling
    pub fn with_rate_limit(mut self, rate_limit: f64) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// Point the client at a different E-utilities root (mock servers, mirrors)
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Set the summary page size, clamped to `1..=10000`
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Rate limit in effect: explicit override, else 10 with an API key, else 3
    pub fn effective_rate_limit(&self) -> f64 {
        self.rate_limit.unwrap_or(if self.api_key.is_some() {
            10.0
        } else {
            3.0
        })
    }

    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn effective_tool(&self) -> &str {
        self.tool.as_deref().unwrap_or(DEFAULT_TOOL)
    }

    pub fn effective_user_agent(&self) -> String {
        match &self.user_agent {
            Some(user_agent) => user_agent.clone(),
            None => format!("{}/{}", DEFAULT_TOOL, env!("CARGO_PKG_VERSION")),
        }
    }

    /// Page size after clamping
    pub fn effective_page_size(&self) -> usize {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// NCBI identification parameters appended to every request
    pub fn build_api_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if let Some(api_key) = &self.api_key {
            params.push(("api_key".to_string(), api_key.clone()));
        }
        if let Some(email) = &self.email {
            params.push(("email".to_string(), email.clone()));
        }
        params.push(("tool".to_string(), self.effective_tool().to_string()));

        params
    }

    pub fn create_rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.effective_rate_limit())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(rate) = self.rate_limit {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(RetrievalError::InvalidConfig(format!(
                    "rate_limit must be a positive number, got {rate}"
                )));
            }
        }
        if self.timeout.is_zero() {
            return Err(RetrievalError::InvalidConfig(
                "timeout must be non-zero".to_string(),
            ));
        }
        self.retry_config.validate()
    }
}

/// Configuration for a full multi-database retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Longest query string sent to the search endpoint
    pub max_query_length: usize,
    /// Queries fetched concurrently
    pub pool_size: usize,
    /// Databases searched, in order
    pub databases: Vec<Database>,
    /// Optional publication year restriction applied to every query
    pub year_range: Option<YearRange>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            pool_size: 3,
            databases: vec![Database::PubMed, Database::Pmc],
            year_range: None,
        }
    }
}

impl RetrievalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_query_length(mut self, max_query_length: usize) -> Self {
        self.max_query_length = max_query_length;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_databases(mut self, databases: Vec<Database>) -> Self {
        self.databases = databases;
        self
    }

    pub fn with_year_range(mut self, year_range: YearRange) -> Self {
        self.year_range = Some(year_range);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(RetrievalError::InvalidConfig(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.databases.is_empty() {
            return Err(RetrievalError::InvalidConfig(
                "at least one database must be configured".to_string(),
            ));
        }
        if let Some(range) = &self.year_range {
            range.validate()?;
        }
        Ok(())
    }
}
