//! E-utilities client: search with history, summary pages, paginated fetch

pub mod extract;
pub mod pagination;
pub(crate) mod responses;

use crate::common::{ArticleIds, Database};
use crate::config::ClientConfig;
use crate::error::{Result, RetrievalError};
use crate::eutils::responses::ESearchResult;
use crate::rate_limit::RateLimiter;
use crate::retry::{RetryPolicy, with_retry};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub use pagination::RetrievalResult;

/// Search results stored on the history server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSession {
    pub database: Database,
    /// Total hits reported by ESearch
    pub total_count: usize,
    pub webenv: Option<String>,
    pub query_key: Option<String>,
    /// How the service interpreted the query
    pub query_translation: Option<String>,
}

/// Client for the ESearch and ESummary endpoints
///
/// Clones share the HTTP connection pool, the rate limiter and the cancellation token.
#[derive(Clone)]
pub struct EutilsClient {
    client: Client,
    base_url: String,
    rate_limiter: RateLimiter,
    retry_policy: RetryPolicy,
    config: ClientConfig,
    cancel: CancellationToken,
}

impl EutilsClient {
    /// Create a client with default configuration (3 requests/second, no API key)
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::new())
    }

    /// Create a client with custom configuration
    ///
    /// ```
    /// use eutils_retrieval::{ClientConfig, EutilsClient};
    ///
    /// let config = ClientConfig::new()
    ///     .with_api_key("your_api_key_here")
    ///     .with_email("researcher@university.edu");
    ///
    /// let client = EutilsClient::with_config(config).unwrap();
    /// assert_eq!(client.rate_limiter().capacity(), 10);
    /// ```
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .user_agent(config.effective_user_agent())
            .timeout(config.timeout)
            .build()?;

        Ok(Self::with_http_client(client, config))
    }

    /// Create a client around an existing reqwest client
    pub fn with_http_client(client: Client, config: ClientConfig) -> Self {
        Self {
            client,
            base_url: config.effective_base_url().to_string(),
            rate_limiter: config.create_rate_limiter(),
            retry_policy: RetryPolicy::new(config.retry_config.clone()),
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Token that aborts every pending request, limiter wait and backoff sleep of this
    /// client and its clones
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run ESearch with `usehistory=y` and learn the hit count and history session
    ///
    /// The query travels in a POST body so long boolean queries do not hit URL limits.
    #[instrument(skip(self, query, database), fields(database = %database, query_length = query.len()))]
    pub async fn search_with_history(&self, query: &str, database: Database) -> Result<SearchSession> {
        let params = vec![
            ("db".to_string(), database.as_param().to_string()),
            ("term".to_string(), query.to_string()),
            ("usehistory".to_string(), "y".to_string()),
            ("retmax".to_string(), "0".to_string()),
            ("retmode".to_string(), "json".to_string()),
        ];

        debug!("Making ESearch API request with history");
        let body = self.make_request(Method::POST, "esearch.fcgi", params).await?;
        let search_result: ESearchResult = serde_json::from_str(&body)?;
        let data = search_result.esearchresult;

        if let Some(error_msg) = &data.error {
            return Err(RetrievalError::ApiError {
                status: 200,
                message: format!("NCBI ESearch API error: {error_msg}"),
            });
        }

        let total_count: usize = match &data.count {
            Some(count) => count.parse().map_err(|_| RetrievalError::ParseError {
                message: format!("non-numeric ESearch count: {count}"),
            })?,
            None => {
                return Err(RetrievalError::ParseError {
                    message: "ESearch response has no count".to_string(),
                });
            }
        };

        if total_count > 0 && (data.webenv.is_none() || data.query_key.is_none()) {
            return Err(RetrievalError::ParseError {
                message: "ESearch response has hits but no WebEnv/query_key".to_string(),
            });
        }

        info!(
            total_count,
            has_webenv = data.webenv.is_some(),
            query_translation = ?data.querytranslation,
            "Search with history completed"
        );

        Ok(SearchSession {
            database,
            total_count,
            webenv: data.webenv,
            query_key: data.query_key,
            query_translation: data.querytranslation,
        })
    }

    /// Fetch one ESummary page from a history session
    #[instrument(skip(self, session), fields(database = %session.database))]
    pub async fn fetch_summary_page(
        &self,
        session: &SearchSession,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ArticleIds>> {
        let (Some(webenv), Some(query_key)) = (&session.webenv, &session.query_key) else {
            return Err(RetrievalError::ParseError {
                message: "history session is missing WebEnv or query_key".to_string(),
            });
        };

        let params = vec![
            ("db".to_string(), session.database.as_param().to_string()),
            ("query_key".to_string(), query_key.clone()),
            ("WebEnv".to_string(), webenv.clone()),
            ("retstart".to_string(), offset.to_string()),
            ("retmax".to_string(), limit.to_string()),
            ("retmode".to_string(), "json".to_string()),
        ];

        let body = self.make_request(Method::GET, "esummary.fcgi", params).await?;
        let payload: serde_json::Value = serde_json::from_str(&body)?;
        let ids = extract::extract(&payload, session.database)?;

        debug!(returned = ids.len(), "Fetched summary page");
        Ok(ids)
    }

    /// Send one E-utilities request through the limiter and the retry policy
    ///
    /// GET requests carry `params` (plus the API parameters) in the query string, POST
    /// requests in a form body. Returns the response body on success.
    pub(crate) async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        mut params: Vec<(String, String)>,
    ) -> Result<String> {
        params.extend(self.config.build_api_params());
        let url = format!("{}/{}", self.base_url, endpoint);

        let final_url = if method == Method::GET {
            let query_string: Vec<String> = params
                .iter()
                .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
                .collect();
            format!("{}?{}", url, query_string.join("&"))
        } else {
            url
        };

        with_retry(
            || async {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(RetrievalError::Cancelled),
                    _ = self.rate_limiter.acquire() => {}
                }

                debug!("Making {} request to: {}", method, final_url);
                let request = if method == Method::GET {
                    self.client.get(&final_url)
                } else {
                    self.client.post(&final_url).form(&params)
                };
                let response = request.send().await?;
                let status = response.status();

                // Server errors and throttling are retryable
                if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                    return Err(RetrievalError::ApiError {
                        status: status.as_u16(),
                        message: canonical_reason(status),
                    });
                }

                if !status.is_success() {
                    warn!("API request failed with status: {}", status);
                    return Err(RetrievalError::ClientError {
                        status: status.as_u16(),
                        message: canonical_reason(status),
                    });
                }

                Ok(response.text().await?)
            },
            &self.retry_policy,
            &self.cancel,
            endpoint,
        )
        .await
    }
}

fn canonical_reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}
