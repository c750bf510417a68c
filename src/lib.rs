//! # eutils-retrieval
//!
//! Retrieves article identifiers from NCBI PubMed and PubMed Central for every pairing
//! of two controlled vocabularies (devices and indicators).
//!
//! ## Features
//!
//! - **Query partitioning**: splits the device x indicator search into boolean queries
//!   that respect the search endpoint's length limit, covering every pair exactly once
//! - **History-server pagination**: ESearch once, then page through ESummary until
//!   every identifier is retrieved
//! - **Rate limiting and retries**: one sliding-window limiter shared by all workers,
//!   exponential backoff for transient failures
//! - **Bounded concurrency**: a fixed-size pool of in-flight queries with
//!   fail-after-completion error reporting
//! - **Cross-database merge**: PMIDs and PMCIDs deduplicated across both databases
//!
//! ## Quick Start
//!
//! ```no_run
//! use eutils_retrieval::{ClientConfig, EutilsClient, RetrievalConfig, Retriever};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = EutilsClient::with_config(
//!         ClientConfig::new().with_email("researcher@university.edu"),
//!     )?;
//!     let retriever = Retriever::new(client, RetrievalConfig::default());
//!
//!     let report = retriever
//!         .retrieve(&["pacemaker", "insulin pump"], &["infection", "recall"])
//!         .await?;
//!
//!     for article in &report.merged.articles {
//!         println!("{} ({:?})", article.ids, article.databases);
//!     }
//!     Ok(())
//! }
//! ```

pub mod common;
pub mod config;
pub mod error;
pub mod eutils;
pub mod merge;
pub mod orchestrator;
pub mod query;
pub mod rate_limit;
pub mod retrieval;
pub mod retry;

// Re-export main types for convenience
pub use common::{ArticleIds, Database, PmcId, PubMedId};
pub use config::{ClientConfig, RetrievalConfig};
pub use error::{QueryFailure, Result, RetrievalError, VocabularyKind};
pub use eutils::{EutilsClient, RetrievalResult, SearchSession};
pub use merge::{MergedArticle, MergedResultSet, merge};
pub use orchestrator::{RunReport, run, run_collecting};
pub use query::{BooleanQuery, YearRange, build_query, build_query_with_filter, partition};
pub use rate_limit::RateLimiter;
pub use retrieval::{RetrievalReport, Retriever};
pub use retry::{RetryConfig, RetryDecision, RetryPolicy, RetryableError};
