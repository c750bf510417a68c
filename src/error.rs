use std::fmt;
use std::result;

use crate::common::Database;
use crate::retry::RetryableError;
use thiserror::Error;

/// Error types for retrieval operations
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// HTTP request failed at the transport level
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A device or indicator list was empty
    #[error("Empty vocabulary: no {kind} terms given")]
    EmptyVocabulary { kind: VocabularyKind },

    /// A single term cannot fit in any query of the configured length
    #[error("Term too long: \"{term}\" renders to {length} characters, maximum is {max_length}")]
    TermTooLong {
        term: String,
        length: usize,
        max_length: usize,
    },

    /// Non-retryable HTTP failure (4xx other than throttling)
    #[error("Client error {status}: {message}")]
    ClientError { status: u16, message: String },

    /// Service-side error: retryable HTTP status or an error reported in the payload
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    /// Retryable failure that outlived the retry budget
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        last: Box<RetrievalError>,
    },

    /// Pagination finished with a different number of ids than the reported total
    #[error(
        "Incomplete fetch from {database} for query \"{query}\": expected {expected} ids, retrieved {retrieved}"
    )]
    IncompleteFetch {
        database: Database,
        query: String,
        expected: usize,
        retrieved: usize,
    },

    /// Response did not have the expected shape
    #[error("Parse error: {message}")]
    ParseError { message: String },

    /// Invalid PMID format
    #[error("Invalid PMID format: {pmid}")]
    InvalidPmid { pmid: String },

    /// Invalid PMC ID format
    #[error("Invalid PMC ID format: {pmcid}")]
    InvalidPmcid { pmcid: String },

    /// Two records disagree on the identifier pairing of one article
    #[error("Conflicting identifiers: {message}")]
    MergeConflict { message: String },

    /// One or more queries of a run failed
    #[error("{} of {total} queries failed: {}", failures.len(), format_failures(failures))]
    AggregateFetchError {
        total: usize,
        failures: Vec<QueryFailure>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = result::Result<T, RetrievalError>;

/// Which vocabulary an [`RetrievalError::EmptyVocabulary`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocabularyKind {
    Device,
    Indicator,
}

impl fmt::Display for VocabularyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VocabularyKind::Device => write!(f, "device"),
            VocabularyKind::Indicator => write!(f, "indicator"),
        }
    }
}

/// A failed query within an orchestrated run
#[derive(Debug)]
pub struct QueryFailure {
    /// Position of the query in the submitted list
    pub index: usize,
    /// The query text
    pub query: String,
    pub database: Database,
    pub error: RetrievalError,
}

impl fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} #{}] {}: {}",
            self.database, self.index, self.query, self.error
        )
    }
}

fn format_failures(failures: &[QueryFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl RetryableError for RetrievalError {
    fn is_retryable(&self) -> bool {
        match self {
            // Network errors are typically transient
            RetrievalError::RequestError(err) => {
                if err.is_timeout() || err.is_connect() {
                    return true;
                }

                if let Some(status) = err.status() {
                    return status.is_server_error() || status.as_u16() == 429;
                }

                // DNS and other network errors
                !err.is_builder() && !err.is_redirect() && !err.is_decode()
            }

            // Server errors (5xx) and rate limiting (429) are retryable
            RetrievalError::ApiError { status, .. } => {
                (500..600).contains(status) || *status == 429
            }

            RetrievalError::JsonError(_)
            | RetrievalError::EmptyVocabulary { .. }
            | RetrievalError::TermTooLong { .. }
            | RetrievalError::ClientError { .. }
            | RetrievalError::RetryExhausted { .. }
            | RetrievalError::IncompleteFetch { .. }
            | RetrievalError::ParseError { .. }
            | RetrievalError::InvalidPmid { .. }
            | RetrievalError::InvalidPmcid { .. }
            | RetrievalError::MergeConflict { .. }
            | RetrievalError::AggregateFetchError { .. }
            | RetrievalError::InvalidConfig(_)
            | RetrievalError::Cancelled => false,
        }
    }

    fn retry_reason(&self) -> &str {
        if self.is_retryable() {
            match self {
                RetrievalError::RequestError(err) if err.is_timeout() => "Request timeout",
                RetrievalError::RequestError(err) if err.is_connect() => "Connection error",
                RetrievalError::RequestError(_) => "Network error",
                RetrievalError::ApiError { status, .. } => match status {
                    429 => "Rate limit exceeded",
                    _ => "Server error",
                },
                _ => "Transient error",
            }
        } else {
            match self {
                RetrievalError::JsonError(_) | RetrievalError::ParseError { .. } => {
                    "Invalid response"
                }
                RetrievalError::ClientError { .. } => "Client error",
                RetrievalError::InvalidPmid { .. } | RetrievalError::InvalidPmcid { .. } => {
                    "Invalid identifier"
                }
                RetrievalError::Cancelled => "Cancelled",
                _ => "Non-transient error",
            }
        }
    }
}
