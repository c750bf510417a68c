//! Bounded-concurrency execution of many paginated fetches
//!
//! Each query is fetched end to end by one slot of a `buffer_unordered` pool. All
//! slots share the client's rate limiter. A failed query never cancels its siblings;
//! failures are gathered and reported once every query has finished.

use std::time::Instant;

use crate::common::Database;
use crate::error::{QueryFailure, Result, RetrievalError};
use crate::eutils::{EutilsClient, RetrievalResult};
use futures_util::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

/// Outcome of every query in a run, successful or not
#[derive(Debug)]
pub struct RunReport {
    pub database: Database,
    /// Number of queries submitted
    pub total: usize,
    /// Successful results, in submission order
    pub results: Vec<RetrievalResult>,
    /// Failed queries, in submission order
    pub failures: Vec<QueryFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// All results, or [`RetrievalError::AggregateFetchError`] naming every failure
    pub fn into_result(self) -> Result<Vec<RetrievalResult>> {
        if self.failures.is_empty() {
            Ok(self.results)
        } else {
            Err(RetrievalError::AggregateFetchError {
                total: self.total,
                failures: self.failures,
            })
        }
    }
}

/// Fetch every query with at most `pool_size` in flight, failing if any query failed
///
/// Returns [`RetrievalError::Cancelled`] when the client was cancelled during the run.
pub async fn run<Q>(
    client: &EutilsClient,
    queries: &[Q],
    database: Database,
    pool_size: usize,
) -> Result<Vec<RetrievalResult>>
where
    Q: AsRef<str>,
{
    let report = run_collecting(client, queries, database, pool_size).await;
    if client.is_cancelled() {
        return Err(RetrievalError::Cancelled);
    }
    report.into_result()
}

/// Fetch every query and keep both successes and failures
#[instrument(skip(client, queries, database), fields(database = %database, queries = queries.len()))]
pub async fn run_collecting<Q>(
    client: &EutilsClient,
    queries: &[Q],
    database: Database,
    pool_size: usize,
) -> RunReport
where
    Q: AsRef<str>,
{
    let started = Instant::now();
    let pool_size = pool_size.max(1);

    let mut outcomes: Vec<(usize, String, Result<RetrievalResult>)> =
        stream::iter(queries.iter().enumerate())
            .map(|(index, query)| {
                let client = client.clone();
                let query = query.as_ref().to_string();
                async move {
                    let outcome = client.fetch_all(&query, database).await;
                    (index, query, outcome)
                }
            })
            .buffer_unordered(pool_size)
            .collect()
            .await;
    outcomes.sort_by_key(|(index, _, _)| *index);

    let mut results = Vec::new();
    let mut failures = Vec::new();
    for (index, query, outcome) in outcomes {
        match outcome {
            Ok(result) => results.push(result),
            Err(error) => {
                warn!(index, error = %error, "Query failed");
                failures.push(QueryFailure {
                    index,
                    query,
                    database,
                    error,
                });
            }
        }
    }

    info!(
        succeeded = results.len(),
        failed = failures.len(),
        identifiers = results.iter().map(|r| r.ids.len()).sum::<usize>(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Run completed"
    );

    RunReport {
        database,
        total: queries.len(),
        results,
        failures,
    }
}
