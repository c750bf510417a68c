//! End-to-end retrieval: partition, fetch per database, merge

use std::collections::BTreeMap;

use crate::common::{ArticleIds, Database};
use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};
use crate::eutils::{EutilsClient, RetrievalResult};
use crate::merge::{MergedResultSet, merge};
use crate::orchestrator::run_collecting;
use crate::query::{BooleanQuery, partition_with_filter};
use tracing::{info, instrument};

/// Everything produced by one [`Retriever::retrieve`] call
#[derive(Debug, Clone)]
pub struct RetrievalReport {
    /// The partitioned queries sent to every database
    pub queries: Vec<BooleanQuery>,
    pub results_by_database: BTreeMap<Database, Vec<RetrievalResult>>,
    pub merged: MergedResultSet,
}

/// Runs the device x indicator search against every configured database
///
/// ```no_run
/// use eutils_retrieval::{EutilsClient, RetrievalConfig, Retriever};
/// use eutils_retrieval::query::YearRange;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = RetrievalConfig::new().with_year_range(YearRange::since(2015));
///     let retriever = Retriever::new(EutilsClient::new()?, config);
///
///     let report = retriever
///         .retrieve(&["insulin pump", "pacemaker"], &["recall", "adverse event"])
///         .await?;
///
///     println!(
///         "{} queries, {} identifiers ({} before deduplication)",
///         report.queries.len(),
///         report.merged.total_after,
///         report.merged.total_before
///     );
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Retriever {
    client: EutilsClient,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(client: EutilsClient, config: RetrievalConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &EutilsClient {
        &self.client
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Partition once, fetch every query from every configured database, then merge
    ///
    /// All databases run to completion before failures are reported; any failed query
    /// turns the whole call into [`RetrievalError::AggregateFetchError`].
    #[instrument(skip_all, fields(devices = devices.len(), indicators = indicators.len()))]
    pub async fn retrieve<D, I>(&self, devices: &[D], indicators: &[I]) -> Result<RetrievalReport>
    where
        D: AsRef<str>,
        I: AsRef<str>,
    {
        self.config.validate()?;

        let queries = partition_with_filter(
            devices,
            indicators,
            self.config.max_query_length,
            self.config.year_range.as_ref(),
        )?;
        info!(queries = queries.len(), "Built search queries");

        let mut results_by_database = BTreeMap::new();
        let mut failures = Vec::new();
        let mut total = 0;

        for database in &self.config.databases {
            let report =
                run_collecting(&self.client, &queries, *database, self.config.pool_size).await;
            total += report.total;
            failures.extend(report.failures);
            results_by_database.insert(*database, report.results);
        }

        if self.client.is_cancelled() {
            return Err(RetrievalError::Cancelled);
        }
        if !failures.is_empty() {
            return Err(RetrievalError::AggregateFetchError { total, failures });
        }

        let ids_by_database: BTreeMap<Database, Vec<ArticleIds>> = results_by_database
            .iter()
            .map(|(database, results)| {
                let ids = results
                    .iter()
                    .flat_map(|result: &RetrievalResult| result.ids.iter().copied())
                    .collect();
                (*database, ids)
            })
            .collect();
        let merged = merge(&ids_by_database)?;

        info!(
            total_before = merged.total_before,
            total_after = merged.total_after,
            "Retrieval completed"
        );

        Ok(RetrievalReport {
            queries,
            results_by_database,
            merged,
        })
    }
}
