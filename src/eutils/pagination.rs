//! Exhaustive retrieval of every identifier matching one query

use std::collections::HashSet;

use crate::common::{ArticleIds, Database};
use crate::error::{Result, RetrievalError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::EutilsClient;

/// Identifiers retrieved for one query from one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub query: String,
    pub database: Database,
    /// Hit count reported by the search endpoint
    pub total_count: usize,
    pub ids: Vec<ArticleIds>,
}

impl EutilsClient {
    /// Retrieve every identifier matching `query`
    ///
    /// Searches once with the history server, then pages through ESummary with
    /// `retstart` advancing by the number of records each page actually returned.
    /// Paging stops when the reported total is reached or a page comes back empty or
    /// with only repeated records. Repeats are dropped, and a distinct count that does
    /// not match the reported total is an [`RetrievalError::IncompleteFetch`].
    ///
    /// ```no_run
    /// use eutils_retrieval::{Database, EutilsClient};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = EutilsClient::new()?;
    ///     let result = client
    ///         .fetch_all(r#"("pacemaker") AND ("infection")"#, Database::Pmc)
    ///         .await?;
    ///
    ///     println!("{} identifiers", result.ids.len());
    ///     Ok(())
    /// }
    /// ```
    #[instrument(skip(self, query, database), fields(database = %database))]
    pub async fn fetch_all(&self, query: &str, database: Database) -> Result<RetrievalResult> {
        let session = self.search_with_history(query, database).await?;
        let total_count = session.total_count;

        if total_count == 0 {
            info!("No results found");
            return Ok(RetrievalResult {
                query: query.to_string(),
                database,
                total_count,
                ids: Vec::new(),
            });
        }

        let page_size = self.config().effective_page_size();
        let mut ids = Vec::with_capacity(total_count);
        let mut seen: HashSet<ArticleIds> = HashSet::with_capacity(total_count);
        let mut offset = 0;

        while offset < total_count {
            let page = self.fetch_summary_page(&session, offset, page_size).await?;
            if page.is_empty() {
                warn!(offset, total_count, "Summary page returned no records before total was reached");
                break;
            }

            let returned = page.len();
            let before = ids.len();
            ids.extend(page.into_iter().filter(|article| seen.insert(*article)));

            // A page of nothing but repeats means the history session has shifted
            if ids.len() == before {
                warn!(offset, returned, total_count, "Summary page repeated already fetched records");
                break;
            }
            if ids.len() - before < returned {
                warn!(
                    offset,
                    duplicates = returned - (ids.len() - before),
                    "Summary page overlapped earlier pages"
                );
            }

            offset += returned;
            debug!(offset, fetched = ids.len(), total_count, "Fetched page");
        }

        if ids.len() != total_count {
            warn!(
                expected = total_count,
                retrieved = ids.len(),
                "Retrieved identifier count differs from reported total"
            );
            return Err(RetrievalError::IncompleteFetch {
                database,
                query: query.to_string(),
                expected: total_count,
                retrieved: ids.len(),
            });
        }

        info!(total_count, fetched = ids.len(), "Fetched all identifiers for query");

        Ok(RetrievalResult {
            query: query.to_string(),
            database,
            total_count,
            ids,
        })
    }
}
