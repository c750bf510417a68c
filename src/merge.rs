//! Cross-database deduplication of article identifiers
//!
//! Two records describe the same article when they share a PMID or a PMCID. Records
//! missing one side are completed from a record that has both, so a PubMed hit
//! without a PMCID and a PMC hit with the full pair collapse into one entry.

use std::collections::{BTreeMap, BTreeSet};

use crate::common::{ArticleIds, Database, PmcId, PubMedId};
use crate::error::{Result, RetrievalError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One deduplicated article and the databases that returned it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedArticle {
    pub ids: ArticleIds,
    pub databases: BTreeSet<Database>,
}

/// Deduplicated identifiers with before/after counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedResultSet {
    /// Sorted by (pmid, pmcid); entries without a PMID come first
    pub articles: Vec<MergedArticle>,
    /// Records seen before deduplication
    pub total_before: usize,
    /// Entries after deduplication
    pub total_after: usize,
    /// Raw record count per database
    pub per_database: BTreeMap<Database, usize>,
}

impl MergedResultSet {
    /// Entries returned by every database in the input
    pub fn in_all(&self) -> impl Iterator<Item = &MergedArticle> {
        let databases = self.per_database.len();
        self.articles
            .iter()
            .filter(move |article| article.databases.len() == databases)
    }
}

/// Merge identifiers from several databases
///
/// ```
/// use std::collections::BTreeMap;
/// use eutils_retrieval::common::{ArticleIds, Database, PmcId, PubMedId};
/// use eutils_retrieval::merge::merge;
///
/// let pmid = PubMedId::parse("36645057").unwrap();
/// let pmcid = PmcId::parse("PMC9848274").unwrap();
///
/// let mut input = BTreeMap::new();
/// input.insert(Database::PubMed, vec![ArticleIds::pmid_only(pmid)]);
/// input.insert(Database::Pmc, vec![ArticleIds::pair(pmid, pmcid)]);
///
/// let merged = merge(&input).unwrap();
/// assert_eq!(merged.total_before, 2);
/// assert_eq!(merged.total_after, 1);
/// assert_eq!(merged.articles[0].ids, ArticleIds::pair(pmid, pmcid));
/// ```
pub fn merge(results_by_database: &BTreeMap<Database, Vec<ArticleIds>>) -> Result<MergedResultSet> {
    let mut pmid_to_pmcid: BTreeMap<PubMedId, PmcId> = BTreeMap::new();
    let mut pmcid_to_pmid: BTreeMap<PmcId, PubMedId> = BTreeMap::new();

    // Complete pairs define the mapping; a second, different partner is a conflict
    for ids in results_by_database.values().flatten() {
        if let (Some(pmid), Some(pmcid)) = (ids.pmid, ids.pmcid) {
            link(&mut pmid_to_pmcid, pmid, pmcid, "PMID")?;
            link(&mut pmcid_to_pmid, pmcid, pmid, "PMCID")?;
        }
    }

    let mut merged: BTreeMap<ArticleIds, BTreeSet<Database>> = BTreeMap::new();
    let mut per_database = BTreeMap::new();
    let mut total_before = 0;

    for (database, ids_list) in results_by_database {
        per_database.insert(*database, ids_list.len());
        total_before += ids_list.len();

        for ids in ids_list {
            let canonical = ArticleIds {
                pmid: ids
                    .pmid
                    .or_else(|| ids.pmcid.and_then(|pmcid| pmcid_to_pmid.get(&pmcid).copied())),
                pmcid: ids
                    .pmcid
                    .or_else(|| ids.pmid.and_then(|pmid| pmid_to_pmcid.get(&pmid).copied())),
            };
            merged.entry(canonical).or_default().insert(*database);
        }
    }

    let articles: Vec<MergedArticle> = merged
        .into_iter()
        .map(|(ids, databases)| MergedArticle { ids, databases })
        .collect();

    debug!(pairs = pmid_to_pmcid.len(), "Built identifier mapping");
    info!(
        total_before,
        total_after = articles.len(),
        "Merged identifiers across databases"
    );

    Ok(MergedResultSet {
        total_after: articles.len(),
        articles,
        total_before,
        per_database,
    })
}

fn link<K, V>(map: &mut BTreeMap<K, V>, key: K, value: V, kind: &str) -> Result<()>
where
    K: Ord + Copy + std::fmt::Display,
    V: PartialEq + Copy + std::fmt::Display,
{
    match map.get(&key) {
        Some(existing) if *existing != value => Err(RetrievalError::MergeConflict {
            message: format!("{kind} {key} maps to both {existing} and {value}"),
        }),
        Some(_) => Ok(()),
        None => {
            map.insert(key, value);
            Ok(())
        }
    }
}
