//! Types shared by the query, fetch and merge stages

pub mod ids;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use ids::{ArticleIds, PmcId, PubMedId};

/// Bibliographic database reachable through E-utilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    PubMed,
    Pmc,
}

impl Database {
    /// Value of the `db` request parameter
    pub fn as_param(&self) -> &'static str {
        match self {
            Database::PubMed => "pubmed",
            Database::Pmc => "pmc",
        }
    }

    pub fn all() -> [Database; 2] {
        [Database::PubMed, Database::Pmc]
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}
