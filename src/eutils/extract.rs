//! Identifier extraction from ESummary payloads
//!
//! PubMed and PMC summaries list identifiers under different `idtype` names:
//!
//! | database | PMID      | PMCID                                  |
//! |----------|-----------|----------------------------------------|
//! | pubmed   | `pubmed`  | `pmc` (or `pmcid` as `pmc-id: PMC1;`)  |
//! | pmc      | `pmid`    | `pmcid`                                |
//!
//! A value of `"0"` or an empty string means the identifier is absent.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::common::{ArticleIds, Database, PmcId, PubMedId};
use crate::error::{Result, RetrievalError};
use crate::eutils::responses::ESummaryArticleId;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Extract one [`ArticleIds`] per uid listed in an ESummary `result`
///
/// ```
/// use eutils_retrieval::common::Database;
/// use eutils_retrieval::eutils::extract::extract;
///
/// let payload = serde_json::json!({
///     "result": {
///         "uids": ["9848274"],
///         "9848274": {
///             "uid": "9848274",
///             "articleids": [
///                 {"idtype": "pmid", "value": "36645057"},
///                 {"idtype": "pmcid", "value": "PMC9848274"}
///             ]
///         }
///     }
/// });
///
/// let ids = extract(&payload, Database::Pmc).unwrap();
/// assert_eq!(ids[0].to_string(), "PMID:36645057/PMC9848274");
/// ```
pub fn extract(raw: &Value, database: Database) -> Result<Vec<ArticleIds>> {
    if let Some(message) = raw.get("error").and_then(Value::as_str) {
        return Err(RetrievalError::ApiError {
            status: 200,
            message: format!("NCBI ESummary API error: {message}"),
        });
    }

    let result = raw.get("result").ok_or_else(|| parse_error("missing `result` object"))?;
    let uids = result
        .get("uids")
        .and_then(Value::as_array)
        .ok_or_else(|| parse_error("missing `result.uids` array"))?;

    let uids: Vec<&str> = uids
        .iter()
        .map(|uid| {
            uid.as_str()
                .ok_or_else(|| parse_error(format!("non-string uid {uid}")))
        })
        .collect::<Result<_>>()?;

    warn_on_unlisted_records(result, &uids);

    uids.iter()
        .map(|uid| {
            let record = result
                .get(*uid)
                .ok_or_else(|| parse_error(format!("uid {uid} listed without a record")))?;
            extract_record(uid, record, database)
        })
        .collect()
}

/// Identifiers of a single summary record
pub fn extract_record(uid: &str, record: &Value, database: Database) -> Result<ArticleIds> {
    let article_ids: Vec<ESummaryArticleId> = match record.get("articleids") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => Vec::<ESummaryArticleId>::deserialize(value)
            .map_err(|err| parse_error(format!("malformed articleids for uid {uid}: {err}")))?,
    };

    let (mut pmid, mut pmcid, mut pmcid_label) = (None, None, None);
    for article_id in &article_ids {
        let Some(value) = present(&article_id.value) else {
            continue;
        };

        match (database, article_id.idtype.as_str()) {
            (Database::PubMed, "pubmed") | (Database::Pmc, "pmid") => {
                pmid = Some(PubMedId::parse(value)?);
            }
            (Database::PubMed, "pmc") | (Database::Pmc, "pmcid") => {
                pmcid = Some(PmcId::parse(value)?);
            }
            (Database::PubMed, "pmcid") => {
                pmcid_label = parse_pmcid_label(value);
            }
            _ => {}
        }
    }
    let pmcid = pmcid.or(pmcid_label);

    // A record always carries its own database's id as the uid
    let ids = match database {
        Database::PubMed => ArticleIds {
            pmid: Some(pmid.map_or_else(|| PubMedId::parse(uid), Ok)?),
            pmcid,
        },
        Database::Pmc => ArticleIds {
            pmid,
            pmcid: Some(pmcid.map_or_else(|| PmcId::parse(uid), Ok)?),
        },
    };

    Ok(ids)
}

fn present(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "0" {
        None
    } else {
        Some(trimmed)
    }
}

/// Pull `PMC123` out of labels such as `pmc-id: PMC123;`
fn parse_pmcid_label(label: &str) -> Option<PmcId> {
    static PMCID_LABEL_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = PMCID_LABEL_REGEX
        .get_or_init(|| Regex::new(r"(?i)PMC\d+").expect("Failed to compile PMCID label regex"));

    re.find(label)
        .and_then(|found| PmcId::parse(found.as_str()).ok())
}

fn warn_on_unlisted_records(result: &Value, uids: &[&str]) {
    let Some(records) = result.as_object() else {
        return;
    };

    let listed: HashSet<&str> = uids.iter().copied().collect();
    let unlisted = records
        .keys()
        .filter(|key| key.as_str() != "uids" && !listed.contains(key.as_str()))
        .count();

    if unlisted > 0 || listed.len() != uids.len() {
        warn!(
            listed_uids = uids.len(),
            distinct_uids = listed.len(),
            unlisted_records = unlisted,
            "Difference between result records and uids list"
        );
    }
}

fn parse_error(message: impl Into<String>) -> RetrievalError {
    RetrievalError::ParseError {
        message: message.into(),
    }
}
