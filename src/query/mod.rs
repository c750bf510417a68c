//! Boolean query construction for device x indicator searches
//!
//! Queries take the form `("d1" OR "d2") AND ("i1" OR "i2")`, optionally followed by
//! a publication date filter. Every term is quoted so multi-word phrases are matched
//! as phrases by the search endpoint.

pub mod partition;

use std::fmt;

use crate::error::{Result, RetrievalError, VocabularyKind};
use serde::{Deserialize, Serialize};

pub use partition::{partition, partition_with_filter};

/// Lower bound substituted for an open-ended start year
pub const EARLIEST_YEAR: u32 = 1800;

/// Upper bound substituted for an open-ended end year
pub const LATEST_YEAR: u32 = 3000;

/// A rendered search expression together with the terms it encodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanQuery {
    text: String,
    devices: Vec<String>,
    indicators: Vec<String>,
}

impl BooleanQuery {
    pub(crate) fn render(
        devices: Vec<String>,
        indicators: Vec<String>,
        filter: Option<&str>,
    ) -> Self {
        let mut text = format!(
            "({}) AND ({})",
            or_group(&devices),
            or_group(&indicators)
        );
        if let Some(filter) = filter {
            text.push_str(" AND ");
            text.push_str(filter);
        }

        Self {
            text,
            devices,
            indicators,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in characters
    pub fn length(&self) -> usize {
        self.text.chars().count()
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn indicators(&self) -> &[String] {
        &self.indicators
    }

    /// Every (device, indicator) pair this query matches on
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.devices.iter().flat_map(move |device| {
            self.indicators
                .iter()
                .map(move |indicator| (device.as_str(), indicator.as_str()))
        })
    }
}

impl fmt::Display for BooleanQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for BooleanQuery {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Publication year restriction
///
/// ```
/// use eutils_retrieval::query::YearRange;
///
/// assert_eq!(YearRange::between(2015, 2020).to_filter(), "2015:2020[pdat]");
/// assert_eq!(YearRange::since(2015).to_filter(), "2015:3000[pdat]");
/// assert_eq!(YearRange::until(1999).to_filter(), "1800:1999[pdat]");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct YearRange {
    pub start: Option<u32>,
    pub end: Option<u32>,
}

impl YearRange {
    pub fn between(start: u32, end: u32) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn since(start: u32) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn until(end: u32) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    /// Render as a `[pdat]` range term
    pub fn to_filter(&self) -> String {
        format!(
            "{}:{}[pdat]",
            self.start.unwrap_or(EARLIEST_YEAR),
            self.end.unwrap_or(LATEST_YEAR)
        )
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(RetrievalError::InvalidConfig(format!(
                    "year range start {start} is after end {end}"
                )));
            }
        }
        Ok(())
    }
}

/// Build a single query over all given devices and indicators
///
/// ```
/// use eutils_retrieval::query::build_query;
///
/// let query = build_query(&["stent", "catheter"], &["infection"]).unwrap();
/// assert_eq!(query.as_str(), r#"("stent" OR "catheter") AND ("infection")"#);
/// ```
pub fn build_query<D, I>(devices: &[D], indicators: &[I]) -> Result<BooleanQuery>
where
    D: AsRef<str>,
    I: AsRef<str>,
{
    build_query_with_filter(devices, indicators, None)
}

/// Like [`build_query`], appending ` AND <filter>` for a year range
pub fn build_query_with_filter<D, I>(
    devices: &[D],
    indicators: &[I],
    year_range: Option<&YearRange>,
) -> Result<BooleanQuery>
where
    D: AsRef<str>,
    I: AsRef<str>,
{
    ensure_non_empty(devices, indicators)?;

    let filter = year_range.map(YearRange::to_filter);
    Ok(BooleanQuery::render(
        to_owned_terms(devices),
        to_owned_terms(indicators),
        filter.as_deref(),
    ))
}

pub(crate) fn ensure_non_empty<D, I>(devices: &[D], indicators: &[I]) -> Result<()> {
    if devices.is_empty() {
        return Err(RetrievalError::EmptyVocabulary {
            kind: VocabularyKind::Device,
        });
    }
    if indicators.is_empty() {
        return Err(RetrievalError::EmptyVocabulary {
            kind: VocabularyKind::Indicator,
        });
    }
    Ok(())
}

pub(crate) fn to_owned_terms<T: AsRef<str>>(terms: &[T]) -> Vec<String> {
    terms.iter().map(|term| term.as_ref().to_string()).collect()
}

fn or_group(terms: &[String]) -> String {
    terms
        .iter()
        .map(|term| format!("\"{term}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}
