//! Splitting a device x indicator search into queries that fit the length limit
//!
//! The search endpoint rejects long query strings, so the full cross product is
//! covered by several smaller queries. Indicators are grouped first so that every
//! group fits next to the longest device; then, per indicator group, devices are
//! packed greedily in input order. Each (device, indicator) pair lands in exactly
//! one query.

use std::ops::Range;

use crate::error::{Result, RetrievalError};
use crate::query::{BooleanQuery, YearRange, ensure_non_empty, to_owned_terms};
use tracing::debug;

/// `(` + `) AND (` + `)`
const GROUP_OVERHEAD: usize = 9;

/// ` OR ` between two terms
const OR_SEPARATOR: usize = 4;

/// ` AND ` before the date filter
const FILTER_SEPARATOR: usize = 5;

/// Partition the cross product of `devices` and `indicators` into queries of at most
/// `max_length` characters
///
/// ```
/// use eutils_retrieval::query::partition;
///
/// let queries = partition(&["stent", "pump"], &["recall"], 4000).unwrap();
/// assert_eq!(queries.len(), 1);
///
/// let queries = partition(&["stent", "pump"], &["recall"], 30).unwrap();
/// assert_eq!(queries.len(), 2);
/// ```
pub fn partition<D, I>(devices: &[D], indicators: &[I], max_length: usize) -> Result<Vec<BooleanQuery>>
where
    D: AsRef<str>,
    I: AsRef<str>,
{
    partition_with_filter(devices, indicators, max_length, None)
}

/// [`partition`] with a year filter appended to every query
pub fn partition_with_filter<D, I>(
    devices: &[D],
    indicators: &[I],
    max_length: usize,
    year_range: Option<&YearRange>,
) -> Result<Vec<BooleanQuery>>
where
    D: AsRef<str>,
    I: AsRef<str>,
{
    ensure_non_empty(devices, indicators)?;

    let filter = year_range.map(YearRange::to_filter);
    let overhead = GROUP_OVERHEAD
        + filter
            .as_ref()
            .map_or(0, |f| FILTER_SEPARATOR + f.chars().count());

    let device_lens: Vec<usize> = devices.iter().map(|d| quoted_len(d.as_ref())).collect();
    let indicator_lens: Vec<usize> = indicators.iter().map(|i| quoted_len(i.as_ref())).collect();

    let (longest_device, longest_device_len) = longest(devices, &device_lens);
    let (longest_indicator, longest_indicator_len) = longest(indicators, &indicator_lens);
    let shortest_device_len = device_lens.iter().copied().min().unwrap_or(0);
    let shortest_indicator_len = indicator_lens.iter().copied().min().unwrap_or(0);

    let too_long = |term: &str, length: usize| RetrievalError::TermTooLong {
        term: term.to_string(),
        length,
        max_length,
    };

    let solo_device = overhead + longest_device_len + shortest_indicator_len;
    if solo_device > max_length {
        return Err(too_long(longest_device, solo_device));
    }
    let solo_indicator = overhead + shortest_device_len + longest_indicator_len;
    if solo_indicator > max_length {
        return Err(too_long(longest_indicator, solo_indicator));
    }
    // The longest device and the longest indicator must still share one query
    let longest_pair = overhead + longest_device_len + longest_indicator_len;
    if longest_pair > max_length {
        let term = if longest_device_len >= longest_indicator_len {
            longest_device
        } else {
            longest_indicator
        };
        return Err(too_long(term, longest_pair));
    }

    let indicator_budget = max_length - overhead - longest_device_len;
    let indicator_groups = greedy_groups(&indicator_lens, indicator_budget);

    let mut queries = Vec::new();
    for indicator_group in indicator_groups {
        let group_len = joined_len(&indicator_lens[indicator_group.clone()]);
        let device_budget = max_length - overhead - group_len;

        for device_chunk in greedy_groups(&device_lens, device_budget) {
            let query = BooleanQuery::render(
                to_owned_terms(&devices[device_chunk.clone()]),
                to_owned_terms(&indicators[indicator_group.clone()]),
                filter.as_deref(),
            );
            debug_assert_eq!(
                query.length(),
                overhead + joined_len(&device_lens[device_chunk]) + group_len
            );
            queries.push(query);
        }
    }

    debug!(
        devices = devices.len(),
        indicators = indicators.len(),
        max_length,
        queries = queries.len(),
        "Partitioned search vocabulary"
    );

    Ok(queries)
}

/// Rendered length of a term including its quotes
fn quoted_len(term: &str) -> usize {
    term.chars().count() + 2
}

/// Length of quoted terms joined with ` OR `
fn joined_len(lens: &[usize]) -> usize {
    lens.iter().sum::<usize>() + OR_SEPARATOR * lens.len().saturating_sub(1)
}

/// First term with the largest rendering
fn longest<'a, T: AsRef<str>>(terms: &'a [T], lens: &[usize]) -> (&'a str, usize) {
    let mut best = 0;
    for (index, len) in lens.iter().enumerate() {
        if *len > lens[best] {
            best = index;
        }
    }
    (terms[best].as_ref(), lens[best])
}

/// Split `lens` into consecutive ranges whose joined length stays within `budget`
///
/// Every single length must already fit the budget.
fn greedy_groups(lens: &[usize], budget: usize) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut start = 0;
    let mut current = 0;

    for (index, len) in lens.iter().enumerate() {
        if index == start {
            current = *len;
            continue;
        }
        let grown = current + OR_SEPARATOR + len;
        if grown > budget {
            groups.push(start..index);
            start = index;
            current = *len;
        } else {
            current = grown;
        }
    }
    groups.push(start..lens.len());

    groups
}
