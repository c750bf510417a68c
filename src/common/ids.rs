//! Validated PubMed and PMC identifiers
//!
//! Identifiers coming back from the two databases use different spellings
//! (`PMC123`, `pmc123`, ` 123 `); these types normalize them so equality is numeric.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RetrievalError};
use serde::{Deserialize, Serialize};

/// A validated PubMed ID (PMID)
///
/// ```
/// use eutils_retrieval::common::PubMedId;
///
/// let pmid = PubMedId::parse("  31978945 ").unwrap();
/// assert_eq!(pmid.as_u32(), 31978945);
/// assert_eq!(pmid.to_string(), "31978945");
///
/// assert!(PubMedId::parse("0").is_err());
/// assert!(PubMedId::parse("abc").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PubMedId {
    value: u32,
}

impl PubMedId {
    /// Parse a PMID, trimming whitespace; zero is rejected
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().parse::<u32>() {
            Ok(value) if value > 0 => Ok(Self { value }),
            _ => Err(RetrievalError::InvalidPmid {
                pmid: s.to_string(),
            }),
        }
    }

    pub fn try_from_u32(value: u32) -> Result<Self> {
        if value == 0 {
            return Err(RetrievalError::InvalidPmid {
                pmid: value.to_string(),
            });
        }
        Ok(Self { value })
    }

    pub fn as_u32(&self) -> u32 {
        self.value
    }
}

impl fmt::Display for PubMedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FromStr for PubMedId {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PubMedId {
    type Error = RetrievalError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<PubMedId> for String {
    fn from(pmid: PubMedId) -> Self {
        pmid.to_string()
    }
}

/// A validated PubMed Central ID, always displayed with the `PMC` prefix
///
/// ```
/// use eutils_retrieval::common::PmcId;
///
/// let pmcid = PmcId::parse("pmc7092803").unwrap();
/// assert_eq!(pmcid.to_string(), "PMC7092803");
/// assert_eq!(pmcid, PmcId::parse("7092803").unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PmcId {
    value: u32,
}

impl PmcId {
    /// Parse a PMC ID with or without the (case-insensitive) `PMC` prefix
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = match trimmed.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("PMC") => &trimmed[3..],
            _ => trimmed,
        };

        match digits.parse::<u32>() {
            Ok(value) if value > 0 && digits.bytes().all(|b| b.is_ascii_digit()) => {
                Ok(Self { value })
            }
            _ => Err(RetrievalError::InvalidPmcid {
                pmcid: s.to_string(),
            }),
        }
    }

    pub fn try_from_u32(value: u32) -> Result<Self> {
        if value == 0 {
            return Err(RetrievalError::InvalidPmcid {
                pmcid: value.to_string(),
            });
        }
        Ok(Self { value })
    }

    /// Numeric part without the prefix
    pub fn numeric_part(&self) -> u32 {
        self.value
    }
}

impl fmt::Display for PmcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PMC{}", self.value)
    }
}

impl FromStr for PmcId {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PmcId {
    type Error = RetrievalError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<PmcId> for String {
    fn from(pmcid: PmcId) -> Self {
        pmcid.to_string()
    }
}

/// The identifier pair of one article; at least one side is always present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArticleIds {
    pub pmid: Option<PubMedId>,
    pub pmcid: Option<PmcId>,
}

impl ArticleIds {
    /// Returns `None` when both sides are absent
    pub fn new(pmid: Option<PubMedId>, pmcid: Option<PmcId>) -> Option<Self> {
        if pmid.is_none() && pmcid.is_none() {
            None
        } else {
            Some(Self { pmid, pmcid })
        }
    }

    pub fn pmid_only(pmid: PubMedId) -> Self {
        Self {
            pmid: Some(pmid),
            pmcid: None,
        }
    }

    pub fn pmcid_only(pmcid: PmcId) -> Self {
        Self {
            pmid: None,
            pmcid: Some(pmcid),
        }
    }

    pub fn pair(pmid: PubMedId, pmcid: PmcId) -> Self {
        Self {
            pmid: Some(pmid),
            pmcid: Some(pmcid),
        }
    }

    /// Both identifiers known
    pub fn is_complete(&self) -> bool {
        self.pmid.is_some() && self.pmcid.is_some()
    }
}

impl fmt::Display for ArticleIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.pmid, &self.pmcid) {
            (Some(pmid), Some(pmcid)) => write!(f, "PMID:{pmid}/{pmcid}"),
            (Some(pmid), None) => write!(f, "PMID:{pmid}"),
            (None, Some(pmcid)) => write!(f, "{pmcid}"),
            (None, None) => write!(f, "<none>"),
        }
    }
}
