//! Data models shared by the retrieval, enrichment and export stages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Authors beyond this many are dropped when a record is parsed.
pub const MAX_AUTHORS: usize = 10;

/// One citation record as returned by the source and carried through a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub pmid: String,
    pub title: String,
    pub journal: String,
    /// Publisher bucket, assigned once by the venue filter.
    pub publisher: Option<String>,
    /// Coarse publication date: `YYYY`, `YYYY-Mon` or the raw MedlineDate.
    pub pub_date: String,
    pub doi: Option<String>,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    /// Generated summary; absent until enrichment completes.
    pub summary: Option<String>,
}

impl Article {
    pub fn new(pmid: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            pmid: pmid.into(),
            title: title.into(),
            journal: String::new(),
            publisher: None,
            pub_date: String::new(),
            doi: None,
            authors: Vec::new(),
            abstract_text: None,
            summary: None,
        }
    }

    pub fn authors_joined(&self) -> String {
        self.authors.join("; ")
    }
}

/// Inclusive publication-date window for a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> anyhow::Result<Self> {
        if start > end {
            anyhow::bail!("start date {} is after end date {}", start, end);
        }
        Ok(Self { start, end })
    }

    /// Parses `YYYY/MM/DD` or `YYYY-MM-DD`.
    pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
        let s = s.trim();
        NaiveDate::parse_from_str(s, "%Y/%m/%d")
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .map_err(|_| anyhow::anyhow!("invalid date '{}', expected YYYY/MM/DD", s))
    }

    /// PubMed's date syntax, also used in prompts and reports.
    pub fn start_label(&self) -> String {
        self.start.format("%Y/%m/%d").to_string()
    }

    pub fn end_label(&self) -> String {
        self.end.format("%Y/%m/%d").to_string()
    }
}
