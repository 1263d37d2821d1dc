//! Venue classifier: maps a journal name to a publisher bucket.
//!
//! Names are normalised (lowercase, runs of whitespace and punctuation
//! collapsed to one space) and compared against every bucket entry. An exact
//! match anywhere wins; otherwise the first bucket holding an entry that
//! contains, or is contained by, the name is chosen. Buckets are scanned in
//! list order, so results are stable for a given configuration.

use std::sync::OnceLock;

use litscan_config::VenueBucket;
use regex::Regex;
use tracing::info;

use crate::models::Article;

pub const UNKNOWN_PUBLISHER: &str = "Unknown";

fn separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s\p{P}]+").expect("static regex"))
}

pub fn normalize(name: &str) -> String {
    separator_re()
        .replace_all(&name.to_lowercase(), " ")
        .trim()
        .to_string()
}

#[derive(Debug, Clone)]
struct NormalisedBucket {
    publisher: String,
    entries: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct VenueClassifier {
    buckets: Vec<NormalisedBucket>,
}

impl VenueClassifier {
    pub fn new(buckets: &[VenueBucket]) -> Self {
        let buckets = buckets
            .iter()
            .map(|b| NormalisedBucket {
                publisher: b.publisher.clone(),
                entries: b
                    .journals
                    .iter()
                    .map(|j| normalize(j))
                    .filter(|j| !j.is_empty())
                    .collect(),
            })
            .collect();
        Self { buckets }
    }

    /// Returns whether the venue is a target and its publisher bucket
    /// (`"Unknown"` when unmatched).
    pub fn classify(&self, venue: &str) -> (bool, &str) {
        match self.publisher_for(venue) {
            Some(p) => (true, p),
            None => (false, UNKNOWN_PUBLISHER),
        }
    }

    pub fn publisher_for(&self, venue: &str) -> Option<&str> {
        let name = normalize(venue);
        if name.is_empty() {
            return None;
        }
        let exact = self
            .buckets
            .iter()
            .find(|b| b.entries.iter().any(|e| *e == name));
        let hit = exact.or_else(|| {
            self.buckets.iter().find(|b| {
                b.entries
                    .iter()
                    .any(|e| name.contains(e.as_str()) || e.contains(name.as_str()))
            })
        });
        hit.map(|b| b.publisher.as_str())
    }

    /// Keeps target-venue articles and stamps their publisher bucket.
    pub fn filter(&self, articles: Vec<Article>) -> Vec<Article> {
        let before = articles.len();
        let kept: Vec<Article> = articles
            .into_iter()
            .filter_map(|mut a| {
                let publisher = self.publisher_for(&a.journal)?;
                a.publisher = Some(publisher.to_string());
                Some(a)
            })
            .collect();
        info!(before, after = kept.len(), "Venue filter applied");
        kept
    }
}

/// How a task narrows its fetched articles.
#[derive(Debug, Clone)]
pub enum VenueFilter {
    /// Only the given buckets are consulted.
    Buckets(Vec<VenueBucket>),
    /// Every article passes with the `"Unknown"` bucket.
    Off,
}

impl VenueFilter {
    pub fn apply(&self, articles: Vec<Article>) -> Vec<Article> {
        match self {
            VenueFilter::Buckets(buckets) => VenueClassifier::new(buckets).filter(articles),
            VenueFilter::Off => articles
                .into_iter()
                .map(|mut a| {
                    a.publisher = Some(UNKNOWN_PUBLISHER.to_string());
                    a
                })
                .collect(),
        }
    }
}
