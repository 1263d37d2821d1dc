//! Report export: Markdown report, review file and CSV table.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::models::{Article, DateRange};

/// Number of journals listed in the report's distribution table.
pub const TOP_JOURNALS: usize = 15;

/// File names (relative to the output directory) written for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportArtifacts {
    pub report: String,
    pub review: String,
    pub table: String,
}

impl ReportArtifacts {
    pub fn for_task(task_id: &str) -> Self {
        Self {
            report: format!("{}_report.md", task_id),
            review: format!("{}_review.md", task_id),
            table: format!("{}_articles.csv", task_id),
        }
    }

    pub fn names(&self) -> [&str; 3] {
        [&self.report, &self.review, &self.table]
    }
}

fn counts_desc<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(&'a str, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for k in keys {
        *counts.entry(k).or_default() += 1;
    }
    let mut counts: Vec<(&str, usize)> = counts.into_iter().collect();
    // Ties ordered by name so the report is reproducible
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    counts
}

/// Statistics header: totals, publisher distribution and the top journals.
pub fn render_overview(articles: &[Article], topic: &str, range: &DateRange) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Literature report: {}\n", topic);
    let _ = writeln!(out, "## Overview");
    let _ = writeln!(
        out,
        "Papers on {} published between {} and {} in the selected venues.\n",
        topic,
        range.start_label(),
        range.end_label()
    );
    let _ = writeln!(out, "## Statistics");
    let _ = writeln!(out, "- **Total articles**: {}", articles.len());
    let _ = writeln!(out, "- **Publisher distribution**:");
    let publishers = counts_desc(articles.iter().map(|a| a.publisher.as_deref().unwrap_or("Unknown")));
    for (publisher, count) in publishers {
        let _ = writeln!(out, "  - {}: {}", publisher, count);
    }
    let _ = writeln!(out, "\n## Journal distribution");
    let journals = counts_desc(articles.iter().map(|a| {
        if a.journal.is_empty() { "Unknown" } else { a.journal.as_str() }
    }));
    for (journal, count) in journals.into_iter().take(TOP_JOURNALS) {
        let _ = writeln!(out, "- {}: {}", journal, count);
    }
    out
}

/// Overview followed by one section per article.
pub fn render_report(articles: &[Article], overview: &str) -> String {
    let mut out = String::new();
    if !overview.is_empty() {
        out.push_str(overview);
        out.push_str("\n\n");
    }
    out.push_str("---\n\n");
    for (i, a) in articles.iter().enumerate() {
        let _ = writeln!(out, "## Article {}: {}\n", i + 1, a.title);
        let _ = writeln!(out, "**PMID**: {}\n", a.pmid);
        let _ = writeln!(out, "**Journal**: {}\n", or_na(&a.journal));
        let _ = writeln!(out, "**Publisher**: {}\n", a.publisher.as_deref().unwrap_or("N/A"));
        let _ = writeln!(out, "**Published**: {}\n", or_na(&a.pub_date));
        let _ = writeln!(out, "**DOI**: {}\n", a.doi.as_deref().unwrap_or("N/A"));
        if !a.authors.is_empty() {
            let _ = writeln!(out, "**Authors**: {}\n", a.authors_joined());
        }
        if let Some(abstract_text) = &a.abstract_text {
            let _ = writeln!(out, "**Abstract**:\n\n{}\n", abstract_text);
            // Articles without an abstract only carry a placeholder summary
            if let Some(summary) = &a.summary {
                let _ = writeln!(out, "**AI summary**:\n\n{}\n", summary);
            }
        }
        out.push_str("---\n\n");
    }
    out
}

fn or_na(s: &str) -> &str {
    if s.is_empty() { "N/A" } else { s }
}

/// Writes the tabular export, one row per article.
pub fn write_csv<W: std::io::Write>(articles: &[Article], writer: W) -> anyhow::Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record([
        "#", "PMID", "Title", "Journal", "Publisher", "Published", "DOI", "Authors", "Abstract",
        "Summary",
    ])?;
    for (i, a) in articles.iter().enumerate() {
        let index = (i + 1).to_string();
        let authors = a.authors_joined();
        w.write_record([
            index.as_str(),
            a.pmid.as_str(),
            a.title.as_str(),
            a.journal.as_str(),
            a.publisher.as_deref().unwrap_or(""),
            a.pub_date.as_str(),
            a.doi.as_deref().unwrap_or(""),
            authors.as_str(),
            a.abstract_text.as_deref().unwrap_or(""),
            a.summary.as_deref().unwrap_or(""),
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn write_all(dir: &Path, names: &ReportArtifacts, report: &str, review: &str, articles: &[Article]) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;
    std::fs::write(dir.join(&names.report), report)
        .with_context(|| format!("writing {}", names.report))?;
    std::fs::write(dir.join(&names.review), review)
        .with_context(|| format!("writing {}", names.review))?;
    let file = std::fs::File::create(dir.join(&names.table))
        .with_context(|| format!("writing {}", names.table))?;
    write_csv(articles, std::io::BufWriter::new(file))?;
    Ok(())
}

/// Writes the three artifacts for `task_id` under `dir` on the blocking pool.
#[instrument(skip(articles, overview, review), fields(articles = articles.len()))]
pub async fn persist_artifacts(
    dir: PathBuf,
    task_id: String,
    articles: Vec<Article>,
    overview: String,
    review: String,
) -> anyhow::Result<ReportArtifacts> {
    let names = ReportArtifacts::for_task(&task_id);
    let out = names.clone();
    tokio::task::spawn_blocking(move || {
        let report = render_report(&articles, &overview);
        write_all(&dir, &out, &report, &review, &articles)
    })
    .await
    .context("artifact writer panicked")??;
    info!(task_id = %task_id, "Artifacts written");
    Ok(names)
}
