use litscan_ingestion::models::{Article, DateRange};

pub fn article(pmid: &str, journal: &str, abstract_text: Option<&str>) -> Article {
    let mut a = Article::new(pmid, format!("Study {}", pmid));
    a.journal = journal.to_string();
    a.pub_date = "2025-Feb".to_string();
    a.authors = vec!["Ann Lee".to_string(), "Bo Chen".to_string()];
    a.abstract_text = abstract_text.map(str::to_string);
    a
}

/// `n` articles with abstracts, alternating between two target journals.
pub fn article_set(n: usize) -> Vec<Article> {
    (1..=n)
        .map(|i| {
            let journal = if i % 2 == 0 { "Cell" } else { "Nature" };
            article(&format!("{}", 1000 + i), journal, Some("An abstract."))
        })
        .collect()
}

pub fn date_range() -> DateRange {
    DateRange::new(
        DateRange::parse_date("2025/01/01").unwrap(),
        DateRange::parse_date("2025/06/30").unwrap(),
    )
    .unwrap()
}
