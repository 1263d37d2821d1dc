//! PubMed E-utilities client.
//!
//! Endpoints used:
//!   esearch: {base}/esearch.fcgi   (JSON, identifier list)
//!   efetch:  {base}/efetch.fcgi    (XML, full records)

use std::time::Duration;

use async_trait::async_trait;
use litscan_common::sandbox::SandboxClient as Client;
use litscan_common::LitscanError;
use litscan_config::PubMedConfig;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument, warn};

use crate::models::{Article, DateRange, MAX_AUTHORS};
use super::SourceFetcher;

const TOOL_NAME: &str = "litscan";

pub struct PubMedClient {
    client: Client,
    base_url: String,
    email: Option<String>,
    api_key: Option<SecretString>,
    batch_size: usize,
    batch_delay: Duration,
}

impl PubMedClient {
    pub fn new(config: &PubMedConfig) -> Result<Self, LitscanError> {
        let mut client = Client::with_timeout(Duration::from_secs(config.request_timeout_secs))?;
        // The configured mirror is trusted; anything else stays blocked.
        if let Some(host) = reqwest::Url::parse(&config.base_url).ok().and_then(|u| u.host_str().map(String::from)) {
            if !client.is_allowed(&config.base_url) {
                info!(%host, "Allowing configured E-utilities host");
                client.allow_domain(&host);
            }
        }
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            api_key: config.api_key.clone(),
            batch_size: config.batch_size.max(1),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
        })
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("db", "pubmed".to_string()), ("tool", TOOL_NAME.to_string())];
        if let Some(email) = &self.email {
            params.push(("email", email.clone()));
        }
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.expose_secret().to_string()));
        }
        params
    }

    /// Search PubMed and return a list of PMIDs, newest first.
    #[instrument(skip(self, query))]
    async fn esearch(&self, query: &str, max: usize) -> anyhow::Result<Vec<String>> {
        let mut params = self.base_params();
        params.push(("term", query.to_string()));
        params.push(("retmax", max.to_string()));
        params.push(("sort", "pub_date".to_string()));
        params.push(("retmode", "json".to_string()));

        let resp: serde_json::Value = self.client
            .get(&format!("{}/esearch.fcgi", self.base_url))?
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let ids: Vec<String> = resp["esearchresult"]["idlist"]
            .as_array()
            .map(|ids| ids.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        debug!(count = ids.len(), "PubMed esearch returned PMIDs");
        Ok(ids)
    }

    /// Fetch PubMed XML for one batch of PMIDs.
    #[instrument(skip(self, pmids), fields(batch = pmids.len()))]
    async fn efetch(&self, pmids: &[String]) -> anyhow::Result<Vec<Article>> {
        let mut params = self.base_params();
        params.push(("id", pmids.join(",")));
        params.push(("rettype", "abstract".to_string()));
        params.push(("retmode", "xml".to_string()));

        let xml = self.client
            .get(&format!("{}/efetch.fcgi", self.base_url))?
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_pubmed_xml(&xml)
    }
}

#[async_trait]
impl SourceFetcher for PubMedClient {
    async fn search(&self, terms: &[String], range: &DateRange, max_results: usize) -> Vec<String> {
        if terms.is_empty() {
            return Vec::new();
        }
        let query = build_query(terms, range);
        info!(%query, "Searching PubMed");
        match self.esearch(&query, max_results).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "PubMed search failed");
                Vec::new()
            }
        }
    }

    async fn fetch_details(&self, ids: &[String]) -> Vec<Article> {
        let mut articles = Vec::with_capacity(ids.len());
        let total = ids.len();
        for (i, batch) in ids.chunks(self.batch_size).enumerate() {
            if i > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
            let first = i * self.batch_size + 1;
            debug!("Fetching records {}-{}/{}", first, first + batch.len() - 1, total);
            match self.efetch(batch).await {
                Ok(mut parsed) => articles.append(&mut parsed),
                Err(e) => warn!(error = %e, batch = i, "PubMed detail batch failed, skipping"),
            }
        }
        articles
    }
}

/// `("t"[Title/Abstract] OR t[MeSH Terms]) OR ...` ANDed with the publication window.
pub fn build_query(terms: &[String], range: &DateRange) -> String {
    let terms = terms
        .iter()
        .map(|t| format!("(\"{0}\"[Title/Abstract] OR {0}[MeSH Terms])", t.replace('"', "")))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!(
        "({}) AND (\"{}\"[Date - Publication] : \"{}\"[Date - Publication])",
        terms,
        range.start_label(),
        range.end_label()
    )
}

fn attr_value(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fields collected for the record currently being parsed.
#[derive(Default)]
struct Draft {
    pmid: Option<String>,
    title: String,
    journal: String,
    year: String,
    month: String,
    medline_date: String,
    doi: Option<String>,
    eloc_doi: Option<String>,
    authors: Vec<String>,
    abstract_parts: Vec<String>,
}

impl Draft {
    /// Records without an identifier or a title are dropped.
    fn finish(self) -> Option<Article> {
        let pmid = self.pmid.as_deref().map(str::trim).filter(|p| !p.is_empty())?.to_string();
        let title = collapse_ws(&self.title);
        if title.is_empty() {
            return None;
        }
        let pub_date = if !self.year.is_empty() {
            if self.month.is_empty() {
                self.year
            } else {
                format!("{}-{}", self.year, self.month)
            }
        } else {
            collapse_ws(&self.medline_date)
        };
        let abstract_text = self
            .abstract_parts
            .iter()
            .map(|p| collapse_ws(p))
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Some(Article {
            pmid,
            title,
            journal: collapse_ws(&self.journal),
            publisher: None,
            pub_date,
            doi: self.doi.or(self.eloc_doi),
            authors: self.authors,
            abstract_text: (!abstract_text.is_empty()).then_some(abstract_text),
            summary: None,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Pmid,
    Title,
    Abstract,
    Journal,
    Year,
    Month,
    MedlineDate,
    LastName,
    ForeName,
    ArticleId,
    ELocation,
}

/// Inline markup PubMed allows inside titles and abstracts.
fn is_inline(name: &[u8]) -> bool {
    matches!(name, b"i" | b"b" | b"u" | b"sup" | b"sub" | b"mml:math")
}

/// Parse PubMed XML (efetch abstract mode) into articles.
/// Handles the <PubmedArticleSet><PubmedArticle> structure; records without a
/// title are dropped.
pub fn parse_pubmed_xml(xml: &str) -> anyhow::Result<Vec<Article>> {
    let mut articles = Vec::new();
    let mut reader = Reader::from_str(xml);

    // State machine for XML parsing
    let mut current: Option<Draft> = None;
    let mut field = Field::None;
    let mut in_abstract_block = false;
    let mut in_journal = false;
    let mut in_pub_date = false;
    let mut in_author = false;
    let mut reference_depth = 0usize;
    let mut id_is_doi = false;
    let mut last_name = String::new();
    let mut fore_name = String::new();
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                let name = name.as_ref();
                let next = match name {
                    _ if is_inline(name) => Field::None,
                    b"PubmedArticle" => {
                        current = Some(Draft::default());
                        Field::None
                    }
                    b"ReferenceList" | b"CommentsCorrectionsList" => {
                        reference_depth += 1;
                        Field::None
                    }
                    _ if reference_depth > 0 => Field::None,
                    b"PMID"         => Field::Pmid,
                    b"ArticleTitle" => Field::Title,
                    b"AbstractText" if in_abstract_block => Field::Abstract,
                    b"Title"        if in_journal => Field::Journal,
                    b"Year"         if in_pub_date => Field::Year,
                    b"Month"        if in_pub_date => Field::Month,
                    b"MedlineDate"  if in_pub_date => Field::MedlineDate,
                    b"LastName"     if in_author => Field::LastName,
                    b"ForeName"     if in_author => Field::ForeName,
                    b"Abstract" => { in_abstract_block = true; Field::None }
                    b"Journal"  => { in_journal = true; Field::None }
                    b"PubDate"  if in_journal => { in_pub_date = true; Field::None }
                    b"Author" => {
                        in_author = true;
                        last_name.clear();
                        fore_name.clear();
                        Field::None
                    }
                    b"ArticleId" => {
                        id_is_doi = attr_value(e, "IdType").as_deref() == Some("doi");
                        Field::ArticleId
                    }
                    b"ELocationID" => {
                        id_is_doi = attr_value(e, "EIdType").as_deref() == Some("doi");
                        Field::ELocation
                    }
                    _ => Field::None,
                };
                if next != Field::None {
                    field = next;
                    text.clear();
                }
            }
            Ok(Event::Text(ref e)) if field != Field::None => {
                text.push_str(&e.unescape().unwrap_or_default());
            }
            Ok(Event::CData(ref e)) if field != Field::None => {
                text.push_str(&String::from_utf8_lossy(e));
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                let name = name.as_ref();
                match name {
                    _ if is_inline(name) => {}
                    b"ReferenceList" | b"CommentsCorrectionsList" => {
                        reference_depth = reference_depth.saturating_sub(1);
                    }
                    b"PubmedArticle" => {
                        if let Some(draft) = current.take() {
                            match draft.finish() {
                                Some(a) => articles.push(a),
                                None => warn!("Skipping record without a PMID or title"),
                            }
                        }
                    }
                    _ if reference_depth > 0 => {}
                    b"Abstract" => in_abstract_block = false,
                    b"Journal"  => in_journal = false,
                    b"PubDate"  => in_pub_date = false,
                    b"Author" => {
                        if let Some(ref mut d) = current {
                            if !last_name.is_empty() && d.authors.len() < MAX_AUTHORS {
                                d.authors.push(format!("{} {}", fore_name, last_name).trim().to_string());
                            }
                        }
                        in_author = false;
                    }
                    _ => {
                        if let Some(ref mut d) = current {
                            commit_field(d, field, name, &text, id_is_doi, &mut last_name, &mut fore_name);
                        }
                    }
                }
                if !is_inline(name) {
                    field = Field::None;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("XML parse error: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(articles)
}

fn commit_field(
    d: &mut Draft,
    field: Field,
    name: &[u8],
    text: &str,
    id_is_doi: bool,
    last_name: &mut String,
    fore_name: &mut String,
) {
    let value = text.trim().to_string();
    match (field, name) {
        // Only the first PMID is the record's own
        (Field::Pmid, b"PMID") if d.pmid.is_none() => d.pmid = Some(value),
        (Field::Title, b"ArticleTitle") => d.title = text.to_string(),
        (Field::Abstract, b"AbstractText") => d.abstract_parts.push(text.to_string()),
        (Field::Journal, b"Title") => d.journal = value,
        (Field::Year, b"Year") => d.year = value,
        (Field::Month, b"Month") => d.month = value,
        (Field::MedlineDate, b"MedlineDate") => d.medline_date = value,
        (Field::LastName, b"LastName") => *last_name = value,
        (Field::ForeName, b"ForeName") => *fore_name = value,
        (Field::ArticleId, b"ArticleId") if id_is_doi && d.doi.is_none() && !value.is_empty() => {
            d.doi = Some(value)
        }
        (Field::ELocation, b"ELocationID") if id_is_doi && d.eloc_doi.is_none() && !value.is_empty() => {
            d.eloc_doi = Some(value)
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">39000001</PMID>
      <Article>
        <Journal>
          <JournalIssue>
            <PubDate><Year>2025</Year><Month>Mar</Month></PubDate>
          </JournalIssue>
          <Title>Nature medicine</Title>
        </Journal>
        <ArticleTitle>PD-1 blockade in <i>ESCC</i> patients</ArticleTitle>
        <ELocationID EIdType="pii">S0000</ELocationID>
        <ELocationID EIdType="doi">10.1000/eloc</ELocationID>
        <Abstract>
          <AbstractText Label="BACKGROUND">Background text &amp; more.</AbstractText>
          <AbstractText Label="RESULTS">Results text.</AbstractText>
        </Abstract>
        <AuthorList>
          <Author><LastName>Smith</LastName><ForeName>John</ForeName></Author>
          <Author><CollectiveName>ESCC Consortium</CollectiveName></Author>
          <Author><LastName>Wang</LastName></Author>
        </AuthorList>
      </Article>
      <CommentsCorrectionsList>
        <CommentsCorrections><PMID>11111111</PMID></CommentsCorrections>
      </CommentsCorrectionsList>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">39000001</ArticleId>
        <ArticleId IdType="doi">10.1000/primary</ArticleId>
      </ArticleIdList>
      <ReferenceList>
        <Reference><ArticleIdList><ArticleId IdType="doi">10.1000/ref</ArticleId></ArticleIdList></Reference>
      </ReferenceList>
    </PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>39000002</PMID>
      <Article>
        <Journal>
          <JournalIssue><PubDate><MedlineDate>2024 Nov-Dec</MedlineDate></PubDate></JournalIssue>
          <Title>Cell</Title>
        </Journal>
        <ArticleTitle></ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>39000003</PMID>
      <Article>
        <Journal>
          <JournalIssue><PubDate><MedlineDate>2024 Nov-Dec</MedlineDate></PubDate></JournalIssue>
          <Title>Cell</Title>
        </Journal>
        <ArticleTitle>No abstract here</ArticleTitle>
        <ELocationID EIdType="doi">10.1000/only-eloc</ELocationID>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_parse_full_record() {
        let articles = parse_pubmed_xml(SAMPLE).unwrap();
        assert_eq!(articles.len(), 2, "record without title must be dropped");

        let a = &articles[0];
        assert_eq!(a.pmid, "39000001");
        assert_eq!(a.title, "PD-1 blockade in ESCC patients");
        assert_eq!(a.journal, "Nature medicine");
        assert_eq!(a.pub_date, "2025-Mar");
        assert_eq!(a.doi.as_deref(), Some("10.1000/primary"));
        assert_eq!(a.authors, vec!["John Smith", "Wang"]);
        assert_eq!(
            a.abstract_text.as_deref(),
            Some("Background text & more. Results text.")
        );
        assert!(a.publisher.is_none());
    }

    #[test]
    fn test_medline_date_and_eloc_doi_fallback() {
        let articles = parse_pubmed_xml(SAMPLE).unwrap();
        let b = &articles[1];
        assert_eq!(b.pmid, "39000003");
        assert_eq!(b.pub_date, "2024 Nov-Dec");
        assert_eq!(b.doi.as_deref(), Some("10.1000/only-eloc"));
        assert!(b.abstract_text.is_none());
    }

    #[test]
    fn test_authors_truncated() {
        let authors: String = (0..14)
            .map(|i| format!("<Author><LastName>L{i}</LastName><ForeName>F{i}</ForeName></Author>"))
            .collect();
        let xml = format!(
            "<PubmedArticleSet><PubmedArticle><MedlineCitation><PMID>1</PMID><Article>\
             <ArticleTitle>T</ArticleTitle><AuthorList>{authors}</AuthorList>\
             </Article></MedlineCitation></PubmedArticle></PubmedArticleSet>"
        );
        let articles = parse_pubmed_xml(&xml).unwrap();
        assert_eq!(articles[0].authors.len(), MAX_AUTHORS);
        assert_eq!(articles[0].authors[9], "F9 L9");
    }

    #[test]
    fn test_malformed_xml_keeps_completed_records() {
        let xml = format!("{}<PubmedArticle><broken", &SAMPLE[..SAMPLE.len() - "</PubmedArticleSet>".len()]);
        let articles = parse_pubmed_xml(&xml).unwrap();
        assert_eq!(articles.len(), 2);
    }

    #[test]
    fn test_record_without_pmid_is_dropped() {
        let xml = "<PubmedArticleSet>\
            <PubmedArticle><MedlineCitation><Article><ArticleTitle>Orphan</ArticleTitle></Article>\
            </MedlineCitation></PubmedArticle>\
            <PubmedArticle><MedlineCitation><PMID> </PMID><Article><ArticleTitle>Blank id</ArticleTitle></Article>\
            </MedlineCitation></PubmedArticle>\
            <PubmedArticle><MedlineCitation><PMID>7</PMID><Article><ArticleTitle>Kept</ArticleTitle></Article>\
            </MedlineCitation></PubmedArticle>\
            </PubmedArticleSet>";
        let articles = parse_pubmed_xml(xml).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].pmid, "7");
        assert_eq!(articles[0].title, "Kept");
    }

    #[test]
    fn test_build_query_format() {
        let range = DateRange::new(
            DateRange::parse_date("2025/01/01").unwrap(),
            DateRange::parse_date("2025/06/30").unwrap(),
        )
        .unwrap();
        let q = build_query(&["esophageal cancer".to_string(), "ESCC".to_string()], &range);
        assert_eq!(
            q,
            "((\"esophageal cancer\"[Title/Abstract] OR esophageal cancer[MeSH Terms]) OR \
             (\"ESCC\"[Title/Abstract] OR ESCC[MeSH Terms])) AND \
             (\"2025/01/01\"[Date - Publication] : \"2025/06/30\"[Date - Publication])"
        );
    }

    #[tokio::test]
    #[ignore] // requires network access to NCBI
    async fn test_live_search() {
        let client = PubMedClient::new(&PubMedConfig::default()).unwrap();
        let range = DateRange::new(
            DateRange::parse_date("2024/01/01").unwrap(),
            DateRange::parse_date("2024/12/31").unwrap(),
        )
        .unwrap();
        let ids = client.search(&["esophageal cancer".to_string()], &range, 3).await;
        assert!(!ids.is_empty());
        let articles = client.fetch_details(&ids).await;
        assert!(!articles.is_empty());
    }
}
