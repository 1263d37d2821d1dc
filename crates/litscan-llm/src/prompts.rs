//! Prompt templates for the generation tasks.

use litscan_ingestion::models::{Article, DateRange};

/// Abstracts are cut to this many characters in the review prompt.
pub const REVIEW_ABSTRACT_CHARS: usize = 200;

pub fn expand_query(topic: &str) -> String {
    format!(
        "A researcher wants to search PubMed for literature on \"{topic}\".\n\n\
         Generate 5-10 optimised search terms following PubMed search conventions.\n\n\
         Requirements:\n\
         1. Include MeSH headings as well as free-text terms\n\
         2. Include synonyms and common variants\n\
         3. Use boolean operators (AND/OR) where they help\n\
         4. Consider alternative spellings (e.g. color vs colour)\n\
         5. Output one term per line, without numbering or commentary\n\n\
         For example, for \"esophageal cancer immunotherapy\" the output could be:\n\
         esophageal cancer immunotherapy\n\
         esophageal carcinoma immunotherapy\n\
         esophagus cancer AND immune therapy\n\
         ESCC AND immune checkpoint\n\n\
         Search terms:"
    )
}

pub fn summarize_article(title: &str, abstract_text: &str, pmid: &str, language: &str) -> String {
    format!(
        "Analyse the following paper abstract and summarise it in the format below.\n\n\
         ## Article\n\
         - PMID: {pmid}\n\
         - Title: {title}\n\n\
         ## Abstract\n\
         {abstract_text}\n\n\
         ## Summary\n\
         1. **Study type**: (basic research, clinical trial, review, cohort study, ...)\n\
         2. **Key findings**: (one or two sentences)\n\
         3. **Methods**: (brief description of the experimental or analytical approach)\n\
         4. **Clinical relevance**: (if any)\n\n\
         Answer in {language}."
    )
}

pub fn polish_topic(topic: &str, language: &str) -> String {
    format!(
        "Rewrite the following search topic as a title suitable for an academic literature review.\n\n\
         Original topic: {topic}\n\n\
         Requirements:\n\
         1. Use formal academic phrasing\n\
         2. Give the English term in parentheses if writing in another language\n\
         3. Keep the core research area unchanged\n\
         4. Output only the rewritten topic, with no explanation\n\
         5. Keep it between 5 and 20 words\n\n\
         Write the topic in {language}."
    )
}

pub fn review(articles: &[Article], topic: &str, range: &DateRange, language: &str) -> String {
    let listing = articles
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let abstract_head: String = a
                .abstract_text
                .as_deref()
                .unwrap_or("")
                .chars()
                .take(REVIEW_ABSTRACT_CHARS)
                .collect();
            format!(
                "Reference {}:\n\
                 - Title: {}\n\
                 - Authors: {}\n\
                 - Journal: {}\n\
                 - Published: {}\n\
                 - DOI: {}\n\
                 - Abstract: {}",
                i + 1,
                a.title,
                a.authors.join(", "),
                a.journal,
                a.pub_date,
                a.doi.as_deref().unwrap_or(""),
                abstract_head,
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n");

    format!(
        "Based on the following {count} papers on \"{topic}\", write a structured literature review.\n\n\
         ## Search criteria\n\
         - Topic: {topic}\n\
         - Date range: {start} to {end}\n\n\
         ## Papers\n\
         {listing}\n\n\
         ## Requirements\n\
         1. Structure: abstract, introduction, a main body with 3-4 subheadings, \
         discussion and outlook, references.\n\
         2. The main body should distil the papers above into core arguments; \
         general background knowledge may be added where needed.\n\
         3. Style: concise, formal and objective, in the register of a Nature Reviews article.\n\
         4. Cite references in a standard format at first mention in the text.\n\n\
         Write the review in {language}.",
        count = articles.len(),
        start = range.start_label(),
        end = range.end_label(),
    )
}
