//! Enrichment client behaviour against a scripted backend.

use litscan_llm::enrichment::NO_ARTICLES_REVIEW;
use litscan_llm::{EnrichmentClient, RetryPolicy, NO_ABSTRACT, SUMMARY_FAILED};
use litscan_test_utils::pretty_assertions::assert_eq;
use litscan_test_utils::{article, article_set, date_range, PromptKind, ScriptedBackend};

fn client(backend: &ScriptedBackend) -> EnrichmentClient {
    EnrichmentClient::new(backend.clone().into_arc(), RetryPolicy::immediate(3))
}

#[tokio::test]
async fn test_summary_without_abstract_makes_no_call() {
    let backend = ScriptedBackend::echo();
    let out = client(&backend).summarize_article("t", None, "1").await;
    assert_eq!(out, NO_ABSTRACT);
    let out = client(&backend).summarize_article("t", Some("   "), "1").await;
    assert_eq!(out, NO_ABSTRACT);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_summary_uses_backend_output() {
    let backend = ScriptedBackend::echo();
    let out = client(&backend).summarize_article("t", Some("abstract"), "42").await;
    assert_eq!(out, "summary of 42");
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_summary_exhausts_retries_then_degrades() {
    let backend = ScriptedBackend::failing();
    let out = client(&backend).summarize_article("t", Some("abstract"), "1").await;
    assert_eq!(out, SUMMARY_FAILED);
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn test_empty_completion_counts_as_failure() {
    let backend = ScriptedBackend::new(|_, _| Ok("   ".to_string()));
    let out = client(&backend).summarize_article("t", Some("abstract"), "1").await;
    assert_eq!(out, SUMMARY_FAILED);
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn test_expand_query_parses_terms() {
    let backend = ScriptedBackend::new(|kind, _| {
        assert_eq!(kind, PromptKind::Expand);
        Ok("# Terms\n1. numbered\nesophageal neoplasms\n\nESCC AND immunotherapy".to_string())
    });
    let terms = client(&backend).expand_query("esophageal cancer").await;
    assert_eq!(terms, vec!["esophageal neoplasms", "ESCC AND immunotherapy"]);
}

#[tokio::test]
async fn test_expand_query_falls_back_to_topic() {
    let backend = ScriptedBackend::failing();
    let terms = client(&backend).expand_query("esophageal cancer").await;
    assert_eq!(terms, vec!["esophageal cancer"]);

    let backend = ScriptedBackend::new(|_, _| Ok("# only a heading".to_string()));
    let terms = client(&backend).expand_query("esophageal cancer").await;
    assert_eq!(terms, vec!["esophageal cancer"]);
}

#[tokio::test]
async fn test_polish_strips_quotes_and_falls_back() {
    let backend = ScriptedBackend::echo();
    assert_eq!(client(&backend).polish_topic("raw").await, "Polished topic");

    let backend = ScriptedBackend::failing();
    assert_eq!(client(&backend).polish_topic("raw").await, "raw");
}

#[tokio::test]
async fn test_polish_request_budget() {
    let backend = ScriptedBackend::new(|_, req| {
        assert_eq!(req.max_tokens, Some(500));
        assert_eq!(req.timeout, Some(std::time::Duration::from_secs(60)));
        Ok("ok".to_string())
    });
    assert_eq!(client(&backend).polish_topic("raw").await, "ok");
}

#[tokio::test]
async fn test_review_of_nothing_skips_backend() {
    let backend = ScriptedBackend::echo();
    let out = client(&backend).generate_review(&[], "topic", &date_range()).await;
    assert_eq!(out, NO_ARTICLES_REVIEW);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_review_prompt_truncates_abstracts() {
    let long = "x".repeat(500);
    let backend = ScriptedBackend::new(move |kind, req| {
        assert_eq!(kind, PromptKind::Review);
        assert_eq!(req.max_tokens, Some(2000));
        let text = req.text();
        assert!(text.contains(&"x".repeat(200)));
        assert!(!text.contains(&"x".repeat(201)));
        Ok("review body".to_string())
    });
    let articles = vec![article("1", "Nature", Some(long.as_str()))];
    let out = client(&backend).generate_review(&articles, "topic", &date_range()).await;
    assert_eq!(out, "review body");
}

#[tokio::test]
async fn test_review_fallback_skeleton() {
    let backend = ScriptedBackend::failing();
    let out = client(&backend)
        .generate_review(&article_set(3), "ESCC", &date_range())
        .await;
    assert!(out.starts_with("# Literature review: ESCC"));
    assert!(out.contains("- Total articles: 3"));
    assert!(out.contains("- Nature: 2"));
    assert!(out.contains("- Cell: 1"));
    assert_eq!(backend.calls(), 3);
}
