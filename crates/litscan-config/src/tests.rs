#[cfg(test)]
mod tests {
    use super::super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.search.max_results, 30);
        assert_eq!(config.search.max_workers, 5);
        assert_eq!(config.search.default_start_date, "2025/01/01");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.llm.provider, LlmProvider::OpenaiCompatible);
        assert_eq!(config.llm.model, "deepseek-chat");
        assert_eq!(config.pubmed.batch_size, 100);
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_default_venues_are_ordered_nature_cell_science() {
        let config = Config::default();
        let publishers: Vec<&str> = config.venues.iter().map(|b| b.publisher.as_str()).collect();
        assert_eq!(publishers, vec!["Nature", "Cell", "Science"]);
        assert!(config.venues.iter().all(|b| !b.journals.is_empty()));
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let toml = r#"
            [llm]
            provider = "ollama"
            base_url = "http://localhost:11434"
            model = "llama3:8b"

            [search]
            max_workers = 2

            [[venues]]
            publisher = "Lancet"
            journals = ["Lancet", "Lancet Oncology"]
        "#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.temperature, 0.7);
        assert_eq!(config.search.max_workers, 2);
        assert_eq!(config.search.max_results, 30);
        assert_eq!(config.venues.len(), 1);
        assert_eq!(config.venues[0].publisher, "Lancet");
    }

    #[test]
    fn test_env_fills_missing_secrets_only() {
        let toml = r#"
            [llm]
            api_key = "from-file"
        "#;
        let mut config = Config::from_toml(toml).unwrap();
        config.apply_env(env_of(&[
            ("LITSCAN_LLM_API_KEY", "from-env"),
            ("LITSCAN_PUBMED_API_KEY", "ncbi-key"),
            ("LITSCAN_BIND", "127.0.0.1:9000"),
        ]));
        assert_eq!(config.llm.api_key.as_ref().unwrap().expose_secret(), "from-file");
        assert_eq!(config.pubmed.api_key.as_ref().unwrap().expose_secret(), "ncbi-key");
        assert_eq!(config.server.bind, "127.0.0.1:9000");
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env(env_of(&[("LITSCAN_LLM_API_KEY", "  "), ("LITSCAN_BIND", "")]));
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.server.bind, "0.0.0.0:5000");
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.search.max_workers = 0;
        assert!(config.validate().is_err());
        config.search.max_workers = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_path_reports_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search\nmax_results = ").unwrap();
        let err = Config::from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }

    #[test]
    fn test_from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output]\ndir = \"/tmp/litscan\"\nlanguage = \"Chinese\"").unwrap();
        let config = Config::from_path(file.path()).unwrap();
        assert_eq!(config.output.dir, "/tmp/litscan");
        assert_eq!(config.output.language, "Chinese");
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\nmax_workers = 2").unwrap();
        let config = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(config.search.max_workers, 2);

        let err = Config::load_from(Some(Path::new("/nonexistent/litscan.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_load_from_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\nmax_workers = 0").unwrap();
        assert!(Config::load_from(Some(file.path())).is_err());
    }
}
