//! Run configuration.
//!
//! Everything has a default, so the tool runs with no config file at all. A TOML file given
//! with `--config` replaces defaults section by section, then environment variables win.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::{Error, Result};

/// Format of the crawl window bounds.
pub const WINDOW_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub runner: RunnerSettings,
    #[serde(default)]
    pub crawler: CrawlerConfig,
}

impl Config {
    /// Reads `path` (if any), applies environment overrides and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str(&raw)?
            }
            None => Config::default(),
        };
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`.
    ///
    /// Supported keys:
    /// - `LLM_ENDPOINT`: API base URL
    /// - `LLM_MODEL`: model name
    /// - `LLM_API_KEY`, then `OPENAI_API_KEY`: API key
    /// - `LLM_MAX_TOKENS`: completion token cap
    /// - `LLM_TEMPERATURE`: sampling temperature
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let c = &mut self.classifier;
        if let Some(val) = lookup("LLM_ENDPOINT") {
            c.endpoint = val;
        }
        if let Some(val) = lookup("LLM_MODEL") {
            c.model = val;
        }
        if let Some(val) = lookup("LLM_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            c.api_key = Some(val);
        }
        if let Some(n) = lookup("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            c.max_tokens = n;
        }
        if let Some(t) = lookup("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            c.temperature = t;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.classifier.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "classifier.max_attempts must be at least 1".into(),
            ));
        }
        if self.runner.batch_size == 0 {
            return Err(Error::InvalidConfig(
                "runner.batch_size must be at least 1".into(),
            ));
        }
        let crawler = &self.crawler;
        if crawler.workers == 0 {
            return Err(Error::InvalidConfig(
                "crawler.workers must be at least 1".into(),
            ));
        }
        if crawler.start_page > crawler.end_page {
            return Err(Error::InvalidConfig(format!(
                "crawler.start_page ({}) is after crawler.end_page ({})",
                crawler.start_page, crawler.end_page
            )));
        }
        crawler.window()?;
        Ok(())
    }
}

/// Remote classification settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClassifierConfig {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// API key; when unset it is read from `api_key_file`
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_file")]
    pub api_key_file: PathBuf,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Remote calls per record before falling back to neutral
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Wait after an unparsable answer
    #[serde(default = "default_parse_retry_delay_ms")]
    pub parse_retry_delay_ms: u64,
    /// Wait after a transport or API error
    #[serde(default = "default_error_retry_delay_ms")]
    pub error_retry_delay_ms: u64,
    /// Trimmed texts shorter than this are neutral without asking
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
}

fn default_endpoint() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_file() -> PathBuf {
    PathBuf::from("api_key.txt")
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    10
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_parse_retry_delay_ms() -> u64 {
    1000
}

fn default_error_retry_delay_ms() -> u64 {
    2000
}

fn default_min_text_chars() -> usize {
    5
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            api_key_file: default_api_key_file(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            parse_retry_delay_ms: default_parse_retry_delay_ms(),
            error_retry_delay_ms: default_error_retry_delay_ms(),
            min_text_chars: default_min_text_chars(),
        }
    }
}

impl ClassifierConfig {
    pub fn parse_retry_delay(&self) -> Duration {
        Duration::from_millis(self.parse_retry_delay_ms)
    }

    pub fn error_retry_delay(&self) -> Duration {
        Duration::from_millis(self.error_retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The configured key, or the first line of `api_key_file`.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().map(str::trim) {
            if !key.is_empty() {
                return Ok(key.to_string());
            }
        }
        let missing = || Error::MissingApiKey(self.api_key_file.clone());
        let raw = std::fs::read_to_string(&self.api_key_file).map_err(|_| missing())?;
        raw.lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(missing)
    }
}

/// Batch runner settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Rows between checkpoint flushes
    pub batch_size: usize,
    /// Minimum gap between two remote calls
    pub throttle_ms: u64,
    /// Where the crawler writes and the labeler reads by default
    pub data_dir: PathBuf,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            throttle_ms: 10,
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl RunnerSettings {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

/// Board crawler settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// List page URL without query
    pub base_url: String,
    /// Prefix for the relative article links found on list pages
    pub site_origin: String,
    pub gallery_id: String,
    pub start_page: u32,
    pub end_page: u32,
    /// Pages fetched concurrently
    pub workers: usize,
    pub window_start: String,
    pub window_end: String,
    /// Pause after each page load
    pub page_delay_ms: u64,
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gall.dcinside.com/mgallery/board/lists".to_string(),
            site_origin: "https://gall.dcinside.com".to_string(),
            gallery_id: "stockus".to_string(),
            start_page: 200,
            end_page: 475,
            workers: 8,
            window_start: "2025.11.17 00:00:00".to_string(),
            window_end: "2025.11.17 23:59:59".to_string(),
            page_delay_ms: 1000,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/131.0 Safari/537.36"
                .to_string(),
        }
    }
}

impl CrawlerConfig {
    /// Inclusive date window posts must fall into.
    pub fn window(&self) -> Result<(NaiveDateTime, NaiveDateTime)> {
        let parse = |s: &str| {
            NaiveDateTime::parse_from_str(s, WINDOW_FORMAT).map_err(|e| {
                Error::InvalidConfig(format!("bad crawl window bound `{s}`: {e}"))
            })
        };
        let start = parse(&self.window_start)?;
        let end = parse(&self.window_end)?;
        if start > end {
            return Err(Error::InvalidConfig(format!(
                "crawl window starts ({start}) after it ends ({end})"
            )));
        }
        Ok((start, end))
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn list_url(&self, page: u32) -> String {
        format!("{}?id={}&page={}", self.base_url, self.gallery_id, page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.classifier.model, "gpt-4o-mini");
        assert_eq!(config.classifier.max_attempts, 3);
        assert_eq!(config.classifier.max_tokens, 10);
        assert_eq!(config.classifier.parse_retry_delay(), Duration::from_secs(1));
        assert_eq!(config.classifier.error_retry_delay(), Duration::from_secs(2));
        assert_eq!(config.runner.batch_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_sections_are_partial() {
        let config: Config = toml::from_str(
            r#"
            [classifier]
            model = "gpt-4o"
            max_attempts = 5

            [runner]
            batch_size = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.classifier.model, "gpt-4o");
        assert_eq!(config.classifier.max_attempts, 5);
        assert_eq!(config.classifier.min_text_chars, 5);
        assert_eq!(config.runner.batch_size, 25);
        assert_eq!(config.runner.throttle_ms, 10);
        assert_eq!(config.crawler.gallery_id, "stockus");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("LLM_MODEL", "llama-3.1-8b"),
            ("OPENAI_API_KEY", "sk-test"),
            ("LLM_MAX_TOKENS", "not-a-number"),
            ("LLM_TEMPERATURE", "0.0"),
        ]
        .into_iter()
        .collect();

        let config = Config::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.classifier.model, "llama-3.1-8b");
        assert_eq!(config.classifier.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.classifier.max_tokens, 10);
        assert_eq!(config.classifier.temperature, 0.0);
    }

    #[test]
    fn test_llm_api_key_wins_over_openai_key() {
        let config = Config::default().with_overrides(|k| match k {
            "LLM_API_KEY" => Some("primary".into()),
            "OPENAI_API_KEY" => Some("secondary".into()),
            _ => None,
        });
        assert_eq!(config.classifier.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn test_validate_rejects_zero_batch_and_attempts() {
        let mut config = Config::default();
        config.runner.batch_size = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = Config::default();
        config.classifier.max_attempts = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_bad_crawl_settings() {
        let mut config = Config::default();
        config.crawler.start_page = 10;
        config.crawler.end_page = 9;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.crawler.window_start = "2025.11.18 00:00:00".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.crawler.window_end = "yesterday".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_api_key_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("api_key.txt");
        std::fs::write(&file, "\n  sk-from-file  \n").unwrap();

        let config = ClassifierConfig {
            api_key_file: file.clone(),
            ..ClassifierConfig::default()
        };
        assert_eq!(config.resolve_api_key().unwrap(), "sk-from-file");

        std::fs::write(&file, "   \n").unwrap();
        assert!(matches!(
            config.resolve_api_key(),
            Err(Error::MissingApiKey(_))
        ));
    }

    #[test]
    fn test_list_url() {
        let crawler = CrawlerConfig::default();
        assert_eq!(
            crawler.list_url(201),
            "https://gall.dcinside.com/mgallery/board/lists?id=stockus&page=201"
        );
    }
}
