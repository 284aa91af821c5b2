use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::prompt::PromptTemplates;

#[derive(Debug, Clone)]
pub struct Config {
    pub searxng_endpoint: String,
    pub search_timeout: Duration,
    pub ollama_url: String,
    pub ollama_model: String,
    pub generation_timeout: Duration,
    pub top_k_documents: usize,
    pub top_k_snippets: Option<usize>,
    pub num_nodes_rerank: usize,
    pub openfoodfacts_url: String,
    pub eco_score_timeout: Duration,
    pub bind_addr: String,
    pub run_log_dir: Option<PathBuf>,
    pub templates: PromptTemplates,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            searxng_endpoint: "http://127.0.0.1:8080/".into(),
            search_timeout: Duration::from_secs(5),
            ollama_url: "http://127.0.0.1:11434".into(),
            ollama_model: "llama3.2".into(),
            generation_timeout: Duration::from_secs(30),
            top_k_documents: 3,
            top_k_snippets: None,
            num_nodes_rerank: 100,
            openfoodfacts_url: "https://world.openfoodfacts.org".into(),
            eco_score_timeout: Duration::from_secs(10),
            bind_addr: "127.0.0.1:5000".into(),
            run_log_dir: None,
            templates: PromptTemplates::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let templates = PromptTemplates {
            shopping: match env("SHOPPING_TEMPLATE_PATH") {
                Some(path) => std::fs::read_to_string(&path)
                    .context(format!("Failed to read shopping template: {}", path))?,
                None => defaults.templates.shopping,
            },
            recycling: match env("RECYCLING_TEMPLATE_PATH") {
                Some(path) => std::fs::read_to_string(&path)
                    .context(format!("Failed to read recycling template: {}", path))?,
                None => defaults.templates.recycling,
            },
        };

        let run_log_dir = match std::env::var("RUN_LOG_DIR") {
            Ok(dir) if dir.trim().is_empty() => None,
            Ok(dir) => Some(PathBuf::from(dir.trim())),
            Err(_) => Some(PathBuf::from("logs")),
        };

        Ok(Self {
            searxng_endpoint: env("SEARXNG_ENDPOINT").unwrap_or(defaults.searxng_endpoint),
            search_timeout: Duration::from_secs(
                parse_or("SEARCH_TIMEOUT_SECS", 5).context("SEARCH_TIMEOUT_SECS must be a number")?,
            ),
            ollama_url: env("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            ollama_model: env("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            generation_timeout: Duration::from_secs(
                parse_or("GENERATION_TIMEOUT_SECS", 30)
                    .context("GENERATION_TIMEOUT_SECS must be a number")?,
            ),
            top_k_documents: parse_or("TOP_K_DOCUMENTS", defaults.top_k_documents)
                .context("TOP_K_DOCUMENTS must be a number")?,
            top_k_snippets: match env("TOP_K_SNIPPETS") {
                Some(v) => Some(v.parse().context("TOP_K_SNIPPETS must be a number")?),
                None => None,
            },
            num_nodes_rerank: parse_or("NUM_NODES_RERANK", defaults.num_nodes_rerank)
                .context("NUM_NODES_RERANK must be a number")?,
            openfoodfacts_url: env("OPENFOODFACTS_URL").unwrap_or(defaults.openfoodfacts_url),
            eco_score_timeout: Duration::from_secs(
                parse_or("ECO_SCORE_TIMEOUT_SECS", 10)
                    .context("ECO_SCORE_TIMEOUT_SECS must be a number")?,
            ),
            bind_addr: env("BIND_ADDR").unwrap_or(defaults.bind_addr),
            run_log_dir,
            templates,
        })
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T, T::Err>
where
    T: std::str::FromStr,
{
    match env(key) {
        Some(v) => v.parse(),
        None => Ok(default),
    }
}
