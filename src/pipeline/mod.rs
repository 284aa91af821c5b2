pub mod context;
pub mod mode;
pub mod prompt;

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::instrumentation::{RunLog, RunLogger};
use crate::llm::{GenerationClient, GenerationResult};
use crate::search::SearchClient;

pub use context::{ContextAssembler, SnippetEcho};
pub use mode::{Mode, ModeProfile};
pub use prompt::{PromptBuilder, PromptRequest};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Empty query")]
    EmptyQuery,
    #[error("No results found")]
    NoResults,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub context: String,
    pub response: String,
}

pub struct Pipeline {
    search: SearchClient,
    assembler: ContextAssembler,
    prompts: PromptBuilder,
    generator: GenerationClient,
    logger: Option<RunLogger>,
}

impl Pipeline {
    pub fn new(config: &Config) -> Result<Self> {
        let search = SearchClient::new(
            reqwest::Client::new(),
            &config.searxng_endpoint,
            config.search_timeout,
        );
        let assembler = ContextAssembler::new(
            Arc::new(SnippetEcho),
            config.top_k_documents,
            config.top_k_snippets,
            config.num_nodes_rerank,
        );
        let generator = GenerationClient::new(
            &config.ollama_url,
            &config.ollama_model,
            config.generation_timeout,
        )?;
        let logger = match &config.run_log_dir {
            Some(dir) => {
                let logger = RunLogger::new(dir)?;
                tracing::info!("Writing run logs to {}", logger.path().display());
                Some(logger)
            }
            None => None,
        };

        Ok(Self {
            search,
            assembler,
            prompts: PromptBuilder::new(config.templates.clone()),
            generator,
            logger,
        })
    }

    /// Builds the mode's prompt around an already assembled context.
    pub async fn generate(&self, request: PromptRequest<'_>) -> GenerationResult {
        let prompt = self.prompts.build(&request);
        self.generator.generate(&prompt).await
    }

    pub async fn run(&self, profile: ModeProfile, query: &str) -> Result<Answer, PipelineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::EmptyQuery);
        }

        let run_start = Instant::now();

        let search_start = Instant::now();
        let search_query = profile.rule.apply(query);
        let results = self.search.search(&search_query, profile.top_k).await;
        let search_latency = search_start.elapsed().as_millis() as u64;
        if results.is_empty() {
            tracing::info!(mode = %profile.mode, %search_query, "No results found");
            return Err(PipelineError::NoResults);
        }

        let items = self.assembler.from_results(query, &results).await;
        let context = context::render(&items);

        let generation_start = Instant::now();
        let generation = self
            .generate(PromptRequest::new(profile.mode, &context, query))
            .await;
        let generation_latency = generation_start.elapsed().as_millis() as u64;

        let run_log = RunLog {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            mode: profile.mode,
            query: query.to_string(),
            search_query,
            num_results: results.len() as u32,
            num_context_items: items.len() as u32,
            search_latency_ms: search_latency,
            generation_latency_ms: generation_latency,
            total_latency_ms: run_start.elapsed().as_millis() as u64,
            fragments: generation.fragments as u32,
            fell_back: generation.fell_back,
            response: generation.text.clone(),
        };
        tracing::info!("{}", run_log.summary());

        if let Some(logger) = &self.logger {
            if let Err(e) = logger.write(&run_log) {
                tracing::warn!("Failed to write run log: {:#}", e);
            }
        }

        Ok(Answer {
            context,
            response: generation.text,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::search::QueryRule;
    use axum::{
        body::Body,
        extract::{Query, State},
        routing::{get, post},
        Json, Router,
    };
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Stand-ins for SearXNG and Ollama that count their hits.
    #[derive(Default)]
    pub(crate) struct Backends {
        pub search_hits: AtomicUsize,
        pub generate_hits: AtomicUsize,
        pub last_search: Mutex<Option<String>>,
        pub last_prompt: Mutex<Option<String>>,
        pub num_results: AtomicUsize,
    }

    pub(crate) async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn search(
        State(backends): State<Arc<Backends>>,
        Query(q): Query<HashMap<String, String>>,
    ) -> Json<serde_json::Value> {
        backends.search_hits.fetch_add(1, Ordering::SeqCst);
        *backends.last_search.lock().unwrap() = q.get("q").cloned();
        let n = backends.num_results.load(Ordering::SeqCst);
        let results: Vec<_> = (0..n)
            .map(|i| {
                serde_json::json!({
                    "url": format!("https://example.com/{i}"),
                    "title": format!("Brand {i}"),
                    "content": format!("Snippet {i} ..."),
                })
            })
            .collect();
        Json(serde_json::json!({ "results": results }))
    }

    async fn generate(
        State(backends): State<Arc<Backends>>,
        Json(body): Json<serde_json::Value>,
    ) -> Body {
        backends.generate_hits.fetch_add(1, Ordering::SeqCst);
        *backends.last_prompt.lock().unwrap() = body["prompt"].as_str().map(String::from);
        Body::from("{\"response\":\"Try \"}\n{\"response\":\"baked chips.\"}\n")
    }

    /// Starts both stubs and returns a config pointing at them.
    pub(crate) async fn stub_backends(num_results: usize) -> (Arc<Backends>, Config) {
        let backends = Arc::new(Backends::default());
        backends.num_results.store(num_results, Ordering::SeqCst);

        let app = Router::new()
            .route("/search", get(search))
            .route("/api/generate", post(generate))
            .with_state(backends.clone());
        let addr = serve(app).await;

        let config = Config {
            searxng_endpoint: format!("http://{addr}/"),
            ollama_url: format!("http://{addr}"),
            ..Config::default()
        };
        (backends, config)
    }

    #[tokio::test]
    async fn empty_query_contacts_no_backend() {
        let (backends, config) = stub_backends(5).await;
        let pipeline = Pipeline::new(&config).unwrap();

        let err = pipeline
            .run(ModeProfile::for_mode(Mode::Shopping), "   ")
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::EmptyQuery);
        assert_eq!(backends.search_hits.load(Ordering::SeqCst), 0);
        assert_eq!(backends.generate_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_results_skips_generation() {
        let (backends, config) = stub_backends(0).await;
        let pipeline = Pipeline::new(&config).unwrap();

        let err = pipeline
            .run(ModeProfile::for_mode(Mode::Recycling), "glass jar")
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::NoResults);
        assert_eq!(backends.search_hits.load(Ordering::SeqCst), 1);
        assert_eq!(backends.generate_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn shopping_run_end_to_end() {
        let (backends, config) = stub_backends(7).await;
        let pipeline = Pipeline::new(&config).unwrap();

        let answer = pipeline
            .run(ModeProfile::for_mode(Mode::Shopping), " Potato chips (Lays) ")
            .await
            .unwrap();

        assert_eq!(
            backends.last_search.lock().unwrap().as_deref(),
            Some("Healthy Lays brands in India")
        );
        assert_eq!(
            answer.context,
            "Brand 0 - Snippet 0. Snippet 0.\nBrand 1 - Snippet 1. Snippet 1.\nBrand 2 - Snippet 2. Snippet 2."
        );
        assert_eq!(answer.response, "Try baked chips.");

        let prompt = backends.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.starts_with("You are an eco-shopping assistant"));
        assert!(prompt.contains(&format!("{}\n\nQuestion: Potato chips (Lays)\n", answer.context)));
    }

    #[tokio::test]
    async fn recycling_run_uses_recycling_rule_and_template() {
        let (backends, config) = stub_backends(2).await;
        let pipeline = Pipeline::new(&config).unwrap();

        pipeline
            .run(ModeProfile::for_mode(Mode::Recycling), "tin can")
            .await
            .unwrap();

        assert_eq!(
            backends.last_search.lock().unwrap().as_deref(),
            Some("!go !ddg !qw How to recycletin can?")
        );
        let prompt = backends.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.starts_with("You are an eco-recycling assistant"));
    }

    #[tokio::test]
    async fn rule_override_changes_search_query() {
        let (backends, config) = stub_backends(2).await;
        let pipeline = Pipeline::new(&config).unwrap();
        let profile = ModeProfile::for_mode(Mode::Shopping).with_rule(QueryRule::HyphenSuffix);

        pipeline.run(profile, "Snacks - Cookies").await.unwrap();

        assert_eq!(
            backends.last_search.lock().unwrap().as_deref(),
            Some("HealthyCookiesbrands in India")
        );
    }

    #[tokio::test]
    async fn writes_run_log_when_configured() {
        let (_backends, mut config) = stub_backends(3).await;
        let tmp = tempfile::tempdir().unwrap();
        config.run_log_dir = Some(tmp.path().to_path_buf());
        let pipeline = Pipeline::new(&config).unwrap();

        pipeline
            .run(ModeProfile::for_mode(Mode::Shopping), "cola")
            .await
            .unwrap();

        let raw = std::fs::read_to_string(tmp.path().join("runs.jsonl")).unwrap();
        let log: RunLog = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
        assert_eq!(log.query, "cola");
        assert_eq!(log.search_query, "cola");
        assert_eq!(log.num_results, 3);
        assert_eq!(log.fragments, 2);
        assert!(!log.fell_back);
    }
}
