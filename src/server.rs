use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::ecoscore::{self, EcoScoreClient};
use crate::pipeline::{Mode, ModeProfile, Pipeline, PipelineError, PromptRequest};

pub struct AppState {
    pipeline: Pipeline,
    eco_score: EcoScoreClient,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            pipeline: Pipeline::new(config)?,
            eco_score: EcoScoreClient::new(
                reqwest::Client::new(),
                &config.openfoodfacts_url,
                config.eco_score_timeout,
            ),
        })
    }
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    mode: Mode,
}

#[derive(Debug, Deserialize)]
struct EcoScoreForm {
    #[serde(default)]
    query: String,
    #[serde(default)]
    mode: String,
}

#[derive(Debug, Serialize)]
struct EcoScoreResponse {
    product_name: String,
    eco_score: String,
    recommendations: &'static str,
    #[serde(rename = "AI_suggestions")]
    ai_suggestions: String,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match err {
            PipelineError::EmptyQuery => StatusCode::BAD_REQUEST,
            PipelineError::NoResults => StatusCode::NOT_FOUND,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/query", post(query))
        .route(
            "/get_eco_score",
            post(eco_score).get(|| async { "main" }),
        )
        .with_state(state)
}

pub async fn serve(config: &Config) -> Result<()> {
    let state = Arc::new(AppState::new(config)?);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context(format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .await
        .context("HTTP server failed")
}

async fn query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<crate::pipeline::Answer>, ApiError> {
    let Json(request) = payload?;
    let profile = ModeProfile::for_mode(request.mode);
    let answer = state.pipeline.run(profile, &request.query).await?;
    Ok(Json(answer))
}

async fn eco_score(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EcoScoreForm>,
) -> Result<Json<EcoScoreResponse>, ApiError> {
    let product_name = form.query.trim();
    tracing::info!(product_name, mode = %form.mode, "eco-score request");
    if product_name.is_empty() {
        return Err(ApiError {
            status: StatusCode::BAD_REQUEST,
            message: "no product name or valid image provided".into(),
        });
    }

    let eco_score = state.eco_score.lookup(product_name).await;
    let recommendations = ecoscore::recommendations(&eco_score);

    let context = format!("Simulated context for {}", product_name);
    let generation = state
        .pipeline
        .generate(PromptRequest::new(
            Mode::from_form_value(&form.mode),
            &context,
            product_name,
        ))
        .await;

    Ok(Json(EcoScoreResponse {
        product_name: product_name.to_string(),
        eco_score,
        recommendations,
        ai_suggestions: generation.text,
    }))
}
