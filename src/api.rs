#![forbid(unsafe_code)]

//! HTTP surface of the gateway.
//!
//! Each handler follows the same path: check the API key, build the yt-dlp
//! argument vector, run it on the blocking pool, then reshape stdout.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::command::CommandBuilder;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::runner::{ToolOutput, run_tool};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Keys copied from `yt-dlp -J` into the `/info` response.
const INFO_FIELDS: [&str; 5] = ["title", "id", "duration", "webpage_url", "extractor"];

/// Shared state injected into every handler. Both members are immutable.
#[derive(Clone)]
pub struct AppState {
    config: Arc<GatewayConfig>,
    commands: Arc<CommandBuilder>,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        let commands = CommandBuilder::from_config(&config);
        Self {
            config: Arc::new(config),
            commands: Arc::new(commands),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaRequest {
    pub url: String,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub ok: bool,
    pub cookies_file_present: bool,
    pub api_key_required: bool,
}

/// Missing keys are serialized as `null`, never skipped.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct InfoResponse {
    pub title: Value,
    pub id: Value,
    pub duration: Value,
    pub webpage_url: Value,
    pub extractor: Value,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ExtractResponse {
    pub direct_urls: Vec<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/info", post(info))
        .route("/extract", post(extract))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        cookies_file_present: state.commands.cookies_file_present(),
        api_key_required: state.config.api_key_required(),
    })
}

async fn info(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<MediaRequest>,
) -> GatewayResult<Json<InfoResponse>> {
    authorize(&state.config, &headers)?;
    info!(url = %request.url, "looking up metadata");

    let argv = state.commands.info_args(&request.url);
    let output = run_blocking(argv).await?;
    Ok(Json(parse_info(&output.stdout)?))
}

async fn extract(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<MediaRequest>,
) -> GatewayResult<Json<ExtractResponse>> {
    authorize(&state.config, &headers)?;
    info!(url = %request.url, format = ?request.format, "resolving direct urls");

    let argv = state
        .commands
        .extract_args(&request.url, request.format.as_deref());
    let output = run_blocking(argv).await?;
    Ok(Json(ExtractResponse {
        direct_urls: parse_direct_urls(&output.stdout),
    }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not Found" })))
}

/// Open access when no key is configured; otherwise the header must match
/// exactly.
fn authorize(config: &GatewayConfig, headers: &HeaderMap) -> GatewayResult<()> {
    let Some(expected) = config.api_key.as_deref() else {
        return Ok(());
    };
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if provided == Some(expected) {
        Ok(())
    } else {
        warn!(
            header_present = provided.is_some(),
            "rejected request with bad api key"
        );
        Err(GatewayError::Unauthorized)
    }
}

async fn run_blocking(argv: Vec<String>) -> GatewayResult<ToolOutput> {
    let output = tokio::task::spawn_blocking(move || run_tool(&argv))
        .await
        .map_err(|err| GatewayError::Internal(err.to_string()))??;
    Ok(output)
}

fn parse_info(stdout: &str) -> GatewayResult<InfoResponse> {
    let data: Value = serde_json::from_str(stdout)
        .map_err(|err| GatewayError::MalformedOutput(err.to_string()))?;
    let Value::Object(mut map) = data else {
        return Err(GatewayError::MalformedOutput(
            "expected a JSON object".to_string(),
        ));
    };
    let [title, id, duration, webpage_url, extractor] =
        INFO_FIELDS.map(|key| map.remove(key).unwrap_or(Value::Null));
    Ok(InfoResponse {
        title,
        id,
        duration,
        webpage_url,
        extractor,
    })
}

/// Line boundaries yt-dlp output may use, matching Python's `splitlines`.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\u{0b}'
            | '\u{0c}'
            | '\u{1c}'
            | '\u{1d}'
            | '\u{1e}'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

fn parse_direct_urls(stdout: &str) -> Vec<String> {
    stdout
        .split(is_line_break)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
