use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header::HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::collector::{CollectError, IntelligenceCollector};

pub const CACHE_HEADER: &str = "x-intel-cache";

#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<IntelligenceCollector>,
    /// Parent of every request token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(collector: Arc<IntelligenceCollector>) -> Self {
        Self {
            collector,
            shutdown: CancellationToken::new(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/intel", get(intel))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct IntelQuery {
    #[serde(default)]
    industry: String,
    /// Comma-separated names.
    #[serde(default)]
    competitors: Option<String>,
}

fn split_competitors(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

async fn intel(State(state): State<AppState>, Query(q): Query<IntelQuery>) -> Response {
    let competitors = split_competitors(q.competitors.as_deref());
    let cancel = state.shutdown.child_token();
    // Client disconnect drops this future; the guard cancels in-flight fetches.
    let _guard = cancel.clone().drop_guard();

    match state
        .collector
        .collect_with_status(&cancel, &q.industry, &competitors)
        .await
    {
        Ok((bundle, status)) => {
            let mut resp = Json(bundle.as_ref()).into_response();
            resp.headers_mut().insert(
                HeaderName::from_static(CACHE_HEADER),
                HeaderValue::from_static(status.as_str()),
            );
            resp
        }
        Err(e) => {
            let code = match e {
                CollectError::EmptyIndustry => StatusCode::BAD_REQUEST,
                CollectError::NoAdapters | CollectError::DuplicateAdapter(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (code, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
        }
    }
}
