//! HTTP surface of the resolver.

use crate::Resolver;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub const VIDEO_URL_DETAILS: &str = "/api/get-video-url-details";

pub fn router(resolver: Arc<Resolver>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api", get(docs))
        .route(VIDEO_URL_DETAILS, get(video_url_details))
        .layer(CorsLayer::permissive())
        .with_state(resolver)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailsQuery {
    #[serde(default)]
    batch_id: String,
    #[serde(default)]
    subject_id: String,
    #[serde(default)]
    child_id: String,
}

async fn video_url_details(
    State(resolver): State<Arc<Resolver>>,
    Query(query): Query<DetailsQuery>,
) -> Response {
    match resolver
        .resolve(&query.batch_id, &query.subject_id, &query.child_id)
        .await
    {
        Ok(resolution) => Json(resolution).into_response(),
        Err(e) => {
            let status = StatusCode::from_u16(e.status()).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(e.to_body())).into_response()
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "vidkey is running",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
}

async fn root() -> Json<Value> {
    Json(json!({
        "status": true,
        "message": format!("vidkey {}", env!("CARGO_PKG_VERSION")),
        "time": Utc::now().timestamp(),
    }))
}

async fn docs() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "vidkey api",
        "endpoints": {
            "GET /api/get-video-url-details": "Resolve a video into its stream url and content key",
            "GET /health": "Health check endpoint",
        },
        "parameters": {
            "batchId": "Required - Batch ID",
            "subjectId": "Required - Subject ID",
            "childId": "Required - Child ID",
        },
    }))
}
