//! HTTP handlers

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::error::SuggestError;
use crate::learning::{
    DocumentSuggestions, FieldRecommendation, LearnedValue, MetadataDocument, Suggestion,
};
use crate::server::ServerState;

/// Query for `GET /api/suggestions`
#[derive(Debug, Deserialize)]
pub struct SuggestionsQuery {
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub field: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub section: String,
    pub field: String,
    pub suggestions: Vec<Suggestion>,
}

/// Body of `POST /api/suggestions/record`
#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    pub section: String,
    pub field: String,
    pub value: String,
}

/// Body of `POST /api/learning/ingest`
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub metadata: MetadataDocument,
}

/// Body of `POST /api/learning/suggest`
#[derive(Debug, Deserialize)]
pub struct SuggestDocumentRequest {
    pub metadata: MetadataDocument,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SuggestDocumentResponse {
    pub suggestions: DocumentSuggestions,
    pub recommendations: Vec<FieldRecommendation>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ValuesResponse {
    pub values: Vec<LearnedValue>,
}

/// Body of `PUT /api/preferences/{key}`
#[derive(Debug, Deserialize)]
pub struct PreferenceRequest {
    pub value: Value,
}

#[derive(Debug, Serialize)]
pub struct PreferenceResponse {
    pub key: String,
    pub value: Value,
}

/// Map engine errors onto HTTP statuses
fn error_response(err: SuggestError) -> Response {
    let status = match &err {
        SuggestError::Validation(_) => StatusCode::BAD_REQUEST,
        SuggestError::Persistence(_) => {
            warn!("Learning storage failure: {}", err);
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn default_limit(state: &ServerState) -> i64 {
    state.config.learning.default_limit as i64
}

/// Health check
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": crate::VERSION,
    }))
}

/// Ranked suggestions for one field
pub async fn suggestions_handler(
    State(state): State<ServerState>,
    Query(query): Query<SuggestionsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or_else(|| default_limit(&state));

    match state.service.get_suggestions(&query.section, &query.field, limit).await {
        Ok(suggestions) => Json(SuggestionsResponse {
            section: query.section,
            field: query.field,
            suggestions,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// Learn the accepted value of one field
pub async fn record_handler(
    State(state): State<ServerState>,
    Json(req): Json<RecordRequest>,
) -> Response {
    match state.service.record_accepted_edit(&req.section, &req.field, &req.value).await {
        Ok(()) => Json(json!({ "learned": true })).into_response(),
        Err(e) => error_response(e),
    }
}

/// Learn every scalar field of a saved document
pub async fn ingest_handler(
    State(state): State<ServerState>,
    Json(req): Json<IngestRequest>,
) -> Response {
    match state.service.record_document(&req.metadata).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(e),
    }
}

/// Suggestions and missing-field recommendations for a whole document
pub async fn suggest_document_handler(
    State(state): State<ServerState>,
    Json(req): Json<SuggestDocumentRequest>,
) -> Response {
    let limit = req.limit.unwrap_or_else(|| default_limit(&state));

    match state.service.suggest_for_document(&req.metadata, limit).await {
        Ok(suggestions) => Json(SuggestDocumentResponse {
            suggestions,
            recommendations: state.service.recommend_fields(&req.metadata),
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn popular_handler(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> Response {
    match state.service.popular_values(query.limit.unwrap_or(20)).await {
        Ok(values) => Json(ValuesResponse { values }).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn recent_handler(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> Response {
    let days = query.days.unwrap_or(7);
    match state.service.recent_values(days, query.limit.unwrap_or(20)).await {
        Ok(values) => Json(ValuesResponse { values }).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn stats_handler(State(state): State<ServerState>) -> Response {
    Json(state.service.stats().await).into_response()
}

/// Forget all learning data
pub async fn clear_handler(State(state): State<ServerState>) -> Response {
    match state.service.clear_learning_data().await {
        Ok(()) => Json(json!({ "cleared": true })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_preference_handler(
    State(state): State<ServerState>,
    Path(key): Path<String>,
) -> Response {
    match state.service.get_user_preference(&key).await {
        Ok(Some(value)) => Json(PreferenceResponse { key, value }).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("preference '{}' is not set", key) })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn set_preference_handler(
    State(state): State<ServerState>,
    Path(key): Path<String>,
    Json(req): Json<PreferenceRequest>,
) -> Response {
    match state.service.save_user_preference(&key, &req.value).await {
        Ok(()) => Json(json!({ "saved": true })).into_response(),
        Err(e) => error_response(e),
    }
}
