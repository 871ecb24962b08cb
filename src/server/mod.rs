//! HTTP API exposing the suggestion service to the editor UI

pub mod http;

use anyhow::Result;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::learning::SuggestionService;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub service: SuggestionService,
    pub config: Arc<Config>,
}

impl ServerState {
    pub fn new(service: SuggestionService, config: Config) -> Self {
        Self {
            service,
            config: Arc::new(config),
        }
    }
}

/// Build the API router
pub fn router(state: ServerState) -> Router {
    // The editor UI is served from a different origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(http::health_handler))
        .route("/api/suggestions", get(http::suggestions_handler))
        .route("/api/suggestions/record", post(http::record_handler))
        .route("/api/learning", delete(http::clear_handler))
        .route("/api/learning/ingest", post(http::ingest_handler))
        .route("/api/learning/suggest", post(http::suggest_document_handler))
        .route("/api/learning/popular", get(http::popular_handler))
        .route("/api/learning/recent", get(http::recent_handler))
        .route("/api/learning/stats", get(http::stats_handler))
        .route(
            "/api/preferences/{key}",
            get(http::get_preference_handler).put(http::set_preference_handler),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the web server
pub async fn start(host: &str, port: u16, state: ServerState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    let ranking = state.service.ranking_config().clone();
    let app = router(state);

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("     {}", crate::info());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("🚀 Listening on http://{}", addr);
    println!(
        "📈 Recency half-life {} days, floor {}",
        ranking.half_life_days, ranking.recency_floor
    );
    println!();

    info!("Suggestion server listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
