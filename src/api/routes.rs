use axum::{
    extract::{rejection::JsonRejection, Json, State},
    routing::{get, post},
    Router,
};
use tower::ServiceExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::error::ApiError;
use crate::scrape::{ScrapeRequest, ScrapeResponse};
use crate::service::ScraperService;
use crate::traits::BrowserEngine;

pub fn create_router<E: BrowserEngine + 'static>(service: ScraperService<E>) -> Router {
    Router::new()
        .route("/scrape", post(scrape_handler::<E>))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(service)
}

/// Scrapes a page, optionally returning its source HTML, rendered HTML and
/// the JSON/XML responses it received, tagged with each request's
/// Authorization header.
async fn scrape_handler<E: BrowserEngine + 'static>(
    State(service): State<ScraperService<E>>,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<Json<ScrapeResponse>, ApiError> {
    let Json(request) = payload?;
    info!("Processing scrape request for URL: {}", request.url);

    let response = service.oneshot(request).await?;
    Ok(Json(response))
}

async fn health_handler() -> &'static str {
    "ok"
}
