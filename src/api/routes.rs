use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;
use crate::middleware::{make_span_with_request_id, request_id_middleware};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Recommendations
        .route("/api/recommend/home", get(handlers::home_recommendations))
        .route("/api/recommend/feed", get(handlers::feed_recommendations))
        .route("/api/recommend/initial", get(handlers::initial_recommendations))
        .route("/api/recommend/popular", get(handlers::popular_recommendations))
        // Users & onboarding
        .route("/api/user/register", post(handlers::register))
        .route("/api/user/onboarding/complete", post(handlers::onboarding_complete))
        .route("/api/user/event", post(handlers::record_event))
        .route("/api/interests", get(handlers::get_interests))
        // Posts
        .route("/api/post/:id", get(handlers::get_post))
        .route("/api/post", post(handlers::create_post))
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
