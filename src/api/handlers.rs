use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{CandidatePost, EventType, Interest, Post, UserEvent};
use crate::services::recommender::{FeedRequest, RecommendedFeed};
use crate::services::users::{self, Registration};

use super::AppState;

const DEFAULT_LIMIT: usize = 20;

/// Upper bound on requested feed sizes; oversampling stays well within range
const MAX_LIMIT: usize = 100;

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn clamped(limit: usize) -> usize {
    limit.min(MAX_LIMIT)
}

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    pub user_id: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct InitialQuery {
    pub user_id: i64,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct PopularQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub interests: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct OnboardingCompleteRequest {
    pub user_id: i64,
    pub selected_interests: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct OnboardingCompleteResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub user_id: i64,
    pub post_id: i64,
    /// Raw client event kind; logged verbatim, normalized for weight updates
    pub event_type: String,
    pub engagement_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub primary_interest_id: Option<i64>,
    #[serde(default)]
    pub secondary_interest_ids: Vec<i64>,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Generic recall + rerank feed (not gated by onboarding state)
pub async fn home_recommendations(
    State(state): State<AppState>,
    Query(query): Query<HomeQuery>,
) -> AppResult<Json<Vec<CandidatePost>>> {
    // Anonymous callers get a default profile, matching the original behavior
    let user_id = query.user_id.unwrap_or(1);
    let posts = state
        .recommender
        .home_feed(user_id, clamped(query.limit))
        .await?;
    Ok(Json(posts))
}

/// Interest-flow feed; strategy chosen from the user's onboarding state
pub async fn feed_recommendations(
    State(state): State<AppState>,
    Query(query): Query<HomeQuery>,
) -> AppResult<Json<RecommendedFeed>> {
    let feed = state
        .recommender
        .recommend(query.user_id, FeedRequest::Home, clamped(query.limit))
        .await?;
    Ok(Json(feed))
}

/// Explicit post-onboarding recommendations
pub async fn initial_recommendations(
    State(state): State<AppState>,
    Query(query): Query<InitialQuery>,
) -> AppResult<Json<RecommendedFeed>> {
    let feed = state
        .recommender
        .recommend(Some(query.user_id), FeedRequest::Initial, clamped(query.limit))
        .await?;
    Ok(Json(feed))
}

/// Interest-agnostic popular feed
pub async fn popular_recommendations(
    State(state): State<AppState>,
    Query(query): Query<PopularQuery>,
) -> AppResult<Json<RecommendedFeed>> {
    let feed = state.recommender.popular(clamped(query.limit)).await?;
    Ok(Json(feed))
}

/// Register a new user with an initial interest selection
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<crate::models::User>)> {
    let user = users::register_user(
        state.users.as_ref(),
        state.weights.as_ref(),
        Registration {
            username: request.username,
            email: request.email,
            interests: request.interests,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Replace a user's interest selection
pub async fn onboarding_complete(
    State(state): State<AppState>,
    Json(request): Json<OnboardingCompleteRequest>,
) -> AppResult<Json<OnboardingCompleteResponse>> {
    users::complete_onboarding(
        state.users.as_ref(),
        state.weights.as_ref(),
        request.user_id,
        request.selected_interests,
    )
    .await?;

    Ok(Json(OnboardingCompleteResponse {
        message: "Onboarding completed successfully".to_string(),
    }))
}

/// Record a user event and fold it into the interest weights
///
/// The raw event string is appended to the log verbatim; the normalized kind
/// (unrecognized strings map to `Unknown`) is applied to the post's primary
/// interest and each parsed secondary interest. Weight persistence failures
/// surface as errors; silent loss here would corrupt the weight model.
pub async fn record_event(
    State(state): State<AppState>,
    Json(request): Json<EventRequest>,
) -> AppResult<Json<UserEvent>> {
    state
        .users
        .by_id(request.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let post = state
        .posts
        .by_id(request.post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    let event_type = EventType::parse(&request.event_type);

    let event = state
        .users
        .record_event(
            request.user_id,
            request.post_id,
            &request.event_type,
            request.engagement_score,
        )
        .await?;

    let mut seen = std::collections::HashSet::new();
    let mut interest_ids = Vec::new();
    if let Some(primary) = &post.primary_interest {
        if seen.insert(primary.id) {
            interest_ids.push(primary.id);
        }
    }
    for &id in &post.secondary_interest_ids {
        if seen.insert(id) {
            interest_ids.push(id);
        }
    }

    for interest_id in interest_ids {
        state
            .weights
            .apply_event(request.user_id, interest_id, event_type)
            .await?;
    }

    Ok(Json(event))
}

/// List the interest catalog for onboarding
pub async fn get_interests(State(state): State<AppState>) -> AppResult<Json<Vec<Interest>>> {
    Ok(Json(state.users.all_interests().await?))
}

/// Fetch a single post
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Post>> {
    let post = state
        .posts
        .by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;
    Ok(Json(post))
}

/// Create a new post
pub async fn create_post(
    State(state): State<AppState>,
    Json(request): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<Post>)> {
    let post = state
        .posts
        .create(crate::services::posts::NewPost {
            title: request.title,
            content: request.content,
            author_id: request.author_id,
            primary_interest_id: request.primary_interest_id,
            secondary_interest_ids: request.secondary_interest_ids,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}
