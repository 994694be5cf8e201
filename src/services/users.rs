use std::collections::HashSet;

use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{Interest, User, UserEvent};
use crate::services::weights::InterestWeightStore;

/// User and interest-catalog surface
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn by_id(&self, id: i64) -> AppResult<Option<User>>;

    async fn by_username(&self, username: &str) -> AppResult<Option<User>>;

    async fn by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn create(&self, username: &str, email: &str) -> AppResult<User>;

    async fn set_onboarding_complete(&self, user_id: i64) -> AppResult<()>;

    /// Interests the user currently holds (derived from weight rows)
    async fn interests_for_user(&self, user_id: i64) -> AppResult<Vec<Interest>>;

    /// Full interest catalog for onboarding
    async fn all_interests(&self) -> AppResult<Vec<Interest>>;

    /// Subset of `ids` that exist in the catalog
    async fn existing_interest_ids(&self, ids: &[i64]) -> AppResult<Vec<i64>>;

    /// Appends one row to the event log
    async fn record_event(
        &self,
        user_id: i64,
        post_id: i64,
        event_type: &str,
        engagement_score: Option<f64>,
    ) -> AppResult<UserEvent>;
}

/// Registration request for a new user
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub interests: Vec<i64>,
}

/// Registers a user with an initial interest selection
///
/// Rejected before any mutation on empty selection, duplicate username/email, or
/// unknown interest ids. On success the user holds weight = 1.0 and behavior = 0.0
/// rows per interest and is marked as onboarded.
pub async fn register_user(
    users: &dyn UserStore,
    weights: &dyn InterestWeightStore,
    registration: Registration,
) -> AppResult<User> {
    let interest_ids = validated_selection(users, &registration.interests).await?;

    if users.by_username(&registration.username).await?.is_some() {
        return Err(AppError::InvalidInput(
            "Username already registered".to_string(),
        ));
    }
    if users.by_email(&registration.email).await?.is_some() {
        return Err(AppError::InvalidInput(
            "Email already registered".to_string(),
        ));
    }

    let user = users
        .create(&registration.username, &registration.email)
        .await?;
    weights.reset_onboarding(user.id, &interest_ids).await?;
    users.set_onboarding_complete(user.id).await?;

    tracing::info!(
        user_id = user.id,
        interest_count = interest_ids.len(),
        "User registered"
    );

    Ok(User {
        has_completed_onboarding: true,
        ..user
    })
}

/// Replaces a user's interest selection and marks onboarding complete
pub async fn complete_onboarding(
    users: &dyn UserStore,
    weights: &dyn InterestWeightStore,
    user_id: i64,
    selected_interests: Vec<i64>,
) -> AppResult<()> {
    users
        .by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let interest_ids = validated_selection(users, &selected_interests).await?;

    weights.reset_onboarding(user_id, &interest_ids).await?;
    users.set_onboarding_complete(user_id).await?;

    Ok(())
}

/// Validates an interest selection, deduplicating while preserving order
async fn validated_selection(users: &dyn UserStore, selected: &[i64]) -> AppResult<Vec<i64>> {
    if selected.is_empty() {
        return Err(AppError::InvalidInput(
            "At least one interest must be selected".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let interest_ids: Vec<i64> = selected
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();

    let existing: HashSet<i64> = users
        .existing_interest_ids(&interest_ids)
        .await?
        .into_iter()
        .collect();

    let missing: Vec<i64> = interest_ids
        .iter()
        .copied()
        .filter(|id| !existing.contains(id))
        .collect();

    if !missing.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "Invalid interest ids: {missing:?}"
        )));
    }

    Ok(interest_ids)
}

/// Postgres-backed user store
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserStore for PgUserStore {
    async fn by_id(&self, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, has_completed_onboarding, created_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, has_completed_onboarding, created_at \
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, has_completed_onboarding, created_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create(&self, username: &str, email: &str) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email)
            VALUES ($1, $2)
            RETURNING id, username, email, has_completed_onboarding, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_onboarding_complete(&self, user_id: i64) -> AppResult<()> {
        sqlx::query("UPDATE users SET has_completed_onboarding = TRUE WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn interests_for_user(&self, user_id: i64) -> AppResult<Vec<Interest>> {
        let interests = sqlx::query_as::<_, Interest>(
            r#"
            SELECT i.id, i.name, i.category, i.subcategory, i.description
            FROM interests i
            JOIN user_interest_weights w ON w.interest_id = i.id
            WHERE w.user_id = $1
            ORDER BY i.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(interests)
    }

    async fn all_interests(&self) -> AppResult<Vec<Interest>> {
        let interests = sqlx::query_as::<_, Interest>(
            "SELECT id, name, category, subcategory, description \
             FROM interests ORDER BY category, subcategory, name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(interests)
    }

    async fn existing_interest_ids(&self, ids: &[i64]) -> AppResult<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM interests WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn record_event(
        &self,
        user_id: i64,
        post_id: i64,
        event_type: &str,
        engagement_score: Option<f64>,
    ) -> AppResult<UserEvent> {
        let event = sqlx::query_as::<_, UserEvent>(
            r#"
            INSERT INTO user_events (user_id, post_id, event_type, engagement_score)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, post_id, event_type, engagement_score, timestamp
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .bind(event_type)
        .bind(engagement_score)
        .fetch_one(&self.pool)
        .await?;
        Ok(event)
    }
}
