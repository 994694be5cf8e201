use std::collections::HashMap;

use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::{BehaviorScore, EventType, InterestRef, InterestWeight};

pub const WEIGHT_MIN: f64 = 0.1;
pub const WEIGHT_MAX: f64 = 5.0;
pub const INITIAL_WEIGHT: f64 = 1.0;

/// Fraction of the weight delta folded into the behavior score per event
const BEHAVIOR_DELTA_FACTOR: f64 = 0.1;

/// Next weight after applying an event delta, clamped to [0.1, 5.0]
pub fn next_weight(current: f64, delta: f64) -> f64 {
    (current + delta).clamp(WEIGHT_MIN, WEIGHT_MAX)
}

/// Next behavior score after an event
///
/// Capped at 1.0 only. There is intentionally no lower bound: repeated downvotes
/// drive the score negative, matching the deployed behavior.
pub fn next_behavior_score(current: f64, delta: f64) -> f64 {
    (current + delta * BEHAVIOR_DELTA_FACTOR).min(1.0)
}

/// Owns per-(user, interest) weights and behavior scores
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait InterestWeightStore: Send + Sync {
    /// All weights for a user, ordered by weight descending
    async fn weights_for_user(&self, user_id: i64) -> AppResult<Vec<InterestWeight>>;

    /// Behavior scores for a user, keyed by interest id
    async fn behavior_scores_for_user(
        &self,
        user_id: i64,
    ) -> AppResult<HashMap<i64, BehaviorScore>>;

    /// Applies one event to a (user, interest) pair
    ///
    /// Creates the weight row at 1.0 if missing, then applies the event delta.
    /// The behavior row is updated only if it already exists (rows are created at
    /// onboarding, never lazily here). Both writes commit atomically or not at all.
    async fn apply_event(&self, user_id: i64, interest_id: i64, event: EventType)
        -> AppResult<()>;

    /// Replaces a user's weight/behavior rows with a fresh set
    ///
    /// Deletes every existing row for the user, then creates weight = 1.0 and
    /// behavior = {0.0, 0} rows for each given interest.
    async fn reset_onboarding(&self, user_id: i64, interest_ids: &[i64]) -> AppResult<()>;
}

/// Postgres-backed weight store
///
/// The write path uses a transaction with `FOR UPDATE` row locks so concurrent
/// events for the same pair serialize on the read-modify-write.
pub struct PgInterestWeightStore {
    pool: PgPool,
}

impl PgInterestWeightStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl InterestWeightStore for PgInterestWeightStore {
    async fn weights_for_user(&self, user_id: i64) -> AppResult<Vec<InterestWeight>> {
        let rows: Vec<(i64, String, String, f64, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
            r#"
            SELECT i.id, i.name, i.category, w.weight, w.updated_at
            FROM user_interest_weights w
            JOIN interests i ON i.id = w.interest_id
            WHERE w.user_id = $1
            ORDER BY w.weight DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, category, weight, updated_at)| InterestWeight {
                interest: InterestRef { id, name, category },
                weight,
                updated_at,
            })
            .collect())
    }

    async fn behavior_scores_for_user(
        &self,
        user_id: i64,
    ) -> AppResult<HashMap<i64, BehaviorScore>> {
        let rows: Vec<(i64, f64, i32, Option<chrono::DateTime<chrono::Utc>>)> = sqlx::query_as(
            r#"
            SELECT interest_id, score, interaction_count, last_interaction
            FROM user_behavior_scores
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(interest_id, score, interaction_count, last_interaction)| {
                (
                    interest_id,
                    BehaviorScore {
                        score,
                        interaction_count,
                        last_interaction,
                    },
                )
            })
            .collect())
    }

    async fn apply_event(
        &self,
        user_id: i64,
        interest_id: i64,
        event: EventType,
    ) -> AppResult<()> {
        let delta = event.weight_delta();
        let mut tx = self.pool.begin().await?;

        // Two first events for the same pair can race on row creation; the
        // conflict clause makes the create idempotent so both serialize on the
        // FOR UPDATE lock below instead of one dying on the unique constraint
        sqlx::query(
            r#"
            INSERT INTO user_interest_weights (user_id, interest_id, weight)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, interest_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(interest_id)
        .bind(INITIAL_WEIGHT)
        .execute(&mut *tx)
        .await?;

        let (current_weight,): (f64,) = sqlx::query_as(
            r#"
            SELECT weight FROM user_interest_weights
            WHERE user_id = $1 AND interest_id = $2
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(interest_id)
        .fetch_one(&mut *tx)
        .await?;

        let updated = next_weight(current_weight, delta);
        sqlx::query(
            r#"
            UPDATE user_interest_weights
            SET weight = $3, updated_at = NOW()
            WHERE user_id = $1 AND interest_id = $2
            "#,
        )
        .bind(user_id)
        .bind(interest_id)
        .bind(updated)
        .execute(&mut *tx)
        .await?;

        // Behavior rows are created at onboarding only; absent row means no-op here
        let behavior: Option<(f64,)> = sqlx::query_as(
            r#"
            SELECT score FROM user_behavior_scores
            WHERE user_id = $1 AND interest_id = $2
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(interest_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((score,)) = behavior {
            sqlx::query(
                r#"
                UPDATE user_behavior_scores
                SET score = $3,
                    interaction_count = interaction_count + 1,
                    last_interaction = NOW()
                WHERE user_id = $1 AND interest_id = $2
                "#,
            )
            .bind(user_id)
            .bind(interest_id)
            .bind(next_behavior_score(score, delta))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            user_id,
            interest_id,
            event = event.as_str(),
            weight = updated,
            "Applied event to interest weight"
        );

        Ok(())
    }

    async fn reset_onboarding(&self, user_id: i64, interest_ids: &[i64]) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_interest_weights WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM user_behavior_scores WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for &interest_id in interest_ids {
            sqlx::query(
                r#"
                INSERT INTO user_interest_weights (user_id, interest_id, weight)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(user_id)
            .bind(interest_id)
            .bind(INITIAL_WEIGHT)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO user_behavior_scores (user_id, interest_id, score, interaction_count)
                VALUES ($1, $2, 0.0, 0)
                "#,
            )
            .bind(user_id)
            .bind(interest_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            user_id,
            interest_count = interest_ids.len(),
            "Onboarding interests reset"
        );

        Ok(())
    }
}
