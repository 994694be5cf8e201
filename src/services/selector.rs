use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::CandidatePost;
use crate::services::posts::PostStore;
use crate::services::scoring::combine_scores;
use crate::services::users::UserStore;
use crate::services::weights::InterestWeightStore;

/// Fixed relevance carried by popular-fallback results
const POPULAR_RELEVANCE: f64 = 0.5;

/// Oversampling factor for the personalized candidate pool
const POOL_OVERSAMPLE: usize = 2;

/// Chooses and scores posts from a user's interest profile
///
/// Three modes: `initial` right after onboarding (uniform weights), `personalized`
/// once behavior has accumulated, and the interest-agnostic `popular` fallback.
pub struct InterestBasedSelector {
    posts: Arc<dyn PostStore>,
    weights: Arc<dyn InterestWeightStore>,
    users: Arc<dyn UserStore>,
}

impl InterestBasedSelector {
    pub fn new(
        posts: Arc<dyn PostStore>,
        weights: Arc<dyn InterestWeightStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            posts,
            weights,
            users,
        }
    }

    /// Recommendations for a user with no behavior history yet
    ///
    /// Primary-interest matches come first (most recent first, relevance 1.0).
    /// When those fall short of `limit`, recent posts whose secondary interests
    /// overlap the user's set are appended, scored by overlap fraction. Users
    /// without any interests fall through to the popular feed.
    pub async fn initial(&self, user_id: i64, limit: usize) -> AppResult<Vec<CandidatePost>> {
        let interests = self.users.interests_for_user(user_id).await?;
        if interests.is_empty() {
            return self.popular(limit).await;
        }

        let interest_ids: Vec<i64> = interests.iter().map(|i| i.id).collect();

        let primary = self
            .posts
            .by_primary_interest(&interest_ids, limit as i64)
            .await?;
        let mut selected: Vec<CandidatePost> = primary
            .iter()
            .map(|post| CandidatePost::from_post(post, 1.0))
            .collect();

        if selected.len() < limit {
            let selected_ids: HashSet<i64> = selected.iter().map(|c| c.id).collect();
            let interest_set: HashSet<i64> = interest_ids.iter().copied().collect();
            let remaining = limit - selected.len();

            let pool = self.posts.recent(remaining.saturating_mul(2) as i64).await?;
            for post in &pool {
                if selected.len() >= limit {
                    break;
                }
                if selected_ids.contains(&post.id) {
                    continue;
                }

                let overlap = post
                    .secondary_interest_ids
                    .iter()
                    .filter(|id| interest_set.contains(id))
                    .count();
                if overlap > 0 {
                    let relevance = overlap as f64 / interest_ids.len() as f64;
                    selected.push(CandidatePost::from_post(post, relevance));
                }
            }
        }

        tracing::debug!(user_id, count = selected.len(), "Initial selection built");
        Ok(selected)
    }

    /// Recommendations weighted by learned interest weights and behavior scores
    ///
    /// A recency-ordered pool of primary-interest matches (2x oversampled) is
    /// re-scored by each post's combined interest score and sorted descending.
    pub async fn personalized(&self, user_id: i64, limit: usize) -> AppResult<Vec<CandidatePost>> {
        let weights = self.weights.weights_for_user(user_id).await?;
        let behavior = self.weights.behavior_scores_for_user(user_id).await?;
        let combined = combine_scores(&weights, &behavior);

        let interest_ids: Vec<i64> = weights.iter().map(|w| w.interest.id).collect();
        let pool = self
            .posts
            .by_primary_interest(&interest_ids, limit.saturating_mul(POOL_OVERSAMPLE) as i64)
            .await?;

        let mut candidates: Vec<CandidatePost> = pool
            .iter()
            .map(|post| {
                let relevance = post
                    .primary_interest
                    .as_ref()
                    .and_then(|interest| combined.get(&interest.id))
                    .copied()
                    .unwrap_or(0.0);
                CandidatePost::from_post(post, relevance)
            })
            .collect();

        // Stable sort: equally scored posts keep recency order
        candidates.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(Ordering::Equal)
        });
        candidates.truncate(limit);

        tracing::debug!(user_id, count = candidates.len(), "Personalized selection built");
        Ok(candidates)
    }

    /// Interest-agnostic fallback: most recent posts at a fixed relevance
    pub async fn popular(&self, limit: usize) -> AppResult<Vec<CandidatePost>> {
        let posts = self.posts.recent(limit as i64).await?;
        Ok(posts
            .iter()
            .map(|post| CandidatePost::from_post(post, POPULAR_RELEVANCE))
            .collect())
    }
}
