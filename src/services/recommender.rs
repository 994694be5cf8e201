use std::sync::Arc;

use serde::Serialize;

use crate::error::AppResult;
use crate::models::{CandidatePost, RecommendationType};
use crate::services::posts::PostStore;
use crate::services::ranking::RankService;
use crate::services::recall::RecallService;
use crate::services::selector::InterestBasedSelector;
use crate::services::users::UserStore;

/// Recall fetches twice the requested feed size before reranking
const RECALL_OVERSAMPLE: usize = 2;

/// Which feed the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedRequest {
    /// Regular home feed; strategy decided by user state
    Home,
    /// Explicit post-onboarding request
    Initial,
}

/// One recommendation response: the strategy used and the ordered candidates
#[derive(Debug, Serialize)]
pub struct RecommendedFeed {
    pub recommendation_type: RecommendationType,
    pub posts: Vec<CandidatePost>,
}

/// Composes the recommendation pipeline per request
pub struct Recommender {
    selector: InterestBasedSelector,
    recall: RecallService,
    rank: RankService,
    users: Arc<dyn UserStore>,
    posts: Arc<dyn PostStore>,
}

impl Recommender {
    pub fn new(
        selector: InterestBasedSelector,
        recall: RecallService,
        rank: RankService,
        users: Arc<dyn UserStore>,
        posts: Arc<dyn PostStore>,
    ) -> Self {
        Self {
            selector,
            recall,
            rank,
            users,
            posts,
        }
    }

    /// Interest-flow entry point
    ///
    /// Strategy order: unknown or missing user -> popular; user who has not
    /// finished onboarding -> popular; explicit initial request -> initial mode;
    /// otherwise personalized.
    pub async fn recommend(
        &self,
        user_id: Option<i64>,
        request: FeedRequest,
        limit: usize,
    ) -> AppResult<RecommendedFeed> {
        let user = match user_id {
            Some(id) => self.users.by_id(id).await?,
            None => None,
        };

        let feed = match user {
            None => self.popular(limit).await?,
            Some(user) if !user.has_completed_onboarding => {
                tracing::debug!(user_id = user.id, "User not onboarded, serving popular feed");
                self.popular(limit).await?
            }
            Some(user) => match request {
                FeedRequest::Initial => RecommendedFeed {
                    recommendation_type: RecommendationType::Initial,
                    posts: self.selector.initial(user.id, limit).await?,
                },
                FeedRequest::Home => RecommendedFeed {
                    recommendation_type: RecommendationType::Personalized,
                    posts: self.selector.personalized(user.id, limit).await?,
                },
            },
        };

        tracing::info!(
            recommendation_type = feed.recommendation_type.as_str(),
            count = feed.posts.len(),
            "Recommendation request served"
        );

        Ok(feed)
    }

    /// Interest-agnostic popular feed
    pub async fn popular(&self, limit: usize) -> AppResult<RecommendedFeed> {
        Ok(RecommendedFeed {
            recommendation_type: RecommendationType::Popular,
            posts: self.selector.popular(limit).await?,
        })
    }

    /// Generic embedding-recall + model-rerank flow (not gated by onboarding)
    ///
    /// Recalls 2x the requested size, reranks, truncates, then hydrates the ids
    /// into candidates. Ids that no longer resolve to a live post are dropped.
    pub async fn home_feed(&self, user_id: i64, limit: usize) -> AppResult<Vec<CandidatePost>> {
        let candidates = self
            .recall
            .get_candidates(user_id, limit.saturating_mul(RECALL_OVERSAMPLE))
            .await;
        let mut ranked = self.rank.rerank(user_id, candidates).await;
        ranked.truncate(limit);

        let posts = self.posts.by_ids(&ranked).await?;
        Ok(posts
            .iter()
            .map(|post| CandidatePost::from_post(post, 1.0))
            .collect())
    }
}
