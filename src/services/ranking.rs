use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};

/// Ranking model surface
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RankingModel: Send + Sync {
    /// Whether the model endpoint is reachable
    async fn available(&self) -> bool;

    /// Predicted relevance of a post for a user
    async fn score(&self, user_id: i64, post_id: i64) -> AppResult<f32>;
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    score: f32,
}

/// HTTP client for a served Wide & Deep ranking model
pub struct HttpRankingModel {
    http_client: HttpClient,
    base_url: String,
}

impl HttpRankingModel {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl RankingModel for HttpRankingModel {
    async fn available(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http_client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Ranking model health check failed");
                false
            }
        }
    }

    async fn score(&self, user_id: i64, post_id: i64) -> AppResult<f32> {
        let url = format!("{}/score", self.base_url);
        let body = json!({ "user_id": user_id, "post_id": post_id });

        let response = self.http_client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "Ranking model returned status {}",
                response.status()
            )));
        }

        let scored: ScoreResponse = response.json().await?;
        Ok(scored.score)
    }
}

/// Reorders a candidate set by predicted relevance
///
/// Degrades in two distinct ways, neither of which fails the request: an
/// unavailable model yields a random permutation of the same id set, and any
/// per-item scoring failure yields the original input order unchanged.
#[derive(Clone)]
pub struct RankService {
    model: Arc<dyn RankingModel>,
    shuffle_seed: Option<u64>,
}

impl RankService {
    pub fn new(model: Arc<dyn RankingModel>, shuffle_seed: Option<u64>) -> Self {
        Self {
            model,
            shuffle_seed,
        }
    }

    pub async fn rerank(&self, user_id: i64, post_ids: Vec<i64>) -> Vec<i64> {
        if post_ids.len() <= 1 {
            return post_ids;
        }

        if !self.model.available().await {
            tracing::warn!(
                user_id,
                count = post_ids.len(),
                "Ranking model unavailable, shuffling candidates"
            );
            return self.shuffled(post_ids);
        }

        let mut scored: Vec<(i64, f32)> = Vec::with_capacity(post_ids.len());
        for &post_id in &post_ids {
            match self.model.score(user_id, post_id).await {
                Ok(score) => scored.push((post_id, score)),
                Err(e) => {
                    tracing::warn!(
                        user_id,
                        post_id,
                        error = %e,
                        "Per-item scoring failed, keeping original order"
                    );
                    return post_ids;
                }
            }
        }

        // Stable sort: ties keep input order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.into_iter().map(|(post_id, _)| post_id).collect()
    }

    fn shuffled(&self, mut post_ids: Vec<i64>) -> Vec<i64> {
        let mut rng = match self.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        post_ids.shuffle(&mut rng);
        post_ids
    }
}
