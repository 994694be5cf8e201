use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::services::embedding::EmbeddingProvider;

/// Upper bound on the deterministic fallback candidate list
const FALLBACK_CANDIDATE_CAP: usize = 100;

/// A single similarity hit from the vector index
#[derive(Debug, Clone, Deserialize)]
pub struct IndexHit {
    pub post_id: i64,
    pub score: f32,
}

/// Vector similarity index surface (inner-product metric)
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Returns up to `top_k` items ranked by similarity to `query`
    async fn search(&self, query: &[f32], top_k: usize) -> AppResult<Vec<IndexHit>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<IndexHit>,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    collection: &'a str,
    vector: &'a [f32],
    top_k: usize,
    metric: &'a str,
}

/// HTTP client for the vector similarity index
pub struct HttpVectorIndex {
    http_client: HttpClient,
    base_url: String,
    collection: String,
}

impl HttpVectorIndex {
    pub fn new(base_url: &str, collection: &str, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn search(&self, query: &[f32], top_k: usize) -> AppResult<Vec<IndexHit>> {
        let url = format!("{}/search", self.base_url);
        let request = SearchRequest {
            collection: &self.collection,
            vector: query,
            top_k,
            metric: "IP",
        };

        let response = self.http_client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "Vector index search failed");
            return Err(AppError::ExternalApi(format!(
                "Index returned status {}",
                status
            )));
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.results)
    }
}

/// Candidate retrieval over item embeddings
///
/// Embeds the user (the provider itself never fails, see `EmbeddingProvider`) and
/// searches the index. An unreachable index degrades to a deterministic candidate
/// list instead of failing the request.
#[derive(Clone)]
pub struct RecallService {
    embeddings: EmbeddingProvider,
    index: Arc<dyn VectorIndex>,
}

impl RecallService {
    pub fn new(embeddings: EmbeddingProvider, index: Arc<dyn VectorIndex>) -> Self {
        Self { embeddings, index }
    }

    /// Returns up to `limit` candidate post ids ranked by similarity
    ///
    /// Ids are deduplicated preserving rank order. Ordering is not guaranteed
    /// stable across calls with slightly different embeddings.
    pub async fn get_candidates(&self, user_id: i64, limit: usize) -> Vec<i64> {
        if limit == 0 {
            return Vec::new();
        }

        let embedding = self.embeddings.user_embedding(user_id).await;

        match self.index.search(&embedding, limit).await {
            Ok(hits) => {
                let mut seen = HashSet::new();
                let candidates: Vec<i64> = hits
                    .into_iter()
                    .map(|hit| hit.post_id)
                    .filter(|id| seen.insert(*id))
                    .take(limit)
                    .collect();

                tracing::debug!(user_id, count = candidates.len(), "Recall completed");
                candidates
            }
            Err(e) => {
                tracing::warn!(
                    user_id,
                    error = %e,
                    "Vector index unreachable, returning fallback candidates"
                );
                fallback_candidates(limit)
            }
        }
    }
}

/// Deterministic degraded-mode candidates: the first `min(limit, 100)` post ids
fn fallback_candidates(limit: usize) -> Vec<i64> {
    (1..=limit.min(FALLBACK_CANDIDATE_CAP) as i64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::embedding::{EmbeddingProvider, MockEmbeddingModel, EMBEDDING_DIM};

    fn offline_embeddings() -> EmbeddingProvider {
        let mut model = MockEmbeddingModel::new();
        model
            .expect_embed_user()
            .returning(|_| Ok(vec![0.1; EMBEDDING_DIM]));
        EmbeddingProvider::new(Arc::new(model), Some(1))
    }

    fn hits(ids: &[i64]) -> Vec<IndexHit> {
        ids.iter()
            .map(|&post_id| IndexHit {
                post_id,
                score: 1.0,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_candidates_deduplicated_and_capped() {
        let mut index = MockVectorIndex::new();
        index
            .expect_search()
            .returning(|_, _| Ok(hits(&[5, 3, 5, 9, 3, 7, 2])));

        let recall = RecallService::new(offline_embeddings(), Arc::new(index));
        let candidates = recall.get_candidates(1, 4).await;

        assert_eq!(candidates, vec![5, 3, 9, 7]);
    }

    #[tokio::test]
    async fn test_never_returns_more_than_limit() {
        let mut index = MockVectorIndex::new();
        index
            .expect_search()
            .returning(|_, _| Ok(hits(&[1, 2, 3, 4, 5, 6, 7, 8])));

        let recall = RecallService::new(offline_embeddings(), Arc::new(index));
        assert_eq!(recall.get_candidates(1, 3).await.len(), 3);
    }

    #[tokio::test]
    async fn test_index_unreachable_returns_deterministic_fallback() {
        let mut index = MockVectorIndex::new();
        index
            .expect_search()
            .returning(|_, _| Err(AppError::ExternalApi("connection refused".to_string())));

        let recall = RecallService::new(offline_embeddings(), Arc::new(index));
        let candidates = recall.get_candidates(1, 20).await;

        assert_eq!(candidates, (1..=20).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_fallback_capped_at_one_hundred() {
        let mut index = MockVectorIndex::new();
        index
            .expect_search()
            .returning(|_, _| Err(AppError::ExternalApi("down".to_string())));

        let recall = RecallService::new(offline_embeddings(), Arc::new(index));
        let candidates = recall.get_candidates(1, 500).await;

        assert_eq!(candidates.len(), 100);
        assert_eq!(candidates[0], 1);
        assert_eq!(candidates[99], 100);
    }

    #[tokio::test]
    async fn test_zero_limit_is_empty_without_searching() {
        let index = MockVectorIndex::new();
        let recall = RecallService::new(offline_embeddings(), Arc::new(index));
        assert!(recall.get_candidates(1, 0).await.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_fallback_still_searches_index() {
        let mut model = MockEmbeddingModel::new();
        model
            .expect_embed_user()
            .returning(|_| Err(AppError::ExternalApi("model down".to_string())));
        let embeddings = EmbeddingProvider::new(Arc::new(model), Some(3));

        let mut index = MockVectorIndex::new();
        index
            .expect_search()
            .withf(|query, _| query.len() == EMBEDDING_DIM)
            .returning(|_, _| Ok(hits(&[11, 12])));

        let recall = RecallService::new(embeddings, Arc::new(index));
        assert_eq!(recall.get_candidates(1, 5).await, vec![11, 12]);
    }
}
