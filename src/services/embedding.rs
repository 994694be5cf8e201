use std::sync::Arc;
use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Dimension of user and item feature vectors
pub const EMBEDDING_DIM: usize = 64;

/// Contextual features for embedding a user
#[derive(Debug, Clone, Serialize)]
pub struct UserFeatures {
    pub user_id: i64,
}

/// Contextual features for embedding an item
#[derive(Debug, Clone, Serialize)]
pub struct ItemFeatures {
    pub post_id: i64,
}

/// Two-tower embedding model surface
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed a user into the shared vector space
    async fn embed_user(&self, features: &UserFeatures) -> AppResult<Vec<f32>>;

    /// Embed an item into the shared vector space
    async fn embed_item(&self, features: &ItemFeatures) -> AppResult<Vec<f32>>;
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// HTTP client for a served two-tower model
pub struct TwoTowerClient {
    http_client: HttpClient,
    base_url: String,
}

impl TwoTowerClient {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_embedding<T: Serialize>(&self, path: &str, features: &T) -> AppResult<Vec<f32>> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self.http_client.post(&url).json(features).send().await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "Embedding model returned status {}",
                response.status()
            )));
        }

        let body: EmbeddingResponse = response.json().await?;
        Ok(body.embedding)
    }
}

#[async_trait::async_trait]
impl EmbeddingModel for TwoTowerClient {
    async fn embed_user(&self, features: &UserFeatures) -> AppResult<Vec<f32>> {
        self.fetch_embedding("embed/user", features).await
    }

    async fn embed_item(&self, features: &ItemFeatures) -> AppResult<Vec<f32>> {
        self.fetch_embedding("embed/item", features).await
    }
}

/// Embedding provider consumed by the recall flow
///
/// Never fails: when the model is unreachable or returns a malformed vector, a
/// pseudo-random embedding of the same dimension is substituted and a warning is
/// logged. The seed makes the degraded output reproducible in tests.
#[derive(Clone)]
pub struct EmbeddingProvider {
    model: Arc<dyn EmbeddingModel>,
    fallback_seed: Option<u64>,
}

impl EmbeddingProvider {
    pub fn new(model: Arc<dyn EmbeddingModel>, fallback_seed: Option<u64>) -> Self {
        Self {
            model,
            fallback_seed,
        }
    }

    pub async fn user_embedding(&self, user_id: i64) -> Vec<f32> {
        let features = UserFeatures { user_id };
        match self.model.embed_user(&features).await {
            Ok(embedding) if embedding.len() == EMBEDDING_DIM => embedding,
            Ok(embedding) => {
                tracing::warn!(
                    user_id,
                    dimension = embedding.len(),
                    expected = EMBEDDING_DIM,
                    "Embedding model returned wrong dimension, using fallback embedding"
                );
                self.fallback_embedding()
            }
            Err(e) => {
                tracing::warn!(
                    user_id,
                    error = %e,
                    "Embedding model unavailable, using fallback embedding"
                );
                self.fallback_embedding()
            }
        }
    }

    pub async fn item_embedding(&self, post_id: i64) -> Vec<f32> {
        let features = ItemFeatures { post_id };
        match self.model.embed_item(&features).await {
            Ok(embedding) if embedding.len() == EMBEDDING_DIM => embedding,
            Ok(_) | Err(_) => {
                tracing::warn!(post_id, "Item embedding degraded, using fallback embedding");
                self.fallback_embedding()
            }
        }
    }

    fn fallback_embedding(&self) -> Vec<f32> {
        let mut rng = match self.fallback_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        (0..EMBEDDING_DIM).map(|_| rng.gen::<f32>()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::always;

    #[tokio::test]
    async fn test_user_embedding_passes_through_model_output() {
        let mut model = MockEmbeddingModel::new();
        let expected = vec![0.5_f32; EMBEDDING_DIM];
        let returned = expected.clone();
        model
            .expect_embed_user()
            .with(always())
            .returning(move |_| Ok(returned.clone()));

        let provider = EmbeddingProvider::new(Arc::new(model), Some(7));
        assert_eq!(provider.user_embedding(42).await, expected);
    }

    #[tokio::test]
    async fn test_model_failure_yields_fallback_of_right_dimension() {
        let mut model = MockEmbeddingModel::new();
        model
            .expect_embed_user()
            .returning(|_| Err(crate::error::AppError::ExternalApi("down".to_string())));

        let provider = EmbeddingProvider::new(Arc::new(model), Some(7));
        let embedding = provider.user_embedding(42).await;
        assert_eq!(embedding.len(), EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn test_seeded_fallback_is_reproducible() {
        let mut model = MockEmbeddingModel::new();
        model
            .expect_embed_user()
            .returning(|_| Err(crate::error::AppError::ExternalApi("down".to_string())));
        let mut model2 = MockEmbeddingModel::new();
        model2
            .expect_embed_user()
            .returning(|_| Err(crate::error::AppError::ExternalApi("down".to_string())));

        let a = EmbeddingProvider::new(Arc::new(model), Some(99));
        let b = EmbeddingProvider::new(Arc::new(model2), Some(99));
        assert_eq!(a.user_embedding(1).await, b.user_embedding(2).await);
    }

    #[tokio::test]
    async fn test_wrong_dimension_triggers_fallback() {
        let mut model = MockEmbeddingModel::new();
        model.expect_embed_user().returning(|_| Ok(vec![1.0; 8]));

        let provider = EmbeddingProvider::new(Arc::new(model), Some(7));
        assert_eq!(provider.user_embedding(1).await.len(), EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn test_item_embedding_degrades_like_user_embedding() {
        let mut model = MockEmbeddingModel::new();
        model
            .expect_embed_item()
            .returning(|_| Err(crate::error::AppError::ExternalApi("down".to_string())));

        let provider = EmbeddingProvider::new(Arc::new(model), Some(7));
        assert_eq!(provider.item_embedding(5).await.len(), EMBEDDING_DIM);
    }
}
