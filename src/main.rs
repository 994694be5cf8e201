use std::sync::Arc;

use raddit_recs::{
    api::{create_router, AppState},
    config::Config,
    db,
    services::{
        embedding::{EmbeddingProvider, TwoTowerClient},
        posts::PgPostStore,
        ranking::{HttpRankingModel, RankService},
        recall::{HttpVectorIndex, RecallService},
        recommender::Recommender,
        selector::InterestBasedSelector,
        users::PgUserStore,
        weights::PgInterestWeightStore,
    },
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    sqlx::migrate!().run(&pool).await?;

    // Relational stores
    let posts = Arc::new(PgPostStore::new(pool.clone()));
    let users = Arc::new(PgUserStore::new(pool.clone()));
    let weights = Arc::new(PgInterestWeightStore::new(pool.clone()));

    // External model/index surfaces; each degrades independently when unreachable
    let embedding_model = Arc::new(TwoTowerClient::new(
        &config.embedding_model_url,
        config.model_timeout(),
    )?);
    let vector_index = Arc::new(HttpVectorIndex::new(
        &config.vector_index_url,
        &config.index_collection,
        config.model_timeout(),
    )?);
    let ranking_model = Arc::new(HttpRankingModel::new(
        &config.ranking_model_url,
        config.model_timeout(),
    )?);

    let embeddings = EmbeddingProvider::new(embedding_model, config.degraded_seed);
    let recall = RecallService::new(embeddings, vector_index);
    let rank = RankService::new(ranking_model, config.degraded_seed);
    let selector = InterestBasedSelector::new(posts.clone(), weights.clone(), users.clone());
    let recommender = Arc::new(Recommender::new(
        selector,
        recall,
        rank,
        users.clone(),
        posts.clone(),
    ));

    let state = AppState {
        recommender,
        posts,
        users,
        weights,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "recommendation service listening");
    axum::serve(listener, app).await?;

    Ok(())
}
