use std::sync::Arc;

use crate::services::posts::PostStore;
use crate::services::recommender::Recommender;
use crate::services::users::UserStore;
use crate::services::weights::InterestWeightStore;

/// Shared application state
///
/// Services are constructed once at startup (see `main`) and shared read-only
/// across requests; nothing here is request-scoped.
#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<Recommender>,
    pub posts: Arc<dyn PostStore>,
    pub users: Arc<dyn UserStore>,
    pub weights: Arc<dyn InterestWeightStore>,
}
