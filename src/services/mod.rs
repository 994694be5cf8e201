pub mod embedding;
pub mod posts;
pub mod ranking;
pub mod recall;
pub mod recommender;
pub mod scoring;
pub mod selector;
pub mod users;
pub mod weights;
