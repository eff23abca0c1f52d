pub mod catalog;
pub mod config;
pub mod cosine;
pub mod error;
pub mod factor;
pub mod neighbors;
pub mod persistence;
pub mod protocol;
pub mod ranking;
pub mod ratings;
pub mod recommender;
pub mod scoring;
pub mod server;
pub mod store;
pub mod transport;
pub mod types;
pub mod vectorize;

pub use error::{ErrorKind, RecommendError};
pub use recommender::{RecommendRequest, Recommender};
pub use store::ModelStore;
pub use types::{ItemId, RatingScale, Strategy, UserQuery};
