pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{RecommendError, Result};
pub use services::{
    check_health, CacheModification, HealthStatus, HiddenItemsManager, OnlineRecommender,
    PopularItemsCache, SessionRecommender, WriteBack, Worker,
};
