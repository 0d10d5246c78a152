use std::sync::Arc;
use std::time::Duration;

use quasar_cache::{CacheStore, RedisCache};
use quasar_data::{DataStore, MemoryData, User};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recommend_service::models::{CtrModel, ModelSlot, RankingModel};
use recommend_service::services::{check_health, spawn_reconciler, HiddenItemsManager, Worker};
use recommend_service::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(
        service = %config.service.service_name,
        version = env!("CARGO_PKG_VERSION"),
        jobs = config.service.jobs,
        "starting recommend-service"
    );

    let cache: Arc<dyn CacheStore> = Arc::new(RedisCache::open(&config.cache.url).await?);
    // single-node truth store; swap in a DataStore adapter for shared setups
    let data: Arc<dyn DataStore> = Arc::new(MemoryData::new());

    let hidden = HiddenItemsManager::load(cache.clone()).await?;
    let reconciler = spawn_reconciler(
        hidden.clone(),
        data.clone(),
        Duration::from_secs(config.recommend.offline.check_recommend_period_secs),
    );

    // model slots start empty; a loader sideloads versions as they arrive
    let ranking_model: Arc<ModelSlot<dyn RankingModel>> = Arc::new(ModelSlot::empty());
    let ctr_model: Arc<ModelSlot<dyn CtrModel>> = Arc::new(ModelSlot::empty());

    let worker = Worker::new(
        config.clone(),
        cache.clone(),
        data.clone(),
        hidden,
        ranking_model,
        ctr_model,
    );

    let mut recommend_ticker = tokio::time::interval(Duration::from_secs(
        config.recommend.offline.check_recommend_period_secs,
    ));
    let mut health_ticker = tokio::time::interval(Duration::from_secs(
        config.service.health_check_period_secs,
    ));

    loop {
        tokio::select! {
            _ = recommend_ticker.tick() => {
                let users = match load_all_users(data.as_ref()).await {
                    Ok(users) => users,
                    Err(e) => {
                        tracing::warn!("user listing failed, skipping cycle: {}", e);
                        continue;
                    }
                };
                tracing::debug!(users = users.len(), "recommendation cycle starting");
                worker.recommend(users).await;
            }
            _ = health_ticker.tick() => {
                let status = check_health(&cache, &data).await;
                if status.ready() {
                    tracing::debug!("health check passed");
                } else {
                    tracing::warn!(
                        cache_error = ?status.cache_store_error,
                        data_error = ?status.data_store_error,
                        "health check failed"
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                reconciler.abort();
                return Ok(());
            }
        }
    }
}

async fn load_all_users(data: &dyn DataStore) -> anyhow::Result<Vec<User>> {
    let mut users = Vec::new();
    let mut cursor = String::new();
    loop {
        let (page, next) = data.list_users(&cursor, 1024).await?;
        users.extend(page);
        if next.is_empty() {
            return Ok(users);
        }
        cursor = next;
    }
}
