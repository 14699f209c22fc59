use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod admin;
mod cache;
mod config;
mod consumer;
mod db;
mod error;
mod metrics;
mod models;
mod queue;
mod services;
mod sources;
mod trace;

use crate::admin::AdminState;
use crate::cache::CacheManager;
use crate::config::AppConfig;
use crate::consumer::EventConsumer;
use crate::db::{Database, ReferenceReader, SqlReferenceRepository};
use crate::queue::{LoggingQueueSink, QueueSink};
use crate::services::{
    CachingPreloader, DataPreloader, DedupService, EventHandler, GroupingStrategy,
    LogDeadLetterSink, OrderGrouper, OrderPublisher, OrderTransformer, PartnerValidator,
    PipelineOrchestrator, Preloader,
};
use crate::sources::{MockOrderSource, MongoOrderSource, OrderSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orderflow_pipeline=debug,rdkafka=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("Starting orderflow pipeline v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.environment);

    // Install Prometheus recorder before any metric is touched
    let metrics_handle = metrics::init_metrics();

    // Relational store
    let database = Database::connect(&config.database.url, config.database.max_connections).await?;
    tracing::info!("Database connected");
    let repo: Arc<dyn ReferenceReader> =
        Arc::new(SqlReferenceRepository::new(database.pool.clone(), config.db));
    tracing::info!(
        "Reference repository ready (chunk_size: {}, max_retries: {}, retry_delay_ms: {})",
        config.db.chunk_size,
        config.db.max_retries,
        config.db.retry_delay_ms
    );

    // Caches
    let caches = Arc::new(CacheManager::new(&config.cache));
    caches.start_cleanup_tasks();
    tracing::info!(
        "Caches initialized (data: {}x{}m, partner: {}x{}m, dedup: {}x{}m)",
        config.cache.data.max_size,
        config.cache.data.ttl_minutes,
        config.cache.partner.max_size,
        config.cache.partner.ttl_minutes,
        config.cache.dedup.max_size,
        config.cache.dedup.ttl_minutes
    );

    // Pending-order source
    let source: Arc<dyn OrderSource> = if config.mongodb.enabled {
        let mongo = MongoOrderSource::connect(
            &config.mongodb.uri,
            &config.mongodb.database,
            config.mongodb.pending_limit,
        )
        .await
        .map_err(|e| anyhow::anyhow!("mongodb connect failed: {}", e))?;
        tracing::info!("Order source: MongoDB at {}", config.mongodb.uri);
        Arc::new(mongo)
    } else {
        tracing::warn!("MongoDB disabled, using mock order source");
        Arc::new(MockOrderSource::new(5))
    };

    // Downstream queue sink. The real queue client is deployed alongside
    // the broker; this build always logs when it is not wired in.
    let sink: Arc<dyn QueueSink> = Arc::new(LoggingQueueSink::new());
    if config.wmq.enabled {
        tracing::warn!("wmq.enabled is set but no queue client is wired in, using logging sink");
    } else {
        tracing::info!(
            "Queue disabled, publishes to {} will be logged only",
            config.wmq.queue_name
        );
    }

    // Identity stamped onto processed orders
    let worker = std::env::var("HOSTNAME").unwrap_or_else(|_| "worker-0".to_string());
    let processed_by = format!("{}@{}", env!("CARGO_PKG_NAME"), worker);

    // Grouping
    let strategy = GroupingStrategy::from_config(&config.grouping.strategy).unwrap_or_else(|| {
        tracing::warn!(
            "unknown grouping strategy '{}', falling back to BY_CUSTOMER",
            config.grouping.strategy
        );
        GroupingStrategy::ByCustomer
    });
    let high_value_threshold = Decimal::from_str(&config.grouping.high_value_threshold)
        .unwrap_or_else(|_| Decimal::new(500, 0));
    let grouper = OrderGrouper::new(
        strategy,
        config.grouping.min_group_size,
        high_value_threshold,
        processed_by.clone(),
    );
    tracing::info!(
        "Grouping strategy: {} (min_group_size: {}, high_value_threshold: {})",
        strategy.as_str(),
        config.grouping.min_group_size,
        high_value_threshold
    );

    // Pipeline stages
    let preloader: Arc<dyn Preloader> = Arc::new(CachingPreloader::new(
        DataPreloader::new(repo.clone(), config.executor.db_concurrency),
        caches.clone(),
    ));
    let transformer = Arc::new(OrderTransformer::new(
        config.executor.processing_concurrency,
        processed_by.clone(),
    ));
    let publisher = Arc::new(OrderPublisher::new(
        sink,
        grouper,
        config.wmq.publish_concurrency,
    ));
    tracing::info!(
        "Concurrency caps: processing={}, publish={}, db={}",
        config.executor.processing_concurrency,
        config.wmq.publish_concurrency,
        config.executor.db_concurrency
    );

    let orchestrator = PipelineOrchestrator::new(preloader, transformer, publisher);
    let handler = Arc::new(EventHandler::new(
        DedupService::new(caches.dedup.clone()),
        PartnerValidator::new(repo, caches.partners.clone(), caches.units.clone()),
        source,
        orchestrator,
        Arc::new(LogDeadLetterSink::new()),
    ));

    // Admin surface in the background
    let admin_state = AdminState {
        metrics: metrics_handle,
        caches: caches.clone(),
    };
    let admin_port = config.admin_port;
    tokio::spawn(async move {
        if let Err(err) = admin::serve(admin_state, admin_port).await {
            tracing::error!("admin server stopped: {}", err);
        }
    });

    // Consume until the process is stopped
    let consumer = EventConsumer::new(&config.kafka, handler)?;
    tracing::info!("Pipeline ready, consuming from {}", config.kafka.topic);
    consumer.run().await?;

    Ok(())
}
