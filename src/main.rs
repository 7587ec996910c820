use std::sync::Arc;
use std::time::Duration;
use tickseries::config::Config;
use tickseries::services::{
    build_registry, spawn_repair_job, GapRepairer, IngestService, PublishDispatcher,
    RecordSource, RedisMirror, SqliteHistory, TickHistory, TimeSeriesStore,
};
use tickseries::types::QueueItem;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tickseries=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Starting tickseries with horizons {:?}",
        config.indicators.horizons
    );

    let registry = build_registry(&config.indicators)?;
    for subscription in registry.subscriptions() {
        debug!(
            "{} watches {:?} on {}",
            subscription.subscriber,
            subscription.watches,
            subscription.index.as_deref().unwrap_or("*")
        );
    }
    let dispatcher = PublishDispatcher::new(registry);

    // Redis mirror is optional; without it the store is memory-only
    let mirror = match config.redis_url {
        Some(ref redis_url) => match RedisMirror::connect(redis_url).await {
            Ok(mirror) => Some(mirror),
            Err(e) => {
                warn!("Failed to connect to Redis: {}. Running without persistence.", e);
                None
            }
        },
        None => None,
    };

    let store = match mirror {
        Some(ref mirror) => {
            let (tx, rx) = mpsc::unbounded_channel();
            let store = TimeSeriesStore::with_commit_sink(dispatcher, tx);
            if let Err(e) = mirror.load_all(&store).await {
                warn!("Failed to load series from Redis: {}", e);
            }
            mirror.clone().spawn(rx);
            store
        }
        None => TimeSeriesStore::new(dispatcher),
    };

    let archive = match config.history_db_path {
        Some(ref path) => match SqliteHistory::new(path) {
            Ok(history) => {
                info!("Tick archive opened at {}", path);
                Some(Arc::new(history))
            }
            Err(e) => {
                warn!("Failed to open tick archive {}: {}", path, e);
                None
            }
        },
        None => None,
    };

    let history = TickHistory::new();
    let ingest = IngestService::new(
        store.clone(),
        history.clone(),
        archive.clone(),
        Duration::from_millis(config.cascade_timeout_ms),
    );

    if config.repair.watched_pairs.is_empty() {
        info!("No WATCHED_PAIRS configured; gap repair job disabled");
    } else {
        let backlog = archive.map(|a| a as Arc<dyn RecordSource>);
        let repairer = Arc::new(GapRepairer::new(store.clone(), history, backlog));
        spawn_repair_job(repairer, config.repair.clone());
        info!(
            "Gap repair every {}s for {} pairs",
            config.repair.interval_secs,
            config.repair.watched_pairs.len()
        );
    }

    let (tx, rx) = IngestService::channel(config.ingest_buffer);
    let ingest_task = ingest.spawn(rx);

    // Queue items arrive as JSON lines on stdin
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let item: QueueItem = match serde_json::from_str(&line) {
            Ok(item) => item,
            Err(e) => {
                warn!("Skipping malformed queue item: {}", e);
                continue;
            }
        };
        let Some(tick) = item.into_tick() else {
            debug!("Skipping unsupported queue item: {}", line);
            continue;
        };
        if tx.send(tick).await.is_err() {
            break;
        }
    }

    drop(tx);
    ingest_task.await?;
    info!("Input closed; {} series held", store.keys().len());
    Ok(())
}
