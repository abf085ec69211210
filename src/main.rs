use std::sync::Arc;
use std::time::Duration;

use feature_flag_evaluator::cache::{FlagEvaluationCache, MemoryStore};
use feature_flag_evaluator::config::Config;
use feature_flag_evaluator::evaluation::FlagEvaluationService;
use feature_flag_evaluator::routes;
use feature_flag_evaluator::state::AppState;
use feature_flag_evaluator::store::PgFlagStore;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, error, info};

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,feature_flag_evaluator=debug".into()),
        )
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "server exited with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let db = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(config.lookup_timeout)
        .connect(&config.database_url)
        .await?;
    info!("connected to database");

    let flags = Arc::new(PgFlagStore::new(db));
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(FlagEvaluationCache::new(store.clone(), config.cache_ttl));

    let evaluator = FlagEvaluationService::new(
        flags.clone(),
        flags,
        cache,
        config.lookup_timeout,
    );

    // Expired entries are never read, but they still hold memory until purged
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = store.purge_expired().await;
            if purged > 0 {
                debug!(purged, "purged expired cache entries");
            }
        }
    });

    let state = AppState {
        evaluator: Arc::new(evaluator),
    };

    let app = routes::routes().with_state(state);

    let listener = tokio::net::TcpListener::bind(config.addr()).await?;

    info!("server is chilling at http://{}", config.addr());

    axum::serve(listener, app).await?;

    Ok(())
}
