use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use optiproxy::application::{
    MetadataManager, NegativeResultCache, ObjectCache, OptimizeImageUseCase, Transcoder,
    UrlNormalizer,
};
use optiproxy::infrastructure::{
    AppConfig, CliArgs, ConfigLoader, DiskObjectStore, HttpUpstreamFetcher, SqliteMetadataRepository,
    StandardImageCodec, StoreSweeper,
};
use optiproxy::presentation::{AppState, SecurityHeaders, Shutdown, create_router, serve};

const BYTES_PER_MB: u64 = 1024 * 1024;

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}

fn load_config() -> Result<AppConfig> {
    let args = CliArgs::parse();
    let loader = ConfigLoader::new()?;
    let mut config = loader.load_config(args.config.as_deref())?;
    config.merge_with_args(args);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = dotenvy::dotenv();

    let config = load_config()?;
    init_logging(&config)?;

    info!(version = optiproxy::VERSION, "Starting {}", optiproxy::NAME);

    let object_dir = config.effective_object_dir();
    let store = Arc::new(
        DiskObjectStore::new(
            object_dir.clone(),
            config.storage.max_size_mb.saturating_mul(BYTES_PER_MB),
            config.storage.shard_prefix_len,
        )
        .await
        .wrap_err_with(|| format!("failed to open object store at {}", object_dir.display()))?,
    );

    let database_path = config.effective_database_path();
    let repository = Arc::new(
        SqliteMetadataRepository::new(&database_path)
            .await
            .wrap_err_with(|| format!("failed to open metadata database {}", database_path.display()))?,
    );
    let metadata = Arc::new(MetadataManager::new(
        repository,
        config.metadata.cache_capacity,
        Duration::from_secs(config.metadata.cache_ttl_secs),
    ));

    let optimizer = Arc::new(OptimizeImageUseCase::new(
        Arc::new(HttpUpstreamFetcher::new(&config.fetch)?),
        ObjectCache::new(store.clone()),
        metadata.clone(),
        Arc::new(Transcoder::new(
            Arc::new(StandardImageCodec::new()),
            config.transcode.max_dimension,
        )),
        Arc::new(NegativeResultCache::new(
            config.negative_cache.capacity,
            Duration::from_secs(config.negative_cache.ttl_secs),
        )),
    ));
    let normalizer = Arc::new(
        UrlNormalizer::new(config.rewrite.clone(), config.server.default_quality)
            .wrap_err("invalid rewrite rules")?,
    );

    let security = SecurityHeaders::new(
        &config.security.content_security_policy,
        config.security.report_to.as_deref(),
    )
    .wrap_err("invalid security headers")?;

    let shutdown = Shutdown::new();
    let sweeper = StoreSweeper::new(
        store,
        metadata.clone(),
        Duration::from_secs(config.storage.cleanup_interval_secs),
    )
    .spawn(shutdown.subscribe());

    let signals = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = shutdown.listen_for_signals().await {
                error!(error = %e, "Failed to install signal handlers");
            }
        })
    };

    let listener = TcpListener::bind(&config.server.listen)
        .await
        .wrap_err_with(|| format!("failed to bind to {}", config.server.listen))?;
    info!(addr = %config.server.listen, "Listening");

    let router = create_router(AppState::new(optimizer, normalizer, security));
    let result = serve(
        listener,
        router,
        &shutdown,
        Duration::from_secs(config.server.shutdown_grace_secs),
    )
    .await;

    shutdown.trigger();
    signals.abort();
    if let Err(e) = sweeper.await {
        error!(error = %e, "Store sweeper stopped abnormally");
    }
    metadata.close().await;
    info!("Shutdown complete");

    result.wrap_err("server error")
}
