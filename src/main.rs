use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use subgen::application::ports::GenerateOptions;
use subgen::application::services::{
    EngineLifecycle, LifecycleConfig, TranscriptionOptions, TranscriptionService,
    join_background, spawn_cache_janitor, spawn_idle_monitor,
};
use subgen::domain::SegmentationOptions;
use subgen::infrastructure::cache::ContentCacheFactory;
use subgen::infrastructure::engine::CandleWhisperLoader;
use subgen::infrastructure::media::HttpMediaFetcher;
use subgen::infrastructure::observability::{TracingConfig, init_tracing};
use subgen::presentation::{AppState, Environment, Settings, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;
    let settings = Settings::load(environment).context("Failed to load configuration")?;

    init_tracing(
        TracingConfig::new(
            environment.as_str(),
            settings.logging.enable_json,
            settings.logging.level.clone(),
        ),
        settings.server.port,
    );

    let shutdown = CancellationToken::new();

    let cache = ContentCacheFactory::create(&settings.cache).context("Failed to open cache")?;
    let removed = cache.sweep_expired().await;
    tracing::info!(removed, enabled = settings.cache.enabled, "Startup cache sweep finished");
    let janitor = spawn_cache_janitor(
        Arc::clone(&cache),
        settings.cache.sweep_interval(),
        shutdown.clone(),
    );

    let loader = Arc::new(CandleWhisperLoader::new(
        settings.engine.model_id.clone(),
        settings.engine.language.clone(),
    ));
    let lifecycle = Arc::new(EngineLifecycle::new(
        loader,
        LifecycleConfig {
            idle_timeout: settings.engine.idle_timeout(),
            prefer_accelerator: settings.engine.prefer_accelerator,
        },
    ));
    let idle_monitor = spawn_idle_monitor(
        Arc::clone(&lifecycle),
        settings.engine.check_interval(),
        shutdown.clone(),
    );

    let fetcher = Arc::new(
        HttpMediaFetcher::new(
            settings.fetch.user_agent.clone(),
            settings.fetch.referer.clone(),
            settings.fetch.timeout(),
        )
        .context("Failed to build HTTP client")?,
    );

    let options = TranscriptionOptions {
        generate: GenerateOptions {
            batch_size_s: settings.engine.batch_size_s,
            sentence_timestamps: settings.engine.enable_timestamp,
        },
        segmentation: SegmentationOptions {
            max_segment_length: settings.processing.max_segment_length,
            duration_per_segment: settings.processing.duration_per_segment,
        },
        chinese_ratio_threshold: settings.processing.chinese_ratio_threshold,
        style: settings.subtitle.style(),
    };

    tokio::fs::create_dir_all(&settings.server.work_dir)
        .await
        .with_context(|| format!("Failed to create {}", settings.server.work_dir.display()))?;

    let service = Arc::new(TranscriptionService::new(
        Arc::clone(&lifecycle),
        cache,
        fetcher,
        options,
        settings.server.work_dir.clone(),
    ));

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    if settings.server.api_token.is_empty() {
        tracing::warn!("No API token configured, /api routes are unauthenticated");
    }

    let router = create_router(AppState::new(service, settings));

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    let signal = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    join_background(vec![("cache janitor", janitor), ("idle monitor", idle_monitor)]).await;
    lifecycle.force_unload().await;

    tracing::info!("Server stopped");
    Ok(())
}
