use std::sync::Arc;
use std::time::Instant;
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use keytag::{ModelManager, ServerConfig, TaggerServer, TaggingPipeline};

async fn run(config: ServerConfig) -> Result<()> {
    let start_time = Instant::now();

    let manager = match &config.cache_dir {
        Some(dir) => ModelManager::new(dir, config.offline),
        None => ModelManager::new_default(config.offline),
    };
    info!(
        "Resolving artifacts (cache: {:?}, offline: {})",
        manager.cache_dir(),
        manager.is_offline()
    );

    let artifacts = config.artifacts();
    if config.fresh {
        info!("Fresh download requested - removing any cached artifacts...");
        manager.remove_downloads(&artifacts)?;
    }
    let resolved = manager.resolve(&artifacts).await
        .context("Model artifacts are not available")?;

    let pipeline = TaggingPipeline::builder()
        .with_runtime_config(config.runtime_config())
        .with_threshold(config.threshold)
        .with_max_length(config.max_length)
        .with_model_files(&resolved.model_path, &resolved.tokenizer_path)
        .context("Failed to load model and tokenizer")?
        .build()?;
    let pipeline = Arc::new(pipeline);

    pipeline.warm_up();
    info!(
        "=== Tagger ready in {:.2?} (threshold {}, max length {}) ===",
        start_time.elapsed(),
        pipeline.threshold(),
        pipeline.max_length()
    );

    TaggerServer::new(pipeline)
        .serve(&config.bind_addr())
        .await
        .with_context(|| format!("Server on {} failed", config.bind_addr()))
}

fn main() -> Result<()> {
    keytag::init_logger();
    let config = ServerConfig::parse();

    info!("=== Starting Keyword Tagger ===");

    let threads = usize::from(config.threads);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(threads)
        .max_blocking_threads(threads)
        .thread_name("keytag-worker")
        .enable_all()
        .build()
        .context("Failed to start the request thread pool")?;
    info!("Request thread pool size: {}", threads);

    runtime.block_on(run(config))
}
