use std::time::Duration;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use job_aggregator::api::{
    health::health_config,
    search::{SearchService, search_config},
    validation,
};
use job_aggregator::config::{Cli, Config};
use job_aggregator::engine::{Classifier, SearchCoordinator, TermSets};
use job_aggregator::shutdown::ShutdownCoordinator;
use job_aggregator::sources;
use job_aggregator::worker::EvictionWorker;

fn to_io(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

/// Console plus daily rolling files per level:
/// logs/info.log.2026-10-19, logs/error.log.2026-10-19, ...
fn init_tracing(log_dir: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(log_dir)?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let info_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::daily(log_dir, "info.log"))
        .with_ansi(false)
        .with_filter(LevelFilter::INFO);

    let warn_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::daily(log_dir, "warn.log"))
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::daily(log_dir, "error.log"))
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    let debug_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::daily(log_dir, "debug.log"))
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(info_layer)
        .with(warn_layer)
        .with(error_layer)
        .with(debug_layer)
        .try_init()
        .map_err(to_io)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().map_err(to_io)?.with_cli(cli);

    init_tracing(&config.log_dir)?;

    info!("Starting job-aggregator application");
    info!("Configuration loaded successfully:");
    info!("  - Max payload size: {} bytes", config.max_payload_size);
    info!("  - Max concurrent searches: {}", config.max_concurrent_searches);
    info!("  - Search queue capacity: {}", config.search_queue_capacity);
    info!(
        "  - Timeouts: {:?} per source, {:?} per search",
        config.source_timeout, config.search_timeout
    );
    info!("  - Result retention: {:?}", config.result_retention);

    let terms = match &config.classifier_terms_path {
        Some(path) => {
            info!("Loading classifier terms from {}", path.display());
            TermSets::from_file(path).map_err(to_io)?
        }
        None => TermSets::default(),
    };
    let classifier = Classifier::new(&terms).map_err(to_io)?;

    let registry = sources::build_registry(config.fixtures_dir.as_deref(), &config.simulated_sources);
    if registry.is_empty() {
        warn!("No source adapters registered; set FIXTURES_DIR or SIMULATED_SOURCES");
    } else {
        info!("{} source adapters registered", registry.len());
    }

    let (coordinator, search_worker) =
        SearchCoordinator::new(config.search_settings(), registry, classifier);

    let mut worker_handles = Vec::new();
    worker_handles.push(tokio::spawn(search_worker.run(coordinator.shutdown_signal())));
    info!("Spawned search worker");

    let eviction = EvictionWorker::new(coordinator.clone(), config.eviction_interval);
    worker_handles.push(tokio::spawn(eviction.run(coordinator.shutdown_signal())));
    info!("Spawned eviction worker");

    let service = web::Data::new(SearchService::new(coordinator.clone()));
    let max_payload_size = config.max_payload_size;

    let server = HttpServer::new(move || {
        // Configure payload size limits globally
        let payload_config = web::PayloadConfig::default().limit(max_payload_size);

        App::new()
            .app_data(service.clone())
            .app_data(payload_config)
            .app_data(validation::json_config().limit(max_payload_size))
            .app_data(validation::query_config())
            .configure(health_config)
            .configure(search_config)
    });

    info!("Server starting on http://{}:{}", config.bind_address, config.port);

    let server = server
        .bind((config.bind_address.as_str(), config.port))?
        .disable_signals()
        .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    let shutdown = ShutdownCoordinator::new(
        server_handle,
        server_task,
        worker_handles,
        coordinator,
        Duration::from_secs(10),
    );

    if let Err(e) = shutdown.wait_for_shutdown().await {
        error!("Shutdown failed: {}", e);
        return Err(e);
    }
    Ok(())
}
