use anyhow::Context;
use burrow_core::{Repository, Shortener};
use burrow_gateway::{App, AppState, Cli, Config, CookieSigner, StorageBackend};
use burrow_generator::HexGenerator;
use burrow_shortener::ShortenerService;
use burrow_storage::{
    CacheSettings, CachedRepository, FileRepository, InMemoryRepository, JournalOptions,
    PostgresRepository,
};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::try_from(Cli::parse())?;
    burrow_telemetry::init(config.log_format)?;

    info!(
        server_address = %config.server_address,
        base_url = %config.base_url,
        storage_backend = %config.storage,
        id_offset = config.id_offset,
        "starting burrow"
    );

    let generator = HexGenerator::with_offset(config.id_offset);
    let shortener = match &config.storage {
        StorageBackend::Postgres { dsn } => {
            let repository = PostgresRepository::connect(dsn)
                .await
                .context("failed to connect to postgres")?;
            repository.init_schema().await?;
            let cache = CacheSettings::builder()
                .max_capacity(config.cache_capacity)
                .build();
            into_service(CachedRepository::new(repository, &cache), generator)
        }
        StorageBackend::File { path } => {
            let repository = FileRepository::open(JournalOptions::builder().path(path).build())
                .with_context(|| format!("failed to open journal {}", path.display()))?;
            into_service(repository, generator)
        }
        StorageBackend::Memory => into_service(InMemoryRepository::new(), generator),
    };

    let signer = CookieSigner::new(&config.auth_secret)?;
    let state = AppState::new(shortener, config.base_url, signer);

    let listener = TcpListener::bind(config.server_address.as_str())
        .await
        .with_context(|| format!("failed to bind {}", config.server_address))?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

fn into_service<R: Repository>(repository: R, generator: HexGenerator) -> Arc<dyn Shortener> {
    Arc::new(ShortenerService::new(repository, generator))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
