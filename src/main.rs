use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;
use ucdn_exporter::exporter::{Catalogue, ScrapeConfig, ScrapeCoordinator};
use ucdn_exporter::registry::EntityRegistry;
use ucdn_exporter::source::ucloud::UcloudClientConfig;
use ucdn_exporter::source::{MetricSource, UcloudClient};
use ucdn_exporter::*;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let cli = config::Cli::parse();
    let app_config = config::AppConfig::load(&cli)?;
    tracing::debug!(config = ?app_config, "configuration loaded");

    let source: Arc<dyn MetricSource> = Arc::new(UcloudClient::new(UcloudClientConfig {
        base_url: app_config.ucloud.base_url.clone(),
        public_key: app_config.ucloud.public_key.clone(),
        private_key: app_config.ucloud.private_key.clone(),
        request_timeout: Duration::from_secs(app_config.ucloud.request_timeout_secs),
        page_size: app_config.registry.page_size,
    })?);

    let registry = Arc::new(EntityRegistry::new(
        source.clone(),
        app_config.ucloud.project_id.clone(),
    ));
    registry
        .bootstrap(
            app_config.registry.bootstrap_attempts,
            Duration::from_secs(app_config.registry.bootstrap_retry_secs),
        )
        .await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let worker_handle = worker::spawn(
        worker::RefreshDeps {
            registry: registry.clone(),
            shutdown_rx,
        },
        worker::RefreshConfig {
            ticker_time_secs: app_config.scrape.ticker_time,
        },
    );

    let coordinator = Arc::new(ScrapeCoordinator::new(
        source,
        registry,
        Catalogue::new(app_config.scrape.namespace.clone())?,
        ScrapeConfig {
            project_id: app_config.ucloud.project_id.clone(),
            area_code: app_config.ucloud.area_code.clone(),
            range_time_secs: app_config.scrape.range_time,
            delay_time_secs: app_config.scrape.delay_time,
            scrape_timeout: Duration::from_secs(app_config.scrape.scrape_timeout_secs),
            max_concurrency: app_config.scrape.max_concurrency,
        },
    ));

    let app = routes::app(coordinator, &app_config.server.metrics_path);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        "Listening on http://{}{}",
        addr,
        app_config.server.metrics_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Received shutdown signal");
    let _ = shutdown_tx.send(());
    let _ = worker_handle.await;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
