use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use farefeed_api::{app, AppState};
use farefeed_pricing::TravelpayoutsClient;
use farefeed_streams::{ConsumerHealthMonitor, SearchWorker, WorkerSettings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HEALTH_REPORT_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "farefeed=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = farefeed_store::Config::load().expect("Failed to load config");
    tracing::info!("Starting farefeed on port {}", config.server.port);

    let broker = farefeed_store::RedisBroker::connect(&config.redis.url)
        .await
        .expect("Failed to connect to Redis");
    broker
        .ensure_group(&config.streams.request_stream, &config.streams.group)
        .await
        .expect("Failed to create consumer group");
    let broker = Arc::new(broker);

    let searcher = Arc::new(TravelpayoutsClient::new(
        &config.pricing.base_url,
        &config.pricing.token,
        &config.pricing.marker,
    ));
    let monitor = Arc::new(ConsumerHealthMonitor::new());

    for i in 0..config.worker.concurrency.max(1) {
        let worker = SearchWorker::new(
            broker.clone(),
            searcher.clone(),
            monitor.clone(),
            WorkerSettings {
                request_stream: config.streams.request_stream.clone(),
                result_stream: config.streams.result_stream.clone(),
                group: config.streams.group.clone(),
                consumer_name: format!("{}-{}", config.streams.consumer_name, i),
                idle_backoff: Duration::from_millis(config.worker.idle_backoff_ms),
                consume_timeout: Duration::from_millis(config.worker.consume_timeout_ms),
            },
        );
        tokio::spawn(async move { worker.run().await });
    }

    // Periodic health visibility in the logs.
    let report_monitor = monitor.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEALTH_REPORT_INTERVAL);
        loop {
            ticker.tick().await;
            let status = report_monitor.health_status();
            tracing::info!(
                healthy = status.healthy,
                processed = status.processed_count,
                errors = status.error_count,
                success_rate = status.success_rate,
                average_latency_ms = status.average_latency_ms,
                "Consumer health"
            );
        }
    });

    let app_state = AppState { searcher, monitor };
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install ctrl-c handler");
    tracing::info!("Shutdown signal received");
}
