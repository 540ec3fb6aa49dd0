use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::{
    services::{ingest_request, livez, metrics, readyz},
    state::AppState,
};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::observability::Metrics;
use crate::queue::{Broker, QueueReceiver};
use crate::sources::SourceChain;
use crate::worker::{DispatchWorker, WorkerConfig};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Operator and ingress routes
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/dispatch", post(ingest_request))
        .route("/livez", get(livez))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the dispatch service until a shutdown signal arrives
///
/// Declares the broker topology, starts the dispatch worker and serves the
/// HTTP endpoints. On shutdown the listener stops first, then the worker
/// drains, then the broker closes.
pub async fn run(config: Config) -> Result<(), AnyError> {
    let chain = Arc::new(SourceChain::from_config(&config.sources)?);
    info!(chain = ?chain.names(), "Source chain ready");

    let (broker, consumers) = Broker::declare(&config);
    let broker = Arc::new(broker);
    let metrics = Arc::new(Metrics::new());

    let dispatcher = Arc::new(Dispatcher::new(
        chain,
        broker.provider_exchange(),
        metrics.clone(),
        &config.queues.routing_namespace,
    ));

    for receiver in consumers.providers {
        tokio::spawn(log_sink(receiver, false));
    }
    tokio::spawn(log_sink(consumers.dead_letter, true));
    tokio::spawn(log_sink(consumers.parking_lot, true));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = DispatchWorker::new(
        dispatcher,
        broker.clone(),
        WorkerConfig::from_config(&config),
    );
    let worker = tokio::spawn(worker.run(consumers.dispatcher, shutdown_rx));

    let address = config.probes.bind_addr;
    let app = router(AppState::new(config, broker.clone(), metrics));

    let listener = TcpListener::bind(address).await?;
    info!(%address, "dispatchbox listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if shutdown_tx.send(true).is_err() {
        warn!("Dispatch worker already gone");
    }
    let report = worker.await?;
    broker.close();
    info!(?report, "Shutdown complete");

    Ok(())
}

/// Log every message reaching a queue that has no consumer in this process
async fn log_sink(mut receiver: QueueReceiver, dead: bool) {
    while let Some(delivery) = receiver.recv().await {
        let message = &delivery.message;
        if dead {
            warn!(
                queue = receiver.name(),
                routing_key = %message.routing_key,
                headers = ?message.headers,
                "Message dead-lettered"
            );
        } else {
            info!(
                queue = receiver.name(),
                routing_key = %message.routing_key,
                size = message.body.len(),
                "Provider operation delivered"
            );
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
