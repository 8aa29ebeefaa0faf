// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use app_routing_operator::{
    cleaner::Cleaner,
    config::OperatorConfig,
    constants::{GRACEFUL_SHUTDOWN_TIMEOUT_SECS, TOKIO_WORKER_THREADS},
    mapper::{DiscoveryRestMapper, RestMapper},
    metrics::gather_metrics,
    operator,
    reconcilers::ResourceReconciler,
    runtime::{leader::LeaderElection, Manager},
};
use axum::{http::StatusCode, routing::get, Router};
use kube::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Name of the cleaner removing resources of retired components and releases
const STALE_RESOURCE_CLEANER: &str = "stale-resources";

/// Name of the reconciler keeping the operator's global objects applied
const STATIC_RESOURCE_RECONCILER: &str = "static-resources";

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("app-routing-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

fn init_tracing() {
    // Respects RUST_LOG if set, otherwise defaults to INFO level.
    // RUST_LOG_FORMAT=json switches to JSON output.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main() -> Result<()> {
    init_tracing();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting app-routing operator");
    debug!("Logging initialized with file and line number tracking");

    let config = OperatorConfig::from_env().context("loading configuration")?;
    debug!(?config, "Configuration loaded");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default()
        .await
        .context("initializing Kubernetes client")?;
    debug!("Kubernetes client initialized successfully");

    let mapper: Arc<dyn RestMapper> = Arc::new(DiscoveryRestMapper::new(client.clone()));
    let mut manager = Manager::new(
        client.clone(),
        mapper,
        config.leader_election.identity.clone(),
        Duration::from_secs(GRACEFUL_SHUTDOWN_TIMEOUT_SECS),
    );

    let resources = operator::static_resources(&config).context("building static resources")?;
    let retriever = operator::cleanup_retriever(&config, &resources);

    Cleaner::register(
        &mut manager,
        STALE_RESOURCE_CLEANER,
        retriever,
        config.cleaner_max_retries,
    )?;
    ResourceReconciler::register(
        &mut manager,
        STATIC_RESOURCE_RECONCILER,
        resources,
        config.static_reconcile_interval,
    )?;

    let election = LeaderElection::start(client, &config.leader_election)
        .await
        .context("starting leader election")?;

    let shutdown = CancellationToken::new();
    let metrics_server = tokio::spawn(serve_metrics(
        config.metrics_bind_address,
        shutdown.clone(),
    ));
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.cancel();
        });
    }

    let result = manager.run(shutdown.clone(), election.subscribe()).await;
    match &result {
        Ok(()) => info!("Manager stopped"),
        Err(e) => error!(error = %e, "CRITICAL: manager exited"),
    }

    shutdown.cancel();
    election.stop().await;
    match metrics_server.await {
        Ok(Ok(())) => debug!("Metrics server stopped"),
        Ok(Err(e)) => warn!(error = %e, "Metrics server failed"),
        Err(e) => warn!(error = %e, "Metrics server task panicked"),
    }

    result.context("running operator")
}

/// Serve `/metrics` and `/healthz` until `shutdown` is cancelled.
async fn serve_metrics(addr: SocketAddr, shutdown: CancellationToken) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding metrics endpoint on {addr}"))?;
    info!(%addr, "Serving metrics and health endpoints");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

async fn metrics_handler() -> (StatusCode, String) {
    match gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn healthz_handler() -> &'static str {
    "ok"
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        () = ctrl_c => info!("Received Ctrl+C, shutting down gracefully"),
        () = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
}
