//! lockbox lifecycle daemon.
//!
//! Runs the background half of the secrets manager: the daily expiration
//! scan, the notification bus consumer, and the delivery-ledger retention
//! sweep. Rotation is exposed through the library surface and invoked by
//! the API tier.

use std::sync::Arc;

use anyhow::Result;
use lockbox_lifecycle::{
    audit::AuditDispatcher,
    bus::InProcessBus,
    cleanup::{CleanupWorker, CleanupWorkerConfig},
    config,
    consumer::{ConsumerWorker, NotificationConsumer},
    crypto::EncryptionGateway,
    db::Database,
    metrics::OperationMetrics,
    rotation::{RotationService, StrategyRegistry},
    scanner::{ExpirationScanner, ScannerWorker},
    stores::NoopMailer,
};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to LOCKBOX_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting lockbox lifecycle daemon");

    // The master key must be present before anything touches a secret.
    let gateway = match EncryptionGateway::from_env() {
        Ok(gateway) => gateway,
        Err(e) => {
            error!(error = %e, "Failed to load secrets master key");
            return Err(e.into());
        }
    };

    // Connect to database
    let db = match Database::connect(&config.database).await {
        Ok(db) => {
            info!("Database connection established");
            db
        }
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            return Err(e.into());
        }
    };

    // Run migrations in dev mode
    if config.dev_mode {
        info!("Running database migrations (dev mode)");
        if let Err(e) = db.run_migrations().await {
            error!(error = %e, "Failed to run migrations");
            return Err(e.into());
        }
    }

    // Startup-built shared components
    let registry = Arc::new(StrategyRegistry::with_builtins());
    let metrics = Arc::new(OperationMetrics::new());
    let audit = AuditDispatcher::new(config.audit_endpoint.clone(), config.audit_timeout);
    if config.audit_endpoint.is_none() {
        warn!("No audit endpoint configured, audit events will be dropped");
    }

    let secret_store = Arc::new(db.secret_store());
    let ledger = Arc::new(db.delivery_ledger());

    // The rotation service is driven by the API tier through the library
    // surface; constructing it here validates the wiring at startup.
    let _rotation = RotationService::new(
        Arc::clone(&secret_store),
        Arc::clone(&registry),
        gateway,
        audit.clone(),
        Arc::clone(&metrics),
    );

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Notification bus: in-process pair until a managed broker is wired in.
    let (bus, receiver) = InProcessBus::channel();

    // Start the consumer worker in background
    let consumer = NotificationConsumer::new(
        Arc::clone(&ledger),
        Arc::new(NoopMailer),
        config.consumer_max_attempts,
    );
    let consumer_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        let worker = ConsumerWorker::new(consumer, receiver);
        async move {
            worker.run(shutdown_rx).await;
        }
    });

    // Start the scan scheduler in background
    let scanner = Arc::new(ExpirationScanner::new(
        Arc::clone(&secret_store),
        Arc::new(db.project_directory()),
        Arc::new(bus),
        config.warning_days,
    ));
    let scanner_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        let worker = ScannerWorker::new(scanner, config.scan_hour);
        async move {
            worker.run(shutdown_rx).await;
        }
    });

    // Start the ledger cleanup worker in background
    let cleanup_worker = CleanupWorker::new(
        Arc::clone(&ledger),
        CleanupWorkerConfig {
            ledger_retention_days: config.ledger_retention_days,
            ..Default::default()
        },
    );
    let cleanup_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            cleanup_worker.run(shutdown_rx).await;
        }
    });

    // Wait for shutdown signal (Ctrl+C)
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    // Signal shutdown to all workers
    let _ = shutdown_tx.send(true);

    // Wait for workers to finish
    info!("Waiting for workers to shut down...");
    let shutdown_timeout = std::time::Duration::from_secs(10);

    if let Err(e) = tokio::time::timeout(shutdown_timeout, consumer_handle).await {
        warn!(error = %e, "Consumer worker did not shut down in time");
    }

    if let Err(e) = tokio::time::timeout(shutdown_timeout, scanner_handle).await {
        warn!(error = %e, "Scanner worker did not shut down in time");
    }

    if let Err(e) = tokio::time::timeout(shutdown_timeout, cleanup_handle).await {
        warn!(error = %e, "Cleanup worker did not shut down in time");
    }

    let snapshot = metrics.snapshot();
    info!(
        rotations = snapshot.rotation_count,
        "Lifecycle daemon shutdown complete"
    );
    Ok(())
}
