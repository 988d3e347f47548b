//! billing-reconciler server binary.
//!
//! Wires the PayOS gateway, the Postgres stores and the HTTP routes, and runs
//! the timeout sweeper alongside the server until SIGINT/SIGTERM.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use billing_reconciler::adapters::http::{billing_router, BillingAppState};
use billing_reconciler::adapters::{
    PayosConfig, PayosGateway, PostgresBillingReader, PostgresBillingStore, PostgresCatalog,
    TimeoutSweeper, TimeoutSweeperConfig,
};
use billing_reconciler::application::handlers::billing::{
    CheckoutUrlDefaults, SubscriptionLifecycle, SweepPaymentTimeoutsCommand,
    SweepPaymentTimeoutsHandler,
};
use billing_reconciler::config::{AppConfig, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.server);
    config.validate().context("Invalid configuration")?;

    let pool = connect(&config).await?;

    let gateway = Arc::new(
        PayosGateway::new(
            PayosConfig::new(
                config.payment.payos_client_id.clone(),
                config.payment.payos_api_key.clone(),
                config.payment.payos_checksum_key.clone(),
            )
            .with_base_url(config.payment.payos_base_url.clone())
            .with_timeout(config.payment.request_timeout())
            .with_max_retries(config.payment.max_retries),
        )
        .context("Failed to build PayOS client")?,
    );
    let store = Arc::new(PostgresBillingStore::new(pool.clone()));
    let reader = Arc::new(PostgresBillingReader::new(pool.clone()));
    let catalog = Arc::new(PostgresCatalog::new(pool));
    let policy = config.restoration.policy();

    let state = BillingAppState {
        store: store.clone(),
        reader: reader.clone(),
        plans: catalog.clone(),
        users: catalog.clone(),
        gateway: gateway.clone(),
        policy,
        urls: CheckoutUrlDefaults {
            client_url: config.payment.client_url.clone(),
            public_url: config.payment.public_url.clone(),
        },
        sweep: SweepPaymentTimeoutsCommand {
            threshold_minutes: config.sweeper.threshold_minutes,
            batch_size: config.sweeper.batch_size,
        },
        admin_token: config.server.admin_token().map(Arc::from),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_task = if config.sweeper.enabled {
        let handler = Arc::new(SweepPaymentTimeoutsHandler::new(
            store.clone(),
            reader,
            gateway,
            SubscriptionLifecycle::new(store, catalog),
            policy,
        ));
        let sweeper = TimeoutSweeper::with_config(
            handler,
            TimeoutSweeperConfig::default()
                .with_interval(config.sweeper.interval())
                .with_threshold_minutes(config.sweeper.threshold_minutes)
                .with_batch_size(config.sweeper.batch_size),
        );
        Some(tokio::spawn(async move { sweeper.run(shutdown_rx).await }))
    } else {
        tracing::info!("Timeout sweeper disabled");
        None
    };

    let app = Router::new()
        .route("/health", get(health))
        .merge(billing_router().with_state(state))
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(cors_layer(&config.server))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, environment = ?config.server.environment, "billing-reconciler listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // Receivers see the flip even if the sweeper is mid-sweep.
    let _ = shutdown_tx.send(true);
    if let Some(task) = sweeper_task {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Timeout sweeper task panicked");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(server.log_level.clone()));

    if server.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let db = &config.database;
    let pool = PgPoolOptions::new()
        .min_connections(db.min_connections)
        .max_connections(db.max_connections)
        .acquire_timeout(db.acquire_timeout())
        .idle_timeout(db.idle_timeout())
        .connect(&db.url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    if db.run_migrations {
        let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
        let migrator = sqlx::migrate::Migrator::new(migrations_dir)
            .await
            .context("Failed to load migrations")?;
        migrator
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        tracing::info!("Database migrations applied");
    }

    Ok(pool)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring malformed CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .allow_origin(origins)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
