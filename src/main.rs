use std::sync::{Arc, Mutex};

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use salonbook::config::AppConfig;
use salonbook::db;
use salonbook::handlers;
use salonbook::services::notifications::LogNotifier;
use salonbook::services::sweep::SweepScheduler;
use salonbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        notifier: Box::new(LogNotifier),
    });

    let mut scheduler = SweepScheduler::new();
    scheduler.start(state.clone());

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/customers", post(handlers::catalog::create_customer))
        .route("/api/categories", post(handlers::catalog::create_category))
        .route("/api/services", post(handlers::catalog::create_service))
        .route("/api/services", get(handlers::catalog::list_services))
        .route("/api/staff", post(handlers::catalog::create_staff))
        .route("/api/staff", get(handlers::catalog::list_staff))
        .route("/api/staff/:id", patch(handlers::catalog::update_staff))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings", get(handlers::bookings::list_bookings))
        .route(
            "/api/bookings/:id/cancel",
            patch(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/bookings/:id/reschedule",
            patch(handlers::bookings::reschedule_booking),
        )
        .route(
            "/api/bookings/:id/start",
            patch(handlers::bookings::start_booking),
        )
        .route(
            "/api/bookings/:id/complete",
            patch(handlers::bookings::complete_booking),
        )
        .route(
            "/api/available-slots",
            get(handlers::slots::available_slots),
        )
        .route("/api/admin/sweep/run", post(handlers::admin::run_sweep))
        .route("/api/admin/sweep/status", get(handlers::admin::sweep_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
