use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;

use crate::errors::AppError;
use crate::services::sweep;
use crate::state::AppState;

// POST /api/admin/sweep/run
//
// Manual trigger for the periodic sweep; the timer normally drives it.
pub async fn run_sweep(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let now = Utc::now().naive_utc();
    let outcome = sweep::run_all(&state, now).await;

    Ok(Json(serde_json::json!({
        "success": true,
        "reminders_sent": outcome.reminders_sent,
        "bookings_deleted": outcome.bookings_deleted,
        "overdue_completed": outcome.overdue_completed,
        "timestamp": now.format("%Y-%m-%d %H:%M:%S").to_string(),
    })))
}

// GET /api/admin/sweep/status
pub async fn sweep_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let now = Utc::now().naive_utc();
    let (pending_reminders, bookings_to_delete) = sweep::pending_counts(&state, now)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "pending_reminders": pending_reminders,
        "bookings_to_delete": bookings_to_delete,
        "timestamp": now.format("%Y-%m-%d %H:%M:%S").to_string(),
    })))
}
