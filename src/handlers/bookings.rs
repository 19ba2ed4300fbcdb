use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Booking;
use crate::services::lifecycle::{self, BookingOutcome};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub service_id: i64,
    pub date: String,
    pub start_time: String,
    pub employee_id: Option<i64>,
}

#[derive(Serialize)]
pub struct BookingResponse {
    booking_id: String,
    employee_id: i64,
    employee_name: String,
    service_title: String,
    date: String,
    start_time: String,
    end_time: String,
    duration_minutes: i64,
    price: f64,
    status: String,
}

impl From<BookingOutcome> for BookingResponse {
    fn from(outcome: BookingOutcome) -> Self {
        Self {
            booking_id: outcome.booking.id,
            employee_id: outcome.staff.id,
            employee_name: outcome.staff.full_name,
            service_title: outcome.service.title,
            date: outcome.booking.date.format("%Y-%m-%d").to_string(),
            start_time: outcome.booking.start_time.format("%H:%M").to_string(),
            end_time: outcome.booking.end_time.format("%H:%M").to_string(),
            duration_minutes: outcome.service.duration_minutes,
            price: outcome.booking.price,
            status: outcome.booking.status.as_str().to_string(),
        }
    }
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let customer_id = super::customer_id(&headers)?;
    let now = Utc::now().naive_utc();

    let outcome = {
        let db = state.db.lock().unwrap();
        let mut rng = rand::thread_rng();
        lifecycle::create_booking(
            &db,
            &state.config,
            customer_id,
            body.service_id,
            &body.date,
            &body.start_time,
            body.employee_id,
            now,
            &mut rng,
        )?
    };

    tracing::info!(
        "booking {} created for customer {customer_id} with staff {}",
        outcome.booking.id,
        outcome.staff.id
    );

    Ok((StatusCode::CREATED, Json(outcome.into())))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct BookingListItem {
    id: String,
    service_title: String,
    employee_name: String,
    date: String,
    start_time: String,
    end_time: String,
    status: String,
    price: f64,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<BookingListItem>>, AppError> {
    let customer_id = super::customer_id(&headers)?;

    let db = state.db.lock().unwrap();
    let bookings = queries::bookings_for_customer(&db, customer_id, query.status.as_deref())?;

    let mut items = vec![];
    for booking in bookings {
        let service_title = queries::get_service(&db, booking.service_id)?
            .map(|s| s.title)
            .unwrap_or_default();
        let employee_name = queries::get_staff(&db, booking.staff_id)?
            .map(|s| s.full_name)
            .unwrap_or_default();
        items.push(BookingListItem {
            id: booking.id,
            service_title,
            employee_name,
            date: booking.date.format("%Y-%m-%d").to_string(),
            start_time: booking.start_time.format("%H:%M").to_string(),
            end_time: booking.end_time.format("%H:%M").to_string(),
            status: booking.status.as_str().to_string(),
            price: booking.price,
        });
    }
    Ok(Json(items))
}

// PATCH /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let customer_id = super::customer_id(&headers)?;
    let now = Utc::now().naive_utc();

    let booking = {
        let db = state.db.lock().unwrap();
        lifecycle::cancel_booking(&db, &state.config, &id, customer_id, now)?
    };

    Ok(Json(serde_json::json!({
        "ok": true,
        "booking_id": booking.id,
        "status": booking.status.as_str(),
    })))
}

// PATCH /api/bookings/:id/reschedule
#[derive(Deserialize)]
pub struct RescheduleRequest {
    pub date: String,
    pub start_time: String,
    pub employee_id: Option<i64>,
}

pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RescheduleRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let customer_id = super::customer_id(&headers)?;
    let now = Utc::now().naive_utc();

    let outcome = {
        let db = state.db.lock().unwrap();
        let mut rng = rand::thread_rng();
        lifecycle::reschedule_booking(
            &db,
            &state.config,
            &id,
            customer_id,
            &body.date,
            &body.start_time,
            body.employee_id,
            now,
            &mut rng,
        )?
    };

    Ok(Json(outcome.into()))
}

// PATCH /api/bookings/:id/start
pub async fn start_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let staff_id = super::staff_id(&headers)?;
    let now = Utc::now().naive_utc();

    let booking = {
        let db = state.db.lock().unwrap();
        lifecycle::start_booking(&db, &id, staff_id, now)?
    };

    Ok(Json(serde_json::json!({
        "ok": true,
        "booking_id": booking.id,
        "status": booking.status.as_str(),
        "started_at": booking.started_at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
    })))
}

// PATCH /api/bookings/:id/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let staff_id = super::staff_id(&headers)?;
    let now = Utc::now().naive_utc();

    let (booking, receipt) = {
        let db = state.db.lock().unwrap();
        let booking = lifecycle::complete_booking(&db, &id, staff_id, now)?;
        let receipt = receipt_for(&db, &booking)?;
        (booking, receipt)
    };

    // Receipt delivery never fails the completion; the flag in the response
    // tells the caller whether it went out.
    let receipt_sent = match receipt {
        Some((email, body)) => match state.notifier.send(&email, "Your receipt", &body).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("failed to send receipt for booking {id}: {e}");
                false
            }
        },
        None => false,
    };

    Ok(Json(serde_json::json!({
        "ok": true,
        "booking_id": booking.id,
        "status": booking.status.as_str(),
        "completed_by": booking.completed_by,
        "receipt_sent": receipt_sent,
    })))
}

fn receipt_for(
    db: &rusqlite::Connection,
    booking: &Booking,
) -> Result<Option<(String, String)>, AppError> {
    let Some(customer) = queries::get_customer(db, booking.customer_id)? else {
        return Ok(None);
    };
    let service_title = queries::get_service(db, booking.service_id)?
        .map(|s| s.title)
        .unwrap_or_else(|| "your service".to_string());

    let body = format!(
        "Hello {},\n\nThank you for your visit.\n\nService: {service_title}\nDate: {}\nAmount: {:.2}\n",
        customer.name,
        booking.date.format("%B %d, %Y"),
        booking.price,
    );
    Ok(Some((customer.email, body)))
}
