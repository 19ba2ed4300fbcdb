use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::services::{availability, slots};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SlotsQuery {
    pub service_id: i64,
    pub date: String,
}

#[derive(Serialize)]
pub struct SlotEntry {
    start_time: String,
    end_time: String,
    employee_id: i64,
    employee_name: String,
}

#[derive(Serialize, Default)]
pub struct SlotBuckets {
    morning: Vec<SlotEntry>,
    afternoon: Vec<SlotEntry>,
    evening: Vec<SlotEntry>,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    date: String,
    service_id: i64,
    service_title: String,
    duration_minutes: i64,
    price: f64,
    slots: SlotBuckets,
    total_available: usize,
}

// GET /api/available-slots?service_id=&date=
pub async fn available_slots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    let date = NaiveDate::parse_from_str(&query.date, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("invalid date format, use YYYY-MM-DD".to_string()))?;

    if date < Utc::now().naive_utc().date() {
        return Err(AppError::Validation(
            "cannot check slots for past dates".to_string(),
        ));
    }

    let db = state.db.lock().unwrap();

    let service = queries::get_service(&db, query.service_id)?
        .ok_or_else(|| AppError::NotFound(format!("service {}", query.service_id)))?;

    let pool: Vec<_> = queries::staff_with_skill(&db, service.id)?
        .into_iter()
        .filter(|s| s.is_active())
        .collect();
    if pool.is_empty() {
        return Err(AppError::NotFound(
            "no staff available for this service".to_string(),
        ));
    }

    let config = &state.config;
    let grid = slots::generate_slots(
        service.duration_minutes,
        config.buffer_minutes,
        config.salon_open,
        config.salon_close,
    );

    let mut buckets = SlotBuckets::default();
    let mut total_available = 0;

    for slot in grid {
        let end_buffered =
            slots::end_with_buffer(slot.start, service.duration_minutes, config.buffer_minutes);

        // One available staff member is enough to offer the slot.
        let taker = pool.iter().find(|staff| {
            availability::is_available(
                &db,
                staff,
                date,
                slot.start,
                end_buffered,
                Some(&service),
                None,
            )
            .unwrap_or(false)
        });

        if let Some(staff) = taker {
            let entry = SlotEntry {
                start_time: slot.start.format("%H:%M").to_string(),
                end_time: slot.end.format("%H:%M").to_string(),
                employee_id: staff.id,
                employee_name: staff.full_name.clone(),
            };
            match slots::day_part(slot.start, &config.time_blocks) {
                slots::DayPart::Morning => buckets.morning.push(entry),
                slots::DayPart::Afternoon => buckets.afternoon.push(entry),
                slots::DayPart::Evening => buckets.evening.push(entry),
            }
            total_available += 1;
        }
    }

    Ok(Json(SlotsResponse {
        date: query.date,
        service_id: service.id,
        service_title: service.title,
        duration_minutes: service.duration_minutes,
        price: service.price,
        slots: buckets,
        total_available,
    }))
}
