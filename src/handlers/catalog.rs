use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::state::AppState;

const DAY_NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

fn parse_work_days(names: &[String]) -> Result<String, AppError> {
    let mut numbers = vec![];
    for name in names {
        let idx = DAY_NAMES
            .iter()
            .position(|d| *d == name.to_lowercase())
            .ok_or_else(|| AppError::Validation(format!("invalid day name: {name}")))?;
        numbers.push(idx.to_string());
    }
    Ok(numbers.join(","))
}

fn work_day_names(work_days: &str) -> Vec<String> {
    work_days
        .split(',')
        .filter_map(|n| n.trim().parse::<usize>().ok())
        .filter_map(|n| DAY_NAMES.get(n))
        .map(|d| d.to_string())
        .collect()
}

fn parse_hhmm(s: &str, field: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| AppError::Validation(format!("invalid {field} time format, use HH:MM")))
}

// POST /api/categories
#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let db = state.db.lock().unwrap();
    let id = queries::create_category(&db, &body.name)?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

// POST /api/services
#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub duration_minutes: i64,
    pub category_id: i64,
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if body.duration_minutes < 1 {
        return Err(AppError::Validation(
            "duration_minutes must be at least 1".to_string(),
        ));
    }

    let db = state.db.lock().unwrap();
    if queries::get_category(&db, body.category_id)?.is_none() {
        return Err(AppError::NotFound(format!("category {}", body.category_id)));
    }

    let id = queries::create_service(
        &db,
        &body.title,
        body.description.as_deref(),
        body.price,
        body.duration_minutes,
        body.category_id,
    )?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

// GET /api/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<serde_json::Value>>, AppError> {
    let db = state.db.lock().unwrap();
    let services = queries::list_services(&db)?;

    let response = services
        .into_iter()
        .map(|s| {
            serde_json::json!({
                "id": s.id,
                "title": s.title,
                "description": s.description,
                "price": s.price,
                "duration_minutes": s.duration_minutes,
                "is_active": s.is_active,
                "category_id": s.category_id,
            })
        })
        .collect();
    Ok(Json(response))
}

// POST /api/customers
#[derive(Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub email: String,
}

pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if body.email.trim().is_empty() || !body.email.contains('@') {
        return Err(AppError::Validation("invalid email address".to_string()));
    }

    let db = state.db.lock().unwrap();
    let id = queries::create_customer(&db, &body.name, &body.email)?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

// POST /api/staff
#[derive(Deserialize)]
pub struct CreateStaffRequest {
    pub full_name: String,
    pub work_days: Vec<String>,
    pub work_start: String,
    pub work_end: String,
    #[serde(default)]
    pub skills: Vec<i64>,
    pub is_active: Option<bool>,
}

#[derive(Serialize)]
pub struct StaffResponse {
    id: i64,
    full_name: String,
    work_days: Vec<String>,
    work_start: String,
    work_end: String,
    skills: Vec<i64>,
    is_active: bool,
    override_active: Option<bool>,
}

pub async fn create_staff(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateStaffRequest>,
) -> Result<(StatusCode, Json<StaffResponse>), AppError> {
    if body.full_name.trim().is_empty() || body.work_days.is_empty() {
        return Err(AppError::Validation("missing required fields".to_string()));
    }

    let work_start = parse_hhmm(&body.work_start, "work_start")?;
    let work_end = parse_hhmm(&body.work_end, "work_end")?;
    if work_start >= work_end {
        return Err(AppError::Validation(
            "work_start must be before work_end".to_string(),
        ));
    }
    let work_days = parse_work_days(&body.work_days)?;

    let db = state.db.lock().unwrap();
    for service_id in &body.skills {
        if queries::get_service(&db, *service_id)?.is_none() {
            return Err(AppError::Validation(format!("unknown service id {service_id}")));
        }
    }

    let id = queries::create_staff(
        &db,
        &body.full_name,
        &work_days,
        work_start,
        work_end,
        body.is_active.unwrap_or(true),
    )?;
    queries::set_staff_skills(&db, id, &body.skills)?;

    let staff = queries::get_staff(&db, id)?
        .ok_or_else(|| AppError::NotFound(format!("staff {id}")))?;
    let skills = queries::skills_for_staff(&db, id)?;

    Ok((
        StatusCode::CREATED,
        Json(StaffResponse {
            id: staff.id,
            is_active: staff.is_active(),
            full_name: staff.full_name,
            work_days: work_day_names(&staff.work_days),
            work_start: staff.work_start.format("%H:%M").to_string(),
            work_end: staff.work_end.format("%H:%M").to_string(),
            skills,
            override_active: staff.override_active,
        }),
    ))
}

// GET /api/staff
pub async fn list_staff(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StaffResponse>>, AppError> {
    let db = state.db.lock().unwrap();
    let staff = queries::list_staff(&db)?;

    let mut response = vec![];
    for member in staff {
        let skills = queries::skills_for_staff(&db, member.id)?;
        response.push(StaffResponse {
            id: member.id,
            full_name: member.full_name.clone(),
            work_days: work_day_names(&member.work_days),
            work_start: member.work_start.format("%H:%M").to_string(),
            work_end: member.work_end.format("%H:%M").to_string(),
            skills,
            is_active: member.is_active(),
            override_active: member.override_active,
        });
    }
    Ok(Json(response))
}

// PATCH /api/staff/:id
#[derive(Deserialize)]
pub struct UpdateStaffRequest {
    pub full_name: Option<String>,
    pub work_days: Option<Vec<String>>,
    pub work_start: Option<String>,
    pub work_end: Option<String>,
    pub skills: Option<Vec<i64>>,
    pub is_active: Option<bool>,
    pub override_active: Option<bool>,
    /// Clears the admin override so the persisted flag applies again.
    #[serde(default)]
    pub clear_override: bool,
}

pub async fn update_staff(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateStaffRequest>,
) -> Result<Json<StaffResponse>, AppError> {
    let db = state.db.lock().unwrap();
    let mut staff = queries::get_staff(&db, id)?
        .ok_or_else(|| AppError::NotFound(format!("staff {id}")))?;

    if let Some(name) = body.full_name {
        staff.full_name = name;
    }
    if let Some(days) = body.work_days {
        staff.work_days = parse_work_days(&days)?;
    }
    if let Some(start) = body.work_start {
        staff.work_start = parse_hhmm(&start, "work_start")?;
    }
    if let Some(end) = body.work_end {
        staff.work_end = parse_hhmm(&end, "work_end")?;
    }
    if staff.work_start >= staff.work_end {
        return Err(AppError::Validation(
            "work_start must be before work_end".to_string(),
        ));
    }
    if let Some(active) = body.is_active {
        staff.active = active;
    }
    if body.clear_override {
        staff.override_active = None;
    } else if let Some(override_active) = body.override_active {
        staff.override_active = Some(override_active);
    }

    queries::save_staff(&db, &staff)?;

    if let Some(skills) = &body.skills {
        for service_id in skills {
            if queries::get_service(&db, *service_id)?.is_none() {
                return Err(AppError::Validation(format!("unknown service id {service_id}")));
            }
        }
        queries::set_staff_skills(&db, id, skills)?;
    }

    let skills = queries::skills_for_staff(&db, id)?;
    Ok(Json(StaffResponse {
        id: staff.id,
        is_active: staff.is_active(),
        full_name: staff.full_name,
        work_days: work_day_names(&staff.work_days),
        work_start: staff.work_start.format("%H:%M").to_string(),
        work_end: staff.work_end.format("%H:%M").to_string(),
        skills,
        override_active: staff.override_active,
    }))
}
