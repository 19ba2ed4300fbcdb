pub mod admin;
pub mod bookings;
pub mod catalog;
pub mod health;
pub mod slots;

use axum::http::HeaderMap;

use crate::errors::AppError;

/// Actor identity arrives in headers; a session layer would normally put it
/// there. Missing or unparseable identity is an authentication problem, a
/// wrong actor for the action is authorization and handled downstream.
pub(crate) fn customer_id(headers: &HeaderMap) -> Result<i64, AppError> {
    header_id(headers, "x-customer-id")
}

pub(crate) fn staff_id(headers: &HeaderMap) -> Result<i64, AppError> {
    header_id(headers, "x-staff-id")
}

fn header_id(headers: &HeaderMap, name: &str) -> Result<i64, AppError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .ok_or(AppError::Unauthorized)
}
