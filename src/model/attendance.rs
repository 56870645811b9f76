use crate::model::{shift::ShiftResponse, user::UserRef};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use strum::{Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    OnTime,
    Late,
    Early,
    InvalidQr,
    Missing,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: u64,
    pub guard_id: u64,
    pub guard_username: String,
    pub shift_id: u64,
    pub check_in_time: NaiveDateTime,
    pub check_in_lat: Option<f64>,
    pub check_in_lng: Option<f64>,
    pub qr_payload: Option<Json<serde_json::Value>>,
    pub status: String,
}

pub const ATTENDANCE_SELECT: &str = r#"
    SELECT a.id, a.guard_id, u.username AS guard_username, a.shift_id, a.check_in_time,
           a.check_in_lat, a.check_in_lng, a.qr_payload, a.status
    FROM attendance_records a
    JOIN users u ON u.id = a.guard_id
"#;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendanceResponse {
    pub id: u64,
    pub guard: UserRef,
    pub shift: Option<ShiftResponse>,
    #[schema(value_type = String, format = "date-time")]
    pub check_in_time: NaiveDateTime,
    pub check_in_lat: Option<f64>,
    pub check_in_lng: Option<f64>,
    #[schema(value_type = Object)]
    pub qr_payload: Option<serde_json::Value>,
    pub status: String,
}

impl AttendanceResponse {
    pub fn new(row: AttendanceRow, shift: Option<ShiftResponse>) -> Self {
        AttendanceResponse {
            id: row.id,
            guard: UserRef {
                id: row.guard_id,
                username: row.guard_username,
            },
            shift,
            check_in_time: row.check_in_time,
            check_in_lat: row.check_in_lat,
            check_in_lng: row.check_in_lng,
            qr_payload: row.qr_payload.map(|j| j.0),
            status: row.status,
        }
    }
}
