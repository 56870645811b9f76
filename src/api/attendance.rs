use crate::{
    allocation::{
        apply::claim_shift,
        roster,
        skills::{match_skills, parse_tags},
    },
    auth::auth::AuthUser,
    config::Config,
    error::ApiError,
    model::{
        attendance::{ATTENDANCE_SELECT, AttendanceResponse, AttendanceRow},
        guard::{GuardStatus, touch_profile},
        premise::{Premise, fetch_premise, fetch_premise_by_uuid},
        shift::{SHIFT_SELECT, ShiftResponse, ShiftRow, fetch_shift, fetch_shifts_by_ids},
    },
    utils::{
        geo::{haversine_m, valid_coordinates},
        params::{limit, optional_f64, optional_id, parse_day, truthy},
        qr::{QrPayload, QrRef},
        window::{CheckInWindow, pick_shift_for_scan},
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sqlx::{MySqlConnection, MySqlPool, types::Json};
use std::collections::HashMap;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

const ALREADY_CHECKED_IN: &str = "You have already checked in for this shift.";

#[derive(Deserialize, ToSchema)]
pub struct CheckInRequest {
    #[schema(example = 41)]
    pub shift_id: Option<u64>,
    #[schema(value_type = Object, example = json!({ "type": "premise", "id": 1, "uuid": "0c3c8b56-3a8e-4d5e-9f57-8a1b7a4f7c11" }))]
    pub qr_payload: Option<Value>,
    #[schema(example = -1.2648)]
    pub check_in_lat: Option<f64>,
    #[schema(example = 36.8028)]
    pub check_in_lng: Option<f64>,
    pub force: Option<bool>,
    pub manual: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct CheckInResponse {
    #[serde(flatten)]
    pub record: AttendanceResponse,
    pub auto_assigned: bool,
}

/// Shift a check-in refers to: explicit id, else the premise named by the
/// QR code, else (for manual check-ins) the caller's own shift in window.
async fn resolve_shift(
    conn: &mut MySqlConnection,
    config: &Config,
    auth: &AuthUser,
    shift_id: Option<u64>,
    qr: Option<&QrPayload>,
    manual: bool,
    now: NaiveDateTime,
) -> Result<ShiftRow, ApiError> {
    if let Some(id) = shift_id {
        return fetch_shift(&mut *conn, id)
            .await?
            .ok_or_else(|| ApiError::not_found("Shift not found"));
    }

    let today = now.date();
    let (from, to) = (today - Duration::days(1), today + Duration::days(1));

    if let Some(qr) = qr {
        let premise = match qr.reference()? {
            Some(QrRef::Id(id)) => Some(
                fetch_premise(&mut *conn, id)
                    .await?
                    .ok_or_else(|| ApiError::field("qr_payload", "QR premise id not found"))?,
            ),
            Some(QrRef::Uuid(uuid)) => Some(
                fetch_premise_by_uuid(&mut *conn, &uuid)
                    .await?
                    .ok_or_else(|| ApiError::field("qr_payload", "QR premise uuid not found"))?,
            ),
            None => None,
        };
        if let Some(premise) = premise {
            let sql = format!(
                "{SHIFT_SELECT} WHERE s.premise_id = ? AND s.date BETWEEN ? AND ? ORDER BY s.date, s.start_time"
            );
            let candidates = sqlx::query_as::<_, ShiftRow>(&sql)
                .bind(premise.id)
                .bind(from)
                .bind(to)
                .fetch_all(&mut *conn)
                .await?;
            let picked = pick_shift_for_scan(
                &candidates,
                now,
                config.checkin_early_minutes,
                config.checkin_late_minutes,
            );
            if let Some(shift) = picked {
                return Ok(shift.clone());
            }
        }
    }

    if manual {
        let sql = format!(
            "{SHIFT_SELECT} WHERE s.assigned_guard_id = ? AND s.date BETWEEN ? AND ? ORDER BY s.date, s.start_time"
        );
        let own = sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(auth.user_id)
            .bind(from)
            .bind(to)
            .fetch_all(&mut *conn)
            .await?;
        if let Some(shift) = own.into_iter().find(|s| {
            CheckInWindow::for_row(s, config.checkin_early_minutes, config.checkin_late_minutes)
                .contains(now)
        }) {
            return Ok(shift);
        }
    }

    Err(ApiError::field(
        "shift_id",
        "Missing shift_id / could not resolve a shift (provide shift_id, qr_payload with premise, or manual:true for assigned shift).",
    ))
}

/// A scanned premise code must belong to the shift's premise.
fn ensure_qr_matches(qr: &QrPayload, premise: &Premise) -> Result<(), ApiError> {
    match qr.reference()? {
        Some(QrRef::Id(id)) if id != premise.id => {
            Err(ApiError::field("qr_payload", "QR does not match premise"))
        }
        Some(QrRef::Uuid(uuid)) if uuid != premise.uuid => {
            Err(ApiError::field("qr_payload", "QR uuid does not match premise"))
        }
        _ => Ok(()),
    }
}

fn outside_window(shift: &ShiftRow, window: &CheckInWindow) -> ApiError {
    let mut context = Map::new();
    context.insert("shift_id".into(), json!(shift.id));
    context.insert("shift_date".into(), json!(shift.date.to_string()));
    context.insert("shift_start".into(), json!(shift.start_time.format("%H:%M:%S").to_string()));
    context.insert("shift_end".into(), json!(shift.end_time.format("%H:%M:%S").to_string()));
    ApiError::Rejected {
        message: format!(
            "Check-in outside allowed window {} - {}",
            window.opens.format("%Y-%m-%dT%H:%M:%S"),
            window.closes.format("%Y-%m-%dT%H:%M:%S"),
        ),
        context,
    }
}

fn outside_geofence(distance_m: f64, radius_m: f64) -> ApiError {
    let mut context = Map::new();
    context.insert("distance_m".into(), json!(distance_m.round()));
    context.insert("radius_m".into(), json!(radius_m));
    ApiError::Rejected {
        message: "Check-in location is outside the premise geofence.".to_string(),
        context,
    }
}

/// Check in to a shift by id, premise QR code or assigned shift
#[utoipa::path(
    post,
    path = "/api/attendance/checkin",
    request_body = CheckInRequest,
    responses(
        (status = 201, description = "Checked in", body = CheckInResponse),
        (status = 400, description = "Unresolvable shift, QR mismatch, outside window or geofence, or duplicate", body = Object, example = json!({
            "detail": ["Check-in outside allowed window 2026-03-02T07:45:00 - 2026-03-02T17:00:00"],
            "shift_id": 41,
            "shift_date": "2026-03-02",
            "shift_start": "08:00:00",
            "shift_end": "16:00:00"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only guards can check in"),
        (status = 404, description = "Shift not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let qr = QrPayload::parse_optional(body.get("qr_payload"))?.filter(|q| !q.is_empty());
    let shift_id = optional_id(&body, "shift_id")?;
    let manual = truthy(body.get("manual"));
    let lat = optional_f64(&body, "check_in_lat")?;
    let lng = optional_f64(&body, "check_in_lng")?;
    let position = match (lat, lng) {
        (Some(lat), Some(lng)) if !valid_coordinates(lat, lng) => {
            return Err(ApiError::field("check_in_lat", "Coordinates out of range."));
        }
        (Some(lat), Some(lng)) => Some((lat, lng)),
        _ => None,
    };

    let can_force = config.allow_force_checkin || config.allow_force_for_staff || auth.is_staff();
    let forced = truthy(body.get("force")) && can_force;
    if !auth.is_guard() && !forced {
        return Err(ApiError::forbidden("Only guards can check in."));
    }

    let now = config.local_now();
    let mut tx = pool.begin().await?;

    let shift = resolve_shift(&mut *tx, &config, &auth, shift_id, qr.as_ref(), manual, now).await?;
    let premise = fetch_premise(&mut *tx, shift.premise_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Premise not found"))?;

    if let Some(qr) = &qr {
        ensure_qr_matches(qr, &premise)?;
    }

    let window = CheckInWindow::for_row(&shift, config.checkin_early_minutes, config.checkin_late_minutes);
    if !window.contains(now) {
        if !forced {
            return Err(outside_window(&shift, &window));
        }
        warn!(user_id = auth.user_id, shift_id = shift.id, "Forced check-in outside window");
    }

    if let (Some((centre_lat, centre_lng, radius)), Some((lat, lng))) = (premise.geofence(), position) {
        let distance = haversine_m(lat, lng, centre_lat, centre_lng);
        if distance > radius && !forced {
            return Err(outside_geofence(distance, radius));
        }
    }

    let already = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM attendance_records WHERE guard_id = ? AND shift_id = ?",
    )
    .bind(auth.user_id)
    .bind(shift.id)
    .fetch_one(&mut *tx)
    .await?;
    if already > 0 {
        return Err(ApiError::bad_request(ALREADY_CHECKED_IN));
    }

    let mut auto_assigned = false;
    if shift.assigned_guard_id.is_none() {
        if let Some(guard) = roster::load_guard(&mut *tx, auth.user_id).await? {
            let required = parse_tags(&shift.required_skills);
            let qualified = match_skills(&guard.skills, &required).covers_all()
                && guard.experience_years >= config.auto_assign_min_experience;
            if qualified {
                auto_assigned = claim_shift(&mut *tx, shift.id, auth.user_id, now).await?;
            }
        }
    }

    let status = window.status_at(now);
    let inserted = sqlx::query(
        r#"
        INSERT INTO attendance_records
            (guard_id, shift_id, check_in_time, check_in_lat, check_in_lng, qr_payload, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(shift.id)
    .bind(now)
    .bind(lat)
    .bind(lng)
    .bind(qr.map(|q| Json(q.into_value())))
    .bind(status.to_string())
    .execute(&mut *tx)
    .await;

    let record_id = match inserted {
        Ok(r) => r.last_insert_id(),
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
            return Err(ApiError::bad_request(ALREADY_CHECKED_IN));
        }
        Err(e) => return Err(e.into()),
    };

    touch_profile(&mut *tx, auth.user_id, GuardStatus::OnSite, now, position).await?;

    let sql = format!("{ATTENDANCE_SELECT} WHERE a.id = ?");
    let row = sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(record_id)
        .fetch_one(&mut *tx)
        .await?;
    let shift = fetch_shift(&mut *tx, shift.id).await?.map(ShiftResponse::from);
    tx.commit().await?;

    info!(
        user_id = auth.user_id,
        shift_id = row.shift_id,
        status = %status,
        auto_assigned,
        "Check-in recorded"
    );

    Ok(HttpResponse::Created().json(CheckInResponse {
        record: AttendanceResponse::new(row, shift),
        auto_assigned,
    }))
}

/// Attaches each record's shift, loaded in one query.
async fn with_shifts(
    pool: &MySqlPool,
    rows: Vec<AttendanceRow>,
) -> Result<Vec<AttendanceResponse>, sqlx::Error> {
    let mut ids: Vec<u64> = rows.iter().map(|r| r.shift_id).collect();
    ids.sort_unstable();
    ids.dedup();
    let shifts: HashMap<u64, ShiftResponse> = fetch_shifts_by_ids(pool, &ids)
        .await?
        .into_iter()
        .map(|s| (s.id, ShiftResponse::from(s)))
        .collect();

    Ok(rows
        .into_iter()
        .map(|row| {
            let shift = shifts.get(&row.shift_id).cloned();
            AttendanceResponse::new(row, shift)
        })
        .collect())
}

#[derive(Deserialize, IntoParams)]
pub struct AttendanceDateQuery {
    /// YYYY-MM-DD or "today" (default)
    pub date: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

/// Attendance records for a day, newest first
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceDateQuery),
    responses(
        (status = 200, description = "Attendance records", body = [AttendanceResponse]),
        (status = 400, description = "Invalid date"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<AttendanceDateQuery>,
) -> Result<HttpResponse, ApiError> {
    let date = parse_day(query.date.as_deref(), config.local_today())
        .map_err(|_| ApiError::bad_request("invalid date format, use YYYY-MM-DD or 'today'."))?;

    let rows = if auth.is_staff() {
        let sql = format!(
            "{ATTENDANCE_SELECT} WHERE DATE(a.check_in_time) = ? ORDER BY a.check_in_time DESC"
        );
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(date)
            .fetch_all(pool.get_ref())
            .await?
    } else {
        let sql = format!(
            "{ATTENDANCE_SELECT} WHERE DATE(a.check_in_time) = ? AND a.guard_id = ? ORDER BY a.check_in_time DESC"
        );
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(date)
            .bind(auth.user_id)
            .fetch_all(pool.get_ref())
            .await?
    };

    Ok(HttpResponse::Ok().json(with_shifts(pool.get_ref(), rows).await?))
}

async fn own_records(
    pool: &MySqlPool,
    user_id: u64,
    limit: u32,
) -> Result<Vec<AttendanceResponse>, sqlx::Error> {
    let sql = format!("{ATTENDANCE_SELECT} WHERE a.guard_id = ? ORDER BY a.check_in_time DESC LIMIT ?");
    let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    with_shifts(pool, rows).await
}

/// The caller's check-in history
#[utoipa::path(
    get,
    path = "/api/attendance/history",
    params(LimitQuery),
    responses(
        (status = 200, description = "Newest first; limit defaults to 20, at most 200", body = [AttendanceResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = limit(query.limit.as_deref(), 20, 200);
    Ok(HttpResponse::Ok().json(own_records(pool.get_ref(), auth.user_id, limit).await?))
}

/// The caller's check-ins wrapped as `{results}`
#[utoipa::path(
    get,
    path = "/api/attendance/my",
    params(LimitQuery),
    responses(
        (status = 200, description = "Newest first; limit defaults to 50, at most 200", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = limit(query.limit.as_deref(), 50, 200);
    let results = own_records(pool.get_ref(), auth.user_id, limit).await?;
    Ok(HttpResponse::Ok().json(json!({ "results": results })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{api_app, bearer};
    use crate::model::role::Role;
    use actix_web::test as atest;
    use chrono::{NaiveDate, NaiveTime};

    fn premise() -> Premise {
        Premise {
            id: 4,
            name: "Gigiri Gate".into(),
            address: String::new(),
            required_skills: String::new(),
            uuid: "0c3c8b56-3a8e-4d5e-9f57-8a1b7a4f7c11".into(),
            lat: None,
            lng: None,
            geofence_radius_m: None,
        }
    }

    #[test]
    fn qr_must_name_the_shift_premise() {
        let p = premise();
        let ok = QrPayload::parse(&json!({ "type": "premise", "id": 4 })).unwrap();
        let wrong_id = QrPayload::parse(&json!({ "id": 5, "uuid": p.uuid })).unwrap();
        let wrong_uuid = QrPayload::parse(&json!({ "uuid": "nope" })).unwrap();
        assert!(ensure_qr_matches(&ok, &p).is_ok());
        assert!(ensure_qr_matches(&wrong_id, &p).is_err());
        assert!(ensure_qr_matches(&wrong_uuid, &p).is_err());
    }

    #[actix_web::test]
    async fn window_rejection_carries_shift_context() {
        let shift = ShiftRow {
            id: 41,
            premise_id: 4,
            premise_name: "Gigiri Gate".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            required_skills: String::new(),
            assigned_guard_id: None,
            assigned_guard_username: None,
            assigned_at: None,
        };
        let window = CheckInWindow::for_row(&shift, 15, 60);
        let resp = actix_web::ResponseError::error_response(&outside_window(&shift, &window));
        assert_eq!(resp.status(), 400);
        let bytes = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["shift_id"], 41);
        assert_eq!(body["shift_start"], "08:00:00");
        assert_eq!(
            body["detail"][0],
            "Check-in outside allowed window 2026-03-02T07:45:00 - 2026-03-02T17:00:00"
        );
    }

    #[actix_web::test]
    async fn staff_cannot_check_in_without_force() {
        let app = api_app!((post, "/attendance/checkin", check_in));
        let req = atest::TestRequest::post()
            .uri("/api/attendance/checkin")
            .insert_header(bearer(1, Role::Supervisor))
            .set_json(json!({ "shift_id": 41 }))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);
    }

    #[actix_web::test]
    async fn malformed_qr_payload_is_rejected() {
        let app = api_app!((post, "/attendance/checkin", check_in));
        let req = atest::TestRequest::post()
            .uri("/api/attendance/checkin")
            .insert_header(bearer(12, Role::Guard))
            .set_json(json!({ "qr_payload": "not json" }))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = atest::read_body_json(resp).await;
        assert_eq!(body["qr_payload"], "Invalid JSON for qr_payload.");
    }

    #[actix_web::test]
    async fn out_of_range_coordinates_are_rejected() {
        let app = api_app!((post, "/attendance/checkin", check_in));
        let req = atest::TestRequest::post()
            .uri("/api/attendance/checkin")
            .insert_header(bearer(12, Role::Guard))
            .set_json(json!({ "shift_id": 41, "check_in_lat": 123.0, "check_in_lng": 36.8 }))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn list_rejects_bad_date() {
        let app = api_app!((get, "/attendance", list_attendance));
        let req = atest::TestRequest::get()
            .uri("/api/attendance?date=yesterday")
            .insert_header(bearer(1, Role::Admin))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = atest::read_body_json(resp).await;
        assert_eq!(body["detail"][0], "invalid date format, use YYYY-MM-DD or 'today'.");
    }
}
