use crate::{
    allocation::fairness::gini, auth::auth::AuthUser, config::Config, error::ApiError,
};
use actix_web::{HttpResponse, web};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sqlx::MySqlPool;
use std::collections::HashMap;
use utoipa::ToSchema;

const ANALYTICS_DAYS: i64 = 7;
const WORKLOAD_TOP: i64 = 50;

#[derive(Serialize, ToSchema)]
pub struct DashboardSummary {
    pub active_shifts: i64,
    pub guards_on_duty: i64,
    pub on_time_pct: i64,
    pub shifts_delta: i64,
    pub guards_delta: i64,
    pub on_time_delta: i64,
}

/// Integer percentage, truncated; 0 when there is nothing to compare.
fn percentage(part: i64, total: i64) -> i64 {
    if total > 0 { part * 100 / total } else { 0 }
}

/// Today's headline numbers
#[utoipa::path(
    get,
    path = "/api/dashboard/summary",
    responses(
        (status = 200, description = "Summary for the site-local day", body = DashboardSummary),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn summary(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let today = config.local_today();

    let active_shifts = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM shifts WHERE date = ?")
        .bind(today)
        .fetch_one(pool.get_ref())
        .await?;

    let (guards_on_duty, on_time, total) = sqlx::query_as::<_, (i64, i64, i64)>(
        r#"
        SELECT COUNT(DISTINCT guard_id),
               CAST(COALESCE(SUM(status = 'ON_TIME'), 0) AS SIGNED),
               COUNT(*)
        FROM attendance_records
        WHERE DATE(check_in_time) = ?
        "#,
    )
    .bind(today)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(DashboardSummary {
        active_shifts,
        guards_on_duty,
        on_time_pct: percentage(on_time, total),
        shifts_delta: 0,
        guards_delta: 0,
        on_time_delta: 0,
    }))
}

#[derive(Debug, Serialize, PartialEq, ToSchema)]
pub struct DayAttendance {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub on_time: i64,
    pub late: i64,
    pub absent: i64,
    pub total: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct GuardWorkload {
    pub guard_username: String,
    pub shifts: i64,
}

#[derive(Serialize, ToSchema)]
pub struct DashboardAnalytics {
    pub attendance_last_7_days: Vec<DayAttendance>,
    pub workload: Vec<GuardWorkload>,
    /// Inequality of the workload counts; 0 is perfectly even
    pub gini: f64,
}

#[derive(sqlx::FromRow)]
struct AttendanceCounts {
    day: NaiveDate,
    on_time: i64,
    late: i64,
    total: i64,
}

/// One entry per day from `start`, filling days without records with zeros.
/// Absent is scheduled shifts minus check-ins, floored at zero.
fn attendance_days(
    start: NaiveDate,
    days: i64,
    counts: &HashMap<NaiveDate, (i64, i64, i64)>,
    shifts: &HashMap<NaiveDate, i64>,
) -> Vec<DayAttendance> {
    (0..days)
        .map(|i| {
            let date = start + Duration::days(i);
            let (on_time, late, total) = counts.get(&date).copied().unwrap_or((0, 0, 0));
            let scheduled = shifts.get(&date).copied().unwrap_or(0);
            DayAttendance {
                date,
                on_time,
                late,
                absent: (scheduled - total).max(0),
                total,
            }
        })
        .collect()
}

/// Attendance for the last seven days and per-guard workload
#[utoipa::path(
    get,
    path = "/api/dashboard/analytics",
    responses(
        (status = 200, description = "Attendance trend and workload", body = DashboardAnalytics),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn analytics(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let today = config.local_today();
    let start = today - Duration::days(ANALYTICS_DAYS - 1);
    let window_start = start.and_hms_opt(0, 0, 0).ok_or(ApiError::Internal)?;

    let counts: HashMap<NaiveDate, (i64, i64, i64)> = sqlx::query_as::<_, AttendanceCounts>(
        r#"
        SELECT DATE(check_in_time) AS day,
               CAST(SUM(status = 'ON_TIME') AS SIGNED) AS on_time,
               CAST(SUM(status = 'LATE') AS SIGNED) AS late,
               COUNT(*) AS total
        FROM attendance_records
        WHERE check_in_time >= ?
        GROUP BY DATE(check_in_time)
        "#,
    )
    .bind(window_start)
    .fetch_all(pool.get_ref())
    .await?
    .into_iter()
    .map(|c| (c.day, (c.on_time, c.late, c.total)))
    .collect();

    let shifts: HashMap<NaiveDate, i64> = sqlx::query_as::<_, (NaiveDate, i64)>(
        "SELECT date, COUNT(*) FROM shifts WHERE date BETWEEN ? AND ? GROUP BY date",
    )
    .bind(start)
    .bind(today)
    .fetch_all(pool.get_ref())
    .await?
    .into_iter()
    .collect();

    let workload = sqlx::query_as::<_, GuardWorkload>(
        r#"
        SELECT u.username AS guard_username, COUNT(a.id) AS shifts
        FROM attendance_records a
        JOIN users u ON u.id = a.guard_id
        WHERE a.check_in_time >= ?
        GROUP BY u.username
        ORDER BY shifts DESC, u.username
        LIMIT ?
        "#,
    )
    .bind(window_start)
    .bind(WORKLOAD_TOP)
    .fetch_all(pool.get_ref())
    .await?;

    let loads: Vec<u64> = workload.iter().map(|w| w.shifts.max(0) as u64).collect();

    Ok(HttpResponse::Ok().json(DashboardAnalytics {
        attendance_last_7_days: attendance_days(start, ANALYTICS_DAYS, &counts, &shifts),
        gini: gini(&loads),
        workload,
    }))
}
