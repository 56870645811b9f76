use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::ApiError,
    model::{
        guard::{GUARD_PROFILE_SELECT, GuardProfile, GuardStatus, touch_profile},
        patrol::{PATROL_SELECT, PatrolCoordinate, PatrolRow},
        shift::fetch_shift,
    },
    utils::{
        params::{datetime_bound, limit, optional_f64, required_id, shift_id_query},
        patrol_throttle::{last_point, remember, retry_after},
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Duration, NaiveDateTime};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreatePatrol {
    #[schema(example = 41)]
    pub shift_id: u64,
    #[schema(example = -1.2649)]
    pub lat: f64,
    #[schema(example = 36.8031)]
    pub lng: f64,
    #[schema(example = 8.5)]
    pub accuracy: Option<f64>,
}

#[derive(Deserialize, IntoParams)]
pub struct ShiftFilter {
    /// Only points recorded for this shift
    pub shift_id: Option<String>,
}

fn required_coordinate(body: &Value, field: &'static str, bound: f64) -> Result<f64, ApiError> {
    let value = optional_f64(body, field)?
        .ok_or_else(|| ApiError::field(field, "This field is required."))?;
    if !(-bound..=bound).contains(&value) {
        return Err(ApiError::field(field, format!("{field} must be between -{bound} and {bound}.")));
    }
    Ok(value)
}

struct NewPoint {
    guard_id: u64,
    shift_id: u64,
    at: NaiveDateTime,
    lat: f64,
    lng: f64,
    accuracy: Option<f64>,
}

/// Inserts the point unless the guard already has one for the shift within
/// `min_interval_secs`. The check and the insert are one statement.
async fn insert_point(pool: &MySqlPool, p: &NewPoint, min_interval_secs: i64) -> Result<Option<u64>, sqlx::Error> {
    let done = sqlx::query(
        r#"
        INSERT INTO patrol_coordinates (guard_id, shift_id, timestamp, lat, lng, accuracy)
        SELECT ?, ?, ?, ?, ?, ? FROM DUAL
        WHERE NOT EXISTS (
            SELECT 1 FROM patrol_coordinates
            WHERE guard_id = ? AND shift_id = ? AND timestamp > ?
        )
        "#,
    )
    .bind(p.guard_id)
    .bind(p.shift_id)
    .bind(p.at)
    .bind(p.lat)
    .bind(p.lng)
    .bind(p.accuracy)
    .bind(p.guard_id)
    .bind(p.shift_id)
    .bind(p.at - Duration::seconds(min_interval_secs))
    .execute(pool)
    .await?;
    Ok((done.rows_affected() == 1).then(|| done.last_insert_id()))
}

fn throttled(min_interval: i64, wait: i64) -> ApiError {
    ApiError::TooManyRequests(format!(
        "Too many points - minimum interval is {min_interval}s. Try again in {wait}s."
    ))
}

/// Record a patrol position for the caller
#[utoipa::path(
    post,
    path = "/api/patrols",
    request_body = CreatePatrol,
    responses(
        (status = 201, description = "Point recorded", body = PatrolCoordinate),
        (status = 400, description = "Invalid coordinates or unknown shift"),
        (status = 401, description = "Unauthorized"),
        (status = 429, description = "Posted faster than the minimum interval", body = Object, example = json!({
            "detail": ["Too many points - minimum interval is 30s. Try again in 12s."]
        })),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Patrols"
)]
pub async fn create_patrol(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let shift_id = required_id(&body, "shift_id")?;
    let lat = required_coordinate(&body, "lat", 90.0)?;
    let lng = required_coordinate(&body, "lng", 180.0)?;
    let accuracy = optional_f64(&body, "accuracy")?;

    fetch_shift(pool.get_ref(), shift_id)
        .await?
        .ok_or_else(|| ApiError::field("shift_id", "shift not found"))?;

    let now = config.local_now();
    let last = match last_point(auth.user_id, shift_id).await {
        Some(at) => Some(at),
        None => {
            sqlx::query_scalar::<_, Option<NaiveDateTime>>(
                "SELECT MAX(timestamp) FROM patrol_coordinates WHERE guard_id = ? AND shift_id = ?",
            )
            .bind(auth.user_id)
            .bind(shift_id)
            .fetch_one(pool.get_ref())
            .await?
        }
    };
    let min_interval = config.min_patrol_interval_secs;
    if let Some(wait) = retry_after(last, now, min_interval) {
        debug!(user_id = auth.user_id, shift_id, wait, "Patrol point throttled");
        return Err(throttled(min_interval, wait));
    }

    let point = NewPoint { guard_id: auth.user_id, shift_id, at: now, lat, lng, accuracy };
    let id = match insert_point(pool.get_ref(), &point, min_interval).await? {
        Some(id) => id,
        None => {
            debug!(user_id = auth.user_id, shift_id, "Concurrent patrol point throttled");
            return Err(throttled(min_interval, min_interval));
        }
    };

    remember(auth.user_id, shift_id, now).await;
    touch_profile(pool.get_ref(), auth.user_id, GuardStatus::OnPatrol, now, Some((lat, lng))).await?;

    let sql = format!("{PATROL_SELECT} WHERE pc.id = ?");
    let row = sqlx::query_as::<_, PatrolRow>(&sql)
        .bind(id)
        .fetch_one(pool.get_ref())
        .await?;

    Ok(HttpResponse::Created().json(PatrolCoordinate::from(row)))
}

/// Patrol points ordered by time
#[utoipa::path(
    get,
    path = "/api/patrols",
    params(ShiftFilter),
    responses(
        (status = 200, description = "Patrol points", body = [PatrolCoordinate]),
        (status = 400, description = "Invalid shift_id"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Patrols"
)]
pub async fn list_patrols(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<ShiftFilter>,
) -> Result<HttpResponse, ApiError> {
    let shift_id = shift_id_query(query.shift_id.as_deref())?;
    let cap = config.patrol_heatmap_max_points;

    let rows = match shift_id {
        Some(shift_id) => {
            let sql = format!("{PATROL_SELECT} WHERE pc.shift_id = ? ORDER BY pc.timestamp LIMIT ?");
            sqlx::query_as::<_, PatrolRow>(&sql)
                .bind(shift_id)
                .bind(cap)
                .fetch_all(pool.get_ref())
                .await?
        }
        None => {
            let sql = format!("{PATROL_SELECT} ORDER BY pc.timestamp LIMIT ?");
            sqlx::query_as::<_, PatrolRow>(&sql)
                .bind(cap)
                .fetch_all(pool.get_ref())
                .await?
        }
    };

    let points: Vec<PatrolCoordinate> = rows.into_iter().map(PatrolCoordinate::from).collect();
    Ok(HttpResponse::Ok().json(points))
}

/// Newest point per guard
#[utoipa::path(
    get,
    path = "/api/patrols/latest",
    params(ShiftFilter),
    responses(
        (status = 200, description = "One point per guard", body = [PatrolCoordinate]),
        (status = 400, description = "Invalid shift_id"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Patrols"
)]
pub async fn latest_patrols(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ShiftFilter>,
) -> Result<HttpResponse, ApiError> {
    let shift_id = shift_id_query(query.shift_id.as_deref())?;

    let rows = match shift_id {
        Some(shift_id) => {
            let sql = format!(
                "{PATROL_SELECT} WHERE pc.id IN (SELECT MAX(id) FROM patrol_coordinates WHERE shift_id = ? GROUP BY guard_id) ORDER BY pc.guard_id"
            );
            sqlx::query_as::<_, PatrolRow>(&sql)
                .bind(shift_id)
                .fetch_all(pool.get_ref())
                .await?
        }
        None => {
            let sql = format!(
                "{PATROL_SELECT} WHERE pc.id IN (SELECT MAX(id) FROM patrol_coordinates GROUP BY guard_id) ORDER BY pc.guard_id"
            );
            sqlx::query_as::<_, PatrolRow>(&sql)
                .fetch_all(pool.get_ref())
                .await?
        }
    };

    let points: Vec<PatrolCoordinate> = rows.into_iter().map(PatrolCoordinate::from).collect();
    Ok(HttpResponse::Ok().json(points))
}

#[derive(Deserialize, IntoParams)]
pub struct RangeQuery {
    /// ISO datetime or date (start of day)
    pub from: Option<String>,
    /// ISO datetime or date (end of day)
    pub to: Option<String>,
    pub limit: Option<String>,
}

/// Patrol trail of one shift within an optional time range
#[utoipa::path(
    get,
    path = "/api/shifts/{id}/patrols",
    params(("id" = u64, Path, description = "Shift id"), RangeQuery),
    responses(
        (status = 200, description = "Patrol points", body = [PatrolCoordinate]),
        (status = 400, description = "Invalid from/to"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Shift not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Patrols"
)]
pub async fn shift_patrols(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    query: web::Query<RangeQuery>,
) -> Result<HttpResponse, ApiError> {
    let shift_id = path.into_inner();
    let from = match query.from.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            datetime_bound(raw, config.time_zone, false)
                .ok_or_else(|| ApiError::bad_request("Invalid from datetime (use ISO)."))?,
        ),
        None => None,
    };
    let to = match query.to.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            datetime_bound(raw, config.time_zone, true)
                .ok_or_else(|| ApiError::bad_request("Invalid to datetime (use ISO)."))?,
        ),
        None => None,
    };
    let max = config.patrol_max_points_per_request;
    let limit = limit(query.limit.as_deref(), max, max);

    fetch_shift(pool.get_ref(), shift_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Shift not found"))?;

    let sql = format!(
        "{PATROL_SELECT} WHERE pc.shift_id = ? AND (? IS NULL OR pc.timestamp >= ?) AND (? IS NULL OR pc.timestamp <= ?) ORDER BY pc.timestamp LIMIT ?"
    );
    let rows = sqlx::query_as::<_, PatrolRow>(&sql)
        .bind(shift_id)
        .bind(from)
        .bind(from)
        .bind(to)
        .bind(to)
        .bind(limit)
        .fetch_all(pool.get_ref())
        .await?;

    let points: Vec<PatrolCoordinate> = rows.into_iter().map(PatrolCoordinate::from).collect();
    Ok(HttpResponse::Ok().json(points))
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct HeatPoint {
    pub lat: f64,
    pub lng: f64,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: NaiveDateTime,
    pub guard_id: u64,
}

/// Raw points for heatmap rendering, capped
#[utoipa::path(
    get,
    path = "/api/patrols/heatmap",
    params(ShiftFilter),
    responses(
        (status = 200, description = "Heatmap points", body = [HeatPoint]),
        (status = 400, description = "Invalid shift_id"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Patrols"
)]
pub async fn heatmap(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<ShiftFilter>,
) -> Result<HttpResponse, ApiError> {
    let shift_id = shift_id_query(query.shift_id.as_deref())?;
    let cap = config.patrol_heatmap_max_points as usize;

    let mut stream = sqlx::query_as::<_, HeatPoint>(
        r#"
        SELECT lat, lng, timestamp, guard_id
        FROM patrol_coordinates
        WHERE (? IS NULL OR shift_id = ?)
        ORDER BY timestamp
        "#,
    )
    .bind(shift_id)
    .bind(shift_id)
    .fetch(pool.get_ref());

    let mut points = Vec::new();
    while let Some(point) = stream.try_next().await? {
        points.push(point);
        if points.len() >= cap {
            break;
        }
    }

    Ok(HttpResponse::Ok().json(points))
}

#[derive(Serialize, ToSchema)]
pub struct ActiveGuard {
    pub id: u64,
    pub username: String,
    pub profile: GuardProfile,
    pub last_seen_age_seconds: Option<i64>,
}

/// Guards that reported a patrol point recently
#[utoipa::path(
    get,
    path = "/api/active-guards",
    responses(
        (status = 200, description = "Guards seen within the online window", body = [ActiveGuard]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Patrols"
)]
pub async fn active_guards(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let now = config.local_now();
    let cutoff = now - Duration::minutes(config.guard_online_window_minutes);

    let sql = format!(
        "{GUARD_PROFILE_SELECT} WHERE gp.user_id IN (SELECT DISTINCT guard_id FROM patrol_coordinates WHERE timestamp >= ?) ORDER BY u.username"
    );
    let profiles = sqlx::query_as::<_, GuardProfile>(&sql)
        .bind(cutoff)
        .fetch_all(pool.get_ref())
        .await?;

    let guards: Vec<ActiveGuard> = profiles
        .into_iter()
        .map(|profile| ActiveGuard {
            id: profile.user_id,
            username: profile.username.clone(),
            last_seen_age_seconds: profile.last_seen.map(|seen| (now - seen).num_seconds().max(0)),
            profile,
        })
        .collect();

    Ok(HttpResponse::Ok().json(guards))
}
