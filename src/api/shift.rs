use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::ApiError,
    model::{
        guard::fetch_profile_by_user,
        premise::fetch_premise,
        shift::{SHIFT_SELECT, ShiftResponse, ShiftRow, fetch_shift},
    },
    utils::{
        db_utils::{build_update_sql, execute_update},
        params::{optional_id, page_window, parse_day, plain_date, required_id, time_from_value, truthy},
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const UPDATABLE: &[&str] = &["premise_id", "date", "start_time", "end_time", "required_skills"];

#[derive(Deserialize, ToSchema)]
pub struct CreateShift {
    #[schema(example = 1)]
    pub premise_id: u64,
    #[schema(example = "2026-03-02")]
    pub date: String,
    #[schema(example = "08:00")]
    pub start_time: String,
    /// At or before start_time means the shift ends the next day
    #[schema(example = "16:00")]
    pub end_time: String,
    #[schema(example = "cctv")]
    pub required_skills: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AssignShift {
    #[schema(example = 12)]
    pub guard_id: u64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ShiftQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub premise_id: Option<u64>,
    /// YYYY-MM-DD or "today"
    pub date: Option<String>,
    /// "1"/"true" lists only shifts without a guard
    pub unassigned: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ShiftListResponse {
    pub data: Vec<ShiftResponse>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

struct ShiftFilter {
    premise_id: Option<u64>,
    date: Option<NaiveDate>,
    unassigned: bool,
}

impl ShiftFilter {
    fn from_query(query: &ShiftQuery, today: NaiveDate) -> Result<Self, ApiError> {
        let date = match query.date.as_deref().map(str::trim) {
            None | Some("") => None,
            raw => Some(parse_day(raw, today)?),
        };
        Ok(ShiftFilter {
            premise_id: query.premise_id,
            date,
            unassigned: truthy(query.unassigned.clone().map(Value::String).as_ref()),
        })
    }

    fn push(&self, qb: &mut QueryBuilder<'_, MySql>) {
        qb.push(" WHERE 1 = 1");
        if let Some(premise_id) = self.premise_id {
            qb.push(" AND s.premise_id = ").push_bind(premise_id);
        }
        if let Some(date) = self.date {
            qb.push(" AND s.date = ").push_bind(date);
        }
        if self.unassigned {
            qb.push(" AND s.assigned_guard_id IS NULL");
        }
    }
}

/// List shifts
#[utoipa::path(
    get,
    path = "/api/shifts",
    params(ShiftQuery),
    responses(
        (status = 200, description = "Paginated shift list", body = ShiftListResponse),
        (status = 400, description = "Invalid date"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn list_shifts(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<ShiftQuery>,
) -> Result<HttpResponse, ApiError> {
    let filter = ShiftFilter::from_query(&query, config.local_today())?;
    let (page, per_page, offset) = page_window(query.page, query.per_page);

    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM shifts s");
    filter.push(&mut count);
    let total = count
        .build_query_scalar::<i64>()
        .fetch_one(pool.get_ref())
        .await?;

    let mut data = QueryBuilder::<MySql>::new(SHIFT_SELECT);
    filter.push(&mut data);
    data.push(" ORDER BY s.date DESC, s.start_time LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind(offset);
    let shifts = data
        .build_query_as::<ShiftRow>()
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(ShiftListResponse {
        data: shifts.into_iter().map(ShiftResponse::from).collect(),
        page,
        per_page,
        total,
    }))
}

/// Create a shift
#[utoipa::path(
    post,
    path = "/api/shifts",
    request_body = CreateShift,
    responses(
        (status = 201, description = "Shift created", body = ShiftResponse),
        (status = 400, description = "Invalid payload or premise not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin/Supervisor only"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn create_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;

    let premise_id = required_id(&body, "premise_id")?;
    let date = match body.get("date").and_then(Value::as_str).map(str::trim) {
        Some(raw) if !raw.is_empty() && raw != "today" => {
            plain_date(raw).ok_or_else(|| ApiError::field("date", "Date must be YYYY-MM-DD."))?
        }
        _ => return Err(ApiError::field("date", "This field is required.")),
    };
    let start_time = time_from_value(body.get("start_time"), "start_time")?;
    let end_time = time_from_value(body.get("end_time"), "end_time")?;
    let required_skills = body
        .get("required_skills")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();

    if fetch_premise(pool.get_ref(), premise_id).await?.is_none() {
        return Err(ApiError::field("premise_id", "premise not found"));
    }

    let id = sqlx::query(
        r#"
        INSERT INTO shifts (premise_id, date, start_time, end_time, required_skills)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(premise_id)
    .bind(date)
    .bind(start_time)
    .bind(end_time)
    .bind(required_skills)
    .execute(pool.get_ref())
    .await?
    .last_insert_id();

    let shift = fetch_shift(pool.get_ref(), id)
        .await?
        .ok_or(ApiError::Internal)?;
    info!(shift_id = id, premise_id, %date, created_by = auth.user_id, "Shift created");
    Ok(HttpResponse::Created().json(ShiftResponse::from(shift)))
}

/// Get a shift
#[utoipa::path(
    get,
    path = "/api/shifts/{id}",
    params(("id" = u64, Path, description = "Shift id")),
    responses(
        (status = 200, description = "Shift", body = ShiftResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Shift not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn get_shift(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let shift = fetch_shift(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Shift not found"))?;
    Ok(HttpResponse::Ok().json(ShiftResponse::from(shift)))
}

/// Update a shift
#[utoipa::path(
    put,
    path = "/api/shifts/{id}",
    params(("id" = u64, Path, description = "Shift id")),
    request_body = CreateShift,
    responses(
        (status = 200, description = "Updated shift", body = ShiftResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin/Supervisor only"),
        (status = 404, description = "Shift not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn update_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;
    let shift_id = path.into_inner();

    for field in ["start_time", "end_time"] {
        if body.get(field).is_some() {
            time_from_value(body.get(field), field)?;
        }
    }
    if let Some(premise_id) = optional_id(&body, "premise_id")? {
        if fetch_premise(pool.get_ref(), premise_id).await?.is_none() {
            return Err(ApiError::field("premise_id", "premise not found"));
        }
    }

    let update = build_update_sql("shifts", &body, UPDATABLE, "id", shift_id)?;
    execute_update(pool.get_ref(), update).await?;

    let shift = fetch_shift(pool.get_ref(), shift_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Shift not found"))?;
    Ok(HttpResponse::Ok().json(ShiftResponse::from(shift)))
}

/// Delete a shift
#[utoipa::path(
    delete,
    path = "/api/shifts/{id}",
    params(("id" = u64, Path, description = "Shift id")),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin/Supervisor only"),
        (status = 404, description = "Shift not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn delete_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;
    let shift_id = path.into_inner();

    let result = sqlx::query("DELETE FROM shifts WHERE id = ?")
        .bind(shift_id)
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Shift not found"));
    }

    info!(shift_id, deleted_by = auth.user_id, "Shift deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

/// Put a guard on a shift by hand
///
/// Replaces any current assignment; the allocator never does that.
#[utoipa::path(
    post,
    path = "/api/shifts/{id}/assign",
    params(("id" = u64, Path, description = "Shift id")),
    request_body = AssignShift,
    responses(
        (status = 200, description = "Shift with its new guard", body = ShiftResponse),
        (status = 400, description = "guard_id required"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin/Supervisor only"),
        (status = 404, description = "Guard or shift not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn assign_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;
    let shift_id = path.into_inner();
    let guard_id = optional_id(&body, "guard_id")
        .ok()
        .flatten()
        .ok_or_else(|| ApiError::bad_request("guard_id required"))?;

    if fetch_profile_by_user(pool.get_ref(), guard_id).await?.is_none() {
        return Err(ApiError::not_found("Guard not found"));
    }

    let mut tx = pool.begin().await?;
    let previous = sqlx::query_scalar::<_, Option<u64>>(
        "SELECT assigned_guard_id FROM shifts WHERE id = ? FOR UPDATE",
    )
    .bind(shift_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Shift not found"))?;

    sqlx::query("UPDATE shifts SET assigned_guard_id = ?, assigned_at = ? WHERE id = ?")
        .bind(guard_id)
        .bind(config.local_now())
        .bind(shift_id)
        .execute(&mut *tx)
        .await?;
    let shift = fetch_shift(&mut *tx, shift_id)
        .await?
        .ok_or(ApiError::Internal)?;
    tx.commit().await?;

    info!(
        shift_id,
        guard_id,
        previous_guard = ?previous,
        assigned_by = auth.user_id,
        "Shift assigned manually"
    );
    Ok(HttpResponse::Ok().json(ShiftResponse::from(shift)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{api_app, bearer};
    use crate::model::role::Role;
    use actix_web::test as atest;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn filter_reads_query_flags() {
        let query = ShiftQuery {
            page: None,
            per_page: None,
            premise_id: Some(4),
            date: Some("today".into()),
            unassigned: Some("1".into()),
        };
        let filter = ShiftFilter::from_query(&query, today()).unwrap();
        assert_eq!(filter.premise_id, Some(4));
        assert_eq!(filter.date, Some(today()));
        assert!(filter.unassigned);

        let mut qb = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM shifts s");
        filter.push(&mut qb);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM shifts s WHERE 1 = 1 AND s.premise_id = ? AND s.date = ? AND s.assigned_guard_id IS NULL"
        );
    }

    #[test]
    fn filter_rejects_bad_dates() {
        let query = ShiftQuery {
            page: None,
            per_page: None,
            premise_id: None,
            date: Some("02/03/2026".into()),
            unassigned: None,
        };
        assert!(ShiftFilter::from_query(&query, today()).is_err());
    }

    #[actix_web::test]
    async fn assign_requires_guard_id() {
        let app = api_app!((post, "/shifts/{id}/assign", assign_shift));
        let req = atest::TestRequest::post()
            .uri("/api/shifts/3/assign")
            .insert_header(bearer(1, Role::Admin))
            .set_json(json!({}))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = atest::read_body_json(resp).await;
        assert_eq!(body["detail"][0], "guard_id required");
    }

    #[actix_web::test]
    async fn guards_cannot_assign() {
        let app = api_app!((post, "/shifts/{id}/assign", assign_shift));
        let req = atest::TestRequest::post()
            .uri("/api/shifts/3/assign")
            .insert_header(bearer(9, Role::Guard))
            .set_json(json!({ "guard_id": 9 }))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);
    }

    #[actix_web::test]
    async fn create_validates_times() {
        let app = api_app!((post, "/shifts", create_shift));
        let req = atest::TestRequest::post()
            .uri("/api/shifts")
            .insert_header(bearer(1, Role::Supervisor))
            .set_json(json!({
                "premise_id": 1,
                "date": "2026-03-02",
                "start_time": "8am",
                "end_time": "16:00"
            }))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = atest::read_body_json(resp).await;
        assert_eq!(body["start_time"], "Time must be HH:MM or HH:MM:SS.");
    }

    #[actix_web::test]
    async fn create_requires_date() {
        let app = api_app!((post, "/shifts", create_shift));
        let req = atest::TestRequest::post()
            .uri("/api/shifts")
            .insert_header(bearer(1, Role::Admin))
            .set_json(json!({ "premise_id": 1, "start_time": "08:00", "end_time": "16:00" }))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = atest::read_body_json(resp).await;
        assert_eq!(body["date"], "This field is required.");
    }
}
