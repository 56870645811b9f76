use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::{
        guard::{GUARD_PROFILE_SELECT, GuardProfile, GuardStatus, fetch_profile_by_user},
        role::Role,
        user::User,
    },
    utils::{
        db_utils::{build_update_sql, execute_update},
        params::{int_from_value, page_window, required_id},
    },
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use std::str::FromStr;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

const UPDATABLE: &[&str] = &["skills", "experience_years", "phone", "max_consecutive_days", "status"];

#[derive(Deserialize, ToSchema)]
pub struct CreateGuard {
    /// Existing user with the Guard role
    #[schema(example = 12)]
    pub user_id: u64,
    #[schema(example = "cctv, first aid")]
    pub skills: Option<String>,
    #[schema(example = 4)]
    pub experience_years: Option<i32>,
    #[schema(example = "+254700000000")]
    pub phone: Option<String>,
    #[schema(example = 6)]
    pub max_consecutive_days: Option<i32>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateGuard {
    pub skills: Option<String>,
    pub experience_years: Option<i32>,
    pub phone: Option<String>,
    pub max_consecutive_days: Option<i32>,
    #[schema(example = "on_patrol")]
    pub status: Option<GuardStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct GuardQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Filter by username
    pub search: Option<String>,
    /// on_patrol, on_break, off_duty or on_site
    pub status: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct GuardListResponse {
    pub data: Vec<GuardProfile>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, MySql>, query: &'a GuardQuery) {
    qb.push(" WHERE 1 = 1");
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        qb.push(" AND u.username LIKE ").push_bind(format!("%{}%", search.trim()));
    }
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND gp.status = ").push_bind(status);
    }
}

/// List guard profiles
#[utoipa::path(
    get,
    path = "/api/guards",
    params(GuardQuery),
    responses(
        (status = 200, description = "Paginated guard list", body = GuardListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Guards"
)]
pub async fn list_guards(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<GuardQuery>,
) -> Result<HttpResponse, ApiError> {
    let (page, per_page, offset) = page_window(query.page, query.per_page);

    let mut count = QueryBuilder::<MySql>::new(
        "SELECT COUNT(*) FROM guard_profiles gp JOIN users u ON u.id = gp.user_id",
    );
    push_filters(&mut count, &query);
    let total = count
        .build_query_scalar::<i64>()
        .fetch_one(pool.get_ref())
        .await?;

    let mut data = QueryBuilder::<MySql>::new(GUARD_PROFILE_SELECT);
    push_filters(&mut data, &query);
    data.push(" ORDER BY u.username LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind(offset);
    debug!(sql = data.sql(), page, per_page, "Fetching guards");
    let guards = data
        .build_query_as::<GuardProfile>()
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(GuardListResponse {
        data: guards,
        page,
        per_page,
        total,
    }))
}

/// Create a guard profile for an existing user
#[utoipa::path(
    post,
    path = "/api/guards",
    request_body = CreateGuard,
    responses(
        (status = 201, description = "Profile created", body = GuardProfile),
        (status = 400, description = "Invalid payload or user is not a guard"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin/Supervisor only"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Profile already exists"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Guards"
)]
pub async fn create_guard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;

    let user_id = required_id(&body, "user_id")?;
    let skills = body.get("skills").and_then(Value::as_str).unwrap_or("").trim().to_string();
    let phone = body.get("phone").and_then(Value::as_str).unwrap_or("").trim().to_string();
    let experience_years = body
        .get("experience_years")
        .and_then(int_from_value)
        .unwrap_or(0);
    let max_consecutive_days = body
        .get("max_consecutive_days")
        .and_then(int_from_value)
        .unwrap_or(6);
    if experience_years < 0 {
        return Err(ApiError::field("experience_years", "Must not be negative."));
    }
    if max_consecutive_days < 1 {
        return Err(ApiError::field("max_consecutive_days", "Must be at least 1."));
    }

    let user = sqlx::query_as::<_, User>("SELECT id, username, role_id, is_active FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if Role::from_id(user.role_id) != Some(Role::Guard) {
        return Err(ApiError::field("user_id", "User does not have the guard role."));
    }
    if fetch_profile_by_user(pool.get_ref(), user_id).await?.is_some() {
        return Err(ApiError::Conflict("Guard profile already exists".to_string()));
    }

    sqlx::query(
        r#"
        INSERT INTO guard_profiles
            (user_id, skills, experience_years, phone, qr_uuid, max_consecutive_days, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(&skills)
    .bind(experience_years)
    .bind(&phone)
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(max_consecutive_days)
    .bind(GuardStatus::OffDuty.to_string())
    .execute(pool.get_ref())
    .await?;

    let profile = fetch_profile_by_user(pool.get_ref(), user_id)
        .await?
        .ok_or(ApiError::Internal)?;
    info!(user_id, username = %user.username, created_by = auth.user_id, "Guard profile created");
    Ok(HttpResponse::Created().json(profile))
}

/// Get a guard profile by user id
#[utoipa::path(
    get,
    path = "/api/guards/{id}",
    params(("id" = u64, Path, description = "Guard user id")),
    responses(
        (status = 200, description = "Guard profile", body = GuardProfile),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Guard not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Guards"
)]
pub async fn get_guard(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let profile = fetch_profile_by_user(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Guard not found"))?;
    Ok(HttpResponse::Ok().json(profile))
}

/// Update a guard profile
#[utoipa::path(
    put,
    path = "/api/guards/{id}",
    params(("id" = u64, Path, description = "Guard user id")),
    request_body = UpdateGuard,
    responses(
        (status = 200, description = "Updated profile", body = GuardProfile),
        (status = 400, description = "Unknown field or invalid status"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin/Supervisor only"),
        (status = 404, description = "Guard not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Guards"
)]
pub async fn update_guard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;
    let user_id = path.into_inner();

    if let Some(status) = body.get("status") {
        let valid = status.as_str().map(GuardStatus::from_str).is_some_and(|s| s.is_ok());
        if !valid {
            return Err(ApiError::field("status", "Invalid guard status."));
        }
    }

    let update = build_update_sql("guard_profiles", &body, UPDATABLE, "user_id", user_id)?;
    execute_update(pool.get_ref(), update).await?;

    let profile = fetch_profile_by_user(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Guard not found"))?;
    Ok(HttpResponse::Ok().json(profile))
}

/// Delete a guard profile
#[utoipa::path(
    delete,
    path = "/api/guards/{id}",
    params(("id" = u64, Path, description = "Guard user id")),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin/Supervisor only"),
        (status = 404, description = "Guard not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Guards"
)]
pub async fn delete_guard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;
    let user_id = path.into_inner();

    let result = sqlx::query("DELETE FROM guard_profiles WHERE user_id = ?")
        .bind(user_id)
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Guard not found"));
    }

    info!(user_id, deleted_by = auth.user_id, "Guard profile deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

/// QR badge payload for a guard
#[utoipa::path(
    get,
    path = "/api/guards/{id}/qr",
    params(("id" = u64, Path, description = "Guard user id")),
    responses(
        (status = 200, description = "Badge payload", body = Object, example = json!({
            "type": "guard", "id": 12, "uuid": "5b0c3f0e-8d1a-4c55-9a5e-0f5d2f1c9b71"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Guard not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Guards"
)]
pub async fn guard_qr(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let profile = fetch_profile_by_user(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Guard not found"))?;
    Ok(HttpResponse::Ok().json(profile.qr_payload()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{api_app, bearer};
    use actix_web::test as atest;

    #[actix_web::test]
    async fn guards_cannot_edit_profiles() {
        let app = api_app!(
            (post, "/guards", create_guard),
            (put, "/guards/{id}", update_guard),
            (delete, "/guards/{id}", delete_guard),
        );
        let requests = [
            atest::TestRequest::post().uri("/api/guards").set_json(json!({ "user_id": 12 })),
            atest::TestRequest::put().uri("/api/guards/12").set_json(json!({ "skills": "k9" })),
            atest::TestRequest::delete().uri("/api/guards/12"),
        ];
        for req in requests {
            let resp = atest::call_service(&app, req.insert_header(bearer(12, Role::Guard)).to_request()).await;
            assert_eq!(resp.status(), 403);
        }
    }

    #[actix_web::test]
    async fn update_rejects_unknown_status() {
        let app = api_app!((put, "/guards/{id}", update_guard));
        let req = atest::TestRequest::put()
            .uri("/api/guards/12")
            .insert_header(bearer(1, Role::Admin))
            .set_json(json!({ "status": "asleep" }))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = atest::read_body_json(resp).await;
        assert_eq!(body["status"], "Invalid guard status.");
    }

    #[actix_web::test]
    async fn update_rejects_columns_outside_whitelist() {
        let app = api_app!((put, "/guards/{id}", update_guard));
        let req = atest::TestRequest::put()
            .uri("/api/guards/12")
            .insert_header(bearer(1, Role::Admin))
            .set_json(json!({ "qr_uuid": "forged" }))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn create_validates_before_lookup() {
        let app = api_app!((post, "/guards", create_guard));
        let req = atest::TestRequest::post()
            .uri("/api/guards")
            .insert_header(bearer(1, Role::Admin))
            .set_json(json!({ "user_id": 12, "max_consecutive_days": 0 }))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }
}
