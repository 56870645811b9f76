use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::premise::{PREMISE_SELECT, Premise, fetch_premise},
    utils::{
        db_utils::{build_update_sql, execute_update},
        geo::valid_coordinates,
        params::{optional_f64, page_window},
    },
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const UPDATABLE: &[&str] = &["name", "address", "required_skills", "lat", "lng", "geofence_radius_m"];

#[derive(Deserialize, ToSchema)]
pub struct CreatePremise {
    #[schema(example = "Westlands Mall")]
    pub name: String,
    #[schema(example = "Waiyaki Way")]
    pub address: Option<String>,
    #[schema(example = "cctv")]
    pub required_skills: Option<String>,
    #[schema(example = -1.2648)]
    pub lat: Option<f64>,
    #[schema(example = 36.8028)]
    pub lng: Option<f64>,
    /// 0 or null disables the geofence
    #[schema(example = 250.0)]
    pub geofence_radius_m: Option<f64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PremiseQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Filter by name or address
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PremiseListResponse {
    pub data: Vec<Premise>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Coordinates must come in pairs and be on the globe; the radius may not be negative.
fn validate_location(body: &Value) -> Result<(), ApiError> {
    let lat = optional_f64(body, "lat")?;
    let lng = optional_f64(body, "lng")?;
    match (lat, lng) {
        (Some(lat), Some(lng)) if !valid_coordinates(lat, lng) => {
            return Err(ApiError::field("lat", "Coordinates out of range."));
        }
        (Some(_), None) => return Err(ApiError::field("lng", "lng is required with lat.")),
        (None, Some(_)) => return Err(ApiError::field("lat", "lat is required with lng.")),
        _ => {}
    }
    if optional_f64(body, "geofence_radius_m")?.is_some_and(|r| r < 0.0) {
        return Err(ApiError::field("geofence_radius_m", "Must not be negative."));
    }
    Ok(())
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, MySql>, query: &'a PremiseQuery) {
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let like = format!("%{}%", search.trim());
        qb.push(" WHERE (name LIKE ")
            .push_bind(like.clone())
            .push(" OR address LIKE ")
            .push_bind(like)
            .push(")");
    }
}

/// List premises
#[utoipa::path(
    get,
    path = "/api/premises",
    params(PremiseQuery),
    responses(
        (status = 200, description = "Paginated premise list", body = PremiseListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Premises"
)]
pub async fn list_premises(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PremiseQuery>,
) -> Result<HttpResponse, ApiError> {
    let (page, per_page, offset) = page_window(query.page, query.per_page);

    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM premises");
    push_filters(&mut count, &query);
    let total = count
        .build_query_scalar::<i64>()
        .fetch_one(pool.get_ref())
        .await?;

    let mut data = QueryBuilder::<MySql>::new(PREMISE_SELECT);
    push_filters(&mut data, &query);
    data.push(" ORDER BY name LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind(offset);
    let premises = data
        .build_query_as::<Premise>()
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(PremiseListResponse {
        data: premises,
        page,
        per_page,
        total,
    }))
}

/// Create a premise
#[utoipa::path(
    post,
    path = "/api/premises",
    request_body = CreatePremise,
    responses(
        (status = 201, description = "Premise created", body = Premise),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin/Supervisor only"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Premises"
)]
pub async fn create_premise(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;

    let name = body
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::field("name", "This field is required."))?;
    let text = |key: &str| {
        body.get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string()
    };
    validate_location(&body)?;

    let id = sqlx::query(
        r#"
        INSERT INTO premises (name, address, required_skills, uuid, lat, lng, geofence_radius_m)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(text("address"))
    .bind(text("required_skills"))
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(optional_f64(&body, "lat")?)
    .bind(optional_f64(&body, "lng")?)
    .bind(optional_f64(&body, "geofence_radius_m")?)
    .execute(pool.get_ref())
    .await?
    .last_insert_id();

    let premise = fetch_premise(pool.get_ref(), id)
        .await?
        .ok_or(ApiError::Internal)?;
    info!(premise_id = id, created_by = auth.user_id, "Premise created");
    Ok(HttpResponse::Created().json(premise))
}

/// Get a premise
#[utoipa::path(
    get,
    path = "/api/premises/{id}",
    params(("id" = u64, Path, description = "Premise id")),
    responses(
        (status = 200, description = "Premise", body = Premise),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Premise not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Premises"
)]
pub async fn get_premise(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let premise = fetch_premise(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Premise not found"))?;
    Ok(HttpResponse::Ok().json(premise))
}

/// Update a premise
#[utoipa::path(
    put,
    path = "/api/premises/{id}",
    params(("id" = u64, Path, description = "Premise id")),
    request_body = CreatePremise,
    responses(
        (status = 200, description = "Updated premise", body = Premise),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin/Supervisor only"),
        (status = 404, description = "Premise not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Premises"
)]
pub async fn update_premise(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;
    let premise_id = path.into_inner();

    let lat = optional_f64(&body, "lat")?;
    let lng = optional_f64(&body, "lng")?;
    if !valid_coordinates(lat.unwrap_or(0.0), lng.unwrap_or(0.0)) {
        return Err(ApiError::field("lat", "Coordinates out of range."));
    }
    if optional_f64(&body, "geofence_radius_m")?.is_some_and(|r| r < 0.0) {
        return Err(ApiError::field("geofence_radius_m", "Must not be negative."));
    }

    let update = build_update_sql("premises", &body, UPDATABLE, "id", premise_id)?;
    execute_update(pool.get_ref(), update).await?;

    let premise = fetch_premise(pool.get_ref(), premise_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Premise not found"))?;
    Ok(HttpResponse::Ok().json(premise))
}

/// Delete a premise and its shifts
#[utoipa::path(
    delete,
    path = "/api/premises/{id}",
    params(("id" = u64, Path, description = "Premise id")),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin/Supervisor only"),
        (status = 404, description = "Premise not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Premises"
)]
pub async fn delete_premise(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;
    let premise_id = path.into_inner();

    let result = sqlx::query("DELETE FROM premises WHERE id = ?")
        .bind(premise_id)
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Premise not found"));
    }

    info!(premise_id, deleted_by = auth.user_id, "Premise deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

/// QR poster payload for a premise
#[utoipa::path(
    get,
    path = "/api/premises/{id}/qr",
    params(("id" = u64, Path, description = "Premise id")),
    responses(
        (status = 200, description = "Poster payload", body = Object, example = json!({
            "type": "premise", "id": 1, "uuid": "0c3c8b56-3a8e-4d5e-9f57-8a1b7a4f7c11"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Premise not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Premises"
)]
pub async fn premise_qr(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let premise = fetch_premise(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Premise not found"))?;
    Ok(HttpResponse::Ok().json(premise.qr_payload()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{api_app, bearer};
    use crate::model::role::Role;
    use actix_web::test as atest;

    #[test]
    fn location_rules() {
        assert!(validate_location(&json!({})).is_ok());
        assert!(validate_location(&json!({ "lat": -1.26, "lng": 36.8, "geofence_radius_m": 0 })).is_ok());
        assert!(validate_location(&json!({ "lat": -1.26 })).is_err());
        assert!(validate_location(&json!({ "lat": 100, "lng": 36.8 })).is_err());
        assert!(validate_location(&json!({ "geofence_radius_m": -5 })).is_err());
    }

    #[actix_web::test]
    async fn create_requires_name() {
        let app = api_app!((post, "/premises", create_premise));
        let req = atest::TestRequest::post()
            .uri("/api/premises")
            .insert_header(bearer(1, Role::Admin))
            .set_json(json!({ "name": "  " }))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = atest::read_body_json(resp).await;
        assert_eq!(body["name"], "This field is required.");
    }

    #[actix_web::test]
    async fn update_rejects_uuid_changes() {
        let app = api_app!((put, "/premises/{id}", update_premise));
        let req = atest::TestRequest::put()
            .uri("/api/premises/1")
            .insert_header(bearer(2, Role::Supervisor))
            .set_json(json!({ "uuid": "0000" }))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }
}
