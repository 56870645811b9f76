use crate::{
    allocation::{
        GuardCandidate, OpenShift,
        apply::claim_shift,
        planner::{Planner, RankedCandidate, ShiftOutcome},
        roster,
        scoring::{ScoreBreakdown, ScoringPolicy},
        skills::parse_tags,
    },
    auth::auth::AuthUser,
    config::Config,
    error::ApiError,
    model::{
        premise::fetch_premise,
        shift::{SHIFT_SELECT, ShiftResponse, ShiftRow, fetch_shift, fetch_shifts_by_ids},
    },
    utils::{
        params::{datetime_bound, day_from_value, int_from_value, limit, optional_id, required_id},
        qr::{QrPayload, QrRef},
    },
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use std::collections::BTreeMap;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

const MAX_DAY_RANGE: i64 = 31;

#[derive(Deserialize, ToSchema)]
pub struct AllocateRequest {
    #[schema(example = 1)]
    pub premise_id: u64,
    #[schema(example = "2026-03-02")]
    pub date: Option<String>,
    #[schema(example = 1)]
    pub limit_per_shift: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Assignment {
    pub shift_id: u64,
    pub assigned_guard_id: u64,
    pub guard_username: String,
    pub premise_id: u64,
    pub premise_name: String,
    pub score: f64,
    #[schema(value_type = String, format = "date-time")]
    pub assigned_at: NaiveDateTime,
    pub matched_skills: Vec<String>,
    pub partial_skills: Vec<String>,
    pub required_skills: Vec<String>,
}

impl Assignment {
    fn new(shift: &OpenShift, candidate: &RankedCandidate, at: NaiveDateTime) -> Self {
        Assignment {
            shift_id: shift.id,
            assigned_guard_id: candidate.guard_id,
            guard_username: candidate.username.clone(),
            premise_id: shift.premise_id,
            premise_name: shift.premise_name.clone(),
            score: candidate.score,
            assigned_at: at,
            matched_skills: candidate.skills.exact.clone(),
            partial_skills: candidate.skills.partial.clone(),
            required_skills: shift.required_skills.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AllocateResponse {
    pub assignments: Vec<Assignment>,
    pub updated_shifts: Vec<ShiftResponse>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Assign the best guards to the open shifts of one premise on one day
#[utoipa::path(
    post,
    path = "/api/allocate",
    request_body = AllocateRequest,
    responses(
        (status = 200, description = "Allocation run finished", body = AllocateResponse),
        (status = 400, description = "Invalid premise_id or date", body = Object, example = json!({
            "premise_id": "This field is required."
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin/Supervisor only"),
        (status = 404, description = "Premise not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Allocation"
)]
pub async fn allocate(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;

    let premise_id = required_id(&body, "premise_id")?;
    let date = day_from_value(body.get("date"), config.local_today())?;
    // A shift holds a single guard, so larger values behave like 1.
    let limit_per_shift = body
        .get("limit_per_shift")
        .and_then(int_from_value)
        .unwrap_or(1)
        .max(1);

    let premise = fetch_premise(pool.get_ref(), premise_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Premise not found"))?;

    let mut tx = pool.begin().await?;

    let shifts = roster::load_open_shifts(&mut *tx, date, Some(premise.id)).await?;
    if shifts.is_empty() {
        tx.rollback().await?;
        return Ok(HttpResponse::Ok().json(AllocateResponse {
            assignments: Vec::new(),
            updated_shifts: Vec::new(),
            count: 0,
            detail: Some("No unassigned shifts found for that premise and date.".to_string()),
        }));
    }

    let guards = roster::load_guards(&mut *tx).await?;
    let policy = ScoringPolicy::from_config(&config);
    let existing = roster::load_roster(&mut *tx, date, date, policy.lookback_days(&guards)).await?;

    let mut planner = Planner::new(&policy, &guards, existing);
    let plans = planner.plan(&shifts);

    let now = config.local_now();
    let mut assignments = Vec::new();
    for plan in &plans {
        let ShiftOutcome::Assigned(candidate) = &plan.outcome else {
            debug!(shift_id = plan.shift.id, "No eligible guard for shift");
            continue;
        };
        if claim_shift(&mut *tx, plan.shift.id, candidate.guard_id, now).await? {
            debug!(
                shift_id = plan.shift.id,
                guard_id = candidate.guard_id,
                score = candidate.score,
                "Shift assigned"
            );
            assignments.push(Assignment::new(&plan.shift, candidate, now));
        }
    }

    let ids: Vec<u64> = assignments.iter().map(|a| a.shift_id).collect();
    let updated_shifts = fetch_shifts_by_ids(&mut *tx, &ids).await?;
    tx.commit().await?;

    info!(
        premise_id,
        %date,
        limit_per_shift,
        open_shifts = shifts.len(),
        candidates = guards.len(),
        assigned = assignments.len(),
        "Allocation run finished"
    );

    Ok(HttpResponse::Ok().json(AllocateResponse {
        count: assignments.len(),
        assignments,
        updated_shifts: updated_shifts.into_iter().map(ShiftResponse::from).collect(),
        detail: None,
    }))
}

#[derive(Deserialize, ToSchema)]
pub struct AllocateDayRequest {
    #[schema(example = "2026-03-02")]
    pub date: Option<String>,
    #[schema(example = "2026-03-08")]
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ShiftRunResult {
    Assigned {
        assigned_guard_id: u64,
        assigned_guard_username: String,
        score: f64,
        breakdown: ScoreBreakdown,
    },
    AlreadyAssigned {
        assigned_guard_id: Option<u64>,
        assigned_guard_username: Option<String>,
    },
    NoCandidates,
}

#[derive(Debug, Default, Serialize)]
pub struct DaySummary {
    pub total_shifts: usize,
    pub assigned: usize,
    pub unassigned: usize,
}

#[derive(Debug, Serialize)]
pub struct DayRun {
    pub date: NaiveDate,
    pub summary: DaySummary,
    pub shifts: BTreeMap<u64, ShiftRunResult>,
}

impl DayRun {
    /// Only shifts placed by this run count as assigned; shifts that were
    /// already held count towards neither total.
    fn record(&mut self, shift_id: u64, result: ShiftRunResult) {
        match result {
            ShiftRunResult::Assigned { .. } => self.summary.assigned += 1,
            ShiftRunResult::NoCandidates => self.summary.unassigned += 1,
            ShiftRunResult::AlreadyAssigned { .. } => {}
        }
        self.shifts.insert(shift_id, result);
    }
}

/// Inclusive date range, at most `MAX_DAY_RANGE` days long.
fn day_range(body: &Value, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), ApiError> {
    let start = day_from_value(body.get("date"), today)?;
    let end = match body.get("end_date") {
        None | Some(Value::Null) => start,
        Some(v) => day_from_value(Some(v), today)
            .map_err(|_| ApiError::field("end_date", "Invalid date format, use YYYY-MM-DD."))?,
    };
    if end < start {
        return Err(ApiError::field("end_date", "end_date must not be before date."));
    }
    if (end - start).num_days() >= MAX_DAY_RANGE {
        return Err(ApiError::field(
            "end_date",
            format!("Date range may span at most {MAX_DAY_RANGE} days."),
        ));
    }
    Ok((start, end))
}

/// Allocate every premise's open shifts, one date at a time
#[utoipa::path(
    post,
    path = "/api/allocate/day",
    request_body = AllocateDayRequest,
    responses(
        (status = 200, description = "Per-date allocation results", body = Object, example = json!({
            "days": [{
                "date": "2026-03-02",
                "summary": { "total_shifts": 3, "assigned": 1, "unassigned": 1 },
                "shifts": {
                    "41": { "status": "assigned", "assigned_guard_id": 12, "assigned_guard_username": "wanjiru", "score": 24.0 },
                    "42": { "status": "already_assigned", "assigned_guard_id": 15, "assigned_guard_username": "otieno" },
                    "43": { "status": "no_candidates" }
                }
            }]
        })),
        (status = 400, description = "Invalid date range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin/Supervisor only"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Allocation"
)]
pub async fn allocate_day(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_staff()?;
    let (start, end) = day_range(&body, config.local_today())?;

    let mut tx = pool.begin().await?;
    let guards = roster::load_guards(&mut *tx).await?;
    let policy = ScoringPolicy::from_config(&config);
    let mut booked = roster::load_roster(&mut *tx, start, end, policy.lookback_days(&guards)).await?;

    let now = config.local_now();
    let mut days = Vec::new();
    let mut date = start;
    while date <= end {
        let sql = format!("{SHIFT_SELECT} WHERE s.date = ? ORDER BY s.start_time, s.id");
        let rows = sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(date)
            .fetch_all(&mut *tx)
            .await?;

        let mut run = DayRun {
            date,
            summary: DaySummary {
                total_shifts: rows.len(),
                ..DaySummary::default()
            },
            shifts: BTreeMap::new(),
        };

        let mut open = Vec::new();
        for row in rows {
            match row.assigned_guard_id {
                Some(guard_id) => {
                    let result = ShiftRunResult::AlreadyAssigned {
                        assigned_guard_id: Some(guard_id),
                        assigned_guard_username: row.assigned_guard_username,
                    };
                    run.record(row.id, result);
                }
                None => open.push(OpenShift::from(row)),
            }
        }

        let mut planner = Planner::new(&policy, &guards, booked);
        let mut lost = Vec::new();
        for plan in planner.plan(&open) {
            let result = match plan.outcome {
                ShiftOutcome::Assigned(c) => {
                    if claim_shift(&mut *tx, plan.shift.id, c.guard_id, now).await? {
                        ShiftRunResult::Assigned {
                            assigned_guard_id: c.guard_id,
                            assigned_guard_username: c.username,
                            score: c.score,
                            breakdown: c.breakdown,
                        }
                    } else {
                        let holder = fetch_shift(&mut *tx, plan.shift.id).await?;
                        let (holder_id, holder_name) = holder
                            .map(|row| (row.assigned_guard_id, row.assigned_guard_username))
                            .unwrap_or((None, None));
                        debug!(shift_id = plan.shift.id, planned = c.guard_id, holder = ?holder_id, "Lost claim");
                        lost.push((plan.shift.id, holder_id));
                        ShiftRunResult::AlreadyAssigned {
                            assigned_guard_id: holder_id,
                            assigned_guard_username: holder_name,
                        }
                    }
                }
                ShiftOutcome::NoCandidates => ShiftRunResult::NoCandidates,
            };
            run.record(plan.shift.id, result);
        }
        booked = planner.into_roster();
        for (shift_id, holder) in lost {
            booked.set_holder(shift_id, holder);
        }

        info!(
            %date,
            total = run.summary.total_shifts,
            assigned = run.summary.assigned,
            unassigned = run.summary.unassigned,
            "Day allocation finished"
        );
        days.push(run);
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    tx.commit().await?;
    Ok(HttpResponse::Ok().json(json!({ "days": days })))
}

#[derive(Deserialize, ToSchema)]
pub struct ScanGuardRequest {
    #[schema(example = 12)]
    pub guard_id: Option<u64>,
    #[schema(value_type = Object, example = json!({ "type": "guard", "id": 12, "uuid": "5b0c3f0e-8d1a-4c55-9a5e-0f5d2f1c9b71" }))]
    pub qr_payload: Option<Value>,
    #[schema(example = "cctv, first aid")]
    pub guard_skills: Option<String>,
    pub premise_id: Option<u64>,
    pub date: Option<String>,
}

/// Skills given as a comma-separated string or an array of strings.
fn skills_from_value(value: Option<&Value>) -> Option<Vec<String>> {
    match value? {
        Value::String(s) => Some(parse_tags(s)),
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(",");
            Some(parse_tags(&joined))
        }
        _ => None,
    }
}

async fn resolve_scanned_guard(
    pool: &MySqlPool,
    auth: &AuthUser,
    body: &Value,
) -> Result<u64, ApiError> {
    if let Some(qr) = QrPayload::parse_optional(body.get("qr_payload"))? {
        if let Some(kind) = qr.kind() {
            if kind != "guard" {
                return Err(ApiError::field("qr_payload", "QR code is not a guard badge."));
            }
        }
        return match qr.badge()? {
            Some(QrRef::Id(id)) => Ok(id),
            Some(QrRef::Uuid(uuid)) => {
                let owner = sqlx::query_scalar::<_, u64>("SELECT user_id FROM guard_profiles WHERE qr_uuid = ?")
                    .bind(uuid)
                    .fetch_optional(pool)
                    .await?
                    .ok_or_else(|| ApiError::not_found("Guard not found"))?;
                qr.confirm_owner(owner)
            }
            None => Err(ApiError::field("qr_payload", "Missing 'uuid' or 'id' in qr_payload.")),
        };
    }
    Ok(optional_id(body, "guard_id")?.unwrap_or(auth.user_id))
}

/// Place a single scanned guard on the best open shift
#[utoipa::path(
    post,
    path = "/api/allocate/scan_guard",
    request_body = ScanGuardRequest,
    responses(
        (status = 200, description = "Scan result", body = Object, example = json!({
            "assigned": false,
            "reason": "no suitable shift"
        })),
        (status = 400, description = "Invalid qr_payload, guard_id or date"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only staff may allocate another guard"),
        (status = 404, description = "Guard not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Allocation"
)]
pub async fn scan_guard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let date = day_from_value(body.get("date"), config.local_today())?;
    let premise_id = optional_id(&body, "premise_id")?;

    let guard_id = resolve_scanned_guard(pool.get_ref(), &auth, &body).await?;
    if guard_id != auth.user_id {
        auth.require_staff()?;
    }

    let mut guard: GuardCandidate = roster::load_guard(pool.get_ref(), guard_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Guard not found"))?;
    if let Some(skills) = skills_from_value(body.get("guard_skills")) {
        guard.skills = skills;
    }

    let mut tx = pool.begin().await?;
    let shifts = roster::load_open_shifts(&mut *tx, date, premise_id).await?;
    let policy = ScoringPolicy::from_config(&config);
    let existing = roster::load_roster(&mut *tx, date, date, policy.lookback_days(std::slice::from_ref(&guard))).await?;

    let planner = Planner::new(&policy, &[], existing);
    let (shift, candidate) = match planner.best_shift_for(&guard, &shifts) {
        Ok(found) => found,
        Err(rejection) => {
            tx.rollback().await?;
            debug!(guard_id, %date, reason = rejection.reason(), "Scan found no shift");
            return Ok(HttpResponse::Ok().json(json!({
                "assigned": false,
                "reason": rejection.reason(),
            })));
        }
    };

    let now = config.local_now();
    if !claim_shift(&mut *tx, shift.id, guard_id, now).await? {
        tx.rollback().await?;
        return Ok(HttpResponse::Ok().json(json!({
            "assigned": false,
            "reason": "no suitable shift",
        })));
    }
    tx.commit().await?;

    info!(guard_id, shift_id = shift.id, score = candidate.score, "Scanned guard assigned");
    Ok(HttpResponse::Ok().json(json!({
        "assigned": true,
        "assignment": Assignment::new(&shift, &candidate, now),
    })))
}

#[derive(Deserialize, IntoParams)]
pub struct RecentQuery {
    /// ISO datetime or date; only assignments at or after it
    pub since: Option<String>,
    /// Defaults to 50, at most 200
    pub limit: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct RecentAssignment {
    pub shift: ShiftResponse,
    pub assigned_guard_id: Option<u64>,
    pub guard_username: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub assigned_at: Option<NaiveDateTime>,
}

/// Latest assignments, newest first; clients poll this for live updates
#[utoipa::path(
    get,
    path = "/api/assignments/recent",
    params(RecentQuery),
    responses(
        (status = 200, description = "Recent assignments", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Allocation"
)]
pub async fn recent_assignments(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<RecentQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = limit(query.limit.as_deref(), 50, 200);
    let since = query
        .since
        .as_deref()
        .and_then(|s| datetime_bound(s, config.time_zone, false));

    let rows = match since {
        Some(since) => {
            let sql = format!(
                "{SHIFT_SELECT} WHERE s.assigned_guard_id IS NOT NULL AND s.assigned_at >= ? ORDER BY s.assigned_at DESC, s.id DESC LIMIT ?"
            );
            sqlx::query_as::<_, ShiftRow>(&sql)
                .bind(since)
                .bind(limit)
                .fetch_all(pool.get_ref())
                .await?
        }
        None => {
            let sql = format!(
                "{SHIFT_SELECT} WHERE s.assigned_guard_id IS NOT NULL ORDER BY s.assigned_at DESC, s.id DESC LIMIT ?"
            );
            sqlx::query_as::<_, ShiftRow>(&sql)
                .bind(limit)
                .fetch_all(pool.get_ref())
                .await?
        }
    };

    let assignments: Vec<RecentAssignment> = rows
        .into_iter()
        .map(|row| RecentAssignment {
            assigned_guard_id: row.assigned_guard_id,
            guard_username: row.assigned_guard_username.clone(),
            assigned_at: row.assigned_at,
            shift: ShiftResponse::from(row),
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "assignments": assignments })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{api_app, bearer, body_json, holder_of, seed_guard, seed_premise, seed_shift, user};
    use crate::model::role::Role;
    use actix_web::test as atest;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn day_range_defaults_to_single_day() {
        let (start, end) = day_range(&json!({ "date": "2026-03-05" }), today()).unwrap();
        assert_eq!(start, end);
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 3, 5).unwrap());
    }

    #[test]
    fn day_range_rejects_reversed_and_long_ranges() {
        assert!(day_range(&json!({ "date": "2026-03-05", "end_date": "2026-03-04" }), today()).is_err());
        assert!(day_range(&json!({ "date": "2026-03-01", "end_date": "2026-04-01" }), today()).is_err());
        assert!(day_range(&json!({ "date": "2026-03-01", "end_date": "2026-03-31" }), today()).is_ok());
    }

    #[test]
    fn guard_skills_accept_string_or_array() {
        assert_eq!(
            skills_from_value(Some(&json!("CCTV, first aid"))),
            Some(vec!["cctv".to_string(), "first aid".to_string()])
        );
        assert_eq!(
            skills_from_value(Some(&json!(["K9", " patrol "]))),
            Some(vec!["k9".to_string(), "patrol".to_string()])
        );
        assert_eq!(skills_from_value(Some(&json!(5))), None);
        assert_eq!(skills_from_value(None), None);
    }

    #[actix_web::test]
    async fn allocate_requires_staff() {
        let app = api_app!((post, "/allocate", allocate));
        let req = atest::TestRequest::post()
            .uri("/api/allocate")
            .insert_header(bearer(12, Role::Guard))
            .set_json(json!({ "premise_id": 1 }))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);
    }

    #[actix_web::test]
    async fn allocate_requires_premise_id() {
        let app = api_app!((post, "/allocate", allocate));
        let req = atest::TestRequest::post()
            .uri("/api/allocate")
            .insert_header(bearer(1, Role::Admin))
            .set_json(json!({ "date": "today" }))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = atest::read_body_json(resp).await;
        assert_eq!(body["premise_id"], "This field is required.");
    }

    #[actix_web::test]
    async fn allocate_rejects_malformed_input() {
        let app = api_app!((post, "/allocate", allocate));
        for payload in [
            json!({ "premise_id": "abc" }),
            json!({ "premise_id": 1, "date": "02/03/2026" }),
            json!({ "premise_id": 1, "date": 20260302 }),
        ] {
            let req = atest::TestRequest::post()
                .uri("/api/allocate")
                .insert_header(bearer(1, Role::Supervisor))
                .set_json(payload)
                .to_request();
            let resp = atest::call_service(&app, req).await;
            assert_eq!(resp.status(), 400);
        }
    }

    #[actix_web::test]
    async fn scan_guard_rejects_premise_qr() {
        let app = api_app!((post, "/allocate/scan_guard", scan_guard));
        let req = atest::TestRequest::post()
            .uri("/api/allocate/scan_guard")
            .insert_header(bearer(1, Role::Admin))
            .set_json(json!({ "qr_payload": "{'type': 'premise', 'id': 4}" }))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = atest::read_body_json(resp).await;
        assert_eq!(body["qr_payload"], "QR code is not a guard badge.");
    }

    #[actix_web::test]
    async fn scan_guard_for_someone_else_needs_staff() {
        let app = api_app!((post, "/allocate/scan_guard", scan_guard));
        let req = atest::TestRequest::post()
            .uri("/api/allocate/scan_guard")
            .insert_header(bearer(12, Role::Guard))
            .set_json(json!({ "guard_id": 13 }))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);
    }

    #[actix_web::test]
    async fn day_run_validates_range_before_work() {
        let app = api_app!((post, "/allocate/day", allocate_day));
        let req = atest::TestRequest::post()
            .uri("/api/allocate/day")
            .insert_header(bearer(1, Role::Admin))
            .set_json(json!({ "date": "2026-03-10", "end_date": "2026-03-01" }))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = atest::read_body_json(resp).await;
        assert!(body["end_date"].is_string());
    }

    #[test]
    fn day_summary_counts_only_new_placements() {
        let mut run = DayRun {
            date: today(),
            summary: DaySummary {
                total_shifts: 3,
                ..DaySummary::default()
            },
            shifts: BTreeMap::new(),
        };
        run.record(
            41,
            ShiftRunResult::AlreadyAssigned {
                assigned_guard_id: Some(15),
                assigned_guard_username: Some("otieno".to_string()),
            },
        );
        run.record(
            42,
            ShiftRunResult::Assigned {
                assigned_guard_id: 12,
                assigned_guard_username: "wanjiru".to_string(),
                score: 24.0,
                breakdown: ScoreBreakdown::default(),
            },
        );
        run.record(43, ShiftRunResult::NoCandidates);

        assert_eq!(run.summary.total_shifts, 3);
        assert_eq!(run.summary.assigned, 1);
        assert_eq!(run.summary.unassigned, 1);
        assert_eq!(run.shifts.len(), 3);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn allocate_leaves_taken_shift_alone(pool: MySqlPool) {
        let (holder, _) = seed_guard(&pool, "wanjiru", "cctv").await;
        seed_guard(&pool, "otieno", "cctv").await;
        let premise = seed_premise(&pool, "Westlands Mall").await;
        let taken = seed_shift(&pool, premise, "2026-03-02", (8, 16), Some(holder)).await;
        let open = seed_shift(&pool, premise, "2026-03-02", (18, 23), None).await;

        let resp = allocate(
            user(1, Role::Admin),
            web::Data::new(pool.clone()),
            web::Data::new(Config::for_tests()),
            web::Json(json!({ "premise_id": premise, "date": "2026-03-02" })),
        )
        .await
        .unwrap();
        let body = body_json(resp).await;

        assert_eq!(body["count"], 1);
        assert_eq!(body["assignments"][0]["shift_id"], open);
        assert_eq!(holder_of(&pool, taken).await, Some(holder));
        assert!(holder_of(&pool, open).await.is_some());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn day_run_reports_held_new_and_unfilled_shifts(pool: MySqlPool) {
        let (holder, _) = seed_guard(&pool, "wanjiru", "").await;
        let (free, _) = seed_guard(&pool, "otieno", "").await;
        let premise = seed_premise(&pool, "Westlands Mall").await;
        let taken = seed_shift(&pool, premise, "2026-03-02", (8, 16), Some(holder)).await;
        // Both overlap the held shift, and the free guard can take only one per run.
        let first = seed_shift(&pool, premise, "2026-03-02", (9, 12), None).await;
        let second = seed_shift(&pool, premise, "2026-03-02", (9, 12), None).await;

        let resp = allocate_day(
            user(1, Role::Admin),
            web::Data::new(pool.clone()),
            web::Data::new(Config::for_tests()),
            web::Json(json!({ "date": "2026-03-02" })),
        )
        .await
        .unwrap();
        let body = body_json(resp).await;
        let day = &body["days"][0];

        assert_eq!(day["summary"], json!({ "total_shifts": 3, "assigned": 1, "unassigned": 1 }));
        assert_eq!(day["shifts"][taken.to_string()]["status"], "already_assigned");
        assert_eq!(day["shifts"][taken.to_string()]["assigned_guard_id"], holder);
        assert_eq!(day["shifts"][first.to_string()]["assigned_guard_id"], free);
        assert_eq!(day["shifts"][second.to_string()]["status"], "no_candidates");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn scan_resolves_badge_by_uuid(pool: MySqlPool) {
        let (owner, owner_uuid) = seed_guard(&pool, "wanjiru", "").await;
        let (other, _) = seed_guard(&pool, "otieno", "").await;
        let premise = seed_premise(&pool, "Westlands Mall").await;
        let shift = seed_shift(&pool, premise, "2026-03-02", (8, 16), None).await;

        let scan = |qr: Value| {
            scan_guard(
                user(1, Role::Supervisor),
                web::Data::new(pool.clone()),
                web::Data::new(Config::for_tests()),
                web::Json(json!({ "qr_payload": qr, "date": "2026-03-02" })),
            )
        };

        let err = scan(json!({ "type": "guard", "id": other, "uuid": owner_uuid }))
            .await
            .unwrap_err();
        let body = body_json(actix_web::ResponseError::error_response(&err)).await;
        assert_eq!(body["qr_payload"], "QR id and uuid do not match.");
        assert_eq!(holder_of(&pool, shift).await, None);

        let body = body_json(scan(json!({ "type": "guard", "uuid": owner_uuid })).await.unwrap()).await;
        assert_eq!(body["assigned"], true);
        assert_eq!(body["assignment"]["assigned_guard_id"], owner);
        assert_eq!(holder_of(&pool, shift).await, Some(owner));
    }
}
