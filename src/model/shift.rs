use crate::model::{premise::PremiseRef, user::UserRef};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, MySql, QueryBuilder};
use utoipa::ToSchema;

/// Shift joined with its premise name and assigned guard username.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ShiftRow {
    pub id: u64,
    pub premise_id: u64,
    pub premise_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub required_skills: String,
    pub assigned_guard_id: Option<u64>,
    pub assigned_guard_username: Option<String>,
    pub assigned_at: Option<NaiveDateTime>,
}

pub const SHIFT_SELECT: &str = r#"
    SELECT s.id, s.premise_id, p.name AS premise_name, s.date, s.start_time, s.end_time,
           s.required_skills, s.assigned_guard_id, u.username AS assigned_guard_username,
           s.assigned_at
    FROM shifts s
    JOIN premises p ON p.id = s.premise_id
    LEFT JOIN users u ON u.id = s.assigned_guard_id
"#;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": 41,
        "premise": { "id": 1, "name": "Westlands Mall" },
        "date": "2026-03-02",
        "start_time": "08:00:00",
        "end_time": "16:00:00",
        "required_skills": "cctv, first aid",
        "assigned_guard": { "id": 12, "username": "wanjiru" },
        "assigned_at": "2026-03-01T17:42:10"
    })
)]
pub struct ShiftResponse {
    pub id: u64,
    pub premise: PremiseRef,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = String, format = "time")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, format = "time")]
    pub end_time: NaiveTime,
    pub required_skills: String,
    pub assigned_guard: Option<UserRef>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub assigned_at: Option<NaiveDateTime>,
}

impl From<ShiftRow> for ShiftResponse {
    fn from(row: ShiftRow) -> Self {
        let assigned_guard = match (row.assigned_guard_id, row.assigned_guard_username) {
            (Some(id), Some(username)) => Some(UserRef { id, username }),
            _ => None,
        };
        ShiftResponse {
            id: row.id,
            premise: PremiseRef {
                id: row.premise_id,
                name: row.premise_name,
            },
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            required_skills: row.required_skills,
            assigned_guard,
            assigned_at: row.assigned_at,
        }
    }
}

pub async fn fetch_shift<'e, E>(exec: E, id: u64) -> Result<Option<ShiftRow>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let sql = format!("{SHIFT_SELECT} WHERE s.id = ?");
    sqlx::query_as::<_, ShiftRow>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await
}

pub async fn fetch_shifts_by_ids<'e, E>(exec: E, ids: &[u64]) -> Result<Vec<ShiftRow>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = QueryBuilder::<MySql>::new(SHIFT_SELECT);
    qb.push(" WHERE s.id IN (");
    let mut sep = qb.separated(", ");
    for id in ids {
        sep.push_bind(*id);
    }
    sep.push_unseparated(") ORDER BY s.date, s.start_time");
    qb.build_query_as::<ShiftRow>().fetch_all(exec).await
}
