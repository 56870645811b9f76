use crate::allocation::{
    Booking, GuardCandidate, OpenShift, Roster, ShiftSpan, skills::parse_tags,
};
use crate::model::role::Role;
use crate::model::shift::{SHIFT_SELECT, ShiftRow};
use chrono::{Duration, NaiveDate, NaiveTime};
use sqlx::{Executor, MySql};

#[derive(sqlx::FromRow)]
struct GuardRow {
    user_id: u64,
    username: String,
    skills: String,
    experience_years: i32,
    max_consecutive_days: i32,
}

impl From<GuardRow> for GuardCandidate {
    fn from(row: GuardRow) -> Self {
        GuardCandidate {
            user_id: row.user_id,
            username: row.username,
            skills: parse_tags(&row.skills),
            experience_years: row.experience_years,
            max_consecutive_days: u32::try_from(row.max_consecutive_days).ok(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    guard_id: u64,
    shift_id: u64,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
}

impl From<ShiftRow> for OpenShift {
    fn from(row: ShiftRow) -> Self {
        OpenShift {
            id: row.id,
            premise_id: row.premise_id,
            premise_name: row.premise_name,
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            required_skills: parse_tags(&row.required_skills),
        }
    }
}

const GUARD_CANDIDATE_SELECT: &str = r#"
    SELECT gp.user_id, u.username, gp.skills, gp.experience_years, gp.max_consecutive_days
    FROM guard_profiles gp
    JOIN users u ON u.id = gp.user_id
    WHERE u.role_id = ? AND u.is_active = TRUE
"#;

/// Active guards with a profile, ordered by user id.
pub async fn load_guards<'e, E>(exec: E) -> Result<Vec<GuardCandidate>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let sql = format!("{GUARD_CANDIDATE_SELECT} ORDER BY gp.user_id");
    let rows = sqlx::query_as::<_, GuardRow>(&sql)
        .bind(Role::Guard as u8)
        .fetch_all(exec)
        .await?;
    Ok(rows.into_iter().map(GuardCandidate::from).collect())
}

pub async fn load_guard<'e, E>(exec: E, user_id: u64) -> Result<Option<GuardCandidate>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let sql = format!("{GUARD_CANDIDATE_SELECT} AND gp.user_id = ?");
    let row = sqlx::query_as::<_, GuardRow>(&sql)
        .bind(Role::Guard as u8)
        .bind(user_id)
        .fetch_optional(exec)
        .await?;
    Ok(row.map(GuardCandidate::from))
}

/// Assignments that can influence planning for `from..=to`: the lookback
/// needed for consecutive-day and fairness rules, plus the neighbouring days
/// whose overnight shifts may overlap.
pub async fn load_roster<'e, E>(
    exec: E,
    from: NaiveDate,
    to: NaiveDate,
    lookback_days: u32,
) -> Result<Roster, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let start = from
        .checked_sub_signed(Duration::days(i64::from(lookback_days) + 1))
        .unwrap_or(NaiveDate::MIN);
    let end = to.succ_opt().unwrap_or(to);

    let rows = sqlx::query_as::<_, BookingRow>(
        r#"
        SELECT assigned_guard_id AS guard_id, id AS shift_id, date, start_time, end_time
        FROM shifts
        WHERE assigned_guard_id IS NOT NULL
          AND date BETWEEN ? AND ?
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(exec)
    .await?;

    Ok(Roster::new(
        rows.into_iter()
            .map(|r| Booking {
                guard_id: r.guard_id,
                shift_id: r.shift_id,
                date: r.date,
                span: ShiftSpan::new(r.date, r.start_time, r.end_time),
            })
            .collect(),
    ))
}

/// Unassigned shifts on `date`, optionally for one premise, by start time.
pub async fn load_open_shifts<'e, E>(
    exec: E,
    date: NaiveDate,
    premise_id: Option<u64>,
) -> Result<Vec<OpenShift>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let rows = match premise_id {
        Some(premise_id) => {
            let sql = format!(
                "{SHIFT_SELECT} WHERE s.date = ? AND s.premise_id = ? AND s.assigned_guard_id IS NULL ORDER BY s.start_time, s.id"
            );
            sqlx::query_as::<_, ShiftRow>(&sql)
                .bind(date)
                .bind(premise_id)
                .fetch_all(exec)
                .await?
        }
        None => {
            let sql = format!(
                "{SHIFT_SELECT} WHERE s.date = ? AND s.assigned_guard_id IS NULL ORDER BY s.start_time, s.id"
            );
            sqlx::query_as::<_, ShiftRow>(&sql)
                .bind(date)
                .fetch_all(exec)
                .await?
        }
    };
    Ok(rows.into_iter().map(OpenShift::from).collect())
}
