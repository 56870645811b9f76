use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GuardStatus {
    OnPatrol,
    OnBreak,
    OffDuty,
    OnSite,
}

/// Guard profile joined with its user row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 3,
        "user_id": 12,
        "username": "wanjiru",
        "skills": "cctv, first aid",
        "experience_years": 4,
        "phone": "+254700000000",
        "qr_uuid": "5b0c3f0e-8d1a-4c55-9a5e-0f5d2f1c9b71",
        "max_consecutive_days": 6,
        "last_seen": null,
        "last_lat": null,
        "last_lng": null,
        "status": "off_duty"
    })
)]
pub struct GuardProfile {
    pub id: u64,
    pub user_id: u64,
    pub username: String,
    pub skills: String,
    pub experience_years: i32,
    pub phone: String,
    pub qr_uuid: String,
    pub max_consecutive_days: i32,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_seen: Option<NaiveDateTime>,
    pub last_lat: Option<f64>,
    pub last_lng: Option<f64>,
    pub status: String,
}

pub const GUARD_PROFILE_SELECT: &str = r#"
    SELECT gp.id, gp.user_id, u.username, gp.skills, gp.experience_years, gp.phone,
           gp.qr_uuid, gp.max_consecutive_days, gp.last_seen, gp.last_lat, gp.last_lng, gp.status
    FROM guard_profiles gp
    JOIN users u ON u.id = gp.user_id
"#;

impl GuardProfile {
    /// Payload encoded in the guard's badge QR.
    pub fn qr_payload(&self) -> serde_json::Value {
        serde_json::json!({ "type": "guard", "id": self.user_id, "uuid": self.qr_uuid })
    }
}

pub async fn fetch_profile_by_user<'e, E>(exec: E, user_id: u64) -> Result<Option<GuardProfile>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let sql = format!("{GUARD_PROFILE_SELECT} WHERE gp.user_id = ?");
    sqlx::query_as::<_, GuardProfile>(&sql)
        .bind(user_id)
        .fetch_optional(exec)
        .await
}

/// Records the guard's latest known activity on their profile.
pub async fn touch_profile<'e, E>(
    exec: E,
    user_id: u64,
    status: GuardStatus,
    at: NaiveDateTime,
    position: Option<(f64, f64)>,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    sqlx::query(
        r#"
        UPDATE guard_profiles
        SET status = ?, last_seen = ?,
            last_lat = COALESCE(?, last_lat), last_lng = COALESCE(?, last_lng)
        WHERE user_id = ?
        "#,
    )
    .bind(status.to_string())
    .bind(at)
    .bind(position.map(|p| p.0))
    .bind(position.map(|p| p.1))
    .bind(user_id)
    .execute(exec)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_uses_snake_case_in_storage() {
        assert_eq!(GuardStatus::OnPatrol.to_string(), "on_patrol");
        assert_eq!(GuardStatus::from_str("off_duty").unwrap(), GuardStatus::OffDuty);
        assert!(GuardStatus::from_str("asleep").is_err());
    }
}
