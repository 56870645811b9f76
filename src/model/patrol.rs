use crate::model::user::UserRef;
use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PatrolRow {
    pub id: u64,
    pub guard_id: u64,
    pub guard_username: String,
    pub shift_id: u64,
    pub timestamp: NaiveDateTime,
    pub lat: f64,
    pub lng: f64,
    pub accuracy: Option<f64>,
}

pub const PATROL_SELECT: &str = r#"
    SELECT pc.id, pc.guard_id, u.username AS guard_username, pc.shift_id, pc.timestamp,
           pc.lat, pc.lng, pc.accuracy
    FROM patrol_coordinates pc
    JOIN users u ON u.id = pc.guard_id
"#;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(
    example = json!({
        "id": 901,
        "guard": { "id": 12, "username": "wanjiru" },
        "shift": 41,
        "timestamp": "2026-03-02T09:15:00",
        "lat": -1.2649,
        "lng": 36.8031,
        "accuracy": 8.5
    })
)]
pub struct PatrolCoordinate {
    pub id: u64,
    pub guard: UserRef,
    pub shift: u64,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: NaiveDateTime,
    pub lat: f64,
    pub lng: f64,
    pub accuracy: Option<f64>,
}

impl From<PatrolRow> for PatrolCoordinate {
    fn from(row: PatrolRow) -> Self {
        PatrolCoordinate {
            id: row.id,
            guard: UserRef {
                id: row.guard_id,
                username: row.guard_username,
            },
            shift: row.shift_id,
            timestamp: row.timestamp,
            lat: row.lat,
            lng: row.lng,
            accuracy: row.accuracy,
        }
    }
}
