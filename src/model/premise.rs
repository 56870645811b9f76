use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "Westlands Mall",
        "address": "Waiyaki Way",
        "required_skills": "cctv",
        "uuid": "0c3c8b56-3a8e-4d5e-9f57-8a1b7a4f7c11",
        "lat": -1.2648,
        "lng": 36.8028,
        "geofence_radius_m": 250.0
    })
)]
pub struct Premise {
    pub id: u64,
    pub name: String,
    pub address: String,
    pub required_skills: String,
    pub uuid: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub geofence_radius_m: Option<f64>,
}

impl Premise {
    /// Payload encoded in the QR poster mounted at the premise.
    pub fn qr_payload(&self) -> serde_json::Value {
        serde_json::json!({ "type": "premise", "id": self.id, "uuid": self.uuid })
    }

    /// Centre and radius when the premise has a usable geofence.
    pub fn geofence(&self) -> Option<(f64, f64, f64)> {
        match (self.lat, self.lng, self.geofence_radius_m) {
            (Some(lat), Some(lng), Some(radius)) if radius > 0.0 => Some((lat, lng, radius)),
            _ => None,
        }
    }
}

/// Compact premise reference embedded in shift payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PremiseRef {
    pub id: u64,
    pub name: String,
}

pub const PREMISE_SELECT: &str = r#"
    SELECT id, name, address, required_skills, uuid, lat, lng, geofence_radius_m
    FROM premises
"#;

pub async fn fetch_premise<'e, E>(exec: E, id: u64) -> Result<Option<Premise>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let sql = format!("{PREMISE_SELECT} WHERE id = ?");
    sqlx::query_as::<_, Premise>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await
}

pub async fn fetch_premise_by_uuid<'e, E>(exec: E, uuid: &str) -> Result<Option<Premise>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let sql = format!("{PREMISE_SELECT} WHERE uuid = ?");
    sqlx::query_as::<_, Premise>(&sql)
        .bind(uuid)
        .fetch_optional(exec)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn premise(lat: Option<f64>, lng: Option<f64>, radius: Option<f64>) -> Premise {
        Premise {
            id: 4,
            name: "Gigiri Gate".into(),
            address: String::new(),
            required_skills: String::new(),
            uuid: "0c3c8b56-3a8e-4d5e-9f57-8a1b7a4f7c11".into(),
            lat,
            lng,
            geofence_radius_m: radius,
        }
    }

    #[test]
    fn geofence_needs_centre_and_positive_radius() {
        assert_eq!(premise(Some(1.0), Some(2.0), Some(50.0)).geofence(), Some((1.0, 2.0, 50.0)));
        assert_eq!(premise(Some(1.0), Some(2.0), Some(0.0)).geofence(), None);
        assert_eq!(premise(None, Some(2.0), Some(50.0)).geofence(), None);
    }

    #[test]
    fn qr_payload_identifies_premise() {
        let p = premise(None, None, None);
        assert_eq!(p.qr_payload()["type"], "premise");
        assert_eq!(p.qr_payload()["id"], 4);
    }
}
