use crate::error::ApiError;
use crate::utils::params::int_from_value;
use serde_json::{Map, Value};

/// How a QR payload points at a premise or guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrRef {
    Id(u64),
    Uuid(String),
}

/// Decoded QR payload, e.g. `{"type":"premise","id":4,"uuid":"..."}`.
#[derive(Debug, Clone, PartialEq)]
pub struct QrPayload {
    fields: Map<String, Value>,
}

impl QrPayload {
    /// Accepts a JSON object or a string holding one. Strings written with
    /// single quotes are retried with double quotes.
    pub fn parse(raw: &Value) -> Result<Self, ApiError> {
        match raw {
            Value::Null => Err(ApiError::field("qr_payload", "This field is required.")),
            Value::Object(map) => Ok(QrPayload { fields: map.clone() }),
            Value::String(s) => {
                let parsed = serde_json::from_str::<Value>(s)
                    .or_else(|_| serde_json::from_str::<Value>(&s.replace('\'', "\"")))
                    .map_err(|_| ApiError::field("qr_payload", "Invalid JSON for qr_payload."))?;
                match parsed {
                    Value::Object(map) => Ok(QrPayload { fields: map }),
                    _ => Err(ApiError::field("qr_payload", "Invalid JSON for qr_payload.")),
                }
            }
            _ => Err(ApiError::field("qr_payload", "Invalid qr_payload type.")),
        }
    }

    /// `None` for a missing or null value; otherwise as `parse`.
    pub fn parse_optional(raw: Option<&Value>) -> Result<Option<Self>, ApiError> {
        match raw {
            None | Some(Value::Null) => Ok(None),
            Some(v) => Self::parse(v).map(Some),
        }
    }

    pub fn kind(&self) -> Option<&str> {
        self.fields.get("type").and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The numeric `id` wins over `uuid` when both are present.
    pub fn reference(&self) -> Result<Option<QrRef>, ApiError> {
        match self.id()? {
            Some(id) => Ok(Some(QrRef::Id(id))),
            None => Ok(self.uuid().map(QrRef::Uuid)),
        }
    }

    /// Guard badges go the other way: the `uuid` decides and a bare `id` is
    /// only used when the badge carries no uuid.
    pub fn badge(&self) -> Result<Option<QrRef>, ApiError> {
        match self.uuid() {
            Some(uuid) => Ok(Some(QrRef::Uuid(uuid))),
            None => Ok(self.id()?.map(QrRef::Id)),
        }
    }

    /// Checks the payload's `id`, if any, against the guard its uuid resolved to.
    pub fn confirm_owner(&self, owner: u64) -> Result<u64, ApiError> {
        match self.id()? {
            Some(id) if id != owner => {
                Err(ApiError::field("qr_payload", "QR id and uuid do not match."))
            }
            _ => Ok(owner),
        }
    }

    fn id(&self) -> Result<Option<u64>, ApiError> {
        match self.fields.get("id").filter(|v| !v.is_null()) {
            None => Ok(None),
            Some(id) => int_from_value(id)
                .and_then(|i| u64::try_from(i).ok())
                .map(Some)
                .ok_or_else(|| ApiError::field("qr_payload", "Invalid qr id")),
        }
    }

    fn uuid(&self) -> Option<String> {
        self.fields.get("uuid").and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Null | Value::String(_) => None,
            other => Some(other.to_string()),
        })
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_object_and_string_forms() {
        let obj = QrPayload::parse(&json!({ "type": "premise", "id": 4 })).unwrap();
        let text = QrPayload::parse(&json!(r#"{"type":"premise","id":4}"#)).unwrap();
        let single = QrPayload::parse(&json!("{'type':'premise','id':4}")).unwrap();
        assert_eq!(obj, text);
        assert_eq!(obj, single);
        assert_eq!(obj.kind(), Some("premise"));
    }

    #[test]
    fn rejects_bad_payloads() {
        assert!(QrPayload::parse(&Value::Null).is_err());
        assert!(QrPayload::parse(&json!("not json")).is_err());
        assert!(QrPayload::parse(&json!("[1,2]")).is_err());
        assert!(QrPayload::parse(&json!(17)).is_err());
        assert_eq!(QrPayload::parse_optional(None).unwrap(), None);
    }

    #[test]
    fn id_takes_precedence_over_uuid() {
        let p = QrPayload::parse(&json!({ "id": "9", "uuid": "abc" })).unwrap();
        assert_eq!(p.reference().unwrap(), Some(QrRef::Id(9)));

        let p = QrPayload::parse(&json!({ "uuid": "abc" })).unwrap();
        assert_eq!(p.reference().unwrap(), Some(QrRef::Uuid("abc".into())));

        let p = QrPayload::parse(&json!({ "type": "premise" })).unwrap();
        assert_eq!(p.reference().unwrap(), None);
    }

    #[test]
    fn badge_prefers_uuid_over_id() {
        let p = QrPayload::parse(&json!({ "type": "guard", "id": 13, "uuid": "5b0c-9b71" })).unwrap();
        assert_eq!(p.badge().unwrap(), Some(QrRef::Uuid("5b0c-9b71".into())));

        let p = QrPayload::parse(&json!({ "type": "guard", "id": 13, "uuid": "  " })).unwrap();
        assert_eq!(p.badge().unwrap(), Some(QrRef::Id(13)));

        let p = QrPayload::parse(&json!({ "type": "guard" })).unwrap();
        assert_eq!(p.badge().unwrap(), None);
    }

    #[test]
    fn badge_id_must_match_uuid_owner() {
        let p = QrPayload::parse(&json!({ "id": 13, "uuid": "5b0c-9b71" })).unwrap();
        assert_eq!(p.confirm_owner(13).unwrap(), 13);
        assert!(p.confirm_owner(14).is_err());

        let p = QrPayload::parse(&json!({ "uuid": "5b0c-9b71" })).unwrap();
        assert_eq!(p.confirm_owner(14).unwrap(), 14);
    }

    #[test]
    fn non_numeric_id_is_invalid() {
        let p = QrPayload::parse(&json!({ "id": "nine" })).unwrap();
        assert!(p.reference().is_err());
    }
}
