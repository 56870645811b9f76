use crate::error::ApiError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use serde_json::Value;

const DATE_HINT: &str = "Invalid date format, use YYYY-MM-DD or 'today'.";

/// `None`, `""` and `"today"` mean the site-local date.
pub fn parse_day(raw: Option<&str>, today: NaiveDate) -> Result<NaiveDate, ApiError> {
    match raw.map(str::trim) {
        None | Some("") | Some("today") => Ok(today),
        Some(s) => plain_date(s).ok_or_else(|| ApiError::field("date", DATE_HINT)),
    }
}

/// Exactly `YYYY-MM-DD`; chrono's `%Y` alone would also take signed years of any width.
pub fn plain_date(s: &str) -> Option<NaiveDate> {
    let shaped = s.len() == 10
        && s.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Same as `parse_day` for a JSON body value; numbers and other types are invalid.
pub fn day_from_value(value: Option<&Value>, today: NaiveDate) -> Result<NaiveDate, ApiError> {
    match value {
        None | Some(Value::Null) => Ok(today),
        Some(Value::String(s)) => parse_day(Some(s), today),
        Some(_) => Err(ApiError::field("date", DATE_HINT)),
    }
}

/// Integer from a JSON number or numeric string.
pub fn int_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Required positive id field in a JSON body.
pub fn required_id(body: &Value, field: &'static str) -> Result<u64, ApiError> {
    match body.get(field) {
        None | Some(Value::Null) => Err(ApiError::field(field, "This field is required.")),
        Some(v) => optional_id_value(v, field)?.ok_or_else(|| ApiError::field(field, "This field is required.")),
    }
}

/// Optional id field in a JSON body; present but malformed is an error.
pub fn optional_id(body: &Value, field: &'static str) -> Result<Option<u64>, ApiError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => optional_id_value(v, field),
    }
}

fn optional_id_value(v: &Value, field: &'static str) -> Result<Option<u64>, ApiError> {
    int_from_value(v)
        .and_then(|i| u64::try_from(i).ok())
        .map(Some)
        .ok_or_else(|| ApiError::field(field, format!("{field} must be an integer.")))
}

/// Optional float from a JSON number or numeric string.
pub fn optional_f64(body: &Value, field: &'static str) -> Result<Option<f64>, ApiError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ApiError::field(field, "A valid number is required.")),
        Some(_) => Err(ApiError::field(field, "A valid number is required.")),
    }
}

/// Loose boolean: `true`, non-zero numbers and "1"/"true"/"yes".
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes"),
        _ => false,
    }
}

/// Query-string limit: unparsable falls back to `default`, result clamped to `1..=max`.
pub fn limit(raw: Option<&str>, default: u32, max: u32) -> u32 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(i64::from(default))
        .clamp(1, i64::from(max.max(1))) as u32
}

/// Page number (1-based) and size clamped to `1..=100`, with the row offset.
pub fn page_window(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    (page, per_page, (page - 1) * per_page)
}

/// `HH:MM` or `HH:MM:SS` from a JSON string.
pub fn time_from_value(value: Option<&Value>, field: &'static str) -> Result<NaiveTime, ApiError> {
    let raw = match value {
        Some(Value::String(s)) => s.trim(),
        None | Some(Value::Null) => return Err(ApiError::field(field, "This field is required.")),
        Some(_) => return Err(ApiError::field(field, "Time must be HH:MM or HH:MM:SS.")),
    };
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| ApiError::field(field, "Time must be HH:MM or HH:MM:SS."))
}

pub fn shift_id_query(raw: Option<&str>) -> Result<Option<u64>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ApiError::bad_request("Invalid shift_id")),
    }
}

/// ISO datetime or date bound converted to site-local wall-clock time. A
/// bare date is the start of that day, or its last instant when `end_of_day`.
pub fn datetime_bound(raw: &str, tz: Tz, end_of_day: bool) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&tz).naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    let day = plain_date(raw)?;
    let time = if end_of_day {
        NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)?
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)?
    };
    Some(day.and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn page_window_clamps() {
        assert_eq!(page_window(None, None), (1, 20, 0));
        assert_eq!(page_window(Some(3), Some(500)), (3, 100, 200));
        assert_eq!(page_window(Some(0), Some(0)), (1, 1, 0));
    }

    #[test]
    fn times_accept_with_or_without_seconds() {
        let t = |v: Value| time_from_value(Some(&v), "start_time");
        assert_eq!(t(json!("08:30")).unwrap(), NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(t(json!("22:00:15")).unwrap(), NaiveTime::from_hms_opt(22, 0, 15).unwrap());
        assert!(t(json!("8pm")).is_err());
        assert!(time_from_value(None, "start_time").is_err());
    }

    #[test]
    fn floats_accept_numbers_and_numeric_strings() {
        let body = json!({ "lat": -1.25, "lng": "36.8", "bad": "north", "empty": "" });
        assert_eq!(optional_f64(&body, "lat").unwrap(), Some(-1.25));
        assert_eq!(optional_f64(&body, "lng").unwrap(), Some(36.8));
        assert_eq!(optional_f64(&body, "empty").unwrap(), None);
        assert_eq!(optional_f64(&body, "missing").unwrap(), None);
        assert!(optional_f64(&body, "bad").is_err());
    }

    #[test]
    fn day_accepts_today_aliases_and_iso() {
        assert_eq!(parse_day(None, today()).unwrap(), today());
        assert_eq!(parse_day(Some(""), today()).unwrap(), today());
        assert_eq!(parse_day(Some("today"), today()).unwrap(), today());
        assert_eq!(
            parse_day(Some("2026-01-31"), today()).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()
        );
        assert!(parse_day(Some("31/01/2026"), today()).is_err());
        assert!(day_from_value(Some(&json!(20260131)), today()).is_err());
    }

    #[test]
    fn day_rejects_extended_years() {
        assert!(day_from_value(Some(&json!("+262142-12-31")), today()).is_err());
        assert!(parse_day(Some("-0001-01-01"), today()).is_err());
        assert!(parse_day(Some("2026-1-31"), today()).is_err());
        assert!(parse_day(Some("2026-02-30"), today()).is_err());
        assert_eq!(plain_date("9999-12-31"), NaiveDate::from_ymd_opt(9999, 12, 31));
    }

    #[test]
    fn ids_accept_numbers_and_numeric_strings() {
        let body = json!({ "premise_id": "7", "guard_id": 3, "bad": "x", "neg": -1 });
        assert_eq!(required_id(&body, "premise_id").unwrap(), 7);
        assert_eq!(optional_id(&body, "guard_id").unwrap(), Some(3));
        assert_eq!(optional_id(&body, "missing").unwrap(), None);
        assert!(optional_id(&body, "bad").is_err());
        assert!(optional_id(&body, "neg").is_err());
        assert!(required_id(&body, "missing").is_err());
    }

    #[test]
    fn truthy_matches_loose_flags() {
        assert!(truthy(Some(&json!(true))));
        assert!(truthy(Some(&json!("True"))));
        assert!(truthy(Some(&json!(1))));
        assert!(!truthy(Some(&json!("no"))));
        assert!(!truthy(None));
    }

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(limit(None, 50, 200), 50);
        assert_eq!(limit(Some("abc"), 50, 200), 50);
        assert_eq!(limit(Some("0"), 50, 200), 1);
        assert_eq!(limit(Some("5000"), 50, 200), 200);
        assert_eq!(limit(Some("25"), 50, 200), 25);
    }

    #[test]
    fn shift_id_query_rejects_garbage() {
        assert_eq!(shift_id_query(None).unwrap(), None);
        assert_eq!(shift_id_query(Some("12")).unwrap(), Some(12));
        assert!(shift_id_query(Some("twelve")).is_err());
    }

    #[test]
    fn datetime_bounds() {
        let tz: Tz = "Africa/Nairobi".parse().unwrap();
        let d = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(datetime_bound("2026-03-02", tz, false), Some(d.and_hms_opt(0, 0, 0).unwrap()));
        assert_eq!(
            datetime_bound("2026-03-02", tz, true).unwrap().time(),
            NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap()
        );
        // 06:00Z is 09:00 in Nairobi.
        assert_eq!(
            datetime_bound("2026-03-02T06:00:00Z", tz, false),
            Some(d.and_hms_opt(9, 0, 0).unwrap())
        );
        assert_eq!(
            datetime_bound("2026-03-02T07:30:00", tz, false),
            Some(d.and_hms_opt(7, 30, 0).unwrap())
        );
        assert_eq!(datetime_bound("yesterday", tz, false), None);
    }
}
