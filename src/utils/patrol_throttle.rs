use chrono::NaiveDateTime;
use moka::future::Cache;
use once_cell::sync::Lazy;
use std::time::Duration;

/// (guard_id, shift_id) => time of the last accepted patrol point
static LAST_POINT: Lazy<Cache<(u64, u64), NaiveDateTime>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(3600))
        .build()
});

pub async fn last_point(guard_id: u64, shift_id: u64) -> Option<NaiveDateTime> {
    LAST_POINT.get(&(guard_id, shift_id)).await
}

pub async fn remember(guard_id: u64, shift_id: u64, at: NaiveDateTime) {
    LAST_POINT.insert((guard_id, shift_id), at).await;
}

/// Seconds the caller must still wait, or `None` when a new point is allowed.
pub fn retry_after(last: Option<NaiveDateTime>, now: NaiveDateTime, min_interval_secs: i64) -> Option<i64> {
    let elapsed = (now - last?).num_seconds();
    if elapsed < min_interval_secs {
        Some(min_interval_secs - elapsed)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 0, s)
            .unwrap()
    }

    #[test]
    fn first_point_is_always_allowed() {
        assert_eq!(retry_after(None, at(0), 30), None);
    }

    #[test]
    fn too_soon_reports_remaining_seconds() {
        assert_eq!(retry_after(Some(at(0)), at(12), 30), Some(18));
        assert_eq!(retry_after(Some(at(0)), at(30), 30), None);
    }

    #[actix_web::test]
    async fn cache_remembers_per_guard_and_shift() {
        remember(900_001, 77, at(5)).await;
        assert_eq!(last_point(900_001, 77).await, Some(at(5)));
        assert_eq!(last_point(900_001, 78).await, None);
    }
}
