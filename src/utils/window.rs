use crate::allocation::ShiftSpan;
use crate::model::attendance::AttendanceStatus;
use crate::model::shift::ShiftRow;
use chrono::{Duration, NaiveDateTime};

/// Period in which a guard may check in for a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInWindow {
    pub shift: ShiftSpan,
    pub opens: NaiveDateTime,
    pub closes: NaiveDateTime,
}

impl CheckInWindow {
    pub fn new(shift: ShiftSpan, early_minutes: i64, late_minutes: i64) -> Self {
        CheckInWindow {
            shift,
            opens: shift.start - Duration::minutes(early_minutes),
            closes: shift.end + Duration::minutes(late_minutes),
        }
    }

    pub fn for_row(row: &ShiftRow, early_minutes: i64, late_minutes: i64) -> Self {
        Self::new(
            ShiftSpan::new(row.date, row.start_time, row.end_time),
            early_minutes,
            late_minutes,
        )
    }

    pub fn contains(&self, now: NaiveDateTime) -> bool {
        self.opens <= now && now <= self.closes
    }

    /// On time up to the end of the shift, late after.
    pub fn status_at(&self, now: NaiveDateTime) -> AttendanceStatus {
        if now <= self.shift.end {
            AttendanceStatus::OnTime
        } else {
            AttendanceStatus::Late
        }
    }
}

/// Chooses the shift a premise scan most likely refers to. `candidates` must
/// be ordered by date and start time. Prefers the first shift whose window
/// is open, then the first shift today, then the latest candidate.
pub fn pick_shift_for_scan(
    candidates: &[ShiftRow],
    now: NaiveDateTime,
    early_minutes: i64,
    late_minutes: i64,
) -> Option<&ShiftRow> {
    candidates
        .iter()
        .find(|s| CheckInWindow::for_row(s, early_minutes, late_minutes).contains(now))
        .or_else(|| candidates.iter().find(|s| s.date == now.date()))
        .or_else(|| candidates.last())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn row(id: u64, d: u32, start: u32, end: u32) -> ShiftRow {
        ShiftRow {
            id,
            premise_id: 1,
            premise_name: "Westlands Mall".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, d).unwrap(),
            start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
            required_skills: String::new(),
            assigned_guard_id: None,
            assigned_guard_username: None,
            assigned_at: None,
        }
    }

    #[test]
    fn window_opens_early_and_closes_late() {
        let w = CheckInWindow::for_row(&row(1, 2, 8, 16), 15, 60);
        assert!(!w.contains(at(2, 7, 44)));
        assert!(w.contains(at(2, 7, 45)));
        assert!(w.contains(at(2, 17, 0)));
        assert!(!w.contains(at(2, 17, 1)));
    }

    #[test]
    fn overnight_window_extends_into_next_day() {
        let w = CheckInWindow::for_row(&row(1, 2, 22, 6), 15, 60);
        assert!(w.contains(at(3, 6, 30)));
        assert_eq!(w.status_at(at(3, 5, 59)), AttendanceStatus::OnTime);
        assert_eq!(w.status_at(at(3, 6, 1)), AttendanceStatus::Late);
    }

    #[test]
    fn scan_prefers_open_window_then_today_then_last() {
        let shifts = vec![row(1, 1, 8, 16), row(2, 2, 8, 16), row(3, 2, 18, 23), row(4, 3, 8, 16)];

        let chosen = pick_shift_for_scan(&shifts, at(2, 18, 5), 15, 60).unwrap();
        assert_eq!(chosen.id, 3);

        let chosen = pick_shift_for_scan(&shifts, at(2, 5, 0), 15, 60).unwrap();
        assert_eq!(chosen.id, 2);

        let chosen = pick_shift_for_scan(&shifts[..1], at(2, 5, 0), 15, 60).unwrap();
        assert_eq!(chosen.id, 1);

        assert!(pick_shift_for_scan(&[], at(2, 5, 0), 15, 60).is_none());
    }
}
