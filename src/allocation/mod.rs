//! Guard-to-shift allocation.
//!
//! The planning half (`skills`, `scoring`, `planner`, `fairness`) is pure and
//! works on snapshots; `roster` loads those snapshots from MySQL and
//! `apply` writes the chosen assignments back under row locks.

pub mod apply;
pub mod fairness;
pub mod planner;
pub mod roster;
pub mod scoring;
pub mod skills;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeSet;

/// Concrete start/end of a shift. An end at or before the start means the
/// shift runs past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftSpan {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ShiftSpan {
    pub fn new(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        let start = date.and_time(start);
        let mut end = date.and_time(end);
        if end <= start {
            end += Duration::days(1);
        }
        ShiftSpan { start, end }
    }

    /// Half-open overlap: back-to-back shifts do not conflict.
    pub fn overlaps(&self, other: &ShiftSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone)]
pub struct GuardCandidate {
    pub user_id: u64,
    pub username: String,
    pub skills: Vec<String>,
    pub experience_years: i32,
    /// Per-guard cap on consecutive working days; `None` uses the policy default.
    pub max_consecutive_days: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct OpenShift {
    pub id: u64,
    pub premise_id: u64,
    pub premise_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub required_skills: Vec<String>,
}

impl OpenShift {
    pub fn span(&self) -> ShiftSpan {
        ShiftSpan::new(self.date, self.start_time, self.end_time)
    }
}

/// A shift already held by a guard.
#[derive(Debug, Clone)]
pub struct Booking {
    pub guard_id: u64,
    pub shift_id: u64,
    pub date: NaiveDate,
    pub span: ShiftSpan,
}

/// Existing assignments the planner must respect.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    bookings: Vec<Booking>,
}

impl Roster {
    pub fn new(bookings: Vec<Booking>) -> Self {
        Roster { bookings }
    }

    pub fn book(&mut self, booking: Booking) {
        self.bookings.push(booking);
    }

    /// Points the booking for `shift_id` at whoever actually holds it, or
    /// drops it when the shift turned out to be gone or open.
    pub fn set_holder(&mut self, shift_id: u64, holder: Option<u64>) {
        match holder {
            Some(guard_id) => self
                .bookings
                .iter_mut()
                .filter(|b| b.shift_id == shift_id)
                .for_each(|b| b.guard_id = guard_id),
            None => self.bookings.retain(|b| b.shift_id != shift_id),
        }
    }

    fn for_guard(&self, guard_id: u64) -> impl Iterator<Item = &Booking> {
        self.bookings.iter().filter(move |b| b.guard_id == guard_id)
    }

    /// True when the guard holds another shift overlapping `span`.
    pub fn has_conflict(&self, guard_id: u64, shift_id: u64, span: &ShiftSpan) -> bool {
        self.for_guard(guard_id)
            .any(|b| b.shift_id != shift_id && b.span.overlaps(span))
    }

    /// Number of consecutive days immediately before `date` on which the
    /// guard worked, counted up to `cap`.
    pub fn consecutive_days_before(&self, guard_id: u64, date: NaiveDate, cap: u32) -> u32 {
        let worked: BTreeSet<NaiveDate> = self.for_guard(guard_id).map(|b| b.date).collect();
        let mut days = 0;
        let mut day = date;
        while days < cap {
            day = match day.pred_opt() {
                Some(d) => d,
                None => break,
            };
            if !worked.contains(&day) {
                break;
            }
            days += 1;
        }
        days
    }

    /// Shifts held in the `window_days` ending on `date` (inclusive).
    pub fn recent_count(&self, guard_id: u64, date: NaiveDate, window_days: u32) -> u32 {
        let window = i64::from(window_days.max(1)) - 1;
        let from = date - Duration::days(window);
        self.for_guard(guard_id)
            .filter(|b| b.date >= from && b.date <= date)
            .count() as u32
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::allocation::skills::parse_tags;

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    pub fn guard(id: u64, name: &str, skills: &str, exp: i32) -> GuardCandidate {
        GuardCandidate {
            user_id: id,
            username: name.to_string(),
            skills: parse_tags(skills),
            experience_years: exp,
            max_consecutive_days: None,
        }
    }

    pub fn shift(id: u64, day: NaiveDate, start: u32, end: u32, skills: &str) -> OpenShift {
        OpenShift {
            id,
            premise_id: 1,
            premise_name: "Westlands Mall".to_string(),
            date: day,
            start_time: time(start, 0),
            end_time: time(end, 0),
            required_skills: parse_tags(skills),
        }
    }

    pub fn booking(guard_id: u64, shift_id: u64, day: NaiveDate, start: u32, end: u32) -> Booking {
        Booking {
            guard_id,
            shift_id,
            date: day,
            span: ShiftSpan::new(day, time(start, 0), time(end, 0)),
        }
    }
}
