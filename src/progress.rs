use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use crate::models::WorkoutEntry;

/// Entries grouped by training day, earliest day first. Insertion order is
/// kept within a day.
pub fn calendar(entries: &[WorkoutEntry]) -> BTreeMap<NaiveDate, Vec<WorkoutEntry>> {
    let mut days: BTreeMap<NaiveDate, Vec<WorkoutEntry>> = BTreeMap::new();
    for entry in entries {
        days.entry(entry.date).or_default().push(entry.clone());
    }
    days
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayStat {
    pub date: NaiveDate,
    pub entries: usize,
    pub sets: i64,
    pub volume_kg: f64,
}

pub fn daily_histogram(entries: &[WorkoutEntry]) -> Vec<DayStat> {
    let mut days: BTreeMap<NaiveDate, DayStat> = BTreeMap::new();
    for entry in entries {
        let stat = days.entry(entry.date).or_insert_with(|| DayStat {
            date: entry.date,
            entries: 0,
            sets: 0,
            volume_kg: 0.0,
        });
        stat.entries += 1;
        stat.sets = stat.sets.saturating_add(entry.sets);
        stat.volume_kg += entry.volume();
    }
    days.into_values().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyAttendance {
    pub week_start: NaiveDate,
    pub days_trained: usize,
    pub target: i64,
    pub target_met: bool,
}

/// Monday of the week containing `day` and the Monday after it. `None` when
/// that week does not fit in the calendar range.
pub fn week_bounds(day: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let offset = u64::from(day.weekday().num_days_from_monday());
    let week_start = day.checked_sub_days(Days::new(offset))?;
    let week_end = week_start.checked_add_days(Days::new(7))?;
    Some((week_start, week_end))
}

/// Distinct training days in the Monday-based week containing `week_of`.
pub fn weekly_attendance(
    entries: &[WorkoutEntry],
    week_of: NaiveDate,
    target: i64,
) -> Option<WeeklyAttendance> {
    let (week_start, week_end) = week_bounds(week_of)?;

    let days: BTreeSet<NaiveDate> = entries
        .iter()
        .map(|e| e.date)
        .filter(|d| *d >= week_start && *d < week_end)
        .collect();

    Some(WeeklyAttendance {
        week_start,
        days_trained: days.len(),
        target,
        target_met: days.len() as i64 >= target,
    })
}
