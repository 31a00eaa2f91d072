use chrono::{Datelike, Duration, NaiveDate};
use tracing::debug;

use crate::models::{RecurrencePattern, Schedule, Task};

/// Sentinel returned by [`next_reminder`] for completed tasks.
pub const NO_REMINDERS: &str = "No reminders";

/// Display format for reminder dates, e.g. `Oct 21, 2026`.
pub const REMINDER_DATE_FORMAT: &str = "%b %-d, %Y";

/// ISO weekday of `date`: Monday = 1 .. Sunday = 7.
///
/// This is the only place chrono's weekday is converted to the 1-based
/// encoding stored on tasks.
pub fn iso_weekday(date: NaiveDate) -> u8 {
    date.weekday().number_from_monday() as u8
}

/// Full English name of an ISO weekday (1 = Monday).
pub fn weekday_name(iso: u8) -> &'static str {
    match iso {
        1 => "Monday",
        2 => "Tuesday",
        3 => "Wednesday",
        4 => "Thursday",
        5 => "Friday",
        6 => "Saturday",
        7 => "Sunday",
        _ => "Unknown",
    }
}

/// Whole days from the task's creation day to `today` (negative before creation).
pub fn days_since_creation(task: &Task, today: NaiveDate) -> i64 {
    (today - task.created_on()).num_days()
}

/// Calculates completion progress as a percentage in `0..=100`.
///
/// - `100` if the task is completed.
/// - One-off tasks: share of the duration that has elapsed, rounded.
/// - Recurring tasks have no end date and stay at `0` until completed.
pub fn calculate_progress(task: &Task, today: NaiveDate) -> u8 {
    if task.completed {
        return 100;
    }
    match task.schedule {
        Schedule::OneOff { duration_days, .. } => {
            elapsed_percent(days_since_creation(task, today), duration_days)
        }
        Schedule::Recurring { .. } => 0,
    }
}

fn elapsed_percent(days_passed: i64, duration_days: u32) -> u8 {
    let total = i64::from(duration_days);
    if days_passed >= total {
        return 100;
    }
    if days_passed <= 0 {
        return 0;
    }
    let progress = (days_passed as f64 / total as f64 * 100.0).round();
    progress.clamp(0.0, 100.0) as u8
}

/// Weekday set reminders follow, if any: the explicit override first, then a
/// weekly recurrence's scheduled days.
fn reminder_weekdays(task: &Task) -> Option<Vec<u8>> {
    if !task.reminder_days_of_week.is_empty() {
        return Some(task.reminder_days_of_week.clone());
    }
    match &task.schedule {
        Schedule::Recurring { pattern: RecurrencePattern::Weekly, days_of_week, .. }
            if !days_of_week.is_empty() =>
        {
            Some(days_of_week.clone())
        }
        _ => None,
    }
}

/// Reminder cadence in days when no weekday set applies.
fn reminder_frequency(task: &Task) -> u32 {
    let freq = match task.schedule {
        Schedule::OneOff { reminder_frequency, .. } => reminder_frequency,
        Schedule::Recurring { pattern: RecurrencePattern::Daily, .. } => 1,
        Schedule::Recurring { pattern: RecurrencePattern::Weekly, .. } => 7,
    };
    freq.max(1)
}

/// Computes the next reminder date, strictly after `today`.
///
/// Returns `None` for completed tasks, or when the date would fall past the
/// calendar's range.
pub fn next_reminder_date(task: &Task, today: NaiveDate) -> Option<NaiveDate> {
    if task.completed {
        return None;
    }

    if let Some(mut days) = reminder_weekdays(task) {
        days.retain(|d| (1..=7).contains(d));
        days.sort_unstable();
        if let Some(&first) = days.first() {
            let current = iso_weekday(today);
            // Strictly after today; a lone weekday equal to today rolls a full week.
            let ahead = match days.iter().find(|&&d| d > current) {
                Some(&d) => d - current,
                None => 7 - current + first,
            };
            debug!(task = %task.id, ahead, "weekday reminder");
            return today.checked_add_signed(Duration::days(i64::from(ahead)));
        }
    }

    let freq = i64::from(reminder_frequency(task));
    let since_last = days_since_creation(task, today).rem_euclid(freq);
    // A zero remainder skips to the next cycle rather than returning today.
    let ahead = freq - since_last;
    debug!(task = %task.id, ahead, "frequency reminder");
    today.checked_add_signed(Duration::days(ahead))
}

/// Next reminder formatted for display, or [`NO_REMINDERS`].
pub fn next_reminder(task: &Task, today: NaiveDate) -> String {
    match next_reminder_date(task, today) {
        Some(date) => date.format(REMINDER_DATE_FORMAT).to_string(),
        None => NO_REMINDERS.to_string(),
    }
}

/// Due date of a one-off task; recurring tasks have none, and neither does a
/// duration running past the calendar's range.
pub fn due_date(task: &Task) -> Option<NaiveDate> {
    match task.schedule {
        Schedule::OneOff { duration_days, .. } => {
            task.created_on().checked_add_signed(Duration::days(i64::from(duration_days)))
        }
        Schedule::Recurring { .. } => None,
    }
}

/// Whole days from `today` until the due date.
pub fn days_remaining(task: &Task, today: NaiveDate) -> Option<i64> {
    due_date(task).map(|due| (due - today).num_days())
}

/// Human-readable time left until the due date.
///
/// `Overdue`, `Today`, `Tomorrow` or `{n} days`; recurring tasks are `Ongoing`.
pub fn format_remaining_time(task: &Task, today: NaiveDate) -> String {
    match days_remaining(task, today) {
        None => "Ongoing".to_string(),
        Some(n) if n < 0 => "Overdue".to_string(),
        Some(0) => "Today".to_string(),
        Some(1) => "Tomorrow".to_string(),
        Some(n) => format!("{} days", n),
    }
}

/// Whether the task's reminder cadence lands on `today`.
///
/// Counts the creation day and every exact multiple of the frequency, so it
/// can report `true` on a day [`next_reminder_date`] skips over.
pub fn is_reminder_due(task: &Task, today: NaiveDate) -> bool {
    if task.completed {
        return false;
    }
    match &task.schedule {
        Schedule::Recurring { pattern: RecurrencePattern::Daily, .. } => true,
        Schedule::Recurring { pattern: RecurrencePattern::Weekly, days_of_week, .. }
            if !days_of_week.is_empty() =>
        {
            days_of_week.contains(&iso_weekday(today))
        }
        _ => {
            let freq = i64::from(reminder_frequency(task));
            days_since_creation(task, today).rem_euclid(freq) == 0
        }
    }
}

/// Incomplete tasks whose reminder falls on `today`.
pub fn tasks_due_for_reminder(tasks: &[Task], today: NaiveDate) -> Vec<&Task> {
    tasks.iter().filter(|t| is_reminder_due(t, today)).collect()
}

/// Where the user should be by now, as a sentence.
pub fn expected_progress(task: &Task, today: NaiveDate) -> String {
    match &task.schedule {
        Schedule::OneOff { duration_days, .. } => {
            let elapsed = days_since_creation(task, today);
            if elapsed >= i64::from(*duration_days) {
                "Task should be completed".to_string()
            } else {
                format!("You should be {}% complete", elapsed_percent(elapsed, *duration_days))
            }
        }
        Schedule::Recurring { pattern, days_of_week, .. } => {
            let scheduled_today = match pattern {
                RecurrencePattern::Daily => true,
                RecurrencePattern::Weekly => days_of_week.contains(&iso_weekday(today)),
            };
            if scheduled_today {
                "Scheduled for today".to_string()
            } else {
                "Not scheduled today".to_string()
            }
        }
    }
}

/// Comma-separated short weekday names, e.g. `Mon, Wed, Fri`.
pub fn format_weekdays(days: &[u8]) -> String {
    let mut sorted: Vec<u8> = days.iter().copied().filter(|d| (1..=7).contains(d)).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
        .iter()
        .map(|&d| &weekday_name(d)[..3])
        .collect::<Vec<_>>()
        .join(", ")
}

/// Banner text for the tasks needing attention today, if any.
pub fn reminder_banner(due: usize) -> Option<String> {
    match due {
        0 => None,
        1 => Some("You have 1 task that needs your attention today.".to_string()),
        n => Some(format!("You have {} tasks that need your attention today.", n)),
    }
}
