//! Deterministic local narratives, used whenever the service is unavailable.

use chrono::NaiveDate;

use crate::models::{Narrative, Schedule, Task};
use crate::schedule::{
    calculate_progress, days_remaining, days_since_creation, format_weekdays, iso_weekday,
    next_reminder, weekday_name,
};

/// Builds a narrative from the schedule arithmetic alone.
///
/// One-off tasks report elapsed and remaining days; recurring tasks report
/// the current weekday against their scheduled days.
pub fn fallback_narrative(task: &Task, today: NaiveDate) -> Narrative {
    if task.completed {
        return Narrative {
            progress_made: "Task completed. Nice work!".to_string(),
            progress_to_go: "Nothing left to do.".to_string(),
        };
    }

    let next = next_reminder(task, today);
    match &task.schedule {
        Schedule::OneOff { duration_days, .. } => {
            let elapsed = days_since_creation(task, today).max(0);
            let progress = calculate_progress(task, today);
            let progress_made = format!(
                "{} of {} {} elapsed ({}% of the planned time).",
                elapsed,
                duration_days,
                plural(*duration_days as i64, "day", "days"),
                progress
            );
            let progress_to_go = match days_remaining(task, today).unwrap_or(0) {
                n if n < 0 => format!(
                    "Overdue by {} {}. Wrap up or reschedule; next reminder {}.",
                    -n,
                    plural(-n, "day", "days"),
                    next
                ),
                0 => format!("Due today. Next reminder {}.", next),
                n => format!("{} {} remaining. Next reminder {}.", n, plural(n, "day", "days"), next),
            };
            Narrative { progress_made, progress_to_go }
        }
        Schedule::Recurring { pattern, days_of_week, .. } => {
            let current = weekday_name(iso_weekday(today));
            let scheduled = if days_of_week.is_empty() {
                "every day".to_string()
            } else {
                format_weekdays(days_of_week)
            };
            Narrative {
                progress_made: format!(
                    "Today is {}. This {} task runs on {}.",
                    current, pattern, scheduled
                ),
                progress_to_go: format!("Keep the habit going. Next reminder {}.", next),
            }
        }
    }
}

fn plural(n: i64, one: &'static str, many: &'static str) -> &'static str {
    if n == 1 { one } else { many }
}
