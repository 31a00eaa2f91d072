//! Field-constraint checks for new tasks.
//!
//! A [`TaskDraft`] holds raw user input. [`TaskDraft::validate`] checks every
//! field, collects all violations into [`ValidationErrors`], and only builds a
//! [`Task`] when there are none.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveTime};
use uuid::Uuid;

use crate::models::{RecurrencePattern, Schedule, Task, TimeUnit};

pub const TITLE_MIN: usize = 2;
pub const TITLE_MAX: usize = 50;
pub const DESCRIPTION_MAX: usize = 500;
pub const AMOUNT_MIN: u32 = 1;
pub const AMOUNT_MAX: u32 = 365;

/// Raw input for creating a task.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub schedule: ScheduleDraft,
    /// Weekday override for reminders (1 = Monday .. 7 = Sunday).
    pub reminder_days_of_week: Vec<u8>,
}

/// Raw scheduling input, one variant per mode.
#[derive(Debug, Clone)]
pub enum ScheduleDraft {
    OneOff {
        duration: u32,
        duration_unit: TimeUnit,
        reminder_every: u32,
        reminder_unit: TimeUnit,
    },
    Recurring {
        pattern: RecurrencePattern,
        days_of_week: Vec<u8>,
        reminder_time: Option<String>,
        completion_time: Option<String>,
    },
}

impl Default for ScheduleDraft {
    /// Two weeks, reminding every other day.
    fn default() -> Self {
        ScheduleDraft::OneOff {
            duration: 14,
            duration_unit: TimeUnit::Days,
            reminder_every: 2,
            reminder_unit: TimeUnit::Days,
        }
    }
}

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every field that failed validation, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError { field, message: message.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Message for `field`, if it failed.
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors.iter().find(|e| e.field == field).map(|e| e.message.as_str())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl TaskDraft {
    pub fn one_off(title: impl Into<String>, duration_days: u32, reminder_every_days: u32) -> Self {
        TaskDraft {
            title: title.into(),
            schedule: ScheduleDraft::OneOff {
                duration: duration_days,
                duration_unit: TimeUnit::Days,
                reminder_every: reminder_every_days,
                reminder_unit: TimeUnit::Days,
            },
            ..Default::default()
        }
    }

    pub fn recurring(title: impl Into<String>, pattern: RecurrencePattern, days_of_week: Vec<u8>) -> Self {
        TaskDraft {
            title: title.into(),
            schedule: ScheduleDraft::Recurring {
                pattern,
                days_of_week,
                reminder_time: None,
                completion_time: None,
            },
            ..Default::default()
        }
    }

    /// Checks all fields and builds a new, incomplete task created at `now`.
    pub fn validate(self, now: DateTime<FixedOffset>) -> Result<Task, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let title = self.title.trim().to_string();
        let title_len = title.chars().count();
        if title_len < TITLE_MIN {
            errors.push("title", "Title must be at least 2 characters.");
        } else if title_len > TITLE_MAX {
            errors.push("title", "Title must not exceed 50 characters.");
        }

        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if let Some(d) = &description {
            if d.chars().count() > DESCRIPTION_MAX {
                errors.push("description", "Description must not exceed 500 characters.");
            }
        }

        let schedule = match self.schedule {
            ScheduleDraft::OneOff { duration, duration_unit, reminder_every, reminder_unit } => {
                check_amount(&mut errors, "duration", "Duration", duration);
                check_amount(&mut errors, "reminderFrequency", "Reminder frequency", reminder_every);
                Schedule::OneOff {
                    duration_days: duration.saturating_mul(duration_unit.days()),
                    reminder_frequency: reminder_every.saturating_mul(reminder_unit.days()),
                }
            }
            ScheduleDraft::Recurring { pattern, days_of_week, reminder_time, completion_time } => {
                let days_of_week = check_weekdays(&mut errors, "daysOfWeek", days_of_week);
                Schedule::Recurring {
                    pattern,
                    days_of_week,
                    reminder_time: check_time(&mut errors, "reminderTime", reminder_time),
                    completion_time: check_time(&mut errors, "completionTime", completion_time),
                }
            }
        };

        let reminder_days_of_week =
            check_weekdays(&mut errors, "reminderDaysOfWeek", self.reminder_days_of_week);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Task {
            id: Uuid::new_v4(),
            title,
            description,
            created_at: now,
            schedule,
            reminder_days_of_week,
            completed: false,
            progress_made: None,
            progress_to_go: None,
            steps: Vec::new(),
        })
    }
}

fn check_amount(errors: &mut ValidationErrors, field: &'static str, label: &str, value: u32) {
    if value < AMOUNT_MIN {
        errors.push(field, format!("{} must be at least 1.", label));
    } else if value > AMOUNT_MAX {
        errors.push(field, format!("{} cannot exceed 365.", label));
    }
}

/// Deduplicated, sorted weekdays; reports anything outside 1..=7.
fn check_weekdays(errors: &mut ValidationErrors, field: &'static str, mut days: Vec<u8>) -> Vec<u8> {
    if let Some(bad) = days.iter().find(|d| !(1..=7).contains(*d)) {
        errors.push(field, format!("Weekday {} is out of range (1 = Monday .. 7 = Sunday).", bad));
    }
    days.sort_unstable();
    days.dedup();
    days
}

fn check_time(errors: &mut ValidationErrors, field: &'static str, raw: Option<String>) -> Option<NaiveTime> {
    let raw = raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())?;
    match parse_hhmm(&raw) {
        Some(t) => Some(t),
        None => {
            errors.push(field, format!("Invalid time '{}'. Use HH:MM (24-hour).", raw));
            None
        }
    }
}

/// Parses a 24-hour `HH:MM` time.
pub fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Parses a comma-separated weekday list such as `1,3,5` or `mon,wed,fri`.
pub fn parse_weekdays(s: &str) -> Result<Vec<u8>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            if let Ok(n) = p.parse::<u8>() {
                return Ok(n);
            }
            match p.to_lowercase().get(..3) {
                Some("mon") => Ok(1),
                Some("tue") => Ok(2),
                Some("wed") => Ok(3),
                Some("thu") => Ok(4),
                Some("fri") => Ok(5),
                Some("sat") => Ok(6),
                Some("sun") => Ok(7),
                _ => Err(format!("Unknown weekday '{}'.", p)),
            }
        })
        .collect()
}
