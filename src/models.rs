use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a task.
pub type TaskId = Uuid;

/// Represents a single tracked task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for the task.
    pub id: TaskId,
    /// Short title, 2 to 50 characters.
    pub title: String,
    /// Optional longer description, at most 500 characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Timestamp when the task was created (RFC 3339).
    pub created_at: DateTime<FixedOffset>,
    /// How the task is scheduled: fixed duration or recurring pattern.
    pub schedule: Schedule,
    /// Weekdays (1 = Monday .. 7 = Sunday) on which to remind, overriding the schedule.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reminder_days_of_week: Vec<u8>,
    /// Whether the task has been completed.
    #[serde(default)]
    pub completed: bool,
    /// Narrative of what has been achieved so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_made: Option<String>,
    /// Narrative of what is left to do.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_to_go: Option<String>,
    /// Checklist of smaller steps.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
}

impl Task {
    /// Calendar day the task was created on, in the offset it was recorded in.
    pub fn created_on(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self.schedule, Schedule::Recurring { .. })
    }

    /// First eight characters of the id, used in tables.
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

/// Scheduling mode of a task. A task is in exactly one of these.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Schedule {
    /// A task with a fixed duration and due date.
    OneOff {
        /// Days from creation until the task is due.
        duration_days: u32,
        /// Remind every this many days.
        reminder_frequency: u32,
    },
    /// A task repeating on a daily or weekly pattern.
    Recurring {
        pattern: RecurrencePattern,
        /// Weekdays (1 = Monday .. 7 = Sunday) the task is scheduled on.
        #[serde(default)]
        days_of_week: Vec<u8>,
        #[serde(default, with = "hhmm", skip_serializing_if = "Option::is_none")]
        reminder_time: Option<NaiveTime>,
        #[serde(default, with = "hhmm", skip_serializing_if = "Option::is_none")]
        completion_time: Option<NaiveTime>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrencePattern::Daily => write!(f, "daily"),
            RecurrencePattern::Weekly => write!(f, "weekly"),
        }
    }
}

impl FromStr for RecurrencePattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(RecurrencePattern::Daily),
            "weekly" => Ok(RecurrencePattern::Weekly),
            other => Err(format!("Unknown recurrence pattern '{}'. Supported: daily, weekly.", other)),
        }
    }
}

/// Unit that a duration or reminder frequency is entered in.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Days,
    Weeks,
    Months,
}

impl TimeUnit {
    /// Number of days one unit stands for. Months are 30 days.
    pub fn days(self) -> u32 {
        match self {
            TimeUnit::Days => 1,
            TimeUnit::Weeks => 7,
            TimeUnit::Months => 30,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "d" | "day" | "days" => Ok(TimeUnit::Days),
            "w" | "week" | "weeks" => Ok(TimeUnit::Weeks),
            "m" | "month" | "months" => Ok(TimeUnit::Months),
            other => Err(format!("Unknown unit '{}'. Supported: days, weeks, months.", other)),
        }
    }
}

/// A checklist item inside a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: Uuid,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<FixedOffset>>,
}

/// The two narrative strings attached to a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Narrative {
    pub progress_made: String,
    pub progress_to_go: String,
}

/// `HH:MM` serde adapter for optional times.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => s.serialize_str(&t.format(FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => NaiveTime::parse_from_str(s, FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
