//! System and user prompts for the completion backend.

use chrono::NaiveDate;

use crate::models::{Schedule, Task};
use crate::schedule::{days_since_creation, iso_weekday, weekday_name};

const RECURRING_SYSTEM: &str = "You are an AI assistant helping users track recurring task progress. \
Be encouraging, specific, and actionable. Focus on building habits and maintaining consistency.";

const ONE_OFF_SYSTEM: &str = "You are an AI assistant helping users track project progress. \
Be realistic about timelines, encouraging about effort, and specific about next steps.";

/// A system prompt and a user prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Builds the prompts asking for a `{"progressMade", "progressToGo"}` reply.
pub fn build_prompt(task: &Task, user_update: Option<&str>, today: NaiveDate) -> Prompt {
    let age = days_since_creation(task, today).max(0);
    let description = task.description.as_deref().unwrap_or("");

    let (system, mut user) = match &task.schedule {
        Schedule::Recurring { days_of_week, reminder_time, completion_time, .. } => {
            let scheduled = if days_of_week.is_empty() {
                "Daily".to_string()
            } else {
                days_of_week
                    .iter()
                    .map(|&d| weekday_name(d))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let time = |t: &Option<chrono::NaiveTime>| {
                t.map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_else(|| "not set".to_string())
            };
            let user = format!(
                "Analyze this recurring task:\n\n\
                 Title: {}\n\
                 Description: {}\n\
                 Current Day: {}\n\
                 Scheduled Days: {}\n\
                 Reminder Time: {}\n\
                 Completion Time: {}\n\
                 Task Age: {} days\n\n\
                 Provide two separate responses:\n\
                 1. PROGRESS_MADE: A brief assessment of their consistency and current status (max 50 words)\n\
                 2. PROGRESS_TO_GO: Encouraging next steps and timing guidance (max 50 words)",
                task.title,
                description,
                weekday_name(iso_weekday(today)),
                scheduled,
                time(reminder_time),
                time(completion_time),
                age
            );
            (RECURRING_SYSTEM, user)
        }
        Schedule::OneOff { duration_days, reminder_frequency } => {
            let duration = i64::from(*duration_days);
            let remaining = (duration - age).max(0);
            let percent = if duration == 0 {
                100
            } else {
                ((age as f64 / duration as f64) * 100.0).round().min(100.0) as i64
            };
            let user = format!(
                "Analyze this project task:\n\n\
                 Title: {}\n\
                 Description: {}\n\
                 Duration: {} days\n\
                 Days Elapsed: {}\n\
                 Days Remaining: {}\n\
                 Progress: {}%\n\
                 Reminder Frequency: Every {} days\n\n\
                 Provide two separate responses:\n\
                 1. PROGRESS_MADE: Assessment of progress based on time elapsed and task complexity (max 50 words)\n\
                 2. PROGRESS_TO_GO: Specific next steps and timeline recommendations (max 50 words)",
                task.title, description, duration, age, remaining, percent, reminder_frequency
            );
            (ONE_OFF_SYSTEM, user)
        }
    };

    if let Some(update) = user_update.map(str::trim).filter(|u| !u.is_empty()) {
        user.push_str("\n\nLatest update from the user: ");
        user.push_str(update);
        user.push_str("\nTake this update into account in both responses.");
    }
    user.push_str("\n\nFormat as JSON: {\"progressMade\": \"...\", \"progressToGo\": \"...\"}");

    Prompt { system: system.to_string(), user }
}
