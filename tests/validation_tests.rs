use chrono::{FixedOffset, NaiveTime, TimeZone};
use progress_pulse::models::{RecurrencePattern, Schedule, TimeUnit};
use progress_pulse::validation::*;

fn now() -> chrono::DateTime<FixedOffset> {
    FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap()
}

#[test]
fn test_valid_one_off() {
    let task = TaskDraft::one_off("  Write report ", 14, 2).validate(now()).unwrap();
    assert_eq!(task.title, "Write report");
    assert_eq!(task.created_at, now());
    assert!(!task.completed);
    assert_eq!(task.schedule, Schedule::OneOff { duration_days: 14, reminder_frequency: 2 });
}

#[test]
fn test_units_are_scaled_to_days() {
    let draft = TaskDraft {
        title: "Learn Rust".into(),
        schedule: ScheduleDraft::OneOff {
            duration: 2,
            duration_unit: TimeUnit::Months,
            reminder_every: 1,
            reminder_unit: TimeUnit::Weeks,
        },
        ..Default::default()
    };
    let task = draft.validate(now()).unwrap();
    assert_eq!(task.schedule, Schedule::OneOff { duration_days: 60, reminder_frequency: 7 });
}

#[test]
fn test_title_length() {
    let errors = TaskDraft::one_off("a", 14, 2).validate(now()).unwrap_err();
    assert_eq!(errors.for_field("title"), Some("Title must be at least 2 characters."));

    let errors = TaskDraft::one_off("x".repeat(51), 14, 2).validate(now()).unwrap_err();
    assert_eq!(errors.for_field("title"), Some("Title must not exceed 50 characters."));

    assert!(TaskDraft::one_off("x".repeat(50), 14, 2).validate(now()).is_ok());
}

#[test]
fn test_description_length() {
    let mut draft = TaskDraft::one_off("Report", 14, 2);
    draft.description = Some("d".repeat(501));
    let errors = draft.validate(now()).unwrap_err();
    assert_eq!(errors.for_field("description"), Some("Description must not exceed 500 characters."));

    let mut draft = TaskDraft::one_off("Report", 14, 2);
    draft.description = Some("   ".into());
    assert_eq!(draft.validate(now()).unwrap().description, None);
}

#[test]
fn test_amount_ranges() {
    let errors = TaskDraft::one_off("Report", 0, 366).validate(now()).unwrap_err();
    assert_eq!(errors.for_field("duration"), Some("Duration must be at least 1."));
    assert_eq!(errors.for_field("reminderFrequency"), Some("Reminder frequency cannot exceed 365."));
    assert!(TaskDraft::one_off("Report", 365, 1).validate(now()).is_ok());
}

#[test]
fn test_all_errors_reported() {
    let mut draft = TaskDraft::one_off("", 0, 0);
    draft.reminder_days_of_week = vec![8];
    let errors = draft.validate(now()).unwrap_err();
    assert_eq!(errors.errors.len(), 4);
    assert!(errors.for_field("reminderDaysOfWeek").is_some());
    assert!(errors.to_string().starts_with("title: "));
}

#[test]
fn test_recurring_times_and_days() {
    let draft = TaskDraft {
        title: "Run".into(),
        schedule: ScheduleDraft::Recurring {
            pattern: RecurrencePattern::Weekly,
            days_of_week: vec![5, 1, 5, 3],
            reminder_time: Some("07:30".into()),
            completion_time: Some(" ".into()),
        },
        ..Default::default()
    };
    let task = draft.validate(now()).unwrap();
    assert_eq!(
        task.schedule,
        Schedule::Recurring {
            pattern: RecurrencePattern::Weekly,
            days_of_week: vec![1, 3, 5],
            reminder_time: NaiveTime::from_hms_opt(7, 30, 0),
            completion_time: None,
        }
    );
}

#[test]
fn test_recurring_bad_time_and_weekday() {
    let draft = TaskDraft {
        title: "Run".into(),
        schedule: ScheduleDraft::Recurring {
            pattern: RecurrencePattern::Weekly,
            days_of_week: vec![0],
            reminder_time: Some("7pm".into()),
            completion_time: None,
        },
        ..Default::default()
    };
    let errors = draft.validate(now()).unwrap_err();
    assert_eq!(errors.for_field("reminderTime"), Some("Invalid time '7pm'. Use HH:MM (24-hour)."));
    assert_eq!(
        errors.for_field("daysOfWeek"),
        Some("Weekday 0 is out of range (1 = Monday .. 7 = Sunday).")
    );
}

#[test]
fn test_parse_weekdays() {
    assert_eq!(parse_weekdays("mon,wed,fri").unwrap(), vec![1, 3, 5]);
    assert_eq!(parse_weekdays("1, 7").unwrap(), vec![1, 7]);
    assert_eq!(parse_weekdays("Tuesday,SAT").unwrap(), vec![2, 6]);
    assert_eq!(parse_weekdays("").unwrap(), Vec::<u8>::new());
    assert!(parse_weekdays("funday").is_err());
}

#[test]
fn test_parse_hhmm() {
    assert_eq!(parse_hhmm("23:05"), NaiveTime::from_hms_opt(23, 5, 0));
    assert_eq!(parse_hhmm("24:00"), None);
    assert_eq!(parse_hhmm("noon"), None);
}

mod dashboard_input {
    use progress_pulse::models::{RecurrencePattern, TimeUnit};
    use progress_pulse::tui::app::build_draft;
    use progress_pulse::validation::ScheduleDraft;

    #[test]
    fn test_blank_fields_use_defaults() {
        let draft = build_draft("Report", "", "", "").unwrap();
        assert_eq!(draft.description, None);
        match draft.schedule {
            ScheduleDraft::OneOff { duration, duration_unit, reminder_every, reminder_unit } => {
                assert_eq!((duration, duration_unit), (14, TimeUnit::Days));
                assert_eq!((reminder_every, reminder_unit), (2, TimeUnit::Days));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_units_and_weekday_override() {
        let draft = build_draft("Report", "Quarterly", "2 weeks", "on mon,fri").unwrap();
        assert_eq!(draft.description.as_deref(), Some("Quarterly"));
        assert_eq!(draft.reminder_days_of_week, vec![1, 5]);
        match draft.schedule {
            ScheduleDraft::OneOff { duration, duration_unit, .. } => {
                assert_eq!((duration, duration_unit), (2, TimeUnit::Weeks));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_weekly_with_time() {
        let draft = build_draft("Run", "", "weekly mon,wed", "07:30").unwrap();
        match draft.schedule {
            ScheduleDraft::Recurring { pattern, days_of_week, reminder_time, .. } => {
                assert_eq!(pattern, RecurrencePattern::Weekly);
                assert_eq!(days_of_week, vec![1, 3]);
                assert_eq!(reminder_time.as_deref(), Some("07:30"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_errors_point_at_step() {
        assert_eq!(build_draft("Run", "", "soon", "").unwrap_err().0, 2);
        assert_eq!(build_draft("Run", "", "3 fortnights", "").unwrap_err().0, 2);
        assert_eq!(build_draft("Run", "", "daily", "7pm").unwrap_err().0, 3);
        assert_eq!(build_draft("Run", "", "", "on someday").unwrap_err().0, 3);
    }
}
