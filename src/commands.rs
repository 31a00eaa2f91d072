use std::io::{self, Write};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::error::Result;
use crate::models::{Schedule, Task, TaskId};
use crate::narrative::{narrate, NarrativeOutcome, NarrativeService};
use crate::schedule::{
    calculate_progress, days_remaining, expected_progress, format_remaining_time, format_weekdays,
    next_reminder, next_reminder_date, reminder_banner, tasks_due_for_reminder,
};
use crate::storage::TaskStore;
use crate::validation::TaskDraft;

/// Validates `draft` and adds the resulting task.
///
/// Every failing field is reported; nothing is saved unless all pass.
pub fn cmd_add(store: &mut TaskStore, draft: TaskDraft, now: DateTime<FixedOffset>, silent: bool) -> Result<TaskId> {
    let task = match draft.validate(now) {
        Ok(t) => t,
        Err(errors) => {
            if !silent {
                for e in &errors.errors {
                    eprintln!("  {}: {}", e.field, e.message);
                }
            }
            return Err(errors.into());
        }
    };
    let id = task.id;
    let short = task.short_id();
    store.add(task);
    store.save()?;
    if !silent { println!("Task added (id = {})", short); }
    Ok(id)
}

/// Marks a task as complete.
pub fn cmd_complete(store: &mut TaskStore, id: &str, silent: bool) -> Result<()> {
    let task_id = store.resolve(id)?.id;
    if store.complete(task_id)? {
        store.save()?;
        if !silent { println!("Task {} marked as complete.", id); }
    } else if !silent {
        println!("Task {} was already complete.", id);
    }
    Ok(())
}

/// Deletes a task.
pub fn cmd_remove(store: &mut TaskStore, id: &str, silent: bool) -> Result<()> {
    let task_id = store.resolve(id)?.id;
    let task = store.remove(task_id)?;
    store.save()?;
    if !silent { println!("Task '{}' removed.", task.title); }
    Ok(())
}

/// Requests a fresh narrative for a task and stores it.
///
/// Falls back to the local summary when the service is missing or fails; the
/// reason is printed as a notice, not an error.
pub async fn cmd_update(
    store: &mut TaskStore,
    id: &str,
    message: Option<String>,
    service: Option<&dyn NarrativeService>,
    today: NaiveDate,
    timeout: Duration,
    silent: bool,
) -> Result<NarrativeOutcome> {
    let task = store.resolve(id)?.clone();
    let outcome = narrate(service, &task, message, today, timeout).await;
    store.set_narrative(task.id, &outcome.narrative);
    store.save()?;
    if !silent {
        if let Some(notice) = outcome.notice() {
            eprintln!("{}", notice);
        }
        println!("Progress made: {}", outcome.narrative.progress_made);
        println!("Still to go:   {}", outcome.narrative.progress_to_go);
    }
    Ok(outcome)
}

/// Adds a checklist step to a task.
pub fn cmd_step_add(store: &mut TaskStore, id: &str, text: &str, silent: bool) -> Result<usize> {
    let task_id = store.resolve(id)?.id;
    let position = store.add_step(task_id, text)?;
    store.save()?;
    if !silent { println!("Step {} added.", position); }
    Ok(position)
}

/// Toggles a checklist step (1-based).
pub fn cmd_step_done(store: &mut TaskStore, id: &str, position: usize, now: DateTime<FixedOffset>, silent: bool) -> Result<bool> {
    let task_id = store.resolve(id)?.id;
    let done = store.toggle_step(task_id, position, now)?;
    store.save()?;
    if !silent {
        println!("Step {} marked {}.", position, if done { "done" } else { "not done" });
    }
    Ok(done)
}

/// Tasks in display order: open tasks by next reminder, then completed ones.
pub fn sorted_tasks(tasks: &[Task], today: NaiveDate) -> Vec<&Task> {
    let mut sorted: Vec<&Task> = tasks.iter().collect();
    sorted.sort_by_key(|t| (t.completed, next_reminder_date(t, today), t.created_at));
    sorted
}

/// Lists tasks in a formatted table.
///
/// By default, hides completed tasks unless `all` is true.
pub fn cmd_list(store: &TaskStore, all: bool, today: NaiveDate) {
    let tasks: Vec<&Task> = sorted_tasks(store.tasks(), today)
        .into_iter()
        .filter(|t| all || !t.completed)
        .collect();
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Kind").add_attribute(Attribute::Bold),
            Cell::new("Progress").add_attribute(Attribute::Bold),
            Cell::new("Time Left").add_attribute(Attribute::Bold),
            Cell::new("Next Reminder").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    for t in tasks {
        let progress = calculate_progress(t, today);
        let overdue = !t.completed && days_remaining(t, today).is_some_and(|d| d < 0);
        let progress_color = if t.completed {
            Color::Grey
        } else if progress >= 80 {
            Color::Red
        } else if progress >= 50 {
            Color::Yellow
        } else {
            Color::Green
        };
        let status = if t.completed { "Done" } else { "Pending" };
        let status_color = if t.completed { Color::Green } else { Color::Yellow };

        table.add_row(vec![
            Cell::new(t.short_id()),
            Cell::new(&t.title),
            Cell::new(kind_label(t)),
            Cell::new(format!("{}%", progress)).fg(progress_color),
            Cell::new(format_remaining_time(t, today)).fg(if overdue { Color::Red } else { Color::Reset }),
            Cell::new(next_reminder(t, today)),
            Cell::new(status).fg(status_color),
        ]);
    }

    println!("{table}");
}

/// Prints everything known about one task.
pub fn cmd_show(store: &TaskStore, id: &str, today: NaiveDate) -> Result<()> {
    let t = store.resolve(id)?;
    println!("{} ({})", t.title, t.id);
    if let Some(d) = &t.description {
        println!("  {}", d);
    }
    println!("Created:        {}", t.created_at.format("%Y-%m-%d %H:%M"));
    println!("Schedule:       {}", kind_label(t));
    if let Schedule::Recurring { reminder_time, completion_time, .. } = &t.schedule {
        if let Some(time) = reminder_time {
            println!("Reminder time:  {}", time.format("%H:%M"));
        }
        if let Some(time) = completion_time {
            println!("Complete by:    {}", time.format("%H:%M"));
        }
    }
    if !t.reminder_days_of_week.is_empty() {
        println!("Remind on:      {}", format_weekdays(&t.reminder_days_of_week));
    }
    println!("Progress:       {}%", calculate_progress(t, today));
    println!("Time left:      {}", format_remaining_time(t, today));
    println!("Next reminder:  {}", next_reminder(t, today));
    println!("Expected:       {}", expected_progress(t, today));
    if let Some(made) = &t.progress_made {
        println!("Progress made:  {}", made);
    }
    if let Some(to_go) = &t.progress_to_go {
        println!("Still to go:    {}", to_go);
    }
    if !t.steps.is_empty() {
        println!("Steps:");
        for (i, s) in t.steps.iter().enumerate() {
            println!("  {}. [{}] {}", i + 1, if s.completed { "x" } else { " " }, s.text);
        }
    }
    Ok(())
}

/// Prints the tasks whose reminder falls on `today`.
pub fn cmd_reminders(store: &TaskStore, today: NaiveDate) {
    let due = tasks_due_for_reminder(store.tasks(), today);
    let Some(banner) = reminder_banner(due.len()) else {
        println!("No reminders today.");
        return;
    };
    println!("{}", banner);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL)
        .set_header(vec!["ID", "Title", "Time Left", "Expected"]);
    for t in due {
        table.add_row(vec![
            t.short_id(),
            t.title.clone(),
            format_remaining_time(t, today),
            expected_progress(t, today),
        ]);
    }
    println!("{table}");
}

/// Deletes every task after confirmation.
pub fn cmd_reset(store: &mut TaskStore, force: bool) -> Result<()> {
    if !force {
        print!("Are you sure you want to delete all tasks? This cannot be undone. [y/N] ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if input.trim().to_lowercase() != "y" {
            println!("Aborted.");
            return Ok(());
        }
    }

    store.reset()?;
    println!("All tasks deleted.");
    Ok(())
}

/// Short description of a task's schedule, e.g. `14 days, every 2d` or `weekly Mon, Fri`.
pub fn kind_label(t: &Task) -> String {
    match &t.schedule {
        Schedule::OneOff { duration_days, reminder_frequency } => {
            format!("{} days, every {}d", duration_days, reminder_frequency)
        }
        Schedule::Recurring { pattern, days_of_week, .. } if !days_of_week.is_empty() => {
            format!("{} {}", pattern, format_weekdays(days_of_week))
        }
        Schedule::Recurring { pattern, .. } => pattern.to_string(),
    }
}
