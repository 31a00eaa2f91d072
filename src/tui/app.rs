use std::sync::Arc;

use chrono::{Local, NaiveDate};
use ratatui::widgets::TableState;
use tokio::runtime::Handle;
use tracing::warn;

use crate::commands::sorted_tasks;
use crate::config::Config;
use crate::models::{RecurrencePattern, Task, TimeUnit};
use crate::narrative::dispatch::NarrativeDispatcher;
use crate::narrative::{self, NarrativeService};
use crate::schedule::tasks_due_for_reminder;
use crate::storage::TaskStore;
use crate::validation::{parse_hhmm, parse_weekdays, ScheduleDraft, TaskDraft};

#[derive(PartialEq)]
pub enum InputMode {
    Normal,
    Adding,
    Updating,
    AddingStep,
}

/// Steps of the "Add Task" wizard.
pub const ADD_STEPS: usize = 4;

/// State for the multi-step "Add Task" wizard.
///
/// Each step keeps its raw text so a failed submission can send the user back
/// to the offending field with the rest intact.
#[derive(Default)]
pub struct AddState {
    pub step: usize, // 0: Title, 1: Description, 2: Schedule, 3: Reminder
    pub fields: [String; ADD_STEPS],
    /// Validation message for the current step.
    pub error: Option<String>,
}

pub struct App {
    pub store: TaskStore,
    pub tasks: Vec<Task>,
    pub state: TableState,
    pub input_mode: InputMode,
    pub input_buffer: String,
    pub add_state: AddState,
    pub show_completed: bool,
    pub banner_dismissed: bool,
    /// Last non-blocking notice (fallback used, save failed, ...).
    pub status: Option<String>,
    pub dispatcher: NarrativeDispatcher,
    pub today: NaiveDate,
}

impl App {
    /// Creates the app around an opened store.
    pub fn new(store: TaskStore, config: &Config, runtime: Handle) -> App {
        let service: Option<Arc<dyn NarrativeService>> = narrative::service_from_config(&config.narrative);
        let dispatcher = NarrativeDispatcher::new(runtime, service, config.narrative.timeout());
        let mut app = App {
            store,
            tasks: Vec::new(),
            state: TableState::default(),
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            add_state: AddState::default(),
            show_completed: false,
            banner_dismissed: false,
            status: None,
            dispatcher,
            today: Local::now().date_naive(),
        };
        app.reload();
        app
    }

    pub fn selected(&self) -> Option<&Task> {
        self.state.selected().and_then(|i| self.tasks.get(i))
    }

    /// Selects the next task.
    pub fn next(&mut self) {
        if self.tasks.is_empty() { return; }
        let i = match self.state.selected() {
            Some(i) if i + 1 < self.tasks.len() => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    /// Selects the previous task.
    pub fn previous(&mut self) {
        if self.tasks.is_empty() { return; }
        let i = match self.state.selected() {
            Some(0) | None => self.tasks.len() - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    /// Rebuilds the visible list from the store.
    pub fn reload(&mut self) {
        self.today = Local::now().date_naive();
        self.tasks = sorted_tasks(self.store.tasks(), self.today)
            .into_iter()
            .filter(|t| self.show_completed || !t.completed)
            .cloned()
            .collect();

        if self.tasks.is_empty() {
            self.state.select(None);
        } else if let Some(i) = self.state.selected() {
            if i >= self.tasks.len() {
                self.state.select(Some(self.tasks.len() - 1));
            }
        } else {
            self.state.select(Some(0));
        }
    }

    fn save(&mut self) {
        if let Err(e) = self.store.save() {
            warn!(error = %e, "save failed");
            self.status = Some(format!("Could not save: {}", e));
        }
    }

    /// Banner text, unless dismissed or nothing is due.
    pub fn banner(&self) -> Option<String> {
        if self.banner_dismissed {
            return None;
        }
        crate::schedule::reminder_banner(tasks_due_for_reminder(self.store.tasks(), self.today).len())
    }

    pub fn dismiss_banner(&mut self) {
        self.banner_dismissed = true;
    }

    /// Marks the selected task as complete.
    pub fn complete_selected(&mut self) {
        let Some(id) = self.selected().map(|t| t.id) else { return };
        match self.store.complete(id) {
            Ok(true) => {
                self.save();
                self.status = Some("Task completed.".into());
            }
            Ok(false) => {}
            Err(e) => self.status = Some(e.to_string()),
        }
        self.reload();
    }

    /// Deletes the selected task.
    pub fn delete_selected(&mut self) {
        let Some(id) = self.selected().map(|t| t.id) else { return };
        match self.store.remove(id) {
            Ok(task) => {
                self.save();
                self.status = Some(format!("Deleted '{}'.", task.title));
            }
            Err(e) => self.status = Some(e.to_string()),
        }
        self.reload();
    }

    pub fn toggle_completed(&mut self) {
        self.show_completed = !self.show_completed;
        self.reload();
    }

    /// Applies narrative results that have arrived since the last frame.
    pub fn poll_narratives(&mut self) {
        let applied = self.dispatcher.apply_ready(&mut self.store);
        if applied.is_empty() {
            return;
        }
        if applied.iter().any(|a| a.stored) {
            self.save();
        }
        self.status = Some(
            applied
                .iter()
                .rev()
                .find_map(|a| a.notice.clone())
                .unwrap_or_else(|| "Progress updated.".into()),
        );
        self.reload();
    }

    /// Initiates the "Add Task" wizard.
    pub fn start_add(&mut self) {
        self.input_mode = InputMode::Adding;
        self.add_state = AddState::default();
        self.input_buffer.clear();
    }

    /// Asks for an optional update message before requesting a narrative.
    pub fn start_update(&mut self) {
        if self.selected().is_none() { return; }
        self.input_mode = InputMode::Updating;
        self.input_buffer.clear();
    }

    pub fn start_add_step(&mut self) {
        if self.selected().is_none() { return; }
        self.input_mode = InputMode::AddingStep;
        self.input_buffer.clear();
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input_buffer.clear();
    }

    /// Handles Enter based on the current mode.
    pub fn handle_input(&mut self) {
        match self.input_mode {
            InputMode::Adding => self.handle_adding_input(),
            InputMode::Updating => self.handle_update_input(),
            InputMode::AddingStep => self.handle_step_input(),
            InputMode::Normal => {}
        }
    }

    fn handle_update_input(&mut self) {
        if let Some(task) = self.selected().cloned() {
            let message = Some(self.input_buffer.trim().to_string()).filter(|m| !m.is_empty());
            self.dispatcher.request(&task, message, self.today);
            self.status = Some(format!("Asking for a progress update on '{}'...", task.title));
        }
        self.cancel_input();
    }

    fn handle_step_input(&mut self) {
        let text = self.input_buffer.trim().to_string();
        if let (Some(id), false) = (self.selected().map(|t| t.id), text.is_empty()) {
            match self.store.add_step(id, &text) {
                Ok(_) => self.save(),
                Err(e) => self.status = Some(e.to_string()),
            }
        }
        self.cancel_input();
        self.reload();
    }

    /// Handles input for the "Add Task" wizard.
    fn handle_adding_input(&mut self) {
        let step = self.add_state.step;
        if step == 0 && self.input_buffer.trim().is_empty() {
            return;
        }
        self.add_state.fields[step] = self.input_buffer.trim().to_string();
        self.add_state.error = None;

        if step + 1 < ADD_STEPS {
            self.add_state.step += 1;
            self.input_buffer = self.add_state.fields[self.add_state.step].clone();
            return;
        }

        let [title, description, schedule, reminder] = &self.add_state.fields;
        let draft = match build_draft(title, description, schedule, reminder) {
            Ok(d) => d,
            Err((step, message)) => return self.back_to_step(step, message),
        };
        match draft.validate(Local::now().fixed_offset()) {
            Ok(task) => {
                self.status = Some(format!("Task '{}' added.", task.title));
                self.store.add(task);
                self.save();
                self.cancel_input();
                self.reload();
            }
            Err(errors) => {
                if let Some(first) = errors.errors.first() {
                    self.back_to_step(field_step(first.field), first.message.clone());
                }
            }
        }
    }

    fn back_to_step(&mut self, step: usize, message: String) {
        self.add_state.step = step;
        self.add_state.error = Some(message);
        self.input_buffer = self.add_state.fields[step].clone();
    }
}

/// Wizard step holding a validated field.
fn field_step(field: &str) -> usize {
    match field {
        "title" => 0,
        "description" => 1,
        "duration" | "daysOfWeek" => 2,
        _ => 3,
    }
}

/// Turns the wizard's raw fields into a draft.
///
/// Schedule: blank (14 days), `N [days|weeks|months]`, `daily`, or
/// `weekly mon,wed`. Reminder: blank (every 2 days), `N [unit]`,
/// `on mon,fri` (weekday override), or `HH:MM` for recurring tasks.
/// Errors carry the step to return to.
pub fn build_draft(title: &str, description: &str, schedule: &str, reminder: &str) -> Result<TaskDraft, (usize, String)> {
    let schedule_lower = schedule.trim().to_lowercase();
    let mut words = schedule_lower.split_whitespace();
    let head = words.next().unwrap_or("");
    let rest = words.collect::<Vec<_>>().join(" ");

    let mut reminder_days_of_week = Vec::new();
    let reminder = reminder.trim().to_lowercase();
    let reminder_on = reminder.strip_prefix("on ").map(str::trim);
    if let Some(days) = reminder_on {
        reminder_days_of_week = parse_weekdays(days).map_err(|e| (3, e))?;
    }

    let schedule = match head {
        "daily" | "weekly" => {
            let pattern = if head == "daily" { RecurrencePattern::Daily } else { RecurrencePattern::Weekly };
            let days_of_week = parse_weekdays(&rest).map_err(|e| (2, e))?;
            let reminder_time = match (reminder_on, reminder.as_str()) {
                (None, "") | (Some(_), _) => None,
                (None, raw) => {
                    if parse_hhmm(raw).is_none() {
                        return Err((3, format!("Invalid time '{}'. Use HH:MM (24-hour).", raw)));
                    }
                    Some(raw.to_string())
                }
            };
            ScheduleDraft::Recurring { pattern, days_of_week, reminder_time, completion_time: None }
        }
        _ => {
            let (duration, duration_unit) = if head.is_empty() {
                (14, TimeUnit::Days)
            } else {
                parse_amount(&schedule_lower).map_err(|e| (2, e))?
            };
            let (reminder_every, reminder_unit) = match reminder_on {
                Some(_) => (2, TimeUnit::Days),
                None if reminder.is_empty() => (2, TimeUnit::Days),
                None => parse_amount(&reminder).map_err(|e| (3, e))?,
            };
            ScheduleDraft::OneOff { duration, duration_unit, reminder_every, reminder_unit }
        }
    };

    Ok(TaskDraft {
        title: title.to_string(),
        description: Some(description.to_string()).filter(|d| !d.trim().is_empty()),
        schedule,
        reminder_days_of_week,
    })
}

/// `14`, `2 weeks`, `3w`, `1 month`.
fn parse_amount(s: &str) -> Result<(u32, TimeUnit), String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    let n = num
        .parse::<u32>()
        .map_err(|_| format!("Expected a number, got '{}'.", s))?;
    let unit = if unit.trim().is_empty() { TimeUnit::Days } else { unit.parse::<TimeUnit>()? };
    Ok((n, unit))
}
