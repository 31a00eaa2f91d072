//! # Progress Pulse
//!
//! Track tasks with smart reminders from the terminal. Tasks are either one-off
//! (a duration in days, weeks or months and a reminder cadence) or recurring
//! (daily, or weekly on chosen weekdays). Pulse works out how far along you
//! should be, when the next reminder is, and asks a language model for a short
//! progress narrative, falling back to a local summary when it can't.
//!
//! ## Usage
//!
//! ```bash
//! # Interactive dashboard
//! pulse
//!
//! # One-off task: two weeks, reminder every 3 days
//! pulse add "Write report" --duration 2 --duration-unit weeks --remind-every 3
//!
//! # Weekly habit on Mon/Wed/Fri at 07:30
//! pulse add "Morning run" --recur weekly --days mon,wed,fri --reminder-time 07:30
//!
//! pulse list
//! pulse reminders
//! pulse update 3f2a "Finished the outline"
//! pulse complete 3f2a
//! ```
//!
//! Tasks are addressed by any unique prefix of their id.
//!
//! ## Data Storage
//!
//! Tasks are saved as one JSON file in your local data directory:
//! *   Linux: `~/.local/share/progress-pulse/tasks.json`
//! *   macOS: `~/Library/Application Support/progress-pulse/tasks.json`
//! *   Windows: `%LOCALAPPDATA%\progress-pulse\tasks.json`
//!
//! Override with `PULSE_DB` or `data_file` in `config.toml`.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::EnvFilter;

use progress_pulse::commands::*;
use progress_pulse::config::Config;
use progress_pulse::models::{RecurrencePattern, TimeUnit};
use progress_pulse::narrative::{self, openai, server::NarrativeServer, NarrativeService};
use progress_pulse::storage::TaskStore;
use progress_pulse::tui::run_tui;
use progress_pulse::validation::{parse_weekdays, ScheduleDraft, TaskDraft};
use progress_pulse::{Error, Result};

#[derive(Parser)]
#[command(name = "pulse", version)]
#[command(about = "Track tasks with smart reminders", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        /// Task title (quoted if it has spaces)
        title: String,
        /// Longer description
        #[arg(short = 'D', long)]
        description: Option<String>,
        /// How long the task should take
        #[arg(short, long, default_value_t = 14)]
        duration: u32,
        /// Unit of --duration (days, weeks, months)
        #[arg(long, default_value = "days")]
        duration_unit: TimeUnit,
        /// Remind every N units
        #[arg(short = 'e', long, default_value_t = 2)]
        remind_every: u32,
        /// Unit of --remind-every (days, weeks, months)
        #[arg(long, default_value = "days")]
        reminder_unit: TimeUnit,
        /// Make the task recurring (daily, weekly)
        #[arg(short, long)]
        recur: Option<RecurrencePattern>,
        /// Weekdays a weekly task runs on, e.g. mon,wed,fri or 1,3,5
        #[arg(long)]
        days: Option<String>,
        /// Reminder time for recurring tasks (HH:MM)
        #[arg(long)]
        reminder_time: Option<String>,
        /// Time a recurring task should be done by (HH:MM)
        #[arg(long)]
        completion_time: Option<String>,
        /// Weekdays to send reminders on, overriding the cadence
        #[arg(long)]
        remind_on: Option<String>,
    },
    /// List tasks
    List {
        /// Show completed tasks
        #[arg(short, long)]
        all: bool,
    },
    /// Show one task in detail
    Show {
        id: String,
    },
    /// Mark a task as complete
    Complete {
        id: String,
    },
    /// Remove a task
    Remove {
        id: String,
    },
    /// Ask for a fresh progress narrative
    Update {
        id: String,
        /// What you did or where you're stuck
        message: Option<String>,
    },
    /// Show tasks that need attention today
    Reminders,
    /// Manage checklist steps
    Step {
        #[command(subcommand)]
        command: StepCommands,
    },
    /// Serve the narrative endpoint over HTTP
    Serve {
        /// Address to bind, e.g. 127.0.0.1:8787
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Delete all tasks
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
    /// Open interactive dashboard
    Ui,
}

#[derive(Subcommand)]
enum StepCommands {
    /// Add a step to a task
    Add {
        id: String,
        text: String,
    },
    /// Toggle a step done / not done
    Done {
        id: String,
        /// Step number as shown by `pulse show`
        position: usize,
    },
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("progress_pulse=warn")),
        )
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let is_ui = matches!(cli.command, Some(Commands::Ui) | None);
    if !is_ui {
        init_stderr_logging();
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "pulse", &mut io::stdout());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;

    if let Some(Commands::Serve { bind }) = &cli.command {
        let bind = bind.clone().unwrap_or_else(|| config.server.bind.clone());
        let narrator = config.narrative.api_key.as_deref().map(|key| {
            std::sync::Arc::new(openai::OpenAiNarrator::new(
                openai::OpenAiConfig::from_narrative_config(&config.narrative, key),
            )) as std::sync::Arc<dyn NarrativeService>
        });
        if narrator.is_none() {
            eprintln!("OPENAI_API_KEY is not set; every request will get the error fallback.");
        }
        let runtime = tokio::runtime::Runtime::new()?;
        return runtime.block_on(async {
            let server = NarrativeServer::start(narrator, &bind).await?;
            println!("Serving {}", server.url());
            server.wait().await;
            Ok::<(), Error>(())
        });
    }

    let opened = TaskStore::open(&config.data_file)?;
    if let Some(notice) = &opened.recovered {
        eprintln!("Warning: {}. Starting with an empty task list.", notice);
    }
    let mut store = opened.store;

    let now = Local::now().fixed_offset();
    let today = now.date_naive();

    match cli.command {
        Some(Commands::Add {
            title,
            description,
            duration,
            duration_unit,
            remind_every,
            reminder_unit,
            recur,
            days,
            reminder_time,
            completion_time,
            remind_on,
        }) => {
            let weekdays = |raw: Option<String>| -> Result<Vec<u8>> {
                raw.map(|s| parse_weekdays(&s).map_err(Error::InvalidInput))
                    .transpose()
                    .map(Option::unwrap_or_default)
            };
            let schedule = match recur {
                Some(pattern) => ScheduleDraft::Recurring {
                    pattern,
                    days_of_week: weekdays(days)?,
                    reminder_time,
                    completion_time,
                },
                None => ScheduleDraft::OneOff {
                    duration,
                    duration_unit,
                    reminder_every: remind_every,
                    reminder_unit,
                },
            };
            let draft = TaskDraft {
                title,
                description,
                schedule,
                reminder_days_of_week: weekdays(remind_on)?,
            };
            cmd_add(&mut store, draft, now, false).map(|_| ())
        }
        Some(Commands::List { all }) => {
            cmd_list(&store, all, today);
            Ok(())
        }
        Some(Commands::Show { id }) => cmd_show(&store, &id, today),
        Some(Commands::Complete { id }) => cmd_complete(&mut store, &id, false),
        Some(Commands::Remove { id }) => cmd_remove(&mut store, &id, false),
        Some(Commands::Update { id, message }) => {
            let service = narrative::service_from_config(&config.narrative);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime
                .block_on(cmd_update(
                    &mut store,
                    &id,
                    message,
                    service.as_deref(),
                    today,
                    config.narrative.timeout(),
                    false,
                ))
                .map(|_| ())
        }
        Some(Commands::Reminders) => {
            cmd_reminders(&store, today);
            Ok(())
        }
        Some(Commands::Step { command }) => match command {
            StepCommands::Add { id, text } => cmd_step_add(&mut store, &id, &text, false).map(|_| ()),
            StepCommands::Done { id, position } => cmd_step_done(&mut store, &id, position, now, false).map(|_| ()),
        },
        Some(Commands::Reset { force }) => cmd_reset(&mut store, force),
        Some(Commands::Ui) | None => {
            let _guard = init_file_logging(&config);
            Ok(run_tui(store, &config)?)
        }
        Some(Commands::Completions { .. }) | Some(Commands::Serve { .. }) => Ok(()),
    }
}

/// Dashboard logs go to `pulse.log` next to the data file.
fn init_file_logging(config: &Config) -> tracing_appender::non_blocking::WorkerGuard {
    let appender = tracing_appender::rolling::never(config.log_dir(), "pulse.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("progress_pulse=info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    guard
}
