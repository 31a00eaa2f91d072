use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Narrative, Step, Task, TaskId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access task file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("task file {path} is unreadable and was set aside: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize tasks: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Returns the default path of the task file (`tasks.json`).
///
/// `~/.local/share/progress-pulse/tasks.json` on Linux, or `./tasks.json`
/// when no data directory is known.
pub fn default_db_path() -> PathBuf {
    let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push("progress-pulse");
    p.push("tasks.json");
    p
}

/// The in-memory task list backed by one JSON file.
///
/// Mutations only change memory; nothing reaches disk until [`TaskStore::save`]
/// rewrites the whole file.
#[derive(Debug)]
pub struct TaskStore {
    path: PathBuf,
    tasks: Vec<Task>,
}

/// Result of opening a store.
#[derive(Debug)]
pub struct Opened {
    pub store: TaskStore,
    /// Set when the file could not be parsed and the store started empty.
    pub recovered: Option<StoreError>,
}

impl TaskStore {
    /// Loads all tasks from `path`.
    ///
    /// A missing file gives an empty store. A file that does not parse is
    /// renamed to `<name>.corrupt` and the store starts empty; the parse error
    /// is returned in [`Opened::recovered`].
    pub fn open(path: impl Into<PathBuf>) -> std::result::Result<Opened, StoreError> {
        let path = path.into();
        if !path.exists() {
            debug!(path = %path.display(), "task file missing, starting empty");
            return Ok(Opened { store: TaskStore { path, tasks: Vec::new() }, recovered: None });
        }

        // Raw bytes: invalid UTF-8 is a corrupt file, not an I/O failure.
        let bytes = fs::read(&path).map_err(|source| StoreError::Io { path: path.clone(), source })?;

        match serde_json::from_slice::<Vec<Task>>(&bytes) {
            Ok(tasks) => {
                debug!(path = %path.display(), count = tasks.len(), "loaded tasks");
                Ok(Opened { store: TaskStore { path, tasks }, recovered: None })
            }
            Err(source) => {
                let aside = corrupt_path(&path);
                if let Err(e) = fs::rename(&path, &aside) {
                    warn!(error = %e, "could not move unreadable task file aside");
                }
                warn!(path = %path.display(), error = %source, "discarding unreadable task file");
                Ok(Opened {
                    store: TaskStore { path: path.clone(), tasks: Vec::new() },
                    recovered: Some(StoreError::Corrupt { path, source }),
                })
            }
        }
    }

    /// Writes every task to the file, replacing its contents.
    pub fn save(&self) -> std::result::Result<(), StoreError> {
        let s = serde_json::to_string_pretty(&self.tasks).map_err(StoreError::Serialize)?;
        let io_err = |source| StoreError::Io { path: self.path.clone(), source };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(io_err)?;
        f.write_all(s.as_bytes()).map_err(io_err)?;
        debug!(path = %self.path.display(), count = self.tasks.len(), "saved tasks");
        Ok(())
    }

    /// Deletes the task file and clears memory.
    pub fn reset(&mut self) -> std::result::Result<(), StoreError> {
        self.tasks.clear();
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|source| StoreError::Io { path: self.path.clone(), source })?;
        }
        info!(path = %self.path.display(), "task file deleted");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Finds the single task whose id starts with `prefix` (hyphens ignored).
    pub fn resolve(&self, prefix: &str) -> Result<&Task> {
        let needle = prefix.trim().replace('-', "").to_lowercase();
        if needle.is_empty() {
            return Err(Error::TaskNotFound(prefix.to_string()));
        }
        let mut matches = self
            .tasks
            .iter()
            .filter(|t| t.id.simple().to_string().starts_with(&needle));
        match (matches.next(), matches.next()) {
            (Some(t), None) => Ok(t),
            (Some(_), Some(_)) => Err(Error::AmbiguousId(prefix.to_string())),
            (None, _) => Err(Error::TaskNotFound(prefix.to_string())),
        }
    }

    pub fn add(&mut self, task: Task) {
        info!(task = %task.id, title = %task.title, "task added");
        self.tasks.push(task);
    }

    /// Marks a task complete. Returns `false` if it already was.
    pub fn complete(&mut self, id: TaskId) -> Result<bool> {
        let task = self.get_mut(id)?;
        if task.completed {
            return Ok(false);
        }
        task.completed = true;
        info!(task = %id, "task completed");
        Ok(true)
    }

    /// Removes a task for good.
    pub fn remove(&mut self, id: TaskId) -> Result<Task> {
        let idx = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        let task = self.tasks.remove(idx);
        info!(task = %id, "task removed");
        Ok(task)
    }

    /// Replaces a task's narrative. Returns `false` if the task no longer exists.
    pub fn set_narrative(&mut self, id: TaskId, narrative: &Narrative) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.progress_made = Some(narrative.progress_made.clone());
                task.progress_to_go = Some(narrative.progress_to_go.clone());
                debug!(task = %id, "narrative updated");
                true
            }
            None => false,
        }
    }

    /// Appends a checklist step and returns its 1-based position.
    pub fn add_step(&mut self, id: TaskId, text: &str) -> Result<usize> {
        let task = self.get_mut(id)?;
        task.steps.push(Step {
            id: Uuid::new_v4(),
            text: text.trim().to_string(),
            completed: false,
            completed_at: None,
        });
        Ok(task.steps.len())
    }

    /// Flips a step's completion. Returns the new state.
    pub fn toggle_step(&mut self, id: TaskId, position: usize, now: DateTime<FixedOffset>) -> Result<bool> {
        let task = self.get_mut(id)?;
        let short = task.short_id();
        let step = position
            .checked_sub(1)
            .and_then(|i| task.steps.get_mut(i))
            .ok_or(Error::StepNotFound { task: short, position })?;
        step.completed = !step.completed;
        step.completed_at = step.completed.then_some(now);
        Ok(step.completed)
    }

    fn get_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".corrupt");
    path.with_file_name(name)
}
