//! Progress Pulse library: task model, schedule arithmetic, persistence and
//! progress narratives. The `pulse` binary puts a CLI and a terminal
//! dashboard on top of it.

pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod narrative;
pub mod schedule;
pub mod storage;
pub mod tui;
pub mod validation;

pub use error::{Error, Result};
