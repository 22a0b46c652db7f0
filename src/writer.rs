//! Status writer.
//!
//! Turns a status update from the web UI into a full status record, replaces
//! the status file with it, and publishes the resulting run state.

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
    codec::StatusRecord,
    state::RunStateHandle,
    traits::StatusStore,
    types::{RunState, Setting, StatusError},
};

/// A single value in a status update.
///
/// The UI sends a mix of strings, numbers and booleans; all of them are
/// written in their textual form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// A string value, written as is.
    Text(String),
    /// A JSON number, written in its shortest textual form.
    Number(serde_json::Number),
    /// A boolean, written as `true` or `false`.
    Flag(bool),
}

impl SettingValue {
    /// Returns the textual form written to the status file.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
            Self::Flag(b) => b.to_string(),
        }
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Task fields carried by a status update.
///
/// Every field is optional; absent or empty fields get their write default.
/// Other fields of the UI's task object are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskSnapshot {
    /// Part/joint under test.
    pub part: Option<SettingValue>,
    /// Commanded speed.
    pub speed: Option<SettingValue>,
    /// Start position.
    pub pos1: Option<SettingValue>,
    /// End position.
    pub pos2: Option<SettingValue>,
    /// Total cycle target.
    pub total_cycle: Option<SettingValue>,
    /// Cycles completed so far.
    pub current_cycle: Option<SettingValue>,
    /// Manual jog flag.
    pub jogging: Option<SettingValue>,
}

/// A status update as posted by the web UI: `{action, task}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusUpdate {
    /// Requested action (`running`, `stop`, `pause`, ...).
    #[serde(default)]
    pub action: Option<SettingValue>,
    /// Task parameters.
    pub task: TaskSnapshot,
}

impl StatusUpdate {
    /// Creates an update with the given action and task.
    pub fn new(action: impl Into<SettingValue>, task: TaskSnapshot) -> Self {
        Self { action: Some(action.into()), task }
    }

    /// Applies write defaults and returns the full record.
    pub fn into_record(self) -> StatusRecord {
        let task = self.task;
        StatusRecord {
            part: resolve(task.part, Setting::Joint),
            speed: resolve(task.speed, Setting::Speed),
            pos1: resolve(task.pos1, Setting::StartPos),
            pos2: resolve(task.pos2, Setting::EndPos),
            action: resolve(self.action, Setting::RunStatus),
            total_cycle: resolve(task.total_cycle, Setting::TargetCycles),
            current_cycle: resolve(task.current_cycle, Setting::CompletedCycles),
            jogging: resolve(task.jogging, Setting::Jogging),
        }
    }
}

fn resolve(value: Option<SettingValue>, setting: Setting) -> String {
    value
        .map(SettingValue::into_text)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| setting.default_value().to_string())
}

/// Writes status updates to a [`StatusStore`] and publishes the run state.
#[derive(Debug, Clone)]
pub struct StatusWriter<S: StatusStore> {
    store: S,
    run_state: RunStateHandle,
}

impl<S: StatusStore> StatusWriter<S> {
    /// Creates a writer over `store` publishing to `run_state`.
    pub const fn new(store: S, run_state: RunStateHandle) -> Self {
        Self { store, run_state }
    }

    /// Replaces the status file with the defaults-applied update.
    ///
    /// The run state becomes [`RunState::Running`] iff the action is exactly
    /// `running`. It is only published once the file write succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::Invalid`] if a value contains a line break; the
    /// file and run state are left untouched. Returns [`StatusError::Io`] if the
    /// file cannot be written. The previous file contents are undefined in that
    /// case.
    pub async fn write(&self, update: StatusUpdate) -> Result<StatusRecord, StatusError> {
        let record = update.into_record();

        let broken = record.line_breaks();
        if !broken.is_empty() {
            warn!(settings = ?broken, "rejecting status update with line breaks");
            let keys: Vec<_> = broken.iter().map(|s| s.key()).collect();
            return Err(StatusError::Invalid(format!(
                "line break in value of {}",
                keys.join(", ")
            )));
        }

        let conflicts = record.delimiter_conflicts();
        if !conflicts.is_empty() {
            warn!(settings = ?conflicts, "status values contain CSV delimiters, writing unescaped");
        }

        if let Err(e) = self.store.replace(record.encode()).await {
            error!(location = %self.store.location(), error = %e, "failed to write status file");
            return Err(e);
        }

        self.run_state.set(RunState::from_action(&record.action));

        info!(
            action = %record.action,
            part = %record.part,
            current_cycle = %record.current_cycle,
            total_cycle = %record.total_cycle,
            "status written"
        );

        Ok(record)
    }

    /// Returns the underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns the run state handle.
    pub const fn run_state(&self) -> &RunStateHandle {
        &self.run_state
    }
}
