//! Core types for the rigbridge status channel.
//!
//! This module contains the setting keys of the status file, the in-memory
//! run state, and the error type shared throughout the crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Header line written at the top of every status file.
pub const STATUS_HEADER: &str = "Setting,Value";

/// Default location of the status file, relative to the working directory.
pub const DEFAULT_STATUS_PATH: &str = "data/hardware_settings.csv";

/// Action string that puts the rig into [`RunState::Running`].
pub const RUNNING_ACTION: &str = "running";

/// A key of the status file.
///
/// The variants are declared in the order they are written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    /// Identifier of the part/joint under test.
    Joint,
    /// Commanded speed.
    Speed,
    /// Position 1.
    StartPos,
    /// Position 2.
    EndPos,
    /// Run status as last commanded (`running`, `stop`, `pause`, ...).
    RunStatus,
    /// Total cycle target.
    TargetCycles,
    /// Cycles completed so far.
    CompletedCycles,
    /// Manual jog flag.
    Jogging,
}

impl Setting {
    /// All settings in on-disk order.
    pub const ALL: [Self; 8] = [
        Self::Joint,
        Self::Speed,
        Self::StartPos,
        Self::EndPos,
        Self::RunStatus,
        Self::TargetCycles,
        Self::CompletedCycles,
        Self::Jogging,
    ];

    /// Returns the key as it appears in the file.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Joint => "JOINT",
            Self::Speed => "SPEED",
            Self::StartPos => "START_POS",
            Self::EndPos => "END_POS",
            Self::RunStatus => "R_STATUS",
            Self::TargetCycles => "C2COMPLETE",
            Self::CompletedCycles => "CC_COMPLETE",
            Self::Jogging => "Jogging",
        }
    }

    /// Returns the value written when a status update omits this setting.
    pub const fn default_value(self) -> &'static str {
        match self {
            Self::Joint => "Part 1",
            Self::RunStatus => "STOP",
            _ => "0",
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Process-level run state.
///
/// Gates whether progress values are streamed to subscribers. This is
/// distinct from the free-text `R_STATUS` value written to the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    /// A task is running; progress is streamed.
    Running,
    /// No task is running; progress ticks are skipped.
    #[default]
    Stopped,
}

impl RunState {
    /// Derives the run state from a status update action.
    ///
    /// Only the exact action `running` starts the rig; everything else,
    /// including `pause`, stops progress streaming.
    pub fn from_action(action: &str) -> Self {
        if action == RUNNING_ACTION { Self::Running } else { Self::Stopped }
    }

    /// Returns true if the state is [`RunState::Running`].
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("RUNNING"),
            Self::Stopped => f.write_str("STOPPED"),
        }
    }
}

/// Errors that can occur while writing or reading the status channel.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// The status update was rejected before any file I/O.
    #[error("invalid status update: {0}")]
    Invalid(String),

    /// Reading or writing the status file failed.
    #[error("status file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The status file does not follow the `Setting,Value` layout.
    #[error("malformed status file: {0}")]
    Malformed(String),
}

impl StatusError {
    /// Returns true if the error was caused by the caller's input.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}
