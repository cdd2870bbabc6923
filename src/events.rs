//! Events reported to observers.
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

/// Externally visible state of a process.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessState {
    Running,
    Stopped,
}

/// A lifecycle transition of a named process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub name: String,
    pub status: ProcessState,
    /// Exit code of an unexpected exit. `None` for manual stops, for running
    /// transitions, and for processes killed by a signal.
    pub exit_code: Option<i32>,
}

impl ProcessStatus {
    pub fn running(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: ProcessState::Running,
            exit_code: None,
        }
    }

    pub fn stopped(name: &str, exit_code: Option<i32>) -> Self {
        Self {
            name: name.to_string(),
            status: ProcessState::Stopped,
            exit_code,
        }
    }
}

/// One line of output from a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutput {
    pub name: String,
    pub line: String,
    pub is_stderr: bool,
}

/// Either kind of event, as carried over channels or serialized by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SupervisorEvent {
    Status(ProcessStatus),
    Output(ProcessOutput),
}

impl SupervisorEvent {
    /// Name of the process the event belongs to.
    pub fn name(&self) -> &str {
        match self {
            SupervisorEvent::Status(status) => &status.name,
            SupervisorEvent::Output(output) => &output.name,
        }
    }
}
