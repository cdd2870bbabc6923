//! Event sinks.
//!
//! The supervisor never waits on an observer: callbacks are invoked from the
//! spawning caller, output reader threads and monitor threads, always without
//! the registry lock held.
use std::{
    io::{self, Write},
    sync::mpsc::Sender,
};

use tracing::warn;

use crate::events::{ProcessOutput, ProcessState, ProcessStatus, SupervisorEvent};

/// Receives process lifecycle and output events.
pub trait Observer: Send + Sync {
    fn on_status(&self, status: ProcessStatus);
    fn on_output(&self, output: ProcessOutput);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn on_status(&self, _status: ProcessStatus) {}
    fn on_output(&self, _output: ProcessOutput) {}
}

/// Forwards events into an mpsc channel. Sends to a dropped receiver are ignored.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: Sender<SupervisorEvent>,
}

impl ChannelObserver {
    pub fn new(sender: Sender<SupervisorEvent>) -> Self {
        Self { sender }
    }
}

impl Observer for ChannelObserver {
    fn on_status(&self, status: ProcessStatus) {
        let _ = self.sender.send(SupervisorEvent::Status(status));
    }

    fn on_output(&self, output: ProcessOutput) {
        let _ = self.sender.send(SupervisorEvent::Output(output));
    }
}

/// How [`ConsoleObserver`] renders events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleFormat {
    /// `name | line` for stdout, `name ! line` for stderr, `name: state` for status.
    #[default]
    Text,
    /// One JSON-encoded [`SupervisorEvent`] per line.
    Json,
}

/// Writes events to standard output.
#[derive(Debug, Clone, Default)]
pub struct ConsoleObserver {
    format: ConsoleFormat,
}

impl ConsoleObserver {
    pub fn new(format: ConsoleFormat) -> Self {
        Self { format }
    }

    /// Renders an event as a single line, without the trailing newline.
    pub fn render(&self, event: &SupervisorEvent) -> String {
        match self.format {
            ConsoleFormat::Json => serde_json::to_string(event).unwrap_or_else(|err| {
                warn!("Failed to serialize event for '{}': {err}", event.name());
                String::new()
            }),
            ConsoleFormat::Text => match event {
                SupervisorEvent::Status(status) => match (status.status, status.exit_code) {
                    (ProcessState::Stopped, Some(code)) => {
                        format!("{}: stopped (exit {code})", status.name)
                    }
                    (state, _) => format!("{}: {state}", status.name),
                },
                SupervisorEvent::Output(output) => {
                    let marker = if output.is_stderr { '!' } else { '|' };
                    format!("{} {marker} {}", output.name, output.line)
                }
            },
        }
    }

    fn emit(&self, event: SupervisorEvent) {
        let line = self.render(&event);
        if line.is_empty() {
            return;
        }
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{line}");
        let _ = stdout.flush();
    }
}

impl Observer for ConsoleObserver {
    fn on_status(&self, status: ProcessStatus) {
        self.emit(SupervisorEvent::Status(status));
    }

    fn on_output(&self, output: ProcessOutput) {
        self.emit(SupervisorEvent::Output(output));
    }
}
