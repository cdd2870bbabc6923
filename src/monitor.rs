//! Lifecycle monitor.
//!
//! One monitor thread per spawned process waits for the exit, drains the
//! output readers, and reconciles the registry. An exit whose entry is still
//! registered under the same ticket is a crash; anything else was a manual
//! stop and is left to the stopper to report.
use std::{
    process::{Child, ExitStatus},
    sync::{Arc, mpsc::Receiver},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::{debug, error, info, warn};

use crate::{
    config::RestartPolicy,
    constants::{AUTO_RESTART_NOTICE, MONITOR_POLL_INTERVAL, READER_DRAIN_TIMEOUT},
    events::{ProcessOutput, ProcessStatus},
    procfile::ProcessDefinition,
    registry::{CancelToken, ExitFlag, Ticket},
    spawn,
    supervisor::Inner,
};

/// Coordination shared between a monitor and the rest of the supervisor.
pub(crate) struct MonitorSignals {
    /// Fires once the spawner has tried to register the process.
    pub registered: Receiver<()>,
    pub cancel: CancelToken,
    pub exited: ExitFlag,
}

/// What to do after an unexpected exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Clean exit; the crash counter is reset.
    Completed,
    /// Terminated by a signal without an exit code. Not restarted.
    Killed,
    /// Crashed but auto-restart is off.
    Disabled,
    /// Respawn after the cool-down as consecutive crash number `attempt`.
    Restart { attempt: u32 },
    /// Crashed more often than the policy allows.
    GiveUp { attempts: u32 },
}

/// Decides how to react to an exit. Only a non-zero exit code is a crash;
/// `None` means the process was killed by a signal and stays stopped.
pub fn decide_restart(
    exit_code: Option<i32>,
    auto_restart: bool,
    previous_crashes: u32,
    policy: &RestartPolicy,
) -> RestartDecision {
    match exit_code {
        Some(0) => return RestartDecision::Completed,
        None => return RestartDecision::Killed,
        Some(_) => {}
    }
    if !auto_restart {
        return RestartDecision::Disabled;
    }

    let attempt = previous_crashes.saturating_add(1);
    match policy.max_attempts {
        Some(max) if attempt > max => RestartDecision::GiveUp {
            attempts: previous_crashes,
        },
        _ => RestartDecision::Restart { attempt },
    }
}

pub(crate) fn spawn_monitor(
    inner: Arc<Inner>,
    definition: ProcessDefinition,
    ticket: Ticket,
    child: Child,
    readers: Vec<JoinHandle<()>>,
    signals: MonitorSignals,
) -> JoinHandle<()> {
    thread::spawn(move || monitor(inner, definition, ticket, child, readers, signals))
}

fn monitor(
    inner: Arc<Inner>,
    definition: ProcessDefinition,
    ticket: Ticket,
    mut child: Child,
    readers: Vec<JoinHandle<()>>,
    signals: MonitorSignals,
) {
    let name = definition.name.as_str();
    let _ = signals.registered.recv();

    let status = wait_for_exit(&mut child, name);
    signals.exited.mark();
    drain_readers(name, readers);

    let exit_code = status.and_then(|status| status.code());

    if signals.cancel.is_cancelled() {
        debug!("'{name}' exited after a manual stop");
        return;
    }

    let (decision, restart_token) = {
        let mut state = inner.lock_state();
        if state.registry.remove_owned(name, ticket).is_none() {
            debug!("'{name}' exited after a manual stop");
            return;
        }

        let previous = state.crash_counts.get(name).copied().unwrap_or(0);
        let decision = decide_restart(
            exit_code,
            state.auto_restart,
            previous,
            &inner.config.restart,
        );
        let mut restart_token = None;
        match decision {
            RestartDecision::Completed => {
                state.crash_counts.remove(name);
            }
            RestartDecision::Restart { attempt } => {
                state.crash_counts.insert(name.to_string(), attempt);
                let token = state.next_ticket();
                state.pending_restarts.insert(name.to_string(), token);
                restart_token = Some(token);
            }
            RestartDecision::Killed
            | RestartDecision::Disabled
            | RestartDecision::GiveUp { .. } => {}
        }
        (decision, restart_token)
    };

    match exit_code {
        Some(0) => info!("'{name}' exited cleanly"),
        Some(code) => warn!("'{name}' crashed with exit code {code}"),
        None => warn!("'{name}' was terminated by a signal"),
    }
    inner.observer.on_status(ProcessStatus::stopped(name, exit_code));

    match (decision, restart_token) {
        (RestartDecision::Restart { attempt }, Some(token)) => {
            schedule_restart(inner, definition, token, attempt);
        }
        (RestartDecision::GiveUp { attempts }, _) => {
            error!("'{name}' crashed {attempts} time(s) in a row; giving up on restarts");
        }
        (RestartDecision::Disabled, _) => {
            debug!("Auto-restart disabled; leaving '{name}' stopped");
        }
        (RestartDecision::Killed, _) => {
            info!("'{name}' was killed externally; leaving it stopped");
        }
        _ => {}
    }
}

fn wait_for_exit(child: &mut Child, name: &str) -> Option<ExitStatus> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => thread::sleep(MONITOR_POLL_INTERVAL),
            Err(err) => {
                error!("Failed to check status of '{name}': {err}");
                return child.wait().ok();
            }
        }
    }
}

/// Joins the output readers, giving up on readers whose pipe is held open by
/// a surviving descendant.
fn drain_readers(name: &str, readers: Vec<JoinHandle<()>>) {
    let deadline = Instant::now() + READER_DRAIN_TIMEOUT;
    for reader in readers {
        while !reader.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        if !reader.is_finished() {
            debug!("Output reader for '{name}' still open after exit; detaching it");
            continue;
        }
        let _ = reader.join();
    }
}

/// Waits out the cool-down, then respawns `definition` unless the restart
/// was cancelled or auto-restart was switched off meanwhile.
fn schedule_restart(
    inner: Arc<Inner>,
    definition: ProcessDefinition,
    token: Ticket,
    attempt: u32,
) {
    let cooldown = inner.config.restart.cooldown;
    warn!(
        "Restarting '{}' in {cooldown:?} (attempt {attempt})",
        definition.name
    );

    thread::spawn(move || {
        thread::sleep(cooldown);
        let name = definition.name.as_str();

        {
            let mut state = inner.lock_state();
            if state.pending_restarts.get(name) != Some(&token) {
                debug!("Restart of '{name}' was cancelled");
                return;
            }
            if !state.auto_restart {
                state.pending_restarts.remove(name);
                info!("Auto-restart disabled during cool-down; not restarting '{name}'");
                return;
            }
        }

        inner.observer.on_output(ProcessOutput {
            name: name.to_string(),
            line: AUTO_RESTART_NOTICE.to_string(),
            is_stderr: false,
        });
        spawn::respawn(&inner, &definition);

        let mut state = inner.lock_state();
        if state.pending_restarts.get(name) == Some(&token) {
            state.pending_restarts.remove(name);
        }
    });
}
