//! Process spawner.
//!
//! Turns a [`ProcessDefinition`] into a running process group: builds the
//! shell invocation, reserves the name, starts the child with piped output,
//! then hands the pipes to the output readers and the child to its monitor.
use std::{
    os::unix::process::CommandExt,
    path::Path,
    process::{Command, Stdio},
    sync::{Arc, mpsc},
};

use nix::sys::signal::Signal;
use tracing::{debug, error, info, warn};

use crate::{
    constants::{SESSION_ENV_KEY, SHELL_COMMAND_FLAG},
    envfile::EnvVars,
    error::SupervisorError,
    events::ProcessStatus,
    monitor,
    output::{OutputStream, spawn_output_reader},
    process,
    procfile::{ProcessDefinition, working_dir_for},
    registry::{CancelToken, ExitFlag, ProcessHandle},
    session::{SessionId, SessionRecord},
    supervisor::Inner,
};

/// Builds `<shell> -c <command>` for `definition`.
///
/// The child inherits the supervisor's environment plus `env`, and always
/// carries the session tag. It becomes the leader of a new process group.
pub fn build_command(
    shell: &str,
    definition: &ProcessDefinition,
    working_dir: Option<&Path>,
    env: &EnvVars,
    session: &SessionId,
) -> Command {
    let mut command = Command::new(shell);
    command
        .arg(SHELL_COMMAND_FLAG)
        .arg(&definition.command)
        .envs(env)
        .env(SESSION_ENV_KEY, session.as_str())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);

    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    command
}

impl Inner {
    /// Spawns `definition` unless its name is already registered.
    ///
    /// Spawn failures are returned and leave nothing registered.
    pub(crate) fn spawn(
        self: &Arc<Self>,
        definition: &ProcessDefinition,
    ) -> Result<(), SupervisorError> {
        let name = definition.name.as_str();

        let (ticket, working_dir, env) = {
            let mut state = self.state.lock()?;
            if state.registry.contains(name) {
                debug!("'{name}' is already running; ignoring start");
                return Ok(());
            }
            let ticket = state.next_ticket();
            state.registry.reserve(name, ticket);
            let working_dir = state.source.as_deref().map(working_dir_for);
            (ticket, working_dir, state.env.clone())
        };

        let mut command = build_command(
            &self.config.shell,
            definition,
            working_dir.as_deref(),
            &env,
            &self.session,
        );
        debug!(
            "Spawning '{name}': {} {SHELL_COMMAND_FLAG} {:?}",
            self.config.shell, definition.command
        );

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.lock_state().registry.remove_owned(name, ticket);
                error!("Failed to start '{name}': {source}");
                return Err(SupervisorError::SpawnError {
                    process: name.to_string(),
                    source,
                });
            }
        };

        let pid = child.id();
        let pgid = process::process_group_of(pid);
        debug!("'{name}' spawned with pid {pid} in process group {pgid}");

        let record = SessionRecord {
            session_id: self.session.clone(),
            process_group_id: pgid,
        };
        if let Err(err) = self.session_log.append(&record) {
            warn!("Failed to record process group {pgid} of '{name}' in session log: {err}");
        }

        self.observer.on_status(ProcessStatus::running(name));

        let buffer_size = self.config.output_buffer;
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            let observer = Arc::clone(&self.observer);
            readers.push(spawn_output_reader(
                name,
                stdout,
                OutputStream::Stdout,
                buffer_size,
                observer,
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            let observer = Arc::clone(&self.observer);
            readers.push(spawn_output_reader(
                name,
                stderr,
                OutputStream::Stderr,
                buffer_size,
                observer,
            ));
        }

        let cancel = CancelToken::new();
        let exited = ExitFlag::new();
        let (registered_tx, registered_rx) = mpsc::channel();
        let monitor = monitor::spawn_monitor(
            Arc::clone(self),
            definition.clone(),
            ticket,
            child,
            readers,
            monitor::MonitorSignals {
                registered: registered_rx,
                cancel: cancel.clone(),
                exited: exited.clone(),
            },
        );

        let handle = ProcessHandle {
            name: name.to_string(),
            pid,
            pgid,
            ticket,
            cancel,
            exited,
            monitor: Some(monitor),
        };

        let promoted = self.lock_state().registry.promote(handle);
        let _ = registered_tx.send(());

        match promoted {
            Ok(()) => {
                info!("'{name}' running (pid {pid})");
                Ok(())
            }
            Err(mut handle) => {
                // Stopped while starting: nobody else knows about this child.
                info!("'{name}' was stopped while starting; killing pid {pid}");
                handle.cancel.cancel();
                process::signal_group(pgid, Signal::SIGKILL);
                if let Some(monitor) = handle.monitor.take()
                    && monitor.join().is_err()
                {
                    warn!("Monitor thread for '{name}' panicked");
                }
                self.observer.on_status(ProcessStatus::stopped(name, None));
                Ok(())
            }
        }
    }
}

/// Spawn used by the restart cool-down, which has no caller to report to.
pub(crate) fn respawn(inner: &Arc<Inner>, definition: &ProcessDefinition) {
    let name = &definition.name;
    if let Err(err) = inner.spawn(definition) {
        error!("Failed to restart '{name}': {err}");
    }
}
