//! Supervisor facade.
//!
//! [`Supervisor`] is the public operation set. All shared state lives in one
//! [`State`] behind a single mutex that is held for map mutation only: signal
//! delivery, process creation and observer callbacks happen after it is
//! released.
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::Instant,
};

use tracing::{debug, info, warn};

use crate::{
    config::SupervisorConfig,
    constants::{MONITOR_POLL_INTERVAL, STOP_REAP_TIMEOUT},
    envfile::EnvVars,
    error::SupervisorError,
    events::ProcessStatus,
    observer::Observer,
    process,
    procfile::ProcessDefinition,
    reaper::Reaper,
    registry::{Entry, Registry, Ticket},
    session::{SessionId, SessionLog},
};

/// Mutable supervisor state, guarded by [`Inner::state`].
#[derive(Debug)]
pub(crate) struct State {
    pub(crate) definitions: Vec<ProcessDefinition>,
    /// Where the definitions were loaded from; its directory is the working
    /// directory of every spawned process.
    pub(crate) source: Option<PathBuf>,
    pub(crate) env: EnvVars,
    pub(crate) registry: Registry,
    pub(crate) auto_restart: bool,
    /// Consecutive crash restarts per name.
    pub(crate) crash_counts: HashMap<String, u32>,
    /// Names waiting out a restart cool-down, keyed to the token of that wait.
    pub(crate) pending_restarts: HashMap<String, Ticket>,
    next_ticket: Ticket,
}

impl State {
    fn new(auto_restart: bool) -> Self {
        Self {
            definitions: Vec::new(),
            source: None,
            env: EnvVars::new(),
            registry: Registry::new(),
            auto_restart,
            crash_counts: HashMap::new(),
            pending_restarts: HashMap::new(),
            next_ticket: 0,
        }
    }

    pub(crate) fn next_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        self.next_ticket
    }

    pub(crate) fn definition(&self, name: &str) -> Option<&ProcessDefinition> {
        self.definitions.iter().find(|def| def.name == name)
    }
}

/// Shared core handed to spawner, monitor and cool-down threads.
pub(crate) struct Inner {
    pub(crate) state: Mutex<State>,
    pub(crate) config: SupervisorConfig,
    pub(crate) session: SessionId,
    pub(crate) session_log: SessionLog,
    pub(crate) observer: Arc<dyn Observer>,
}

impl Inner {
    /// Lock for background threads, which recover from poisoning rather than
    /// abandon the processes they are responsible for.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stops `name` if it is registered and cancels a pending restart.
    ///
    /// Returns once the monitor has observed the exit, so a following start
    /// never races the old instance.
    pub(crate) fn stop(&self, name: &str) -> Result<(), SupervisorError> {
        let entry = {
            let mut state = self.state.lock()?;
            if state.pending_restarts.remove(name).is_some() {
                info!("Cancelled pending restart of '{name}'");
            }
            state.registry.remove(name)
        };

        let mut handle = match entry {
            None => {
                debug!("Stop requested for '{name}', which is not running");
                return Ok(());
            }
            Some(Entry::Starting { .. }) => {
                debug!("Stop requested for '{name}' while it is starting");
                return Ok(());
            }
            Some(Entry::Running(handle)) => handle,
        };

        info!("Stopping '{name}' (pid {}, pgid {})", handle.pid, handle.pgid);
        handle.cancel.cancel();
        process::terminate_group(handle.pgid, self.config.stop_grace, &handle.exited);

        if let Some(monitor) = handle.monitor.take() {
            join_monitor(name, monitor);
        }

        self.observer.on_status(ProcessStatus::stopped(name, None));
        Ok(())
    }
}

fn join_monitor(name: &str, monitor: JoinHandle<()>) {
    if monitor.thread().id() == thread::current().id() {
        return;
    }

    let deadline = Instant::now() + STOP_REAP_TIMEOUT;
    while !monitor.is_finished() {
        if Instant::now() >= deadline {
            warn!("Monitor for '{name}' did not finish within {STOP_REAP_TIMEOUT:?}");
            return;
        }
        thread::sleep(MONITOR_POLL_INTERVAL);
    }
    if monitor.join().is_err() {
        warn!("Monitor thread for '{name}' panicked");
    }
}

/// Starts, stops and restarts named shell commands and reports on them.
///
/// Cloning is cheap; clones share the same processes.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    /// Creates a supervisor with a fresh session id.
    ///
    /// When `config.reap_orphans` is set, process groups left behind by
    /// previous sessions are killed before this returns.
    pub fn new(config: SupervisorConfig, observer: Arc<dyn Observer>) -> Self {
        let session = SessionId::generate();
        let session_log = SessionLog::new(config.session_log_path());
        info!("Supervisor session {session} (log: {:?})", session_log.path());

        if config.reap_orphans {
            let reaped = Reaper::for_scan(config.orphan_scan, session_log.clone()).run(&session);
            if reaped > 0 {
                info!("Terminated {reaped} orphaned process(es) from previous sessions");
            }
        }

        let state = State::new(config.auto_restart);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                config,
                session,
                session_log,
                observer,
            }),
        }
    }

    /// Replaces the definitions. Running processes keep running.
    pub fn load_definitions(
        &self,
        definitions: Vec<ProcessDefinition>,
        source: Option<&Path>,
        env: EnvVars,
    ) -> Result<(), SupervisorError> {
        let mut state = self.inner.state.lock()?;
        debug!("Loaded {} process definition(s)", definitions.len());
        state.definitions = definitions;
        state.source = source.map(Path::to_path_buf);
        state.env = env;
        Ok(())
    }

    /// Starts `name`. Unknown or already running names are a no-op.
    pub fn start(&self, name: &str) -> Result<(), SupervisorError> {
        let definition = {
            let mut state = self.inner.state.lock()?;
            let Some(definition) = state.definition(name).cloned() else {
                debug!("Start requested for unknown process '{name}'");
                return Ok(());
            };
            state.crash_counts.remove(name);
            definition
        };

        self.inner.spawn(&definition)
    }

    /// Stops `name`, blocking until it has exited. Not running is a no-op.
    pub fn stop(&self, name: &str) -> Result<(), SupervisorError> {
        self.inner.stop(name)
    }

    /// `stop` followed by `start`.
    pub fn restart(&self, name: &str) -> Result<(), SupervisorError> {
        self.stop(name)?;
        self.start(name)
    }

    /// Starts every enabled definition, stopping at the first spawn error.
    pub fn start_all(&self) -> Result<(), SupervisorError> {
        let definitions = self.inner.state.lock()?.definitions.clone();
        for definition in definitions.iter().filter(|def| !def.disabled) {
            self.start(&definition.name)?;
        }
        Ok(())
    }

    /// Stops every running process and cancels pending restarts.
    ///
    /// Every name is attempted; the first error is returned afterwards.
    pub fn stop_all(&self) -> Result<(), SupervisorError> {
        let names = {
            let state = self.inner.state.lock()?;
            let mut names = state.registry.names();
            names.extend(state.pending_restarts.keys().cloned());
            names.sort();
            names.dedup();
            names
        };

        let mut first_error = None;
        for name in names {
            if let Err(err) = self.stop(&name) {
                warn!("Failed to stop '{name}': {err}");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Sets the process-wide auto-restart flag. Affects crashes detected from
    /// now on and restarts still waiting out their cool-down.
    pub fn set_auto_restart(&self, enabled: bool) -> Result<(), SupervisorError> {
        self.inner.state.lock()?.auto_restart = enabled;
        info!("Auto-restart {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    pub fn auto_restart(&self) -> Result<bool, SupervisorError> {
        Ok(self.inner.state.lock()?.auto_restart)
    }

    pub fn is_running(&self, name: &str) -> Result<bool, SupervisorError> {
        Ok(self.inner.state.lock()?.registry.contains(name))
    }

    /// Names of registered processes, sorted.
    pub fn running(&self) -> Result<Vec<String>, SupervisorError> {
        Ok(self.inner.state.lock()?.registry.names())
    }

    pub fn definitions(&self) -> Result<Vec<ProcessDefinition>, SupervisorError> {
        Ok(self.inner.state.lock()?.definitions.clone())
    }

    pub fn session_id(&self) -> &SessionId {
        &self.inner.session
    }

    /// True when nothing is registered and no restart is pending.
    pub fn is_idle(&self) -> Result<bool, SupervisorError> {
        let state = self.inner.state.lock()?;
        Ok(state.registry.is_empty() && state.pending_restarts.is_empty())
    }

    /// Stops everything. Intended for the host's shutdown path.
    pub fn shutdown(&self) -> Result<(), SupervisorError> {
        info!("Shutting down supervisor session {}", self.inner.session);
        self.stop_all()
    }
}
