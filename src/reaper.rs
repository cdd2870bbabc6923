//! Orphan reaper.
//!
//! Runs once when a supervisor starts and kills whatever earlier sessions left
//! running. Where the OS exposes other processes' environments every process
//! tagged with a foreign session id is a target; elsewhere the session log's
//! process groups are used instead.
use std::{collections::HashSet, path::Path};

use nix::sys::signal::Signal;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

use crate::{
    config::OrphanScan,
    constants::SESSION_ENV_KEY,
    error::SupervisorError,
    process,
    session::{SessionId, SessionLog},
};

/// Something the reaper can kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrphanTarget {
    /// A single process found by its session tag.
    Process(i32),
    /// A whole process group taken from the session log.
    Group(i32),
}

impl OrphanTarget {
    /// Sends SIGKILL. Returns whether anything received it.
    pub fn kill(&self) -> bool {
        match *self {
            OrphanTarget::Process(pid) => process::signal_process(pid, Signal::SIGKILL),
            OrphanTarget::Group(pgid) => process::signal_group(pgid, Signal::SIGKILL),
        }
    }
}

/// Enumerates processes attributed to sessions other than `current`.
pub trait TaggedProcessSource {
    fn describe(&self) -> &'static str;
    fn orphans(&self, current: &SessionId) -> Result<Vec<OrphanTarget>, SupervisorError>;
}

/// Reads the session tag straight out of every visible process environment.
#[derive(Debug, Default)]
pub struct EnvironSource;

impl EnvironSource {
    /// Whether this host lets us read process environments.
    pub fn is_supported() -> bool {
        cfg!(target_os = "linux") && Path::new("/proc/self/environ").exists()
    }
}

fn session_tag(environ: &[std::ffi::OsString]) -> Option<&str> {
    environ.iter().find_map(|entry| {
        entry
            .to_str()?
            .strip_prefix(SESSION_ENV_KEY)?
            .strip_prefix('=')
    })
}

impl TaggedProcessSource for EnvironSource {
    fn describe(&self) -> &'static str {
        "process environments"
    }

    fn orphans(&self, current: &SessionId) -> Result<Vec<OrphanTarget>, SupervisorError> {
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );

        // Never target ourselves or whoever started us.
        let mut protected = HashSet::new();
        let mut cursor = Some(Pid::from_u32(std::process::id()));
        while let Some(pid) = cursor {
            if !protected.insert(pid) {
                break;
            }
            cursor = system.process(pid).and_then(|entry| entry.parent());
        }

        Ok(system
            .processes()
            .iter()
            .filter(|(pid, _)| !protected.contains(*pid))
            .filter_map(|(pid, entry)| {
                let tag = session_tag(entry.environ())?;
                (tag != current.as_str()).then(|| {
                    debug!("PID {pid} belongs to session {tag}");
                    OrphanTarget::Process(pid.as_u32() as i32)
                })
            })
            .collect())
    }
}

/// Falls back on the process groups recorded in the session log.
#[derive(Debug, Clone)]
pub struct SessionLogSource {
    log: SessionLog,
}

impl SessionLogSource {
    pub fn new(log: SessionLog) -> Self {
        Self { log }
    }
}

impl TaggedProcessSource for SessionLogSource {
    fn describe(&self) -> &'static str {
        "session log"
    }

    fn orphans(&self, current: &SessionId) -> Result<Vec<OrphanTarget>, SupervisorError> {
        let mut seen = HashSet::new();
        Ok(self
            .log
            .read()?
            .into_iter()
            .filter(|record| &record.session_id != current)
            .map(|record| OrphanTarget::Group(record.process_group_id))
            .filter(|target| seen.insert(*target))
            .collect())
    }
}

/// Kills the leftovers of earlier sessions, then prunes the session log.
pub struct Reaper {
    source: Box<dyn TaggedProcessSource>,
    log: SessionLog,
}

impl Reaper {
    pub fn new(source: Box<dyn TaggedProcessSource>, log: SessionLog) -> Self {
        Self { source, log }
    }

    /// Builds the reaper `scan` asks for. `Auto` picks the environment scan
    /// where supported and the session log otherwise.
    pub fn for_scan(scan: OrphanScan, log: SessionLog) -> Self {
        let source: Box<dyn TaggedProcessSource> = match scan {
            OrphanScan::Auto if EnvironSource::is_supported() => Box::new(EnvironSource),
            OrphanScan::Auto | OrphanScan::SessionLog => {
                Box::new(SessionLogSource::new(log.clone()))
            }
        };
        Self::new(source, log)
    }

    pub fn describe(&self) -> &'static str {
        self.source.describe()
    }

    /// Returns how many targets received SIGKILL. Failures are logged, never
    /// returned: a reaper that cannot run must not keep the supervisor down.
    pub fn run(&self, current: &SessionId) -> usize {
        let targets = match self.source.orphans(current) {
            Ok(targets) => targets,
            Err(err) => {
                warn!("Orphan scan via {} failed: {err}", self.source.describe());
                Vec::new()
            }
        };

        debug!(
            "Found {} orphan target(s) via {}",
            targets.len(),
            self.source.describe()
        );

        let mut killed = 0;
        for target in &targets {
            if target.kill() {
                info!("Killed orphaned {target:?} from a previous session");
                killed += 1;
            }
        }

        if let Err(err) = self.log.retain_session(current) {
            warn!("Failed to prune session log {:?}: {err}", self.log.path());
        }

        killed
    }
}
