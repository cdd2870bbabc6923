#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        mpsc::{self, Receiver},
    },
    thread,
    time::{Duration, Instant},
};

use procrun::{
    Supervisor,
    config::SupervisorConfig,
    envfile::EnvVars,
    events::{ProcessState, ProcessStatus, SupervisorEvent},
    observer::ChannelObserver,
    procfile::ProcessDefinition,
};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tempfile::TempDir;

/// A supervisor wired to a channel, with its session log in a scratch dir.
pub struct Harness {
    pub supervisor: Supervisor,
    pub events: Receiver<SupervisorEvent>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(definitions: &[(&str, &str)]) -> Self {
        Self::with_config(definitions, |_| {})
    }

    pub fn with_config(
        definitions: &[(&str, &str)],
        tweak: impl FnOnce(&mut SupervisorConfig),
    ) -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let mut config = test_config(&dir);
        tweak(&mut config);

        let (tx, rx) = mpsc::channel();
        let supervisor = Supervisor::new(config, Arc::new(ChannelObserver::new(tx)));
        let definitions = definitions
            .iter()
            .map(|(name, command)| ProcessDefinition::new(*name, *command))
            .collect();
        supervisor
            .load_definitions(definitions, None, EnvVars::new())
            .expect("load definitions");

        Self {
            supervisor,
            events: rx,
            dir,
        }
    }

    /// Next event, or `None` after `timeout`.
    pub fn next_event(&self, timeout: Duration) -> Option<SupervisorEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Collects events until `done` accepts one, panicking after `timeout`.
    pub fn events_until(
        &self,
        timeout: Duration,
        mut done: impl FnMut(&SupervisorEvent) -> bool,
    ) -> Vec<SupervisorEvent> {
        let deadline = Instant::now() + timeout;
        let mut seen = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(event) => {
                    let finished = done(&event);
                    seen.push(event);
                    if finished {
                        return seen;
                    }
                }
                Err(_) => panic!("timed out waiting for event; saw {seen:#?}"),
            }
        }
    }

    /// Everything emitted within `window`.
    pub fn drain(&self, window: Duration) -> Vec<SupervisorEvent> {
        let deadline = Instant::now() + window;
        let mut seen = Vec::new();
        while let Ok(event) = self
            .events
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
        {
            seen.push(event);
        }
        seen
    }
}

/// Settings for tests: no orphan reaping (parallel tests would kill each
/// other's children), a private session log, fast restarts.
pub fn test_config(dir: &TempDir) -> SupervisorConfig {
    let mut config = SupervisorConfig {
        reap_orphans: false,
        session_log: Some(dir.path().join("sessions.txt")),
        ..SupervisorConfig::default()
    };
    config.restart.cooldown = Duration::from_millis(300);
    config
}

pub fn statuses(events: &[SupervisorEvent]) -> Vec<ProcessStatus> {
    events
        .iter()
        .filter_map(|event| match event {
            SupervisorEvent::Status(status) => Some(status.clone()),
            SupervisorEvent::Output(_) => None,
        })
        .collect()
}

pub fn is_stopped(event: &SupervisorEvent) -> bool {
    matches!(event, SupervisorEvent::Status(status) if status.status == ProcessState::Stopped)
}

pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(25));
    }
    condition()
}

pub fn is_process_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system
        .process(Pid::from_u32(pid))
        .is_some_and(|process| !matches!(process.status(), sysinfo::ProcessStatus::Zombie))
}
