#[path = "common/mod.rs"]
mod common;

use std::{
    os::unix::process::{CommandExt, ExitStatusExt},
    process::{Child, Command},
    time::Duration,
};

use common::wait_for;
use procrun::{
    constants::SESSION_ENV_KEY,
    reaper::{Reaper, SessionLogSource},
    session::{SessionId, SessionLog, SessionRecord},
};
use tempfile::tempdir;

fn spawn_group(session: Option<&str>) -> Child {
    let mut command = Command::new("sleep");
    command.arg("30").process_group(0);
    if let Some(session) = session {
        command.env(SESSION_ENV_KEY, session);
    }
    command.spawn().expect("spawn sleep")
}

fn was_killed(child: &mut Child) -> bool {
    wait_for(Duration::from_secs(3), || {
        matches!(child.try_wait(), Ok(Some(status)) if status.signal() == Some(9))
    })
}

#[test]
fn log_fallback_kills_only_previous_session_groups() {
    let dir = tempdir().unwrap();
    let log = SessionLog::new(dir.path().join("sessions.txt"));

    let mut current = spawn_group(None);
    let mut old = spawn_group(None);
    let mut older = spawn_group(None);

    for (session, child) in [("current", &current), ("old", &old), ("older", &older)] {
        log.append(&SessionRecord {
            session_id: session.into(),
            process_group_id: child.id() as i32,
        })
        .unwrap();
    }

    let reaper = Reaper::new(Box::new(SessionLogSource::new(log.clone())), log.clone());
    let killed = reaper.run(&SessionId::from("current"));

    assert_eq!(killed, 2);
    assert!(was_killed(&mut old));
    assert!(was_killed(&mut older));
    assert!(current.try_wait().unwrap().is_none());

    let remaining = log.read().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].session_id.as_str(), "current");

    current.kill().unwrap();
    current.wait().unwrap();
}

#[cfg(target_os = "linux")]
#[test]
fn environ_source_finds_processes_of_other_sessions() {
    use procrun::reaper::{EnvironSource, OrphanTarget, TaggedProcessSource};

    if !EnvironSource::is_supported() {
        return;
    }

    let mut foreign = spawn_group(Some("environ-test-foreign"));
    let mut own = spawn_group(Some("environ-test-current"));
    let foreign_pid = foreign.id() as i32;
    let own_pid = own.id() as i32;

    let found = wait_for(Duration::from_secs(2), || {
        EnvironSource
            .orphans(&SessionId::from("environ-test-current"))
            .unwrap()
            .contains(&OrphanTarget::Process(foreign_pid))
    });
    let targets = EnvironSource
        .orphans(&SessionId::from("environ-test-current"))
        .unwrap();

    foreign.kill().unwrap();
    foreign.wait().unwrap();
    own.kill().unwrap();
    own.wait().unwrap();

    assert!(found);
    assert!(!targets.contains(&OrphanTarget::Process(own_pid)));
    assert!(!targets.contains(&OrphanTarget::Process(std::process::id() as i32)));
}

#[test]
fn supervisor_startup_reaps_leftovers() {
    use procrun::{
        Supervisor,
        config::{OrphanScan, SupervisorConfig},
        observer::NullObserver,
    };
    use std::sync::Arc;

    let dir = tempdir().unwrap();
    let log_path = dir.path().join("sessions.txt");

    let mut leftover = spawn_group(None);
    SessionLog::new(&log_path)
        .append(&SessionRecord {
            session_id: "startup-test-stale".into(),
            process_group_id: leftover.id() as i32,
        })
        .unwrap();

    let config = SupervisorConfig {
        reap_orphans: true,
        orphan_scan: OrphanScan::SessionLog,
        session_log: Some(log_path.clone()),
        ..SupervisorConfig::default()
    };
    let supervisor = Supervisor::new(config, Arc::new(NullObserver));

    assert!(was_killed(&mut leftover));
    assert!(SessionLog::new(&log_path).read().unwrap().is_empty());
    assert!(supervisor.is_idle().unwrap());
}
