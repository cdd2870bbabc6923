#[path = "common/mod.rs"]
mod common;

use std::time::{Duration, Instant};

use common::{Harness, is_stopped, statuses, wait_for};
use procrun::{
    constants::AUTO_RESTART_NOTICE,
    events::{ProcessOutput, ProcessState, ProcessStatus, SupervisorEvent},
};

fn is_running(event: &SupervisorEvent) -> bool {
    matches!(event, SupervisorEvent::Status(status) if status.status == ProcessState::Running)
}

#[test]
fn crashing_process_is_restarted_after_cooldown() {
    let harness = Harness::new(&[("crasher", "exit 1")]);
    harness.supervisor.start("crasher").unwrap();

    let mut crash_times = Vec::new();
    for _ in 0..3 {
        let events = harness.events_until(Duration::from_secs(5), is_stopped);
        assert_eq!(
            statuses(&events).last(),
            Some(&ProcessStatus::stopped("crasher", Some(1)))
        );
        crash_times.push(Instant::now());
        harness.events_until(Duration::from_secs(5), is_running);
    }

    for pair in crash_times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(250));
    }

    harness.supervisor.stop("crasher").unwrap();
    assert!(wait_for(Duration::from_secs(2), || {
        harness.supervisor.is_idle().unwrap()
    }));
}

#[test]
fn disabling_auto_restart_during_cooldown_cancels_restart() {
    let harness = Harness::with_config(&[("crasher", "exit 3")], |config| {
        config.restart.cooldown = Duration::from_millis(600);
    });
    harness.supervisor.start("crasher").unwrap();

    let events = harness.events_until(Duration::from_secs(5), is_stopped);
    assert_eq!(
        statuses(&events),
        vec![
            ProcessStatus::running("crasher"),
            ProcessStatus::stopped("crasher", Some(3)),
        ]
    );

    harness.supervisor.set_auto_restart(false).unwrap();
    assert!(harness.drain(Duration::from_millis(1000)).is_empty());
    assert!(harness.supervisor.is_idle().unwrap());
}

#[test]
fn crash_with_auto_restart_disabled_stays_stopped() {
    let harness = Harness::with_config(&[("crasher", "exit 2")], |config| {
        config.auto_restart = false;
    });
    harness.supervisor.start("crasher").unwrap();

    harness.events_until(Duration::from_secs(5), is_stopped);
    assert!(harness.drain(Duration::from_millis(700)).is_empty());
    assert!(harness.supervisor.is_idle().unwrap());
}

#[test]
fn stop_during_cooldown_cancels_restart() {
    let harness = Harness::with_config(&[("crasher", "exit 1")], |config| {
        config.restart.cooldown = Duration::from_millis(600);
    });
    harness.supervisor.start("crasher").unwrap();
    harness.events_until(Duration::from_secs(5), is_stopped);

    assert!(!harness.supervisor.is_idle().unwrap());
    harness.supervisor.stop("crasher").unwrap();

    assert!(harness.supervisor.is_idle().unwrap());
    assert!(harness.drain(Duration::from_millis(1000)).is_empty());
}

#[test]
fn max_attempts_gives_up_after_consecutive_crashes() {
    let harness = Harness::with_config(&[("crasher", "exit 1")], |config| {
        config.restart.cooldown = Duration::from_millis(100);
        config.restart.max_attempts = Some(2);
    });
    harness.supervisor.start("crasher").unwrap();

    for _ in 0..3 {
        harness.events_until(Duration::from_secs(5), is_stopped);
    }

    assert!(harness.drain(Duration::from_millis(500)).is_empty());
    assert!(harness.supervisor.is_idle().unwrap());
}

#[test]
fn killed_process_stays_stopped() {
    let harness = Harness::with_config(&[("victim", "kill -9 $$")], |config| {
        config.restart.cooldown = Duration::from_millis(100);
    });
    harness.supervisor.start("victim").unwrap();

    let events = harness.events_until(Duration::from_secs(5), is_stopped);
    assert_eq!(
        statuses(&events).last(),
        Some(&ProcessStatus::stopped("victim", None))
    );

    assert!(harness.drain(Duration::from_millis(600)).is_empty());
    assert!(harness.supervisor.is_idle().unwrap());
}

#[test]
fn restart_is_announced_on_the_output_stream() {
    let harness = Harness::with_config(&[("crasher", "exit 1")], |config| {
        config.restart.cooldown = Duration::from_millis(100);
    });
    harness.supervisor.start("crasher").unwrap();

    harness.events_until(Duration::from_secs(5), is_stopped);
    let events = harness.events_until(Duration::from_secs(5), is_running);
    harness.supervisor.stop("crasher").unwrap();

    assert_eq!(
        events,
        vec![
            SupervisorEvent::Output(ProcessOutput {
                name: "crasher".into(),
                line: AUTO_RESTART_NOTICE.into(),
                is_stderr: false,
            }),
            SupervisorEvent::Status(ProcessStatus::running("crasher")),
        ]
    );
}
