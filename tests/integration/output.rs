#[path = "common/mod.rs"]
mod common;

use std::time::Duration;

use common::{Harness, is_stopped};
use procrun::events::{ProcessOutput, ProcessState, SupervisorEvent};

fn output_lines(events: &[SupervisorEvent]) -> Vec<ProcessOutput> {
    events
        .iter()
        .filter_map(|event| match event {
            SupervisorEvent::Output(output) => Some(output.clone()),
            SupervisorEvent::Status(_) => None,
        })
        .collect()
}

#[test]
fn stdout_and_stderr_are_tagged() {
    let harness = Harness::new(&[("both", "echo out; echo err >&2")]);
    harness.supervisor.start("both").unwrap();

    let events = harness.events_until(Duration::from_secs(5), is_stopped);
    let mut lines: Vec<_> = output_lines(&events)
        .into_iter()
        .map(|output| (output.line, output.is_stderr))
        .collect();
    lines.sort();

    assert_eq!(
        lines,
        vec![("err".to_string(), true), ("out".to_string(), false)]
    );
}

#[test]
fn every_line_arrives_between_running_and_stopped() {
    let harness = Harness::new(&[("counter", "for i in 1 2 3 4 5; do echo line$i; done")]);
    harness.supervisor.start("counter").unwrap();

    let events = harness.events_until(Duration::from_secs(5), is_stopped);

    assert!(matches!(
        events.first(),
        Some(SupervisorEvent::Status(status)) if status.status == ProcessState::Running
    ));
    let lines: Vec<_> = output_lines(&events)
        .into_iter()
        .map(|output| output.line)
        .collect();
    assert_eq!(lines, vec!["line1", "line2", "line3", "line4", "line5"]);
}

#[test]
fn blank_lines_are_forwarded() {
    let harness = Harness::new(&[("spaced", "echo a; echo; echo b")]);
    harness.supervisor.start("spaced").unwrap();

    let events = harness.events_until(Duration::from_secs(5), is_stopped);
    let lines: Vec<_> = output_lines(&events)
        .into_iter()
        .map(|output| output.line)
        .collect();
    assert_eq!(lines, vec!["a", "", "b"]);
}

#[test]
fn long_lines_are_split_at_the_buffer_size() {
    let harness = Harness::with_config(&[("long", "printf 'abcdefghij\\n'")], |config| {
        config.output_buffer = 4;
    });
    harness.supervisor.start("long").unwrap();

    let events = harness.events_until(Duration::from_secs(5), is_stopped);
    let lines: Vec<_> = output_lines(&events)
        .into_iter()
        .map(|output| output.line)
        .collect();
    assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
}

#[test]
fn env_file_variables_reach_the_process() {
    let harness = Harness::new(&[]);
    let env = [("GREETING".to_string(), "hello".to_string())].into();
    harness
        .supervisor
        .load_definitions(
            vec![procrun::procfile::ProcessDefinition::new(
                "greeter",
                "echo $GREETING $PROCRUN_SESSION",
            )],
            None,
            env,
        )
        .unwrap();
    harness.supervisor.start("greeter").unwrap();

    let events = harness.events_until(Duration::from_secs(5), is_stopped);
    let lines = output_lines(&events);
    assert_eq!(lines.len(), 1);
    assert_eq!(
        lines[0].line,
        format!("hello {}", harness.supervisor.session_id())
    );
}
