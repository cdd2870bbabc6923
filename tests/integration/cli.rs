use std::{fs, path::Path};

use assert_cmd::{Command, cargo::cargo_bin_cmd};
use predicates::{boolean::PredicateBooleanExt, str::contains};
use tempfile::{TempDir, tempdir};

/// Scratch project with a Procfile and settings that keep the run isolated:
/// no orphan reaping and a private session log.
fn project(procfile: &str) -> TempDir {
    let dir = tempdir().expect("failed to create tempdir");
    fs::write(dir.path().join("Procfile"), procfile).unwrap();
    fs::write(
        dir.path().join("procrun.yaml"),
        format!(
            "reap_orphans: false\nsession_log: {}\nrestart:\n  cooldown: 100ms\n",
            dir.path().join("sessions.txt").display()
        ),
    )
    .unwrap();
    fs::create_dir_all(dir.path().join("home")).unwrap();
    dir
}

fn procrun(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("procrun");
    cmd.current_dir(dir)
        .env("HOME", dir.join("home"))
        .env_remove("RUST_LOG")
        .arg("--exit-when-idle")
        .arg("--no-auto-restart");
    cmd
}

#[test]
fn runs_procfile_until_idle() {
    let dir = project("web: echo hello\nworker: echo oops >&2; exit 3\n");

    procrun(dir.path())
        .assert()
        .success()
        .stdout(contains("web: running"))
        .stdout(contains("web | hello"))
        .stdout(contains("web: stopped (exit 0)"))
        .stdout(contains("worker ! oops"))
        .stdout(contains("worker: stopped (exit 3)"));
}

#[test]
fn json_output_is_one_event_per_line() {
    let dir = project("web: echo hello\n");

    let output = procrun(dir.path()).arg("--json").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();

    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["event"], "status");
    assert_eq!(events[0]["status"], "running");
    assert_eq!(events[1]["line"], "hello");
    assert_eq!(events[2]["exit_code"], 0);
}

#[test]
fn only_starts_the_named_processes() {
    let dir = project("a: echo from-a\nb: echo from-b\n# c: echo from-c\n");

    procrun(dir.path())
        .args(["--only", "b", "--only", "c", "--only", "missing"])
        .assert()
        .success()
        .stdout(contains("b | from-b"))
        .stdout(contains("c | from-c"))
        .stdout(contains("from-a").not());
}

#[test]
fn commented_entries_are_not_started_by_default() {
    let dir = project("a: echo from-a\n# b: echo from-b\n");

    procrun(dir.path())
        .assert()
        .success()
        .stdout(contains("a | from-a"))
        .stdout(contains("from-b").not());
}

#[test]
fn env_file_next_to_procfile_is_loaded() {
    let dir = project("web: echo $GREETING\n");
    fs::write(dir.path().join(".env"), "GREETING=\"hi there\"\n").unwrap();

    procrun(dir.path())
        .assert()
        .success()
        .stdout(contains("web | hi there"));
}

#[test]
fn missing_procfile_fails() {
    let dir = project("");

    procrun(dir.path())
        .arg("does-not-exist")
        .assert()
        .failure()
        .stderr(contains("does-not-exist"));
}
