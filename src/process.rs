//! Signal delivery to process groups.
//!
//! Every managed process leads its own process group, so signalling the group
//! reaches the whole subtree a shell command may have started. All delivery is
//! best effort: the target may already be gone.
use std::{
    thread,
    time::{Duration, Instant},
};

use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::{self, Pid},
};
use tracing::{debug, warn};

use crate::{constants::MONITOR_POLL_INTERVAL, registry::ExitFlag};

/// Returns the process group of `pid`, falling back to `pid` itself.
pub fn process_group_of(pid: u32) -> i32 {
    let raw = pid as i32;
    unistd::getpgid(Some(Pid::from_raw(raw)))
        .map(Pid::as_raw)
        .unwrap_or(raw)
}

fn is_signallable_group(pgid: i32) -> bool {
    pgid > 1 && pgid != unistd::getpgrp().as_raw()
}

/// Sends `signal` to every member of `pgid`. Returns whether it was delivered.
///
/// Refuses to signal pid 1 or the supervisor's own group.
pub fn signal_group(pgid: i32, signal: Signal) -> bool {
    if !is_signallable_group(pgid) {
        debug!("Refusing to signal process group {pgid}");
        return false;
    }

    match signal::killpg(Pid::from_raw(pgid), signal) {
        Ok(()) => {
            debug!("Sent {signal} to process group {pgid}");
            true
        }
        Err(Errno::ESRCH) => {
            debug!("Process group {pgid} no longer exists");
            false
        }
        Err(Errno::EPERM) => {
            warn!("Insufficient permissions to signal process group {pgid}");
            false
        }
        Err(err) => {
            debug!("Failed to send {signal} to process group {pgid}: {err}");
            false
        }
    }
}

/// Sends `signal` to a single process. Returns whether it was delivered.
pub fn signal_process(pid: i32, signal: Signal) -> bool {
    if pid <= 1 || pid as u32 == std::process::id() {
        return false;
    }

    match signal::kill(Pid::from_raw(pid), signal) {
        Ok(()) => {
            debug!("Sent {signal} to PID {pid}");
            true
        }
        Err(err) => {
            debug!("Failed to send {signal} to PID {pid}: {err}");
            false
        }
    }
}

/// Whether any member of `pgid` (zombies included) still exists.
pub fn group_alive(pgid: i32) -> bool {
    is_signallable_group(pgid) && signal::killpg(Pid::from_raw(pgid), None).is_ok()
}

/// SIGTERM to the group, then SIGKILL once `grace` has elapsed unless the
/// leader has been reaped and the rest of the group is gone.
pub fn terminate_group(pgid: i32, grace: Duration, exited: &ExitFlag) {
    if !signal_group(pgid, Signal::SIGTERM) {
        return;
    }

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if exited.is_set() && !group_alive(pgid) {
            return;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        thread::sleep(remaining.min(MONITOR_POLL_INTERVAL / 5));
    }

    if group_alive(pgid) {
        debug!("Process group {pgid} still alive after {grace:?}; sending SIGKILL");
        signal_group(pgid, Signal::SIGKILL);
    }
}
