//! Constants and default values for the procrun supervisor.
//!
//! This module centralizes the magic numbers, strings, and file names used
//! throughout the supervisor.

use std::time::Duration;

// ============================================================================
// Session Tracking
// ============================================================================

/// Environment variable carrying the session identifier into every spawned process.
/// It is the only link between a running process and the supervisor run that
/// started it, and is what the orphan reaper matches on.
pub const SESSION_ENV_KEY: &str = "PROCRUN_SESSION";

/// Name of the append-only session log stored in the state directory.
/// Each line is `session_id:process_group_id`.
pub const SESSION_LOG_FILE_NAME: &str = "sessions.txt";

/// Separator between the session id and the process group id in a session log line.
pub const SESSION_RECORD_SEPARATOR: char = ':';

// ============================================================================
// File System Constants
// ============================================================================

/// Settings file looked up in the current directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "procrun.yaml";

/// Procfile looked up in the current directory when no path is given.
pub const DEFAULT_PROCFILE: &str = "Procfile";

/// Environment file loaded from the Procfile's directory.
pub const ENV_FILE_NAME: &str = ".env";

// ============================================================================
// Shell Execution Constants
// ============================================================================

/// Default shell used for executing process commands.
pub const DEFAULT_SHELL: &str = "sh";

/// Shell argument flag for executing command strings.
pub const SHELL_COMMAND_FLAG: &str = "-c";

// ============================================================================
// Process Management Timing
// ============================================================================

/// Delay between a crash and the automatic restart of the process.
pub const DEFAULT_RESTART_COOLDOWN: Duration = Duration::from_secs(2);

/// Time a process group gets to exit after SIGTERM before SIGKILL is sent.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_millis(100);

/// Interval at which monitors poll their child for exit.
pub const MONITOR_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound on how long a monitor waits for its output readers to drain
/// after the process exited. Readers can outlive the process when a detached
/// grandchild keeps the pipe open.
pub const READER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Output line sent on behalf of a crashed process right before it is respawned.
pub const AUTO_RESTART_NOTICE: &str = "Auto-restarting process...";

/// Upper bound on how long `stop` waits for the monitor after SIGKILL.
pub const STOP_REAP_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Output Constants
// ============================================================================

/// Buffer size for output readers. Longer lines are split at this boundary.
pub const OUTPUT_BUFFER_SIZE: usize = 64 * 1024;

/// How often the binary checks whether `--exit-when-idle` should end the run.
pub const IDLE_CHECK_INTERVAL: Duration = Duration::from_millis(200);
