//! Configuration management for procrun.
//!
//! Process definitions come from a Procfile (see [`crate::procfile`]); this
//! module covers the supervisor's own settings, read from an optional YAML file.
use serde::{Deserialize, Deserializer};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    constants::{
        DEFAULT_CONFIG_FILE, DEFAULT_RESTART_COOLDOWN, DEFAULT_SHELL, DEFAULT_STOP_GRACE,
        OUTPUT_BUFFER_SIZE,
    },
    error::SupervisorError,
    runtime,
};

/// Supervisor settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Initial value of the process-wide auto-restart flag.
    pub auto_restart: bool,
    /// Retry policy applied to crashed processes.
    pub restart: RestartPolicy,
    /// Time between SIGTERM and SIGKILL when stopping a process group.
    #[serde(deserialize_with = "deserialize_duration")]
    pub stop_grace: Duration,
    /// Interpreter used to run commands, invoked as `<shell> -c <command>`.
    pub shell: String,
    /// Whether to terminate leftovers from previous sessions on startup.
    pub reap_orphans: bool,
    /// How leftovers are found when reaping.
    pub orphan_scan: OrphanScan,
    /// Override for the session log location.
    pub session_log: Option<PathBuf>,
    /// Output reader buffer size; longer lines are split.
    pub output_buffer: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            auto_restart: true,
            restart: RestartPolicy::default(),
            stop_grace: DEFAULT_STOP_GRACE,
            shell: DEFAULT_SHELL.to_string(),
            reap_orphans: true,
            orphan_scan: OrphanScan::default(),
            session_log: None,
            output_buffer: OUTPUT_BUFFER_SIZE,
        }
    }
}

impl SupervisorConfig {
    /// Resolved session log path.
    pub fn session_log_path(&self) -> PathBuf {
        self.session_log
            .clone()
            .unwrap_or_else(runtime::session_log_path)
    }
}

/// Where the reaper looks for processes of earlier sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanScan {
    /// Process environments where the OS exposes them, the session log otherwise.
    #[default]
    Auto,
    /// Only the process groups recorded in the session log.
    SessionLog,
}

/// How crashed processes are brought back.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RestartPolicy {
    /// Wait between a crash and the respawn.
    #[serde(deserialize_with = "deserialize_duration")]
    pub cooldown: Duration,
    /// Consecutive crash restarts allowed before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_RESTART_COOLDOWN,
            max_attempts: None,
        }
    }
}

/// Parses a user-facing duration string in the format `<number>[ms|s|m|h]`.
/// A bare number is read as seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, SupervisorError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(SupervisorError::InvalidDuration(raw.to_string()));
    }

    let invalid = || SupervisorError::InvalidDuration(raw.to_string());

    if let Some(stripped) = value.strip_suffix("ms") {
        let amount: u64 = stripped.trim().parse().map_err(|_| invalid())?;
        return Ok(Duration::from_millis(amount));
    }

    let (amount_str, multiplier) = if let Some(stripped) = value.strip_suffix('s') {
        (stripped.trim(), 1)
    } else if let Some(stripped) = value.strip_suffix('m') {
        (stripped.trim(), 60)
    } else if let Some(stripped) = value.strip_suffix('h') {
        (stripped.trim(), 3600)
    } else {
        (value, 1)
    };

    let amount: u64 = amount_str.parse().map_err(|_| invalid())?;
    Ok(Duration::from_secs(amount.saturating_mul(multiplier)))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

/// Loads supervisor settings.
///
/// An explicit path must exist. Without one, `procrun.yaml` in the current
/// directory is used when present, and defaults otherwise.
pub fn load_config(config_path: Option<&str>) -> Result<SupervisorConfig, SupervisorError> {
    let path = match config_path {
        Some(path) => PathBuf::from(path),
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if !fallback.exists() {
                return Ok(SupervisorConfig::default());
            }
            fallback.to_path_buf()
        }
    };

    let content =
        fs::read_to_string(&path).map_err(|source| SupervisorError::ConfigReadError {
            path: path.clone(),
            source,
        })?;

    parse_config(&content)
}

/// Parses supervisor settings from YAML. An empty document yields defaults.
pub fn parse_config(content: &str) -> Result<SupervisorConfig, SupervisorError> {
    if content.trim().is_empty() {
        return Ok(SupervisorConfig::default());
    }
    Ok(serde_yaml::from_str(content)?)
}
