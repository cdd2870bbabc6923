//! Session tracking.
//!
//! Every supervisor run gets a [`SessionId`]. Spawned processes carry it in
//! their environment and their process groups are appended to a [`SessionLog`],
//! so a later run can tell its own children apart from leftovers.
use fs2::FileExt;
use std::{
    fmt,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use crate::{constants::SESSION_RECORD_SEPARATOR, error::SessionLogError};

/// Identifier unique to one supervisor run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generates an id from the current time and the supervisor's pid.
    pub fn generate() -> Self {
        let now = chrono::Utc::now();
        let nanos = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1000));
        Self(format!("{nanos}-{}", std::process::id()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One `session_id:process_group_id` line of the session log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub process_group_id: i32,
}

impl SessionRecord {
    /// Parses a log line. Lines without a separator or with a non-positive
    /// group id yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let (session, pgid) = line.trim().split_once(SESSION_RECORD_SEPARATOR)?;
        if session.is_empty() {
            return None;
        }
        let process_group_id: i32 = pgid.trim().parse().ok()?;
        if process_group_id <= 0 {
            return None;
        }
        Some(Self {
            session_id: SessionId::from(session),
            process_group_id,
        })
    }
}

impl fmt::Display for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.session_id, SESSION_RECORD_SEPARATOR, self.process_group_id
        )
    }
}

/// Append-only log of spawned process groups, shared across supervisor runs.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a record under an exclusive file lock.
    pub fn append(&self, record: &SessionRecord) -> Result<(), SessionLogError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;
        let result = writeln!(file, "{record}");
        let _ = FileExt::unlock(&file);
        result?;

        debug!("Recorded process group {record} in {:?}", self.path);
        Ok(())
    }

    /// Reads all well-formed records. A missing log is empty.
    pub fn read(&self) -> Result<Vec<SessionRecord>, SessionLogError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let record = SessionRecord::parse(line);
                if record.is_none() {
                    warn!("Ignoring malformed session log line: {line}");
                }
                record
            })
            .collect())
    }

    /// Rewrites the log so it only holds records of `keep`.
    pub fn retain_session(&self, keep: &SessionId) -> Result<(), SessionLogError> {
        let kept: Vec<_> = self
            .read()?
            .into_iter()
            .filter(|record| &record.session_id == keep)
            .collect();

        if kept.is_empty() {
            return self.clear();
        }

        let mut content = String::new();
        for record in &kept {
            content.push_str(&record.to_string());
            content.push('\n');
        }
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Removes the log. A missing log is not an error.
    pub fn clear(&self) -> Result<(), SessionLogError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
