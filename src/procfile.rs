//! Procfile parsing.
//!
//! A Procfile holds one `name: command` pair per line. Commented-out pairs
//! (`# name: command`) are kept as disabled definitions so they can be shown
//! and started on demand without being part of `start_all`.
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use crate::{
    constants::ENV_FILE_NAME,
    envfile::{self, EnvVars},
    error::SupervisorError,
};

/// A single named command from a Procfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    /// Unique process name.
    pub name: String,
    /// Shell command line.
    pub command: String,
    /// Present but never started by `start_all`.
    pub disabled: bool,
}

impl ProcessDefinition {
    /// Creates an enabled definition.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            disabled: false,
        }
    }
}

/// A loaded Procfile together with the environment found next to it.
#[derive(Debug, Clone)]
pub struct Procfile {
    /// Location the definitions were read from.
    pub path: PathBuf,
    /// Definitions in file order, active entries first.
    pub definitions: Vec<ProcessDefinition>,
    /// Variables from the sibling `.env` file, if any.
    pub env: EnvVars,
}

impl Procfile {
    /// Reads and parses the Procfile at `path`, plus its sibling `.env`.
    pub fn load(path: &Path) -> Result<Self, SupervisorError> {
        let content =
            fs::read_to_string(path).map_err(|source| SupervisorError::ProcfileReadError {
                path: path.to_path_buf(),
                source,
            })?;

        let definitions = parse_procfile(&content);
        debug!(
            "Loaded {} process definitions from {:?}",
            definitions.len(),
            path
        );

        let env = match find_env_file(path) {
            Some(env_path) => match envfile::load_env_file(&env_path) {
                Ok(vars) => {
                    debug!("Loaded {} variables from {:?}", vars.len(), env_path);
                    vars
                }
                Err(err) => {
                    warn!("Failed to read env file {:?}: {err}", env_path);
                    HashMap::new()
                }
            },
            None => HashMap::new(),
        };

        Ok(Self {
            path: path.to_path_buf(),
            definitions,
            env,
        })
    }
}

/// Parses Procfile content into definitions.
pub fn parse_procfile(content: &str) -> Vec<ProcessDefinition> {
    let mut definitions = Vec::new();
    let mut seen = HashSet::new();

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, command)) = split_entry(line) {
            definitions.push(ProcessDefinition::new(name, command));
            seen.insert(name.to_string());
        }
    }

    for line in content.lines().map(str::trim) {
        let Some(commented) = line.strip_prefix('#') else {
            continue;
        };
        if let Some((name, command)) = split_entry(commented.trim())
            && seen.insert(name.to_string())
        {
            definitions.push(ProcessDefinition {
                name: name.to_string(),
                command: command.to_string(),
                disabled: true,
            });
        }
    }

    definitions
}

fn split_entry(line: &str) -> Option<(&str, &str)> {
    let (name, command) = line.split_once(':')?;
    let name = name.trim();
    let command = command.trim();
    if name.is_empty() || command.is_empty() {
        return None;
    }
    Some((name, command))
}

/// Directory processes run in: the Procfile's parent, or `.` for a bare file name.
pub fn working_dir_for(procfile: &Path) -> PathBuf {
    match procfile.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Looks for `.env` in the Procfile's directory.
pub fn find_env_file(procfile: &Path) -> Option<PathBuf> {
    let candidate = working_dir_for(procfile).join(ENV_FILE_NAME);
    candidate.is_file().then_some(candidate)
}
