//! Runtime paths.
use std::{
    env,
    path::PathBuf,
    sync::{OnceLock, RwLock},
};

use crate::constants::SESSION_LOG_FILE_NAME;

#[derive(Debug, Clone)]
struct RuntimeContext {
    state_dir: PathBuf,
}

static CONTEXT: OnceLock<RwLock<RuntimeContext>> = OnceLock::new();

fn context_lock() -> &'static RwLock<RuntimeContext> {
    CONTEXT.get_or_init(|| RwLock::new(RuntimeContext::user_directories()))
}

impl RuntimeContext {
    fn user_directories() -> Self {
        let home = env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/"));
        Self {
            state_dir: home.join(".local/share/procrun"),
        }
    }
}

/// Re-resolves paths from the current `HOME`.
pub fn init() {
    let mut guard = context_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = RuntimeContext::user_directories();
}

/// State dir (session log).
pub fn state_dir() -> PathBuf {
    context_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .state_dir
        .clone()
}

/// Default location of the session log.
pub fn session_log_path() -> PathBuf {
    state_dir().join(SESSION_LOG_FILE_NAME)
}
