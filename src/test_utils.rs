//! Helpers shared by unit and integration tests.
use std::{
    env,
    path::Path,
    sync::{Mutex, MutexGuard, OnceLock},
};

use crate::runtime;

/// Serializes tests that touch process-wide environment variables such as `HOME`.
static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Points `HOME` (and therefore the runtime state dir) at a scratch directory
/// for as long as the guard lives.
pub struct HomeGuard {
    previous: Option<String>,
    _lock: MutexGuard<'static, ()>,
}

impl HomeGuard {
    pub fn set(home: &Path) -> Self {
        let lock = env_lock();
        let previous = env::var("HOME").ok();
        unsafe {
            env::set_var("HOME", home);
        }
        runtime::init();
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for HomeGuard {
    fn drop(&mut self) {
        match &self.previous {
            Some(value) => unsafe {
                env::set_var("HOME", value);
            },
            None => unsafe {
                env::remove_var("HOME");
            },
        }
        runtime::init();
    }
}
