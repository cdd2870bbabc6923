//! Process registry.
//!
//! Maps a process name to the handle of its live OS process. A name is present
//! exactly while a process is attributed to it: reserved while the spawn is in
//! flight, running once the process exists, and removed by whichever of
//! `stop` or the monitor reaches the lock first.
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
};

/// Identifies one spawn attempt. A restart gets a new ticket, so a monitor can
/// tell its own entry from a successor registered under the same name.
pub type Ticket = u64;

/// Per-handle cancellation flag shared with the handle's tasks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Set by the monitor once the OS process has been reaped.
#[derive(Debug, Clone, Default)]
pub struct ExitFlag(Arc<AtomicBool>);

impl ExitFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A live OS process owned by its registry entry.
#[derive(Debug)]
pub struct ProcessHandle {
    pub name: String,
    pub pid: u32,
    pub pgid: i32,
    pub ticket: Ticket,
    pub cancel: CancelToken,
    pub exited: ExitFlag,
    /// The monitor thread. It owns the output reader threads and joins them
    /// before reporting the exit.
    pub monitor: Option<JoinHandle<()>>,
}

/// State of a registered name.
#[derive(Debug)]
pub enum Entry {
    /// Reserved by a spawn that has not produced a process yet.
    Starting { ticket: Ticket },
    Running(ProcessHandle),
}

impl Entry {
    pub fn ticket(&self) -> Ticket {
        match self {
            Entry::Starting { ticket } => *ticket,
            Entry::Running(handle) => handle.ticket,
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<String, Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Whether `name` is registered under `ticket`.
    pub fn owns(&self, name: &str, ticket: Ticket) -> bool {
        self.entries
            .get(name)
            .is_some_and(|entry| entry.ticket() == ticket)
    }

    /// Reserves `name` for a spawn. Returns `false` if it is already taken.
    pub fn reserve(&mut self, name: &str, ticket: Ticket) -> bool {
        if self.contains(name) {
            return false;
        }
        self.entries
            .insert(name.to_string(), Entry::Starting { ticket });
        true
    }

    /// Replaces the reservation with the running handle. If the reservation
    /// is gone the handle is given back.
    pub fn promote(&mut self, handle: ProcessHandle) -> Result<(), ProcessHandle> {
        match self.entries.get(&handle.name) {
            Some(Entry::Starting { ticket }) if *ticket == handle.ticket => {
                self.entries
                    .insert(handle.name.clone(), Entry::Running(handle));
                Ok(())
            }
            _ => Err(handle),
        }
    }

    /// Removes `name` only if it is still registered under `ticket`.
    pub fn remove_owned(&mut self, name: &str, ticket: Ticket) -> Option<Entry> {
        if self.owns(name, ticket) {
            self.entries.remove(name)
        } else {
            None
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Entry> {
        self.entries.remove(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
