//! procrun is a local process supervisor. It runs the named shell commands of
//! a Procfile as process groups, streams their output and lifecycle changes to
//! an observer, restarts them when they crash, and on startup cleans up
//! whatever an earlier, uncleanly terminated run left behind.

/// CLI interface.
pub mod cli;

/// Supervisor settings.
pub mod config;

/// Constants and defaults.
pub mod constants;

/// `.env` parsing.
pub mod envfile;

/// Error handling.
pub mod error;

/// Outbound status and output events.
pub mod events;

/// Lifecycle monitoring and restart policy.
pub mod monitor;

/// Event sinks.
pub mod observer;

/// Output line streaming.
pub mod output;

/// Process group signalling.
pub mod process;

/// Procfile parsing.
pub mod procfile;

/// Orphan cleanup across sessions.
pub mod reaper;

/// Process registry.
pub mod registry;

/// Runtime state paths.
pub mod runtime;

/// Session ids and the session log.
pub mod session;

/// Process spawning.
pub mod spawn;

/// Supervisor facade.
pub mod supervisor;

#[doc(hidden)]
pub mod test_utils;

pub use supervisor::Supervisor;
