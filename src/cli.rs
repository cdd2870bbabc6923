//! Command-line interface for procrun.
use std::str::FromStr;

use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::{constants::DEFAULT_PROCFILE, observer::ConsoleFormat};

/// Log level accepted either by name ("info", "debug", ...) or as a number
/// from 0 (off) to 5 (trace).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// Directive suitable for an `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = trimmed.parse::<u8>() {
            let levels = [
                LevelFilter::OFF,
                LevelFilter::ERROR,
                LevelFilter::WARN,
                LevelFilter::INFO,
                LevelFilter::DEBUG,
                LevelFilter::TRACE,
            ];
            return levels
                .get(number as usize)
                .copied()
                .map(LogLevelArg)
                .ok_or_else(|| format!("unsupported log level number '{number}' (expected 0-5)"));
        }

        let level = match trimmed.to_ascii_lowercase().as_str() {
            "off" => LevelFilter::OFF,
            "error" | "err" => LevelFilter::ERROR,
            "warn" | "warning" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => return Err(format!("invalid log level '{trimmed}'")),
        };

        Ok(LogLevelArg(level))
    }
}

/// Runs the processes of a Procfile and streams their output.
#[derive(Parser, Debug)]
#[command(name = "procrun", version, author)]
#[command(about = "Run and supervise the processes of a Procfile", long_about = None)]
pub struct Cli {
    /// Procfile to run.
    #[arg(value_name = "PROCFILE", default_value = DEFAULT_PROCFILE)]
    pub procfile: String,

    /// Supervisor settings file (YAML). Defaults to ./procrun.yaml when present.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// Logging verbosity. Overrides RUST_LOG.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LogLevelArg>,

    /// Do not restart processes that crash.
    #[arg(long)]
    pub no_auto_restart: bool,

    /// Start only these processes (repeatable). Disabled entries may be named.
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,

    /// Print events as JSON lines instead of text.
    #[arg(long)]
    pub json: bool,

    /// Exit once no process is running and no restart is pending.
    #[arg(long)]
    pub exit_when_idle: bool,
}

impl Cli {
    pub fn console_format(&self) -> ConsoleFormat {
        if self.json {
            ConsoleFormat::Json
        } else {
            ConsoleFormat::Text
        }
    }
}

/// Parses command-line arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}
