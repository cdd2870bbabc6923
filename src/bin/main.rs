use std::{
    error::Error,
    path::Path,
    sync::{Arc, mpsc},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use procrun::{
    Supervisor,
    cli::{Cli, parse_args},
    config::load_config,
    constants::IDLE_CHECK_INTERVAL,
    observer::ConsoleObserver,
    procfile::Procfile,
    runtime,
};

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args();
    init_logging(&args);
    runtime::init();

    let mut config = load_config(args.config.as_deref())?;
    if args.no_auto_restart {
        config.auto_restart = false;
    }

    let procfile = Procfile::load(Path::new(&args.procfile))?;
    let observer = Arc::new(ConsoleObserver::new(args.console_format()));
    let supervisor = Supervisor::new(config, observer);
    supervisor.load_definitions(
        procfile.definitions,
        Some(procfile.path.as_path()),
        procfile.env,
    )?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })?;

    if let Err(err) = start(&supervisor, &args) {
        error!("Startup failed: {err}");
        supervisor.shutdown()?;
        return Err(err);
    }

    loop {
        match shutdown_rx.recv_timeout(IDLE_CHECK_INTERVAL) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                info!("Interrupted; stopping all processes");
                break;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if args.exit_when_idle && supervisor.is_idle()? {
                    info!("All processes have exited");
                    break;
                }
            }
        }
    }

    supervisor.shutdown()?;
    Ok(())
}

fn start(supervisor: &Supervisor, args: &Cli) -> Result<(), Box<dyn Error>> {
    if args.only.is_empty() {
        supervisor.start_all()?;
        return Ok(());
    }

    let definitions = supervisor.definitions()?;
    for name in &args.only {
        if !definitions.iter().any(|def| &def.name == name) {
            warn!("No process named '{name}' in {}", args.procfile);
            continue;
        }
        supervisor.start(name)?;
    }
    Ok(())
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
