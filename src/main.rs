use std::io::BufRead;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use clap::Parser;
use tilecam::cli::{self, Args, Command, ConsolePresenter};
use tilecam::config::Config;
use tilecam::event_loop::{self, Input};
use tilecam::persistence::PngWriter;
use tilecam::session::{SessionController, SessionSettings};

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

/// Load config from file, then apply CLI overrides.
///
/// An explicit --config must exist; otherwise a missing default file falls
/// back to defaults.
fn load_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    if let Some(path) = &args.config {
        if !path.exists() {
            return Err(format!("Config file not found: {}", path.display()).into());
        }
    }
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn spawn_stdin_reader(tx: Sender<Input>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(Input::Line(line)).is_err() {
                break;
            }
        }
    });
}

fn run_session(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let console = Arc::new(ConsolePresenter::new());
    let mut session = SessionController::new(
        cli::device_opener(config),
        console.clone(),
        Box::new(PngWriter),
        SessionSettings::from(config),
    );

    // A missing template is reported but the preview still works
    if let Err(e) = session.load_template(&config.session.template) {
        log::warn!("Continuing without template: {}", e);
    }

    let (tx, rx) = mpsc::channel();
    let interrupt_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(Input::Interrupt);
    })?;
    spawn_stdin_reader(tx);

    event_loop::run(&mut session, &console, rx, event_loop::DEFAULT_POLL);
    log::info!("Session ended in state {}", session.state());
    Ok(())
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args)?;
    log::debug!("Config: {:?}", config);

    match args.command {
        Some(Command::Composite {
            template,
            source,
            output,
        }) => cli::composite_files(&template, &source, &output),
        Some(Command::ListCameras) => Ok(cli::list_cameras()?),
        Some(Command::Config { action }) => cli::handle_config_action(action, &config),
        Some(Command::Run) | None => run_session(&config),
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
