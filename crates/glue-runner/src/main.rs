//! `gluectl`: drive a glue dispensing controller from the command line.
//!
//! # Usage
//!
//! ```bash
//! # List serial ports
//! gluectl ports
//!
//! # Upload a stored profile
//! gluectl --port /dev/ttyUSB0 send-config --profile "Carton A"
//!
//! # Calibrate the encoder over a 1000-unit page and wait for the result
//! gluectl --port /dev/ttyUSB0 calibrate --page-length 1000 --wait-secs 30
//!
//! # Energize gun 2
//! gluectl --port /dev/ttyUSB0 test --gun 2 --state on
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use glue_runner::{SessionController, SessionSettings, SettingsError, SystemConnector};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long one-shot commands wait for trailing controller output.
const SETTLE_TIME: Duration = Duration::from_millis(200);

/// Glue controller command-line tool
#[derive(Parser, Debug)]
#[command(name = "gluectl")]
#[command(about = "Configure, calibrate and test a glue dispensing controller")]
#[command(version)]
struct Cli {
    /// Settings file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port to open
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Profile directory
    #[arg(long)]
    profiles_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    Ports,

    /// Upload the configuration to the controller
    SendConfig {
        /// Stored profile to upload instead of the default configuration
        #[arg(long)]
        profile: Option<String>,
    },

    /// Run an encoder calibration
    Calibrate {
        /// Calibration page length
        #[arg(long)]
        page_length: Option<u32>,

        /// Seconds to wait for the result
        #[arg(long, default_value = "30")]
        wait_secs: u64,
    },

    /// Switch a gun's test output
    Test {
        /// Gun index (0-3)
        #[arg(long)]
        gun: usize,

        /// Output state
        #[arg(long, value_enum)]
        state: Switch,
    },

    /// Send a heartbeat
    Heartbeat,

    /// Print controller messages until interrupted
    Monitor,

    /// Manage stored profiles
    Profiles {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    /// List stored profiles
    List,
    /// Print a profile document
    Show { name: String },
    /// Delete a profile
    Delete { name: String },
    /// Write a profile to a file
    Export { name: String, path: PathBuf },
    /// Add a profile from a file
    Import { path: PathBuf },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Switch {
    On,
    Off,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), SettingsError> {
    let mut settings = match &cli.config {
        Some(path) => SessionSettings::load(path)?,
        None => SessionSettings::default(),
    };
    if let Some(port) = cli.port {
        settings.port = Some(port);
    }
    if let Some(baud) = cli.baud {
        settings.baud_rate = baud;
    }
    if let Some(dir) = cli.profiles_dir {
        settings.profiles_dir = Some(dir);
    }
    settings.validate()?;

    let connector = Arc::new(SystemConnector::new(settings.write_timeout()));
    let mut session = SessionController::from_settings(connector, &settings);

    match cli.command {
        Commands::Ports => {
            session.refresh_ports();
            if session.state().available_ports.is_empty() {
                println!("No serial ports found");
            }
            for port in &session.state().available_ports {
                println!("{}", port);
            }
        }
        Commands::SendConfig { profile } => {
            if let Some(name) = profile {
                let loaded = session.load_profile(&name);
                report(&session);
                if !loaded {
                    return Ok(());
                }
            }
            if connect(&mut session) {
                session.send_config();
                report(&session);
                settle(&mut session);
            }
        }
        Commands::Calibrate {
            page_length,
            wait_secs,
        } => {
            let page_length = page_length.unwrap_or(settings.calibration_page_length);
            if connect(&mut session) {
                calibrate(&mut session, page_length, Duration::from_secs(wait_secs));
            }
        }
        Commands::Test { gun, state } => {
            if connect(&mut session) {
                session.set_test_gun(gun, state == Switch::On);
                report(&session);
                settle(&mut session);
            }
        }
        Commands::Heartbeat => {
            if connect(&mut session) {
                session.send_heartbeat();
                report(&session);
                settle(&mut session);
            }
        }
        Commands::Monitor => {
            if connect(&mut session) {
                monitor(&mut session);
            }
        }
        Commands::Profiles { action } => profiles(&mut session, action),
    }

    session.disconnect();
    Ok(())
}

fn report(session: &SessionController) {
    println!("{}", session.state().status_message);
}

/// Open the configured port, or the first one found. Returns whether a link is up.
fn connect(session: &mut SessionController) -> bool {
    if session.state().selected_port.is_none() {
        session.refresh_ports();
    }
    session.connect();
    report(session);
    session.state().connected
}

/// Pick up anything the controller says in response to a one-shot command.
fn settle(session: &mut SessionController) {
    let deadline = Instant::now() + SETTLE_TIME;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        if session.wait_for_event(remaining) {
            report(session);
        }
    }
}

fn calibrate(session: &mut SessionController, page_length: u32, wait: Duration) {
    session.start_calibration(page_length);
    report(session);
    if !session.state().calibrating {
        return;
    }
    println!("{}", session.state().calibration_result);

    let deadline = Instant::now() + wait;
    while session.state().calibrating && session.state().connected {
        let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
            warn!("No calibration result within {:?}", wait);
            println!("Timed out waiting for calibration result");
            return;
        };
        if session.wait_for_event(remaining) && session.state().calibrating {
            report(session);
        }
    }

    if session.state().last_calibration.is_some() {
        println!("{}", session.state().calibration_result);
        report(session);
    }
}

fn monitor(session: &mut SessionController) {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst)) {
        warn!("Cannot install Ctrl-C handler: {}", e);
    }

    info!("Monitoring; press Ctrl-C to stop");
    while running.load(Ordering::SeqCst) && session.state().connected {
        if session.wait_for_event(Duration::from_millis(250)) {
            report(session);
        }
    }
}

fn profiles(session: &mut SessionController, action: ProfileAction) {
    match action {
        ProfileAction::List => {
            session.reload_profiles();
            for profile in &session.state().profiles {
                println!(
                    "{}\t{}",
                    profile.name,
                    profile.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        ProfileAction::Show { name } => {
            let Some(store) = session.profile_store() else {
                println!("Profile storage unavailable");
                return;
            };
            match store.load(&name).and_then(|p| p.to_json()) {
                Ok(json) => println!("{}", json),
                Err(e) => println!("Failed to load profile: {}", e),
            }
        }
        ProfileAction::Delete { name } => {
            session.delete_profile(&name);
            report(session);
        }
        ProfileAction::Export { name, path } => {
            session.export_profile(&name, &path);
            report(session);
        }
        ProfileAction::Import { path } => {
            session.import_profile(&path);
            report(session);
        }
    }
}
