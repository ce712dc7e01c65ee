//! Meetbot - Main Entry Point
//!
//! Handles CLI argument parsing, configuration loading, and the join /
//! record / leave lifecycle of one meeting session.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use meetbot::config::{SessionOptions, Settings};
use meetbot::session::MeetingSessionManager;
use meetbot::{NAME, VERSION};

/// ANSI color codes for terminal output
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
}

/// Print the startup banner with version
fn print_banner() {
    println!(
        r#"
{cyan}{bold}                      _   _           _
  _ __ ___   ___  ___| |_| |__   ___ | |_
 | '_ ` _ \ / _ \/ _ \ __| '_ \ / _ \| __|
 | | | | | |  __/  __/ |_| |_) | (_) | |_
 |_| |_| |_|\___|\___|\__|_.__/ \___/ \__|
{reset}
{dim}  Stealth Meeting Automation{reset}
{dim}  Version: {version}{reset}
"#,
        cyan = colors::CYAN,
        bold = colors::BOLD,
        reset = colors::RESET,
        dim = colors::DIM,
        version = VERSION
    );
}

/// Print configuration summary
fn print_config_summary(options: &SessionOptions, record: bool) {
    println!(
        "{bold}Configuration:{reset}",
        bold = colors::BOLD,
        reset = colors::RESET
    );
    println!(
        "  {dim}Guest Name:{reset}    {}",
        options.guest_name,
        dim = colors::DIM,
        reset = colors::RESET
    );
    println!(
        "  {dim}Credentials:{reset}   {}",
        if options.has_credentials() {
            format!("{green}supplied{reset}", green = colors::GREEN, reset = colors::RESET)
        } else {
            format!("{yellow}none (guest entry){reset}", yellow = colors::YELLOW, reset = colors::RESET)
        },
        dim = colors::DIM,
        reset = colors::RESET
    );
    println!(
        "  {dim}Headless:{reset}      {}",
        if options.headless { "yes" } else { "no" },
        dim = colors::DIM,
        reset = colors::RESET
    );
    println!(
        "  {dim}Recording:{reset}     {}",
        if record {
            format!(
                "{green}{}{reset}",
                options.recording_dir.display(),
                green = colors::GREEN,
                reset = colors::RESET
            )
        } else {
            format!("{yellow}disabled{reset}", yellow = colors::YELLOW, reset = colors::RESET)
        },
        dim = colors::DIM,
        reset = colors::RESET
    );
    println!();
}

/// Build the CLI command parser
fn build_cli() -> Command {
    Command::new(NAME)
        .version(VERSION)
        .about("Joins a video-conference meeting with a stealth browser and records it")
        .arg(
            Arg::new("url")
                .value_name("MEETING_URL")
                .help("URL of the meeting to join")
                .required(true),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to configuration file (TOML or JSON)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("guest-name")
                .short('n')
                .long("guest-name")
                .value_name("NAME")
                .help("Display name used for guest entry"),
        )
        .arg(
            Arg::new("email")
                .long("email")
                .value_name("EMAIL")
                .help("Provider account email for authenticated entry"),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .value_name("PASSWORD")
                .help("Provider account password")
                .requires("email"),
        )
        .arg(
            Arg::new("record")
                .short('r')
                .long("record")
                .help("Start recording once admitted")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("duration")
                .short('d')
                .long("duration")
                .value_name("MINUTES")
                .help("Cap the recording length in minutes")
                .value_parser(clap::value_parser!(u64))
                .requires("record"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Directory for recordings and failure screenshots")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("headless")
                .long("headless")
                .help("Run the browser headless (default)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-headless")
                .long("no-headless")
                .help("Run the browser with a visible window")
                .action(ArgAction::SetTrue)
                .conflicts_with("headless"),
        )
        .arg(
            Arg::new("camera")
                .long("camera")
                .help("Keep the camera on inside the meeting")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("mic")
                .long("mic")
                .help("Keep the microphone on inside the meeting")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("executable")
                .long("executable")
                .value_name("PATH")
                .help("Chromium executable to launch")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("profile")
                .long("profile")
                .value_name("PATH")
                .help("Browser profile directory")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("SEED")
                .help("Fixed seed for all randomized behavior")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress output except errors")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
}

/// Initialize the tracing/logging subsystem
fn init_tracing(verbosity: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("chromiumoxide=warn".parse().unwrap())
        .add_directive("tungstenite=warn".parse().unwrap());

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

/// Build session options from the precedence chain: defaults, config file,
/// environment, then CLI flags.
fn load_options(matches: &clap::ArgMatches) -> Result<SessionOptions> {
    let settings = match matches.get_one::<PathBuf>("config") {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Settings::default(),
    };
    let settings = settings.merge_with_env();
    settings.validate().context("invalid configuration")?;

    let mut options = settings.into_options();

    if let Some(name) = matches.get_one::<String>("guest-name") {
        options = options.guest_name(name);
    }
    if let (Some(email), Some(password)) = (
        matches.get_one::<String>("email"),
        matches.get_one::<String>("password"),
    ) {
        options = options.credentials(email, password);
    }
    if let Some(dir) = matches.get_one::<PathBuf>("output") {
        options = options.recording_dir(dir);
    }
    if matches.get_flag("headless") {
        options = options.headless(true);
    } else if matches.get_flag("no-headless") {
        options = options.headless(false);
    }
    if matches.get_flag("camera") {
        options = options.camera_enabled(true);
    }
    if matches.get_flag("mic") {
        options = options.mic_enabled(true);
    }
    if let Some(path) = matches.get_one::<PathBuf>("executable") {
        options = options.executable_path(path);
    }
    if let Some(path) = matches.get_one::<PathBuf>("profile") {
        options = options.user_data_dir(path);
    }
    if let Some(seed) = matches.get_one::<u64>("seed") {
        options = options.rng_seed(*seed);
    }

    Ok(options)
}

/// Main application entry point
#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let verbosity = matches.get_count("verbose");
    let quiet = matches.get_flag("quiet");
    init_tracing(verbosity, quiet);

    let meeting_url = matches
        .get_one::<String>("url")
        .cloned()
        .context("missing meeting URL")?;
    let record = matches.get_flag("record");
    let duration = matches.get_one::<u64>("duration").copied();

    let options = load_options(&matches)?;

    if !quiet {
        print_banner();
        print_config_summary(&options, record);
    }

    let manager = MeetingSessionManager::new(options);

    info!(url = %meeting_url, "joining meeting");
    if let Err(e) = manager.join(&meeting_url).await {
        error!(error = %e, "join failed");
        manager.leave().await.ok();
        return Err(e).context("could not join the meeting");
    }
    println!(
        "{green}{bold}Joined:{reset} {}",
        meeting_url,
        green = colors::GREEN,
        bold = colors::BOLD,
        reset = colors::RESET
    );

    if record {
        let path = manager
            .start_recording(duration)
            .await
            .context("could not start recording")?;
        println!(
            "{green}{bold}Recording:{reset} {}",
            path.display(),
            green = colors::GREEN,
            bold = colors::BOLD,
            reset = colors::RESET
        );
    }

    println!(
        "{dim}Press Ctrl+C to leave the meeting{reset}",
        dim = colors::DIM,
        reset = colors::RESET
    );
    signal::ctrl_c().await.context("failed to listen for ctrl-c")?;

    info!("shutting down");
    if record {
        match manager.stop_recording().await {
            Ok(Some(path)) => println!(
                "{green}Recording saved:{reset} {}",
                path.display(),
                green = colors::GREEN,
                reset = colors::RESET
            ),
            Ok(None) => {}
            Err(e) => error!(error = %e, "recording stop failed"),
        }
    }
    manager.leave().await.context("leave failed")?;
    println!("{dim}Left the meeting{reset}", dim = colors::DIM, reset = colors::RESET);

    Ok(())
}
