//! clrconsole demo
//!
//! Opens a console, prints a colored greeting, asks for a name and echoes
//! it back in another color.
//!
//! ```text
//! clrconsole                 # run with ~/.clrconsole/config.toml
//! clrconsole -c demo.toml    # run with another config file
//! ```
//!
//! Outside Windows the demo runs against the in-memory console with a
//! scripted answer and prints the resulting screen.

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use clrconsole::backend::ConsoleBackend;
use clrconsole::color::{Color, ColorPair};
use clrconsole::config::Config;
use clrconsole::console::ColorConsole;
use clrconsole::{tclrprintf, tclrscanf};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest name echoed back
const NAME_LEN: usize = 31;

/// Command line options
#[derive(Default)]
struct Args {
    /// Config file overriding `~/.clrconsole/config.toml`
    config_path: Option<PathBuf>,
}

fn print_version() {
    eprintln!("clrconsole {}", VERSION);
}

fn print_help() {
    eprintln!("clrconsole {} - colored console I/O demo", VERSION);
    eprintln!();
    eprintln!("Usage: clrconsole [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <PATH>   Use this config file");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Palette schemes ([colors] palette = \"...\"):");
    for name in clrconsole::config::PaletteScheme::list() {
        eprintln!("  {}", name);
    }
}

fn parse_args() -> Result<Option<Args>, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(None);
            }
            "-v" | "--version" => {
                print_version();
                return Ok(None);
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing config path".to_string());
                }
                parsed.config_path = Some(PathBuf::from(&args[i]));
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(Some(parsed))
}

/// Log to `~/.clrconsole/clrconsole.log`, never to the console being drawn on
fn init_logging(config: &Config) {
    let log_path = Config::log_path().unwrap_or_else(|| PathBuf::from("clrconsole.log"));

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_new(&config.log.level).unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn run_demo<B: ConsoleBackend + Clone>(backend: &B, config: &Config) -> anyhow::Result<()> {
    let mut console = ColorConsole::new(
        backend.clone(),
        config.console.auto_close,
        config.colors.auto_restore,
    );
    console
        .open(config.console.update_streams)
        .context("Failed to open console")?;

    if let Some(scheme) = config.palette_scheme() {
        console.set_palette(&scheme.colors)?;
        console.flush(false, false, false)?;
        info!("Applied palette scheme {}", scheme.name);
    }

    tclrprintf!(backend, Color::Cyan, "Hello, ")?;
    tclrprintf!(backend, ColorPair::new(Color::Green, Color::Red), "World!\n")?;

    tclrprintf!(backend, Color::White, "Enter name: ")?;
    let mut name = String::new();
    tclrscanf!(backend, ColorPair::new(Color::White, Color::Green), name)
        .context("Failed to read name")?;
    let name: String = name.chars().take(NAME_LEN).collect();

    tclrprintf!(backend, Color::Yellow, "Your name: ")?;
    tclrprintf!(backend, Color::Blue, "{}\n", name)?;

    info!("Greeted {}", name);
    Ok(())
}

#[cfg(windows)]
fn run(config: &Config) -> anyhow::Result<()> {
    let backend = clrconsole::backend::Win32Backend::new();
    run_demo(&backend, config)
}

#[cfg(not(windows))]
fn run(config: &Config) -> anyhow::Result<()> {
    use clrconsole::backend::MemoryBackend;

    eprintln!("No Win32 console on this platform, running headless...");

    let backend = MemoryBackend::new(80, 25);
    backend.push_input("Ferris\n");
    let result = run_demo(&backend, config);

    for y in 0..25 {
        let row = backend.row_text(y);
        if !row.is_empty() {
            eprintln!("{}", row);
        }
    }
    result
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => return Ok(()),
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            return Ok(());
        }
    };

    let config = match &args.config_path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    init_logging(&config);

    info!("clrconsole {} starting", VERSION);

    if let Err(e) = run(&config) {
        error!("Demo failed: {:#}", e);
    }

    Ok(())
}
