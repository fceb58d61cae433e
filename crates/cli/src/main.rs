use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{prelude::*, EnvFilter};
use zws_core::{
    config::{self, AppConfig},
    FailureKind, Rotation, ScheduleError, WorldSelector,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Pick the Zwift world and check today's guest worlds")]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the prefs.xml location in use
    Locate,
    /// Use a specific prefs.xml from now on
    Select {
        /// Path to Zwift's prefs.xml
        path: PathBuf,
    },
    /// Print the currently configured world
    Current,
    /// Change the configured world
    Set {
        /// World name (e.g. "New York") or numeric id
        world: String,
    },
    /// Print today's guest world rotation
    Rotation {
        /// Day of month to look up instead of today
        #[arg(long)]
        day: Option<u32>,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List selectable worlds
    Worlds,
}

fn main() -> Result<ExitCode> {
    init_logging()?;
    let args = Args::parse();

    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    tracing::info!(config = %config::config_path().display(), command = ?args.cmd, "Starting");
    let mut selector = WorldSelector::from_config(&config)?;

    let ok = match args.cmd {
        Command::Locate => match selector.location() {
            Some(path) => {
                println!("{}", path.display());
                true
            }
            None => {
                eprintln!("prefs.xml not found - select it manually");
                false
            }
        },
        Command::Select { path } => {
            let selected = selector.select_explicit(&path).to_path_buf();
            println!("Prefs file selected: {}", selected.display());
            report(selector.current_world().map(|world| format!("Current world: {}", world.name)))
        }
        Command::Current => {
            report(selector.current_world().map(|world| format!("Current world: {}", world.name)))
        }
        Command::Set { world } => report(
            selector
                .set_world_by_input(&world)
                .map(|world| format!("World changed to: {}", world.name)),
        ),
        Command::Rotation { day, json } => {
            let rotation = match day {
                Some(day) => selector.rotation_for_day(&day.to_string()),
                None => selector.today_rotation(),
            };
            match rotation {
                Ok(rotation) if json => {
                    println!("{}", serde_json::to_string_pretty(&rotation)?);
                    true
                }
                outcome => match describe_rotation(day, outcome) {
                    Ok(line) => {
                        println!("{line}");
                        true
                    }
                    Err(message) => {
                        eprintln!("{message}");
                        false
                    }
                },
            }
        }
        Command::Worlds => {
            let current = selector.current_world().ok().map(|world| world.id);
            for world in selector.vocabulary().iter() {
                let marker = if Some(world.id) == current { '*' } else { ' ' };
                println!("{marker} {:>2}  {}", world.id, world.name);
            }
            true
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn report(outcome: Result<String, zws_core::PrefsError>) -> bool {
    match outcome {
        Ok(message) => {
            println!("{message}");
            true
        }
        Err(err) => {
            eprintln!("{}", err.kind().user_message());
            false
        }
    }
}

/// Text for a rotation lookup; misses name the requested day when one was given.
fn describe_rotation(
    day: Option<u32>,
    outcome: Result<Rotation, ScheduleError>,
) -> Result<String, String> {
    let miss = || match day {
        Some(day) => format!("rotation not found for day {day}"),
        None => FailureKind::PatternMiss.user_message().to_string(),
    };
    match outcome {
        Ok(rotation) if rotation.worlds.is_empty() => Err(miss()),
        Ok(rotation) => Ok(format!("Guest worlds: {}", rotation.worlds.join(", "))),
        Err(err) if err.kind() == FailureKind::PatternMiss => Err(miss()),
        Err(err) => Err(err.kind().user_message().to_string()),
    }
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("zws.log");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new("error"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(move || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("failed to open log file")
        });

    tracing_subscriber::registry()
        .with(file_layer.with_filter(env_filter))
        .with(console_layer)
        .init();

    Ok(())
}
