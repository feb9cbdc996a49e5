//! holosync - shared hologram sessions
//!
//! CLI entry point for running scripted sessions and inspecting configuration.

use std::fs;
use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use holosync::cli::{Cli, Command, OutputFormat, generate_after_help};
use holosync::config::Config;
use holosync::simulation::{SimulationOptions, SimulationReport, run_simulation};
use holosync::store::SessionCredentials;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("holosync")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("holosync.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Simulate {
            api_key,
            app_id,
            participants,
            samples,
            format,
        }) => {
            let credentials = SessionCredentials::new(api_key, app_id);
            let options = SimulationOptions { participants, samples };
            cmd_simulate(&config, &credentials, &options, format).await
        }
        Some(Command::Config) => cmd_config(&config),
        None => {
            Cli::command().after_help(generate_after_help()).print_help()?;
            Ok(())
        }
    }
}

async fn cmd_simulate(
    config: &Config,
    credentials: &SessionCredentials,
    options: &SimulationOptions,
    format: OutputFormat,
) -> Result<()> {
    info!(participants = options.participants, samples = options.samples, "Running simulation");
    let report = run_simulation(credentials, config, options)
        .await
        .context("Simulation failed")?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{}", json);
        }
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}

fn check(ok: bool) -> colored::ColoredString {
    if ok { "\u{2713}".green() } else { "\u{2717}".red() }
}

fn print_report(report: &SimulationReport) {
    println!("{} {}", "Session".bold(), report.app_id.cyan());
    println!("  participants: {}", report.participants.len());
    for id in &report.participants {
        println!("    {}", id);
    }

    println!();
    println!("{}", "Authority".bold());
    println!("  before: {}", report.authority_before.to_string().yellow());
    match &report.authority_after {
        Some(id) => println!("  after:  {}", id.to_string().yellow()),
        None => println!("  after:  {}", "none".dimmed()),
    }

    println!();
    println!("{}", "Manipulation".bold());
    println!("  controller: {}", report.controller);
    println!(
        "  samples: {} offered, {} broadcast, {} dropped",
        report.samples_offered,
        report.samples_broadcast.to_string().green(),
        report.samples_dropped.to_string().red()
    );
    println!(
        "  final position: ({:.3}, {:.3}, {:.3})",
        report.final_position.x, report.final_position.y, report.final_position.z
    );
    println!("  {} frozen for others while dragged", check(report.frozen_during_drag));
    println!("  {} restored after release", check(report.restored_after_release));

    println!();
    println!("{}", "Rendering".bold());
    for r in &report.render {
        println!(
            "  {}: {} materialized, {} transforms, affordance calls {:?}",
            r.participant, r.materialized, r.transforms, r.affordances
        );
    }

    println!();
    println!("{}", "Store".bold());
    println!(
        "  log entries: {}, delivered: {}, direct: {}, departures: {}",
        report.store.log_len, report.store.messages_delivered, report.store.direct_sent, report.store.departures
    );
}
