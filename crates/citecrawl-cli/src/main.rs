//! citecrawl - breadth-first citation graph crawler
//!
//! Explores Semantic Scholar citations outward from a root paper through
//! Tor, rotating the exit identity whenever the API rate-limits, and
//! checkpoints progress so a crawl can be resumed.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "citecrawl")]
#[command(about = "Breadth-first citation graph crawler")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./citecrawl.toml or ~/.config/citecrawl/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Explore the citation graph from a root paper
    Explore(cmd::explore::ExploreArgs),
    /// Summarize a saved checkpoint
    Inspect(cmd::inspect::InspectArgs),
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let progress = Arc::new(citecrawl_core::ProgressContext::new());
    let multi = progress.is_tty().then(|| progress.multi());
    citecrawl_core::init_logging(cli.quiet, cli.debug, multi);

    let config = match cli.config {
        Some(path) => Config::from_file(&path),
        None => Config::load(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            log::error!("Configuration error: {e:#}");
            return ExitCode::from(2);
        }
    };

    let result = match cli.command {
        Command::Explore(args) => cmd::explore::run(args, &config, &progress),
        Command::Inspect(args) => cmd::inspect::run(args, &config).map(|()| ExitCode::SUCCESS),
        Command::Config => {
            print_config(&config);
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            log::error!("Fatal error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn print_config(config: &Config) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let configured = |v: bool| if v { "configured" } else { "not set" };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec!["Lookup URL", &config.lookup.base_url]);
    table.add_row(vec!["API key", configured(config.lookup.api_key.is_some())]);
    table.add_row(vec![
        "Request timeout",
        &format!(
            "{}s (connect {}s)",
            config.lookup.timeout_secs, config.lookup.connect_timeout_secs
        ),
    ]);
    table.add_row(vec![
        "IP check URL",
        config.lookup.ip_check_url.as_deref().unwrap_or("disabled"),
    ]);
    table.add_row(vec![
        "Root paper",
        config.explore.root.as_deref().unwrap_or("not set"),
    ]);
    table.add_row(vec!["Step budget", &config.explore.budget.to_string()]);
    table.add_row(vec!["Tor proxy", &config.tor.proxy]);
    table.add_row(vec![
        "Tor control",
        &format!("{}:{}", config.tor.control_host, config.tor.control_port),
    ]);
    table.add_row(vec![
        "Tor password",
        configured(config.tor.password.is_some()),
    ]);
    table.add_row(vec![
        "Checkpoint dir",
        &config.checkpoint.dir.display().to_string(),
    ]);
    let resume = match (&config.checkpoint.visited, &config.checkpoint.frontier) {
        (Some(v), Some(f)) => format!("{} + {}", v.display(), f.display()),
        _ => "none".to_string(),
    };
    table.add_row(vec!["Resume from", &resume]);

    eprintln!("\n{table}");
}
