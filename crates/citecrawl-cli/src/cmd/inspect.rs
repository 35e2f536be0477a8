//! Inspect subcommand - summarize a checkpoint without crawling

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use rustc_hash::FxHashSet;

use citecrawl_core::fmt_num;
use citecrawl_explore::{CheckpointPaths, TraversalState, load_checkpoint};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Visited set file (default: newest checkpoint in the checkpoint dir)
    #[arg(requires = "frontier")]
    pub visited: Option<PathBuf>,

    /// Frontier queue file
    pub frontier: Option<PathBuf>,
}

/// Headline numbers for one checkpoint
#[derive(Debug, PartialEq)]
struct CheckpointSummary {
    visited: usize,
    pending: usize,
    distinct_pending: usize,
    pending_visited: usize,
}

impl CheckpointSummary {
    fn of(state: &TraversalState) -> Self {
        let distinct: FxHashSet<&str> = state.frontier().collect();
        Self {
            visited: state.visited_len(),
            pending: state.frontier_len(),
            distinct_pending: distinct.len(),
            pending_visited: distinct.iter().filter(|id| state.is_visited(id)).count(),
        }
    }
}

pub fn run(args: InspectArgs, config: &Config) -> Result<()> {
    let paths = match (args.visited, args.frontier) {
        (Some(visited), Some(frontier)) => CheckpointPaths::new(visited, frontier),
        _ => CheckpointPaths::latest(&config.checkpoint.dir)?.with_context(|| {
            format!("No checkpoint in {}", config.checkpoint.dir.display())
        })?,
    };
    let state = load_checkpoint(&paths)?
        .with_context(|| format!("Checkpoint not found: {}", paths.visited.display()))?;
    let summary = CheckpointSummary::of(&state);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Checkpoint").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    table.add_row(vec!["Visited file".to_string(), paths.visited.display().to_string()]);
    table.add_row(vec!["Frontier file".to_string(), paths.frontier.display().to_string()]);
    table.add_row(vec!["Papers visited".to_string(), fmt_num(summary.visited)]);
    table.add_row(vec!["Frontier entries".to_string(), fmt_num(summary.pending)]);
    table.add_row(vec!["Distinct pending".to_string(), fmt_num(summary.distinct_pending)]);
    table.add_row(vec![
        "Pending but visited".to_string(),
        fmt_num(summary.pending_visited),
    ]);
    eprintln!("\n{table}");
    Ok(())
}
