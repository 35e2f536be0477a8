//! Explore subcommand - run the crawl and checkpoint the result

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::Args;

use citecrawl_core::SharedProgress;
use citecrawl_core::shutdown::INTERRUPTED_EXIT;
use citecrawl_explore::{
    CheckpointPaths, Exploration, Explorer, PaperRecord, TerminalReason, TorRotator,
    TraversalState, load_checkpoint, save_checkpoint,
};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ExploreArgs {
    /// Root paper: S2 paper id, or a prefixed id such as arXiv:1705.10311
    #[arg(long)]
    pub root: Option<String>,

    /// Maximum papers to add to the visited set in this run
    #[arg(short, long)]
    pub budget: Option<usize>,

    /// Visited set of a previous run
    #[arg(long, requires = "resume_frontier")]
    pub resume_visited: Option<PathBuf>,

    /// Frontier queue of a previous run
    #[arg(long, requires = "resume_visited")]
    pub resume_frontier: Option<PathBuf>,

    /// Resume from the most recently written checkpoint in the checkpoint directory
    #[arg(long, conflicts_with_all = ["resume_visited", "resume_frontier"])]
    pub resume_latest: bool,

    /// Directory for the checkpoint written at the end of the run
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Name for this run's checkpoint files (default: local timestamp)
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Which checkpoint pair (if any) to resume from
fn resume_paths(args: &ExploreArgs, config: &Config, dir: &Path) -> Result<Option<CheckpointPaths>> {
    if args.resume_latest {
        let latest = CheckpointPaths::latest(dir)?;
        if latest.is_none() {
            log::warn!("No checkpoint found in {}, starting fresh", dir.display());
        }
        return Ok(latest);
    }
    if let (Some(visited), Some(frontier)) = (&args.resume_visited, &args.resume_frontier) {
        return Ok(Some(CheckpointPaths::new(visited, frontier)));
    }
    Ok(match (&config.checkpoint.visited, &config.checkpoint.frontier) {
        (Some(visited), Some(frontier)) => Some(CheckpointPaths::new(visited, frontier)),
        _ => None,
    })
}

/// Record to print as the root banner.
///
/// A root given as an alias is stored under its canonical id, so prefer
/// the id the lookup resolved it to.
fn root_record<'s>(
    state: &'s TraversalState,
    root: &str,
    resolved: Option<&str>,
) -> Option<&'s PaperRecord> {
    resolved
        .and_then(|id| state.get(id))
        .or_else(|| state.get(root))
}

pub fn run(args: ExploreArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    citecrawl_core::install_signal_handlers().context("Failed to register signal handlers")?;
    explore_until(args, config, progress, citecrawl_core::shutdown_flag())
}

/// Crawl until a terminal state, then checkpoint; `cancel` stops the loop.
fn explore_until(
    args: ExploreArgs,
    config: &Config,
    progress: &SharedProgress,
    cancel: &AtomicBool,
) -> Result<ExitCode> {
    let root = args
        .root
        .clone()
        .or_else(|| config.explore.root.clone())
        .context("No root paper: pass --root or set explore.root")?;
    let budget = args.budget.unwrap_or(config.explore.budget);
    let checkpoint_dir = args
        .checkpoint_dir
        .clone()
        .unwrap_or_else(|| config.checkpoint.dir.clone());

    let initial: Option<TraversalState> = match resume_paths(&args, config, &checkpoint_dir)? {
        Some(paths) => load_checkpoint(&paths)?,
        None => None,
    };
    if initial.is_none() {
        log::info!("No checkpoint loaded, starting from {root}");
    }

    let rotator = TorRotator::new(
        config.control_settings(),
        config.http_settings(),
        config.lookup.base_url.clone(),
    )
    .with_api_key(config.lookup.api_key.clone())
    .with_ip_check(config.lookup.ip_check_url.clone());
    let mut explorer = Explorer::new(rotator)
        .context("Cannot set up lookup client")?
        .with_cancel(cancel)
        .with_progress(progress.explore_bar(budget));

    let Exploration {
        state,
        reason,
        stats,
        resolved_root,
    } = explorer.explore(&root, initial, budget);

    if progress.is_tty() {
        stats.print(reason.label(), state.visited_len(), state.frontier_len());
    } else {
        stats.log(reason.label(), state.visited_len(), state.frontier_len());
    }
    if let Some(record) = root_record(&state, &root, resolved_root.as_deref()) {
        progress.println(format!("##### Root Paper #####\n{record}"));
    }

    let run_id = args
        .run_id
        .unwrap_or_else(CheckpointPaths::timestamp_run_id);
    let paths = CheckpointPaths::for_run(&checkpoint_dir, &run_id);

    match &reason {
        TerminalReason::Aborted(e) => {
            if let Err(save_err) = save_checkpoint(&state, &paths) {
                log::error!("Best-effort checkpoint failed: {save_err:#}");
            }
            log::error!("Exploration aborted: {e}");
            Ok(ExitCode::from(1))
        }
        TerminalReason::Cancelled => {
            save_checkpoint(&state, &paths).context("Failed to save checkpoint")?;
            Ok(ExitCode::from(INTERRUPTED_EXIT))
        }
        TerminalReason::Exhausted | TerminalReason::BudgetReached => {
            save_checkpoint(&state, &paths).context("Failed to save checkpoint")?;
            log::info!("Exploration complete ({reason})");
            Ok(ExitCode::SUCCESS)
        }
    }
}
