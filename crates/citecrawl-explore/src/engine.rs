//! Breadth-first exploration loop.
//!
//! ```text
//! Idle ─explore()─▶ Running ─┬─▶ Exhausted      frontier empty
//!                            ├─▶ BudgetReached  `budget` records inserted
//!                            ├─▶ Cancelled      shutdown flag set
//!                            └─▶ Aborted        identity rotation failed
//! ```
//!
//! Every terminal state hands back the traversal state so the caller can
//! checkpoint it. Rate-limited identifiers are put back at the head of the
//! frontier and retried on a fresh identity; other failures are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use citecrawl_core::{fmt_num, shutdown_flag};
use indicatif::ProgressBar;

use crate::client::{MetadataClient, Signal};
use crate::rotator::{IdentityRotator, RotationError};
use crate::state::TraversalState;
use crate::stats::ExploreStats;

/// Log counters every this many insertions
const LOG_EVERY: usize = 100;

/// Why the loop stopped
#[derive(Debug)]
pub enum TerminalReason {
    Exhausted,
    BudgetReached,
    /// Operator interrupt; treated like `BudgetReached`
    Cancelled,
    Aborted(RotationError),
}

impl TerminalReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Exhausted => "frontier exhausted",
            Self::BudgetReached => "budget reached",
            Self::Cancelled => "cancelled",
            Self::Aborted(_) => "aborted",
        }
    }
}

impl std::fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aborted(e) => write!(f, "aborted: {e}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Result of one `explore` call
#[derive(Debug)]
pub struct Exploration {
    pub state: TraversalState,
    pub reason: TerminalReason,
    pub stats: ExploreStats,
    /// Canonical id returned for `root` when it was looked up in this call
    pub resolved_root: Option<String>,
}

/// Drives the crawl with one active client at a time.
pub struct Explorer<'a, R: IdentityRotator> {
    rotator: R,
    client: R::Client,
    cancel: &'a AtomicBool,
    progress: ProgressBar,
}

impl<R: IdentityRotator> Explorer<'static, R> {
    /// Take an initial client from `rotator`; cancellation follows the
    /// process shutdown flag.
    pub fn new(rotator: R) -> Result<Self, RotationError> {
        let client = rotator.connect()?;
        Ok(Self {
            rotator,
            client,
            cancel: shutdown_flag(),
            progress: ProgressBar::hidden(),
        })
    }
}

impl<'a, R: IdentityRotator> Explorer<'a, R> {
    /// Use a different cancellation flag
    pub fn with_cancel<'b>(self, cancel: &'b AtomicBool) -> Explorer<'b, R> {
        Explorer {
            rotator: self.rotator,
            client: self.client,
            cancel,
            progress: self.progress,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Explore breadth-first from `root`, or from `initial` when resuming.
    ///
    /// A restored state is used as-is; `root` only seeds a fresh one.
    /// At most `budget` records are inserted per call.
    pub fn explore(
        &mut self,
        root: &str,
        initial: Option<TraversalState>,
        budget: usize,
    ) -> Exploration {
        let started = Instant::now();
        let mut state = initial.unwrap_or_else(|| TraversalState::seeded(root));
        let mut stats = ExploreStats::default();
        let mut resolved_root = None;

        log::info!(
            "Exploring from {root}: budget={}, visited={}, frontier={}",
            fmt_num(budget),
            fmt_num(state.visited_len()),
            fmt_num(state.frontier_len())
        );
        self.progress.set_length(budget as u64);
        self.progress.set_position(0);

        let reason = loop {
            stats.skipped += state.skip_visited();
            if state.frontier_is_empty() {
                break TerminalReason::Exhausted;
            }
            if stats.inserted >= budget {
                break TerminalReason::BudgetReached;
            }
            if self.cancel.load(Ordering::Relaxed) {
                log::warn!("Shutdown requested, stopping exploration");
                break TerminalReason::Cancelled;
            }
            let Some(id) = state.pop_front() else {
                break TerminalReason::Exhausted;
            };

            stats.attempts += 1;
            match self.client.lookup(&id) {
                Signal::Success(record) => {
                    if id == root {
                        resolved_root = Some(record.id.clone());
                    }
                    if state.is_visited(&record.id) {
                        log::debug!("{id}: resolved to visited {}, discarded", record.id);
                        stats.discarded += 1;
                        continue;
                    }
                    state.enqueue(record.citations.iter().map(String::as_str));
                    state.insert(record);
                    stats.inserted += 1;

                    self.progress.inc(1);
                    self.progress
                        .set_message(format!("frontier {}", fmt_num(state.frontier_len())));
                    if stats.inserted % LOG_EVERY == 0 {
                        log::info!(
                            "{} papers explored, frontier={}",
                            fmt_num(stats.inserted),
                            fmt_num(state.frontier_len())
                        );
                    }
                }
                Signal::RateLimited => {
                    stats.rate_limited += 1;
                    log::info!(
                        "Too many requests on {id} ({} papers explored), rotating identity",
                        fmt_num(stats.inserted)
                    );
                    state.requeue_front(id);
                    match self.rotator.rotate() {
                        Ok(client) => {
                            // old client dropped here, closing its pool
                            self.client = client;
                            stats.rotations += 1;
                        }
                        Err(e) => {
                            log::error!("Identity rotation failed: {e}");
                            break TerminalReason::Aborted(e);
                        }
                    }
                }
                Signal::Failure(e) => {
                    stats.failed += 1;
                    log::warn!("{id}: {e}, skipping");
                }
            }
        };

        stats.elapsed = started.elapsed();
        self.progress.finish_and_clear();
        log::debug!("Exploration stopped: {reason}");
        Exploration {
            state,
            reason,
            stats,
            resolved_root,
        }
    }
}
