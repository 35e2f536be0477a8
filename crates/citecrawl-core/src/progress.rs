//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: a single indicatif bar tracking insertions against the budget.
//! Non-TTY mode: hidden bar; the crawler logs periodic counters instead.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Bar used while exploring: papers resolved / budget, frontier in message
fn explore_style() -> Option<ProgressStyle> {
    ProgressStyle::with_template(
        "{spinner:.green} {prefix:<10.cyan.bold} {bar:30.green/dim} {pos:>7}/{len:7} {elapsed:>4} {wide_msg:.dim}",
    )
    .ok()
    .map(|style| style.progress_chars("━━"))
}

/// Central progress context owning the MultiProgress.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: std::io::stderr().is_terminal(),
        }
    }

    /// Context that never draws, for tests and piped output.
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: false,
        }
    }

    /// Create the exploration bar, sized to the step budget.
    ///
    /// Non-TTY: hidden (no-op).
    pub fn explore_bar(&self, budget: usize) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(budget as u64));
        if let Some(style) = explore_style() {
            pb.set_style(style);
        }
        pb.set_prefix("explore");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Print a line above managed progress bars.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Whether running in TTY mode.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for the log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
