//! Counters for one exploration run and their console rendering

use std::time::Duration;

use citecrawl_core::fmt_num;
use comfy_table::{Attribute, Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

/// Per-run counters.
///
/// `attempts` counts every lookup sent; `inserted` counts only records that
/// entered the visited set, which is what the step budget meters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExploreStats {
    pub attempts: usize,
    pub inserted: usize,
    pub rate_limited: usize,
    pub rotations: usize,
    pub failed: usize,
    /// Frontier entries dropped before lookup (already visited)
    pub skipped: usize,
    /// Successful lookups whose id turned out to be visited already
    pub discarded: usize,
    pub elapsed: Duration,
}

impl ExploreStats {
    /// Format summary table as a string.
    pub fn format_table(&self, reason: &str, visited: usize, frontier: usize) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Exploration")
                    .fg(Color::Cyan)
                    .add_attribute(Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
            ]);

        let rows = [
            ("Stopped", reason.to_string()),
            ("Papers inserted", fmt_num(self.inserted)),
            ("Lookups attempted", fmt_num(self.attempts)),
            ("Failed lookups", fmt_num(self.failed)),
            ("Rate limited", fmt_num(self.rate_limited)),
            ("Identity rotations", fmt_num(self.rotations)),
            ("Skipped (visited)", fmt_num(self.skipped + self.discarded)),
            ("Visited total", fmt_num(visited)),
            ("Frontier size", fmt_num(frontier)),
            ("Elapsed", format!("{:.1}s", self.elapsed.as_secs_f64())),
        ];
        for (label, value) in rows {
            table.add_row(vec![Cell::new(label), Cell::new(value)]);
        }
        table.to_string()
    }

    /// Print summary table to stderr (TTY mode).
    pub fn print(&self, reason: &str, visited: usize, frontier: usize) {
        eprintln!("\n{}", self.format_table(reason, visited, frontier));
    }

    /// Log summary line (non-TTY mode).
    pub fn log(&self, reason: &str, visited: usize, frontier: usize) {
        log::info!(
            "{reason}: {} inserted / {} lookups ({} failed, {} rate-limited, {} rotations), visited={}, frontier={} [{:.1}s]",
            fmt_num(self.inserted),
            fmt_num(self.attempts),
            fmt_num(self.failed),
            fmt_num(self.rate_limited),
            fmt_num(self.rotations),
            fmt_num(visited),
            fmt_num(frontier),
            self.elapsed.as_secs_f64()
        );
    }
}
