//! Logging setup: env_logger, optionally routed around indicatif bars

use std::io::Write;

use indicatif::MultiProgress;

/// Padded level label, plus ANSI color wrapping when `color` is set.
fn level_label(level: log::Level, color: bool) -> String {
    let (label, ansi) = match level {
        log::Level::Error => ("ERROR", "31"),
        log::Level::Warn => ("WARN ", "33"),
        log::Level::Info => ("INFO ", "32"),
        log::Level::Debug => ("DEBUG", "36"),
        log::Level::Trace => ("TRACE", "35"),
    };
    if color {
        format!("\x1b[{ansi}m{label}\x1b[0m")
    } else {
        label.to_string()
    }
}

/// Logger that suspends the progress display while printing a line,
/// so log output never tears the exploration bar.
pub struct ProgressAwareLogger {
    filter: env_logger::Logger,
    multi: MultiProgress,
}

impl ProgressAwareLogger {
    pub fn new(filter: env_logger::Logger, multi: MultiProgress) -> Self {
        Self { filter, multi }
    }
}

impl log::Log for ProgressAwareLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.filter.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.filter.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{}] {}", level_label(record.level(), true), record.args());
        self.multi.suspend(|| eprintln!("{line}"));
    }

    fn flush(&self) {
        self.filter.flush();
    }
}

fn default_level(quiet: bool, debug: bool) -> &'static str {
    if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    }
}

/// Initialize logging.
///
/// With `multi` (TTY mode) lines go through the progress display;
/// otherwise plain uncolored lines for log collectors. `RUST_LOG` wins
/// over the quiet/debug defaults.
pub fn init_logging(quiet: bool, debug: bool, multi: Option<&MultiProgress>) {
    let env = env_logger::Env::default().default_filter_or(default_level(quiet, debug));

    let Some(multi) = multi else {
        env_logger::Builder::from_env(env)
            .format(|buf, record| {
                writeln!(buf, "[{}] {}", level_label(record.level(), false), record.args())
            })
            .init();
        return;
    };

    let filter = env_logger::Builder::from_env(env).build();
    let max_level = filter.filter();
    if log::set_boxed_logger(Box::new(ProgressAwareLogger::new(filter, multi.clone()))).is_ok() {
        log::set_max_level(max_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_padded() {
        assert_eq!(level_label(log::Level::Warn, false), "WARN ");
        assert_eq!(level_label(log::Level::Debug, false), "DEBUG");
    }

    #[test]
    fn colored_label_wraps_ansi() {
        let label = level_label(log::Level::Error, true);
        assert!(label.starts_with("\x1b[31m"));
        assert!(label.ends_with("\x1b[0m"));
    }

    #[test]
    fn debug_beats_quiet() {
        assert_eq!(default_level(true, true), "debug");
        assert_eq!(default_level(true, false), "warn");
        assert_eq!(default_level(false, false), "info");
    }
}
