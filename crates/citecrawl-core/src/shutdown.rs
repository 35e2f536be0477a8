//! Graceful shutdown support via atomic flag

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// Exit status used when the run was interrupted by a signal
pub const INTERRUPTED_EXIT: u8 = 130;

/// Global shutdown flag, set by the SIGTERM/SIGINT handler
pub fn shutdown_flag() -> &'static AtomicBool {
    static FLAG: AtomicBool = AtomicBool::new(false);
    &FLAG
}

/// Register SIGINT/SIGTERM handlers.
///
/// First signal sets the shutdown flag so the crawler can finish the
/// in-flight lookup and checkpoint. Second signal exits immediately.
pub fn install_signal_handlers() -> io::Result<()> {
    for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
        // SAFETY: AtomicBool::swap and process::exit are async-signal-safe
        unsafe {
            signal_hook::low_level::register(signal, || {
                if shutdown_flag().swap(true, Ordering::Relaxed) {
                    std::process::exit(i32::from(INTERRUPTED_EXIT));
                }
            })?;
        }
    }
    Ok(())
}
