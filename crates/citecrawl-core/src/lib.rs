//! citecrawl core - shared runtime plumbing for the citation crawler
//!
//! Logging, progress display, graceful shutdown and the HTTP layer
//! (shared tokio runtime, client construction, error classification).

pub mod http;
pub mod logging;
pub mod progress;
pub mod shutdown;

// Re-exports for convenience
pub use http::{HttpError, HttpSettings, SHARED_RUNTIME, build_client};
pub use logging::{ProgressAwareLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use shutdown::{install_signal_handlers, shutdown_flag};
