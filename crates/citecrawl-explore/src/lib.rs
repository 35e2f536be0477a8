//! citecrawl explore - breadth-first citation graph exploration
//!
//! Walks the Semantic Scholar citation graph outward from a root paper,
//! rotating the Tor identity whenever the API rate-limits us, and keeps
//! enough state on disk to resume an interrupted crawl.

pub mod checkpoint;
pub mod client;
pub mod engine;
pub mod paper;
pub mod rotator;
pub mod state;
pub mod stats;

// Re-exports
pub use checkpoint::{CheckpointPaths, load_checkpoint, save_checkpoint};
pub use client::{LookupError, MetadataClient, S2Client, Signal};
pub use engine::{Exploration, Explorer, TerminalReason};
pub use paper::{MalformedRecord, PaperRecord};
pub use rotator::{ControlSettings, IdentityRotator, RotationError, TorRotator};
pub use state::TraversalState;
pub use stats::ExploreStats;
