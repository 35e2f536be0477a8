//! Checkpoint persistence: visited set and frontier as two JSON files
//!
//! Layout for run `<run>` inside the checkpoint directory:
//! ```text
//! visited-<run>.json    [PaperRecord, ...] sorted by id
//! frontier-<run>.json   ["paperId", ...] head first
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::paper::PaperRecord;
use crate::state::TraversalState;

const VISITED_PREFIX: &str = "visited-";
const FRONTIER_PREFIX: &str = "frontier-";

/// The two artifacts making up one checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointPaths {
    pub visited: PathBuf,
    pub frontier: PathBuf,
}

impl CheckpointPaths {
    pub fn new(visited: impl Into<PathBuf>, frontier: impl Into<PathBuf>) -> Self {
        Self {
            visited: visited.into(),
            frontier: frontier.into(),
        }
    }

    /// Paths for `run_id` inside `dir`
    pub fn for_run(dir: &Path, run_id: &str) -> Self {
        Self::new(
            dir.join(format!("{VISITED_PREFIX}{run_id}.json")),
            dir.join(format!("{FRONTIER_PREFIX}{run_id}.json")),
        )
    }

    /// Run id from local time; sorts chronologically.
    pub fn timestamp_run_id() -> String {
        chrono::Local::now().format("%Y%m%d-%H%M%S").to_string()
    }

    /// Newest complete pair in `dir`, by visited-file mtime.
    ///
    /// Ties (and files without a readable mtime) fall back to run id order.
    pub fn latest(dir: &Path) -> Result<Option<Self>> {
        let pattern = dir.join(format!("{VISITED_PREFIX}*.json"));
        let pattern = pattern.to_string_lossy();

        let mut runs: Vec<(Option<SystemTime>, String)> = glob::glob(&pattern)
            .context("invalid checkpoint glob pattern")?
            .filter_map(|entry| entry.ok())
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?;
                let run_id = name.strip_prefix(VISITED_PREFIX)?.strip_suffix(".json")?;
                let modified = path.metadata().and_then(|m| m.modified()).ok();
                Some((modified, run_id.to_string()))
            })
            .filter(|(_, run_id)| Self::for_run(dir, run_id).frontier.is_file())
            .collect();
        runs.sort();

        Ok(runs.pop().map(|(_, run_id)| Self::for_run(dir, &run_id)))
    }
}

/// Load a checkpoint if present.
///
/// `Ok(None)` when neither file exists. Exactly one file present is an
/// error: resuming from half a checkpoint would lose frontier nodes.
pub fn load_checkpoint(paths: &CheckpointPaths) -> Result<Option<TraversalState>> {
    match (paths.visited.exists(), paths.frontier.exists()) {
        (false, false) => return Ok(None),
        (true, true) => {}
        (visited, _) => {
            let missing = if visited {
                &paths.frontier
            } else {
                &paths.visited
            };
            anyhow::bail!("incomplete checkpoint: {} is missing", missing.display());
        }
    }

    let visited: Vec<PaperRecord> = read_json(&paths.visited)?;
    let frontier: Vec<String> = read_json(&paths.frontier)?;
    let state = TraversalState::from_parts(visited, frontier);
    log::info!(
        "Loaded checkpoint: {} visited, {} pending",
        state.visited_len(),
        state.frontier_len()
    );
    Ok(Some(state))
}

/// Write both artifacts, each via a temp file renamed into place.
pub fn save_checkpoint(state: &TraversalState, paths: &CheckpointPaths) -> Result<()> {
    for path in [&paths.visited, &paths.frontier] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
    }

    write_json(&paths.visited, &state.visited_sorted())?;
    write_json(&paths.frontier, &state.frontier().collect::<Vec<_>>())?;
    log::info!(
        "Saved checkpoint: {} ({} visited), {} ({} pending)",
        paths.visited.display(),
        state.visited_len(),
        paths.frontier.display(),
        state.frontier_len()
    );
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("cannot parse {}", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let file = File::create(&tmp).with_context(|| format!("cannot create {}", tmp.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)
        .with_context(|| format!("cannot serialize {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("cannot write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("cannot move {} into place", tmp.display()))?;
    Ok(())
}
