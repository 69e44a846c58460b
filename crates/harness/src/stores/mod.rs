//! JSONL-backed stores.
//!
//! Each store keeps its records in memory behind a `parking_lot` lock
//! and appends snapshots to a JSONL file under the state path; on load,
//! later lines for the same id replace earlier ones, so the newest
//! snapshot wins.

mod conversations;
mod evaluations;
mod metrics;
mod rubrics;
mod runs;

pub use conversations::{ConversationRecord, ConversationStore};
pub use evaluations::{EvaluationRecord, EvaluationStore};
pub use metrics::{MetricRecord, MetricStore};
pub use rubrics::RubricStore;
pub use runs::RunStore;

use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Append one record to a JSONL file, creating parent directories as
/// needed. Persistence failures are logged, never fatal.
pub(crate) fn append_jsonl<T: Serialize>(path: &Path, record: &T) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let json = match serde_json::to_string(record) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "record serialization failed");
            return;
        }
    };
    match std::fs::OpenOptions::new().create(true).append(true).open(path) {
        Ok(mut file) => {
            if let Err(e) = writeln!(file, "{json}") {
                tracing::warn!(path = %path.display(), error = %e, "record append failed");
            }
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "store file open failed");
        }
    }
}

/// Load every parseable line from a JSONL file. Missing files yield an
/// empty list; unparseable lines are skipped.
pub(crate) fn load_jsonl<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}
