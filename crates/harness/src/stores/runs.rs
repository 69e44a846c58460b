//! Eval-run store with enforced status transitions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use cq_domain::error::{Error, Result};
use cq_domain::run::{EvalRun, RunStatus};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{append_jsonl, load_jsonl};

pub struct RunStore {
    log_path: PathBuf,
    runs: RwLock<HashMap<Uuid, EvalRun>>,
}

impl RunStore {
    pub fn new(state_path: &Path) -> Self {
        let log_path = state_path.join("runs.jsonl");
        let mut runs = HashMap::new();
        for run in load_jsonl::<EvalRun>(&log_path) {
            runs.insert(run.id, run);
        }
        if !runs.is_empty() {
            tracing::info!(count = runs.len(), "run store loaded");
        }
        Self {
            log_path,
            runs: RwLock::new(runs),
        }
    }

    pub fn insert(&self, run: EvalRun) -> Uuid {
        let id = run.id;
        append_jsonl(&self.log_path, &run);
        self.runs.write().insert(id, run);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<EvalRun> {
        self.runs.read().get(id).cloned()
    }

    pub fn status(&self, id: &Uuid) -> Option<RunStatus> {
        self.runs.read().get(id).map(|r| r.status)
    }

    /// Apply a status transition, stamping started/completed timestamps.
    /// Illegal transitions are a validation error; terminal states stay
    /// sticky.
    pub fn transition(&self, id: &Uuid, to: RunStatus) -> Result<()> {
        let mut runs = self.runs.write();
        let run = runs
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("eval run {id}")))?;

        if !run.status.can_transition(to) {
            return Err(Error::Validation(format!(
                "illegal run transition {} -> {}",
                run.status.as_str(),
                to.as_str()
            )));
        }

        run.status = to;
        match to {
            RunStatus::RunningSimulation => run.started_at = Some(Utc::now()),
            s if s.is_terminal() => run.completed_at = Some(Utc::now()),
            _ => {}
        }
        append_jsonl(&self.log_path, run);
        tracing::info!(run_id = %id, status = to.as_str(), "run transitioned");
        Ok(())
    }

    /// Record a failure message alongside the `Failed` transition.
    pub fn fail(&self, id: &Uuid, message: &str) -> Result<()> {
        self.transition(id, RunStatus::Failed)?;
        let mut runs = self.runs.write();
        if let Some(run) = runs.get_mut(id) {
            run.error_message = Some(message.to_string());
            append_jsonl(&self.log_path, run);
        }
        Ok(())
    }
}
