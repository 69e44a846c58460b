//! Rubric store. Rubrics are immutable: revisions insert a new version
//! linked to its parent, they never touch the original.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cq_domain::error::{Error, Result};
use cq_domain::rubric::{Rubric, RubricDimension};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{append_jsonl, load_jsonl};

pub struct RubricStore {
    log_path: PathBuf,
    rubrics: RwLock<HashMap<Uuid, Rubric>>,
}

impl RubricStore {
    pub fn new(state_path: &Path) -> Self {
        let log_path = state_path.join("rubrics.jsonl");
        let mut rubrics = HashMap::new();
        for rubric in load_jsonl::<Rubric>(&log_path) {
            rubrics.insert(rubric.id, rubric);
        }
        Self {
            log_path,
            rubrics: RwLock::new(rubrics),
        }
    }

    pub fn insert(&self, rubric: Rubric) -> Uuid {
        let id = rubric.id;
        append_jsonl(&self.log_path, &rubric);
        self.rubrics.write().insert(id, rubric);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<Rubric> {
        self.rubrics.read().get(id).cloned()
    }

    /// Create the next version of an existing rubric.
    pub fn revise(&self, parent_id: &Uuid, dimensions: Vec<RubricDimension>) -> Result<Rubric> {
        let parent = self
            .get(parent_id)
            .ok_or_else(|| Error::NotFound(format!("rubric {parent_id}")))?;
        let revision = parent.revise(dimensions);
        self.insert(revision.clone());
        Ok(revision)
    }
}
