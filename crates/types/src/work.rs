use serde::{Deserialize, Serialize};
use std::fmt;

const TASK_PREFIX: &str = "task:";
const DONE_PREFIX: &str = "done:";

/// Opaque unit of work carried through the pipeline.
///
/// A work item has no identity beyond its content. Items created by a trigger
/// look like `task:<id>`; items coming back through the webhook are the
/// completed payload prefixed with `done:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItem(String);

impl WorkItem {
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    /// Create a fresh trigger item, returning the generated id alongside it.
    pub fn new_task() -> (String, Self) {
        let id = uuid::Uuid::new_v4().to_string();
        let item = Self::task(&id);
        (id, item)
    }

    pub fn task(id: &str) -> Self {
        Self(format!("{TASK_PREFIX}{id}"))
    }

    /// Payload that the slow worker reports back once it has finished with `self`.
    pub fn completed(&self) -> Self {
        Self(format!("{DONE_PREFIX}{}", self.0))
    }

    pub fn payload(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WorkItem {
    fn from(payload: String) -> Self {
        Self(payload)
    }
}

impl From<&str> for WorkItem {
    fn from(payload: &str) -> Self {
        Self(payload.to_string())
    }
}
