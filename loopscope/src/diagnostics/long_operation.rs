use serde::{Deserialize, Serialize};
use std::fmt;

/// A single task run that exceeded the long-operation threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongOperation {
    /// Milliseconds since the hook saw its first event
    pub offset_ms: f64,
    /// Owning request root: the bound context's root, else the causality walk
    pub request_root_id: Option<u64>,
    pub request_id: Option<u64>,
    pub task_id: u64,
    pub duration_ms: f64,
    pub tags: Vec<String>,
}

impl fmt::Display for LongOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.0}] Long synchronous operation ({:.2}ms)! ",
            self.offset_ms, self.duration_ms
        )?;
        match self.request_root_id {
            Some(root) => write!(f, "requestRootId: {root}")?,
            None => f.write_str("requestRootId: none")?,
        }
        write!(f, ", taskId: {}, tags: [{}]", self.task_id, self.tags.join(", "))
    }
}
