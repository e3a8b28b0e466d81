use super::TaskId;
use serde::{Deserialize, Serialize};

/// A time-based reminder for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    /// Local id, assigned by storage.
    pub id: u64,
    pub task_id: TaskId,
    /// Alarm time, in epoch milliseconds.
    pub time: i64,
}

impl Alarm {
    pub fn new(task_id: TaskId, time: i64) -> Alarm {
        Alarm {
            id: 0,
            task_id,
            time,
        }
    }
}
