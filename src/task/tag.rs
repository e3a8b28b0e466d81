use super::TaskId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named tag.  Tag data is created lazily, the first time a task is tagged with a new name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagData {
    /// Local id, assigned by storage.
    pub id: u64,
    /// Global id of this tag.
    pub uid: Uuid,
    pub name: String,
    pub color: Option<i32>,
}

impl TagData {
    /// Make a new, unsaved tag with the given name.
    pub fn new(name: impl Into<String>) -> TagData {
        TagData {
            id: 0,
            uid: Uuid::new_v4(),
            name: name.into(),
            color: None,
        }
    }
}

/// The relationship between a task and a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub task_id: TaskId,
    pub task_uuid: Uuid,
    pub tag_uid: Uuid,
    pub name: String,
}

impl Tag {
    pub fn new(task_id: TaskId, task_uuid: Uuid, tag: &TagData) -> Tag {
        Tag {
            task_id,
            task_uuid,
            tag_uid: tag.uid,
            name: tag.name.clone(),
        }
    }
}
