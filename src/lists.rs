/*!
Remote lists and the association rows that tie local tasks to them.

There are two kinds of remote list provider:

* ordered lists, whose remote representation is a sibling-linked list (parent + position), and
* journals, whose remote representation is an encrypted, append-only log of changes.

Every task belongs to at most one remote list, recorded by exactly one association row.
*/

use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Association between a task and an ordered (sibling-linked) remote list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedListTask {
    pub task_id: TaskId,
    /// Remote id of the list.
    pub list_id: String,
    /// Local id of the parent task, or 0 for a top-level task.
    pub parent: TaskId,
    /// Remote id of this task, once it has been pushed.
    pub remote_id: Option<String>,
    /// Remote id of the parent task.
    pub remote_parent: Option<String>,
    /// Position among the tasks sharing `parent` in this list.
    pub order: i64,
    /// Position last reported by the remote list.
    pub remote_order: i64,
    pub last_sync: Option<DateTime<Utc>>,
    pub deleted: Option<DateTime<Utc>>,
}

impl OrderedListTask {
    /// Make a new top-level association; its position is assigned on insertion.
    pub fn new(task_id: TaskId, list_id: impl Into<String>) -> OrderedListTask {
        OrderedListTask {
            task_id,
            list_id: list_id.into(),
            parent: 0,
            remote_id: None,
            remote_parent: None,
            order: 0,
            remote_order: 0,
            last_sync: None,
            deleted: None,
        }
    }

    pub fn has_parent(&self) -> bool {
        self.parent != 0
    }
}

/// Association between a task and a journal-backed list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalTask {
    pub task_id: TaskId,
    /// Uuid of the [`Calendar`] this task belongs to.
    pub calendar: String,
    /// Remote id (iCalendar UID) of this task.
    pub remote_id: Option<String>,
    /// Remote id of the parent task.
    pub remote_parent: Option<String>,
    /// Local id of the parent task, or 0.
    pub parent: TaskId,
    /// Manual position of a newly inserted task, if one was assigned.
    pub order: Option<i64>,
    pub last_sync: Option<DateTime<Utc>>,
    pub deleted: Option<DateTime<Utc>>,
}

impl JournalTask {
    pub fn new(task_id: TaskId, calendar: impl Into<String>) -> JournalTask {
        JournalTask {
            task_id,
            calendar: calendar.into(),
            remote_id: None,
            remote_parent: None,
            parent: 0,
            order: None,
            last_sync: None,
            deleted: None,
        }
    }
}

/// An ordered remote list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedList {
    pub remote_id: String,
    pub account: Option<String>,
    pub title: String,
    pub color: Option<i32>,
}

/// A journal-backed remote list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    /// Local uuid of this list.
    pub uuid: String,
    /// Uuid of the owning [`Account`].
    pub account: String,
    pub name: String,
    pub color: Option<i32>,
    /// Uid of the remote journal.
    pub url: String,
    /// Uid of the last journal entry applied or pushed, if any.
    pub ctag: Option<String>,
}

/// The kind of service an account synchronizes with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum AccountType {
    OrderedList,
    Journal,
}

/// A remote account holding one or more lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub uuid: String,
    pub name: String,
    pub url: Option<String>,
    pub username: Option<String>,
    pub account_type: AccountType,
}

/// The list new tasks are routed to when no placement hint is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultList {
    /// Keep new tasks local-only.
    Local,
    /// An ordered list, by remote id.
    Ordered(String),
    /// A journal list, by calendar uuid.
    Journal(String),
}

impl DefaultList {
    /// Parse the stored form of a default-list preference: `ordered:<remote id>` or
    /// `journal:<calendar uuid>`.  Anything else is the local list.
    pub fn parse(value: &str) -> DefaultList {
        if let Some(id) = value.strip_prefix("ordered:").filter(|id| !id.is_empty()) {
            DefaultList::Ordered(id.to_string())
        } else if let Some(id) = value.strip_prefix("journal:").filter(|id| !id.is_empty()) {
            DefaultList::Journal(id.to_string())
        } else {
            DefaultList::Local
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn default_list_parse() {
        assert_eq!(
            DefaultList::parse("ordered:abc"),
            DefaultList::Ordered("abc".into())
        );
        assert_eq!(
            DefaultList::parse("journal:1234"),
            DefaultList::Journal("1234".into())
        );
        assert_eq!(DefaultList::parse("journal:"), DefaultList::Local);
        assert_eq!(DefaultList::parse(""), DefaultList::Local);
    }

    #[test]
    fn account_type_strings() {
        assert_eq!(AccountType::Journal.to_string(), "journal");
        assert_eq!(
            AccountType::from_str("ordered_list").unwrap(),
            AccountType::OrderedList
        );
    }
}
