/*!
This module defines the local repository used by [`Replica`](crate::Replica).

It defines a [trait](crate::storage::Storage) for storage implementations, and provides a default
on-disk implementation as well as an in-memory implementation for testing.

Typical uses of this crate do not interact directly with this module. However, users who wish to
implement their own storage backends can implement the traits defined here and pass the result to
[`Replica`](crate::Replica).
*/

use crate::errors::Result;
use crate::lists::{Account, Calendar, JournalTask, OrderedList, OrderedListTask};
use crate::task::{Alarm, Geofence, Place, Tag, TagData, Task, TaskId};
use async_trait::async_trait;
use uuid::Uuid;


mod config;

#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use config::{AccessMode, StorageConfig};

pub mod inmemory;

/// A Storage transaction, in which storage operations are performed.
///
/// # Concurrency
///
/// Serializable consistency must be maintained.  Concurrent access is unusual
/// and some implementations may simply apply a mutex to limit access to
/// one transaction at a time.
///
/// # Commiting and Aborting
///
/// A transaction is not visible to other readers until it is committed with
/// [`crate::storage::StorageTxn::commit`].  Transactions are aborted if they are dropped.
/// It is safe and performant to drop transactions that did not modify any data without committing.
#[async_trait]
pub trait StorageTxn: Send {
    /// Create a new task, assigning it an id, and a uuid if it has none.  The task's `id` must be
    /// zero.  Returns the task as stored.
    async fn create_task(&mut self, task: Task) -> Result<Task>;

    /// Get a task by id, if it is in the storage
    async fn get_task(&mut self, id: TaskId) -> Result<Option<Task>>;

    /// Get the tasks with the given ids, in the order given.  Missing tasks are omitted.
    async fn get_tasks(&mut self, ids: &[TaskId]) -> Result<Vec<Task>>;

    /// Save an existing task, overwriting the stored version.  It is an error to save a task
    /// that does not exist.
    async fn set_task(&mut self, task: Task) -> Result<()>;

    /// Get the ids of the direct children of the given task, in ascending id order.
    async fn get_children(&mut self, id: TaskId) -> Result<Vec<TaskId>>;

    /// Get all tasks, in ascending id order.
    async fn all_tasks(&mut self) -> Result<Vec<Task>>;

    /// Find tag data by name, ignoring case.
    async fn get_tag_data_by_name(&mut self, name: &str) -> Result<Option<TagData>>;

    /// Find tag data by its global id.
    async fn get_tag_data_by_uid(&mut self, uid: Uuid) -> Result<Option<TagData>>;

    /// Get all tag data.
    async fn all_tag_data(&mut self) -> Result<Vec<TagData>>;

    /// Store new tag data, assigning it an id.
    async fn create_tag_data(&mut self, tag_data: TagData) -> Result<TagData>;

    /// Get the tag data for every tag on the given task.
    async fn get_tag_data_for_task(&mut self, task_id: TaskId) -> Result<Vec<TagData>>;

    /// Get the tags on the given task.
    async fn get_tags(&mut self, task_id: TaskId) -> Result<Vec<Tag>>;

    /// Add tags to tasks.  Adding a tag a task already has does nothing.
    async fn add_tags(&mut self, tags: Vec<Tag>) -> Result<()>;

    /// Get the ordered-list association of a task.
    async fn get_ordered_list_task(&mut self, task_id: TaskId) -> Result<Option<OrderedListTask>>;

    /// Get all ordered-list associations for the given list, in ascending task id order.
    async fn get_ordered_list_tasks(&mut self, list_id: &str) -> Result<Vec<OrderedListTask>>;

    /// Insert or replace the ordered-list association of a task.
    async fn set_ordered_list_task(&mut self, row: OrderedListTask) -> Result<()>;

    /// Get an ordered list by remote id.
    async fn get_ordered_list(&mut self, remote_id: &str) -> Result<Option<OrderedList>>;

    /// Insert or replace an ordered list.
    async fn set_ordered_list(&mut self, list: OrderedList) -> Result<()>;

    /// Get the journal association of a task.
    async fn get_journal_task(&mut self, task_id: TaskId) -> Result<Option<JournalTask>>;

    /// Get all journal associations for the given calendar, in ascending task id order.
    async fn get_journal_tasks(&mut self, calendar: &str) -> Result<Vec<JournalTask>>;

    /// Insert or replace the journal association of a task.
    async fn set_journal_task(&mut self, row: JournalTask) -> Result<()>;

    /// Get a journal list by uuid.
    async fn get_calendar(&mut self, uuid: &str) -> Result<Option<Calendar>>;

    /// Insert or replace a journal list.
    async fn set_calendar(&mut self, calendar: Calendar) -> Result<()>;

    /// Get an account by uuid.
    async fn get_account(&mut self, uuid: &str) -> Result<Option<Account>>;

    /// Insert or replace an account.
    async fn set_account(&mut self, account: Account) -> Result<()>;

    /// Get a place by uid.
    async fn get_place(&mut self, uid: &str) -> Result<Option<Place>>;

    /// Insert or replace a place.
    async fn set_place(&mut self, place: Place) -> Result<()>;

    /// Get the geofences of a task, in ascending id order.
    async fn get_geofences(&mut self, task_id: TaskId) -> Result<Vec<Geofence>>;

    /// Add a geofence, assigning it an id.
    async fn add_geofence(&mut self, geofence: Geofence) -> Result<Geofence>;

    /// Get the alarms of a task, in ascending id order.
    async fn get_alarms(&mut self, task_id: TaskId) -> Result<Vec<Alarm>>;

    /// Add alarms, assigning each an id.
    async fn add_alarms(&mut self, alarms: Vec<Alarm>) -> Result<()>;

    /// Commit any changes made in the transaction.  It is an error to call this more than
    /// once.
    async fn commit(&mut self) -> Result<()>;
}

/// A trait for objects able to act as task storage.  Most of the interesting behavior is in the
/// [`crate::storage::StorageTxn`] trait.
#[async_trait]
pub trait Storage: Send {
    /// Begin a transaction
    async fn txn<'a>(&'a mut self) -> Result<Box<dyn StorageTxn + Send + 'a>>;
}

#[async_trait]
impl Storage for Box<dyn Storage> {
    async fn txn<'a>(&'a mut self) -> Result<Box<dyn StorageTxn + Send + 'a>> {
        self.as_mut().txn().await
    }
}
