use crate::errors::{Error, Result};
use crate::lists::{Account, Calendar, JournalTask, OrderedList, OrderedListTask};
use crate::storage::config::AccessMode;
use crate::storage::sqlite::inner::{SqliteStorageInner, Txn};
use crate::storage::{Storage, StorageTxn};
use crate::task::{Alarm, Geofence, Place, Tag, TagData, Task, TaskId};
use async_trait::async_trait;
use rusqlite::ToSql;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use tokio::sync::oneshot;
use uuid::Uuid;

mod inner;
mod schema;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub(crate) enum SqliteError {
    #[error("SQLite transaction already committted")]
    TransactionAlreadyCommitted,
    #[error("Task storage was opened in read-only mode")]
    ReadOnlyStorage,
    #[error("SQLite actor thread is not running")]
    ActorGone,
}

/// Newtype to store a `uuid::Uuid` as a string (rusqlite's uuid feature stores as binary blob)
pub(crate) struct StoredUuid(pub(crate) Uuid);

impl ToSql for StoredUuid {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        let s = self.0.to_string();
        Ok(s.into())
    }
}

/// A unit of work run against the open transaction on the actor thread.
type TxnFn = Box<dyn FnOnce(&mut Txn<'_>) + Send>;

/// An enum for messages sent to the sync thread actor.
enum ActorMessage {
    BeginTxn(oneshot::Sender<Result<mpsc::Sender<TxnMessage>>>),
}

enum TxnMessage {
    Commit(oneshot::Sender<Result<()>>),
    Rollback,
    Run(TxnFn),
}

/// State owned by the dedicated synchronous thread. It handles the low-level,
/// sync db ops.
struct Actor {
    storage: SqliteStorageInner,
    receiver: mpsc::Receiver<ActorMessage>,
}

impl Actor {
    fn run(&mut self) {
        // The outer loop waits for a BeginTxn message. If the channel is disconnected,
        // the thread will exit gracefully.
        while let Ok(ActorMessage::BeginTxn(reply_sender)) = self.receiver.recv() {
            let (txn_sender, txn_receiver) = mpsc::channel::<TxnMessage>();
            match self.storage.txn() {
                Ok(mut txn) => {
                    if reply_sender.send(Ok(txn_sender)).is_err() {
                        log::warn!("Client disconnected before transaction could be established");
                        continue;
                    }
                    Self::handle_transaction(&txn_receiver, &mut txn);
                }
                Err(e) => {
                    log::error!("Could not start SQLite transaction: {e}");
                    let _ = reply_sender.send(Err(e));
                }
            }
        }
    }

    /// The inner loop for handling messages within an active transaction.  The transaction is
    /// rolled back when it is dropped without a commit.
    fn handle_transaction(receiver: &mpsc::Receiver<TxnMessage>, txn: &mut Txn<'_>) {
        while let Ok(msg) = receiver.recv() {
            match msg {
                TxnMessage::Commit(resp) => {
                    let _ = resp.send(txn.commit());
                    return;
                }
                TxnMessage::Rollback => return,
                TxnMessage::Run(f) => f(txn),
            }
        }
    }
}

/// SqliteStorage stores tasks in an SQLite database in a given directory.  All database access
/// happens on a dedicated thread, with this type acting as an async handle to it.
#[derive(Clone)]
pub struct SqliteStorage {
    sender: mpsc::Sender<ActorMessage>,
}

impl SqliteStorage {
    pub fn new<P: AsRef<Path>>(
        path: P,
        access_mode: AccessMode,
        create_if_missing: bool,
    ) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let path = path.as_ref().to_path_buf();

        // Use a sync_channel to block until the thread has initialized.
        let (init_sender, init_receiver) = mpsc::sync_channel(0);

        thread::spawn(move || {
            match SqliteStorageInner::new(path, access_mode, create_if_missing) {
                Ok(storage) => {
                    if init_sender.send(Ok(())).is_err() {
                        return;
                    }
                    let mut actor = Actor { storage, receiver };
                    actor.run();
                }
                Err(e) => {
                    let _ = init_sender.send(Err(e));
                }
            }
        });

        // Block until the thread sends its initialization result.
        init_receiver
            .recv()
            .map_err(|_| Error::from(SqliteError::ActorGone))??;
        Ok(Self { sender })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn txn<'a>(&'a mut self) -> Result<Box<dyn StorageTxn + Send + 'a>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(ActorMessage::BeginTxn(reply_tx))
            .map_err(|_| Error::from(SqliteError::ActorGone))?;
        let txn_sender = reply_rx.await??;
        Ok(Box::new(ActorTxn::new(txn_sender)))
    }
}

/// An async proxy for a transaction running on the sync actor thread.
struct ActorTxn {
    sender: mpsc::Sender<TxnMessage>,
    committed: bool,
}

impl ActorTxn {
    fn new(sender: mpsc::Sender<TxnMessage>) -> Self {
        Self {
            sender,
            committed: false,
        }
    }

    /// Run `f` on the actor thread and wait for its result.
    async fn call<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Txn<'_>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        if self.committed {
            return Err(SqliteError::TransactionAlreadyCommitted.into());
        }
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(TxnMessage::Run(Box::new(move |txn: &mut Txn<'_>| {
                let _ = tx.send(f(txn));
            })))
            .map_err(|_| Error::from(SqliteError::ActorGone))?;
        rx.await
            .map_err(|_| Error::from(SqliteError::ActorGone))?
    }
}

impl Drop for ActorTxn {
    fn drop(&mut self) {
        if !self.committed {
            let _ = self.sender.send(TxnMessage::Rollback);
        }
    }
}

#[async_trait]
impl StorageTxn for ActorTxn {
    async fn create_task(&mut self, task: Task) -> Result<Task> {
        self.call(move |txn| txn.create_task(task)).await
    }

    async fn get_task(&mut self, id: TaskId) -> Result<Option<Task>> {
        self.call(move |txn| txn.get_task(id)).await
    }

    async fn get_tasks(&mut self, ids: &[TaskId]) -> Result<Vec<Task>> {
        let ids = ids.to_vec();
        self.call(move |txn| txn.get_tasks(&ids)).await
    }

    async fn set_task(&mut self, task: Task) -> Result<()> {
        self.call(move |txn| txn.set_task(task)).await
    }

    async fn get_children(&mut self, id: TaskId) -> Result<Vec<TaskId>> {
        self.call(move |txn| txn.get_children(id)).await
    }

    async fn all_tasks(&mut self) -> Result<Vec<Task>> {
        self.call(|txn| txn.all_tasks()).await
    }

    async fn get_tag_data_by_name(&mut self, name: &str) -> Result<Option<TagData>> {
        let name = name.to_string();
        self.call(move |txn| txn.get_tag_data_by_name(&name)).await
    }

    async fn get_tag_data_by_uid(&mut self, uid: Uuid) -> Result<Option<TagData>> {
        self.call(move |txn| txn.get_tag_data_by_uid(uid)).await
    }

    async fn all_tag_data(&mut self) -> Result<Vec<TagData>> {
        self.call(|txn| txn.all_tag_data()).await
    }

    async fn create_tag_data(&mut self, tag_data: TagData) -> Result<TagData> {
        self.call(move |txn| txn.create_tag_data(tag_data)).await
    }

    async fn get_tag_data_for_task(&mut self, task_id: TaskId) -> Result<Vec<TagData>> {
        self.call(move |txn| txn.get_tag_data_for_task(task_id))
            .await
    }

    async fn get_tags(&mut self, task_id: TaskId) -> Result<Vec<Tag>> {
        self.call(move |txn| txn.get_tags(task_id)).await
    }

    async fn add_tags(&mut self, tags: Vec<Tag>) -> Result<()> {
        self.call(move |txn| txn.add_tags(tags)).await
    }

    async fn get_ordered_list_task(&mut self, task_id: TaskId) -> Result<Option<OrderedListTask>> {
        self.call(move |txn| txn.get_ordered_list_task(task_id))
            .await
    }

    async fn get_ordered_list_tasks(&mut self, list_id: &str) -> Result<Vec<OrderedListTask>> {
        let list_id = list_id.to_string();
        self.call(move |txn| txn.get_ordered_list_tasks(&list_id))
            .await
    }

    async fn set_ordered_list_task(&mut self, row: OrderedListTask) -> Result<()> {
        self.call(move |txn| txn.set_ordered_list_task(row)).await
    }

    async fn get_ordered_list(&mut self, remote_id: &str) -> Result<Option<OrderedList>> {
        let remote_id = remote_id.to_string();
        self.call(move |txn| txn.get_ordered_list(&remote_id)).await
    }

    async fn set_ordered_list(&mut self, list: OrderedList) -> Result<()> {
        self.call(move |txn| txn.set_ordered_list(list)).await
    }

    async fn get_journal_task(&mut self, task_id: TaskId) -> Result<Option<JournalTask>> {
        self.call(move |txn| txn.get_journal_task(task_id)).await
    }

    async fn get_journal_tasks(&mut self, calendar: &str) -> Result<Vec<JournalTask>> {
        let calendar = calendar.to_string();
        self.call(move |txn| txn.get_journal_tasks(&calendar)).await
    }

    async fn set_journal_task(&mut self, row: JournalTask) -> Result<()> {
        self.call(move |txn| txn.set_journal_task(row)).await
    }

    async fn get_calendar(&mut self, uuid: &str) -> Result<Option<Calendar>> {
        let uuid = uuid.to_string();
        self.call(move |txn| txn.get_calendar(&uuid)).await
    }

    async fn set_calendar(&mut self, calendar: Calendar) -> Result<()> {
        self.call(move |txn| txn.set_calendar(calendar)).await
    }

    async fn get_account(&mut self, uuid: &str) -> Result<Option<Account>> {
        let uuid = uuid.to_string();
        self.call(move |txn| txn.get_account(&uuid)).await
    }

    async fn set_account(&mut self, account: Account) -> Result<()> {
        self.call(move |txn| txn.set_account(account)).await
    }

    async fn get_place(&mut self, uid: &str) -> Result<Option<Place>> {
        let uid = uid.to_string();
        self.call(move |txn| txn.get_place(&uid)).await
    }

    async fn set_place(&mut self, place: Place) -> Result<()> {
        self.call(move |txn| txn.set_place(place)).await
    }

    async fn get_geofences(&mut self, task_id: TaskId) -> Result<Vec<Geofence>> {
        self.call(move |txn| txn.get_geofences(task_id)).await
    }

    async fn add_geofence(&mut self, geofence: Geofence) -> Result<Geofence> {
        self.call(move |txn| txn.add_geofence(geofence)).await
    }

    async fn get_alarms(&mut self, task_id: TaskId) -> Result<Vec<Alarm>> {
        self.call(move |txn| txn.get_alarms(task_id)).await
    }

    async fn add_alarms(&mut self, alarms: Vec<Alarm>) -> Result<()> {
        self.call(move |txn| txn.add_alarms(alarms)).await
    }

    async fn commit(&mut self) -> Result<()> {
        if self.committed {
            return Err(SqliteError::TransactionAlreadyCommitted.into());
        }
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(TxnMessage::Commit(tx))
            .map_err(|_| Error::from(SqliteError::ActorGone))?;
        let res = rx
            .await
            .map_err(|_| Error::from(SqliteError::ActorGone))?;
        if res.is_ok() {
            self.committed = true;
        }
        res
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn storage() -> SqliteStorage {
        let tmp_dir = TempDir::new().unwrap();
        SqliteStorage::new(tmp_dir.path(), AccessMode::ReadWrite, true).unwrap()
    }

    crate::storage::test::storage_tests!(storage());

    #[tokio::test]
    async fn test_implicit_rollback() -> Result<()> {
        let mut storage = storage();
        {
            let mut txn = storage.txn().await?;
            txn.create_task(Task::default()).await?;
            // dropped here, which rolls back the transaction
        }
        let mut txn = storage.txn().await?;
        assert_eq!(txn.all_tasks().await?, Vec::<Task>::new());
        Ok(())
    }

    #[tokio::test]
    async fn test_init_failure() -> Result<()> {
        let tmp_dir = TempDir::new()?;
        let file_path = tmp_dir.path().join("a_file");
        std::fs::write(&file_path, "I am a file, not a directory")?;

        let result = SqliteStorage::new(&file_path, AccessMode::ReadWrite, true);
        if let Err(Error::Database(msg)) = result {
            assert!(msg.contains("Cannot create directory"));
        } else {
            panic!("Expected a Database error");
        }
        Ok(())
    }

    #[tokio::test]
    async fn missing_without_create() -> Result<()> {
        let tmp_dir = TempDir::new()?;
        let result = SqliteStorage::new(tmp_dir.path(), AccessMode::ReadWrite, false);
        assert!(matches!(result, Err(Error::Database(_))));
        Ok(())
    }

    #[tokio::test]
    async fn persists_across_reopen() -> Result<()> {
        let tmp_dir = TempDir::new()?;
        let id = {
            let mut storage = SqliteStorage::new(tmp_dir.path(), AccessMode::ReadWrite, true)?;
            let mut txn = storage.txn().await?;
            let t = txn
                .create_task(Task {
                    title: Some("persisted".into()),
                    ..Task::default()
                })
                .await?;
            txn.commit().await?;
            t.id
        };

        let mut storage = SqliteStorage::new(tmp_dir.path(), AccessMode::ReadOnly, false)?;
        let mut txn = storage.txn().await?;
        let task = txn.get_task(id).await?;
        assert_eq!(task.and_then(|t| t.title), Some("persisted".into()));
        Ok(())
    }

    #[tokio::test]
    async fn read_only_rejects_writes() -> Result<()> {
        let tmp_dir = TempDir::new()?;
        SqliteStorage::new(tmp_dir.path(), AccessMode::ReadWrite, true)?;

        let mut storage = SqliteStorage::new(tmp_dir.path(), AccessMode::ReadOnly, false)?;
        let mut txn = storage.txn().await?;
        let err = txn.create_task(Task::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Task storage was opened in read-only mode");
        Ok(())
    }

    #[tokio::test]
    async fn commit_twice() -> Result<()> {
        let mut storage = storage();
        let mut txn = storage.txn().await?;
        txn.commit().await?;
        let err = txn.commit().await.unwrap_err();
        assert_eq!(err.to_string(), "SQLite transaction already committted");
        Ok(())
    }

    #[tokio::test]
    async fn use_after_commit() -> Result<()> {
        let mut storage = storage();
        let mut txn = storage.txn().await?;
        let t = txn.create_task(Task::default()).await?;
        txn.commit().await?;
        let err = txn.get_task(t.id).await.unwrap_err();
        assert_eq!(err.to_string(), "SQLite transaction already committted");
        drop(txn);

        let mut txn = storage.txn().await?;
        assert!(txn.get_task(t.id).await?.is_some());
        Ok(())
    }
}
