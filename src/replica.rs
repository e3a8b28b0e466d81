use crate::creator::{self, NewTask};
use crate::duplicator;
use crate::errors::Result;
use crate::hooks::{Hooks, NoopHooks};
use crate::ordering::{journal_list, ledger, ordered_list, JournalItem, ListItem};
use crate::prefs::Preferences;
use crate::storage::Storage;
use crate::task::{TagData, Task, TaskId};
use crate::template::TemplateValues;
use chrono::Utc;
use log::trace;

/// A replica represents an instance of a user's task data, providing an easy interface
/// for creating, duplicating and arranging tasks.
///
/// ## Transactions
///
/// Each method that changes the replica does so in a single storage transaction, which is
/// committed before the method returns.  If the method fails, nothing it did is kept.
///
/// ## Ordering
///
/// Tasks in ordered lists have a manual position, which [`Replica::moved`] and
/// [`Replica::move_task`] maintain.  With strict ordering enabled (see
/// [`Replica::set_strict_ordering`]) every such change is checked for consistency before it is
/// committed.  Tasks in journal lists can only be indented and outdented, with
/// [`Replica::indent_journal_task`].
/**
```rust
# use taskweave::{storage::inmemory::InMemoryStorage, template, Replica, TemplateValues};
# #[tokio::main]
# async fn main() -> anyhow::Result<()> {
let mut replica = Replica::new(InMemoryStorage::new());

// Build a task from a template, then store it.
let values = TemplateValues::new().with(template::IMPORTANCE, "0");
let new_task = replica.create(Some(&values), Some("Pay rent #home")).await?;
let task = replica.insert(new_task).await?;
assert_eq!(task.priority, 0);

// Copy it, along with any subtasks.
let copies = replica.duplicate(&[task.id]).await?;
assert_eq!(copies.len(), 1);
#
# Ok(())
# }
```
**/
pub struct Replica<S: Storage> {
    storage: S,
    prefs: Preferences,
    hooks: Box<dyn Hooks>,
    strict_ordering: bool,
}

impl<S: Storage> Replica<S> {
    /// Create a replica with default preferences and no hooks.
    pub fn new(storage: S) -> Replica<S> {
        Replica {
            storage,
            prefs: Preferences::default(),
            hooks: Box::new(NoopHooks),
            strict_ordering: false,
        }
    }

    pub fn with_preferences(mut self, prefs: Preferences) -> Replica<S> {
        self.prefs = prefs;
        self
    }

    pub fn with_hooks(mut self, hooks: impl Hooks + 'static) -> Replica<S> {
        self.hooks = Box::new(hooks);
        self
    }

    /// Check the consistency of ordered lists after every change, failing the change if they
    /// are inconsistent.
    pub fn set_strict_ordering(&mut self, strict: bool) {
        self.strict_ordering = strict;
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    /// Get an existing task by its id.
    pub async fn get_task(&mut self, id: TaskId) -> Result<Option<Task>> {
        let mut txn = self.storage.txn().await?;
        txn.get_task(id).await
    }

    /// Get the ids of the direct children of a task.
    pub async fn get_children(&mut self, id: TaskId) -> Result<Vec<TaskId>> {
        let mut txn = self.storage.txn().await?;
        txn.get_children(id).await
    }

    /// Get the tags of a task.
    pub async fn get_tags(&mut self, id: TaskId) -> Result<Vec<TagData>> {
        let mut txn = self.storage.txn().await?;
        txn.get_tag_data_for_task(id).await
    }

    /// Get the visible rows of an ordered list, in display order.
    pub async fn ordered_list_items(&mut self, list_id: &str) -> Result<Vec<ListItem>> {
        let mut txn = self.storage.txn().await?;
        let rows = txn.get_ordered_list_tasks(list_id).await?;
        Ok(ledger::visible_items(&rows))
    }

    /// Get the visible rows of a journal list, in display order.
    pub async fn journal_list_items(&mut self, calendar: &str) -> Result<Vec<JournalItem>> {
        let mut txn = self.storage.txn().await?;
        let rows = txn.get_journal_tasks(calendar).await?;
        Ok(journal_list::visible_items(&rows))
    }

    /// Move the task at visible position `from` of an ordered list to position `to`, with the
    /// given indent.  Returns the id of the moved task.
    pub async fn moved(
        &mut self,
        list_id: &str,
        from: usize,
        to: usize,
        indent: usize,
    ) -> Result<TaskId> {
        let mut txn = self.storage.txn().await?;
        let task_id =
            ordered_list::moved(txn.as_mut(), list_id, from, to, indent, self.strict_ordering)
                .await?;
        txn.commit().await?;
        trace!("moved task {task_id} in list {list_id} from {from} to {to}");
        Ok(task_id)
    }

    /// Place a task in an ordered list directly: under `new_parent` (0 for the top level), at
    /// position `primary` among top-level tasks or `secondary` among its siblings.
    pub async fn move_task(
        &mut self,
        task_id: TaskId,
        list_id: &str,
        new_parent: TaskId,
        primary: i64,
        secondary: i64,
    ) -> Result<()> {
        let mut txn = self.storage.txn().await?;
        ordered_list::move_task(
            txn.as_mut(),
            task_id,
            list_id,
            new_parent,
            primary,
            secondary,
            self.strict_ordering,
        )
        .await?;
        txn.commit().await
    }

    /// Change the indentation of the task at visible position `from` of a journal list, as if
    /// dropped at `to`.  Returns false if nothing changed.
    pub async fn indent_journal_task(
        &mut self,
        calendar: &str,
        from: usize,
        to: usize,
        indent: usize,
    ) -> Result<bool> {
        let mut txn = self.storage.txn().await?;
        let changed = journal_list::moved(txn.as_mut(), calendar, from, to, indent).await?;
        if changed {
            txn.commit().await?;
        }
        Ok(changed)
    }

    /// Build a new task from template values and a title, without storing it.
    pub async fn create(
        &mut self,
        values: Option<&TemplateValues>,
        title: Option<&str>,
    ) -> Result<NewTask> {
        let mut txn = self.storage.txn().await?;
        creator::create(txn.as_mut(), &self.prefs, values, title, Utc::now()).await
    }

    /// Store a task built by [`Replica::create`].
    pub async fn insert(&mut self, new_task: NewTask) -> Result<Task> {
        let mut txn = self.storage.txn().await?;
        let task = creator::insert(txn.as_mut(), &self.prefs, new_task).await?;
        txn.commit().await?;
        drop(txn);
        self.refresh(&task).await;
        Ok(task)
    }

    /// Create and store a task from a title alone.
    pub async fn basic_quick_add_task(&mut self, title: &str) -> Result<Task> {
        let mut txn = self.storage.txn().await?;
        let task = creator::basic_quick_add_task(
            txn.as_mut(),
            &self.prefs,
            self.hooks.as_mut(),
            title,
            Utc::now(),
        )
        .await?;
        txn.commit().await?;
        drop(txn);
        self.refresh(&task).await;
        Ok(task)
    }

    /// Copy the given tasks and all of their descendants, returning the copies of the given
    /// tasks.
    pub async fn duplicate(&mut self, task_ids: &[TaskId]) -> Result<Vec<Task>> {
        let mut txn = self.storage.txn().await?;
        let copies = duplicator::duplicate(
            txn.as_mut(),
            &self.prefs,
            self.hooks.as_mut(),
            task_ids,
            Utc::now(),
        )
        .await?;
        txn.commit().await?;
        drop(txn);
        self.hooks.broadcast_refresh().await;
        Ok(copies)
    }

    async fn refresh(&mut self, task: &Task) {
        if !task.suppress_refresh {
            self.hooks.broadcast_refresh().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::hooks::test::RecordingHooks;
    use crate::lists::OrderedListTask;
    use crate::prefs::MapPreferences;
    use crate::storage::inmemory::InMemoryStorage;
    use crate::template;
    use pretty_assertions::assert_eq;

    fn replica() -> Replica<InMemoryStorage> {
        let mut replica = Replica::new(InMemoryStorage::new());
        replica.set_strict_ordering(true);
        replica
    }

    /// Add `n` tasks to the ordered list "list", last-first so that they appear in creation
    /// order.
    async fn ordered(replica: &mut Replica<InMemoryStorage>, n: usize) -> Result<Vec<TaskId>> {
        let mut ids = vec![];
        for i in 0..n {
            let values = TemplateValues::new().with(template::ORDERED_LIST, "list");
            let title = format!("task {i}");
            let new_task = replica.create(Some(&values), Some(&title)).await?;
            ids.push(replica.insert(new_task).await?.id);
        }
        ids.reverse();
        Ok(ids)
    }

    async fn visible(replica: &mut Replica<InMemoryStorage>) -> Result<Vec<(TaskId, TaskId)>> {
        Ok(replica
            .ordered_list_items("list")
            .await?
            .into_iter()
            .map(|i| (i.task_id, i.parent))
            .collect())
    }

    #[tokio::test]
    async fn moved_commits() -> Result<()> {
        let mut replica = replica();
        let ids = ordered(&mut replica, 3).await?;
        assert_eq!(visible(&mut replica).await?, vec![(ids[0], 0), (ids[1], 0), (ids[2], 0)]);

        replica.moved("list", 0, 3, 0).await?;
        assert_eq!(visible(&mut replica).await?, vec![(ids[1], 0), (ids[2], 0), (ids[0], 0)]);

        // indent the last task under the one before it
        replica.moved("list", 2, 2, 1).await?;
        assert_eq!(
            visible(&mut replica).await?,
            vec![(ids[1], 0), (ids[2], 0), (ids[0], ids[2])]
        );
        assert_eq!(replica.get_task(ids[0]).await?.unwrap().parent, ids[2]);
        assert_eq!(replica.get_children(ids[2]).await?, vec![ids[0]]);
        Ok(())
    }

    #[tokio::test]
    async fn failed_move_is_not_committed() -> Result<()> {
        let mut replica = replica();
        let ids = ordered(&mut replica, 2).await?;
        assert!(matches!(
            replica.move_task(ids[0], "list", 0, 7, 0).await,
            Err(Error::Validation(_))
        ));
        assert_eq!(visible(&mut replica).await?, vec![(ids[0], 0), (ids[1], 0)]);
        assert!(matches!(
            replica.moved("list", 5, 0, 0).await,
            Err(Error::Usage(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn indent_journal_task() -> Result<()> {
        let mut replica = replica();
        let mut ids = vec![];
        for title in ["one", "two"] {
            let values = TemplateValues::new().with(template::JOURNAL_LIST, "cal");
            let new_task = replica.create(Some(&values), Some(title)).await?;
            ids.push(replica.insert(new_task).await?.id);
        }
        // added to the top, so "two" is first
        let items = replica.journal_list_items("cal").await?;
        assert_eq!(
            items.iter().map(|i| i.task_id).collect::<Vec<_>>(),
            vec![ids[1], ids[0]]
        );

        assert!(replica.indent_journal_task("cal", 1, 1, 1).await?);
        let items = replica.journal_list_items("cal").await?;
        assert_eq!((items[1].task_id, items[1].indent), (ids[0], 1));
        assert_eq!(replica.get_task(ids[0]).await?.unwrap().parent, ids[1]);
        assert!(!replica.indent_journal_task("cal", 1, 1, 1).await?);
        Ok(())
    }

    #[tokio::test]
    async fn insert_broadcasts_refresh() -> Result<()> {
        let hooks = RecordingHooks::default();
        let mut map = MapPreferences::new();
        map.set("default_calendar", "personal");
        map.set("default_urgency", 1);
        let mut replica = Replica::new(InMemoryStorage::new())
            .with_preferences(Preferences::new(map))
            .with_hooks(hooks.clone());

        let task = replica.basic_quick_add_task("call the bank").await?;
        assert!(task.calendar_uri.is_some());
        let new_task = replica.create(None, Some("no event")).await?;
        let other = replica.insert(new_task).await?;
        assert_eq!(other.calendar_uri, None);

        let recorded = hooks.recorded.lock().unwrap();
        assert_eq!(recorded.refreshes, 2);
        assert_eq!(recorded.events, vec![(task.id, "personal".into())]);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_broadcasts_once() -> Result<()> {
        let hooks = RecordingHooks::default();
        let mut replica = Replica::new(InMemoryStorage::new()).with_hooks(hooks.clone());
        let mut ids = vec![];
        for title in ["a", "b", "c"] {
            let new_task = replica.create(None, Some(title)).await?;
            ids.push(replica.insert(new_task).await?.id);
        }
        hooks.recorded.lock().unwrap().refreshes = 0;

        let copies = replica.duplicate(&ids).await?;
        assert_eq!(copies.len(), 3);
        assert_eq!(hooks.recorded.lock().unwrap().refreshes, 1);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_in_ordered_list() -> Result<()> {
        let mut replica = replica();
        let ids = ordered(&mut replica, 2).await?;
        replica.moved("list", 1, 1, 1).await?;

        let copy = replica.duplicate(&[ids[0]]).await?.remove(0);
        let copy_child = replica.get_children(copy.id).await?;
        assert_eq!(copy_child.len(), 1);
        assert_eq!(
            visible(&mut replica).await?,
            vec![(copy.id, 0), (copy_child[0], copy.id), (ids[0], 0), (ids[1], ids[0])]
        );
        Ok(())
    }

    #[tokio::test]
    async fn row_for_unknown_task_is_tolerated() -> Result<()> {
        let mut replica = replica();
        let ids = ordered(&mut replica, 1).await?;
        {
            let mut txn = replica.storage.txn().await?;
            let mut row = OrderedListTask::new(999, "list");
            row.order = 1;
            txn.set_ordered_list_task(row).await?;
            txn.commit().await?;
        }
        // moving the orphaned row logs a warning but succeeds
        replica.moved("list", 1, 0, 0).await?;
        assert_eq!(visible(&mut replica).await?, vec![(999, 0), (ids[0], 0)]);
        Ok(())
    }
}
