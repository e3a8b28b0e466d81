use super::ledger;
use crate::errors::Result;
use crate::lists::OrderedListTask;
use crate::storage::StorageTxn;
use crate::task::TaskId;

/// Move the task at visible position `from` of the list to position `to`, with the given indent.
/// Returns the id of the moved task.
pub(crate) async fn moved(
    txn: &mut dyn StorageTxn,
    list_id: &str,
    from: usize,
    to: usize,
    indent: usize,
    strict: bool,
) -> Result<TaskId> {
    let rows = txn.get_ordered_list_tasks(list_id).await?;
    let items = ledger::visible_items(&rows);
    let placement = ledger::compute_move(&items, from, to, indent)?;
    let task_id = items[from].task_id;
    move_task(
        txn,
        task_id,
        list_id,
        placement.parent,
        placement.primary,
        placement.secondary,
        strict,
    )
    .await?;
    Ok(task_id)
}

/// Place a task under `new_parent` (0 for the top level) at the given sort keys, persisting every
/// association row whose position changed.
pub(crate) async fn move_task(
    txn: &mut dyn StorageTxn,
    task_id: TaskId,
    list_id: &str,
    new_parent: TaskId,
    primary: i64,
    secondary: i64,
    strict: bool,
) -> Result<()> {
    let mut rows = txn.get_ordered_list_tasks(list_id).await?;
    let before = rows.clone();
    let position = if new_parent == 0 { primary } else { secondary };
    ledger::apply_move(&mut rows, task_id, new_parent, position)?;

    let remote_parent = if new_parent == 0 {
        None
    } else {
        rows.iter()
            .find(|r| r.task_id == new_parent)
            .and_then(|r| r.remote_id.clone())
    };
    if let Some(row) = rows.iter_mut().find(|r| r.task_id == task_id) {
        row.remote_parent = remote_parent;
    }

    if strict {
        ledger::validate(&rows)?;
    }

    for (old, new) in before.iter().zip(rows.iter()) {
        if old != new {
            txn.set_ordered_list_task(new.clone()).await?;
        }
    }
    super::touch(txn, task_id, new_parent).await
}

/// Store a new association row, first or last among its siblings.
pub(crate) async fn insert(
    txn: &mut dyn StorageTxn,
    mut row: OrderedListTask,
    add_to_top: bool,
) -> Result<()> {
    let mut rows = txn.get_ordered_list_tasks(&row.list_id).await?;
    let before = rows.clone();
    ledger::insert_and_shift(&mut rows, &mut row, add_to_top);
    for (old, new) in before.iter().zip(rows.iter()) {
        if old != new && new.task_id != row.task_id {
            txn.set_ordered_list_task(new.clone()).await?;
        }
    }
    txn.set_ordered_list_task(row).await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::errors::Error;
    use crate::storage::inmemory::InMemoryStorage;
    use crate::storage::Storage;
    use crate::task::Task;
    use pretty_assertions::assert_eq;

    /// Create `n` top-level tasks in "list", returning their ids in order.
    async fn setup(txn: &mut dyn StorageTxn, n: usize) -> Result<Vec<TaskId>> {
        let mut ids = vec![];
        for i in 0..n {
            let task = txn.create_task(Task::default()).await?;
            let mut row = OrderedListTask::new(task.id, "list");
            row.order = i as i64;
            row.remote_id = Some(format!("remote-{}", task.id));
            txn.set_ordered_list_task(row).await?;
            ids.push(task.id);
        }
        Ok(ids)
    }

    async fn visible(txn: &mut dyn StorageTxn) -> Result<Vec<(TaskId, TaskId)>> {
        let rows = txn.get_ordered_list_tasks("list").await?;
        Ok(ledger::visible_items(&rows)
            .into_iter()
            .map(|i| (i.task_id, i.parent))
            .collect())
    }

    #[tokio::test]
    async fn moved_reorders_and_touches() -> Result<()> {
        let mut storage = InMemoryStorage::new();
        let mut txn = storage.txn().await?;
        let ids = setup(txn.as_mut(), 3).await?;

        let moved_id = moved(txn.as_mut(), "list", 2, 0, 0, true).await?;
        assert_eq!(moved_id, ids[2]);
        assert_eq!(
            visible(txn.as_mut()).await?,
            vec![(ids[2], 0), (ids[0], 0), (ids[1], 0)]
        );
        let task = txn.get_task(ids[2]).await?.unwrap();
        assert!(task.modified.is_some());
        // untouched tasks keep their modification time
        assert!(txn.get_task(ids[0]).await?.unwrap().modified.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn indent_sets_remote_parent() -> Result<()> {
        let mut storage = InMemoryStorage::new();
        let mut txn = storage.txn().await?;
        let ids = setup(txn.as_mut(), 2).await?;

        moved(txn.as_mut(), "list", 1, 1, 1, true).await?;
        let row = txn.get_ordered_list_task(ids[1]).await?.unwrap();
        assert_eq!(row.parent, ids[0]);
        assert_eq!(row.order, 0);
        assert_eq!(row.remote_parent, Some(format!("remote-{}", ids[0])));
        assert_eq!(txn.get_task(ids[1]).await?.unwrap().parent, ids[0]);

        // and back out again
        moved(txn.as_mut(), "list", 1, 1, 0, true).await?;
        let row = txn.get_ordered_list_task(ids[1]).await?.unwrap();
        assert_eq!(row.parent, 0);
        assert_eq!(row.order, 1);
        assert_eq!(row.remote_parent, None);
        assert_eq!(txn.get_task(ids[1]).await?.unwrap().parent, 0);
        Ok(())
    }

    #[tokio::test]
    async fn move_task_direct() -> Result<()> {
        let mut storage = InMemoryStorage::new();
        let mut txn = storage.txn().await?;
        let ids = setup(txn.as_mut(), 3).await?;

        move_task(txn.as_mut(), ids[0], "list", ids[2], 0, 0, true).await?;
        assert_eq!(
            visible(txn.as_mut()).await?,
            vec![(ids[1], 0), (ids[2], 0), (ids[0], ids[2])]
        );
        Ok(())
    }

    #[tokio::test]
    async fn strict_mode_rejects_bad_position() -> Result<()> {
        let mut storage = InMemoryStorage::new();
        let mut txn = storage.txn().await?;
        let ids = setup(txn.as_mut(), 2).await?;

        // position 5 leaves a gap among the top-level tasks
        let res = move_task(txn.as_mut(), ids[0], "list", 0, 5, 0, true).await;
        assert!(matches!(res, Err(Error::Validation(_))));
        // nothing was written
        assert_eq!(txn.get_ordered_list_task(ids[0]).await?.unwrap().order, 0);

        // without strict mode, the last write wins
        move_task(txn.as_mut(), ids[0], "list", 0, 5, 0, false).await?;
        assert_eq!(txn.get_ordered_list_task(ids[0]).await?.unwrap().order, 5);
        Ok(())
    }

    #[tokio::test]
    async fn insert_top_and_bottom() -> Result<()> {
        let mut storage = InMemoryStorage::new();
        let mut txn = storage.txn().await?;
        let ids = setup(txn.as_mut(), 2).await?;

        let top = txn.create_task(Task::default()).await?;
        insert(txn.as_mut(), OrderedListTask::new(top.id, "list"), true).await?;
        let bottom = txn.create_task(Task::default()).await?;
        insert(txn.as_mut(), OrderedListTask::new(bottom.id, "list"), false).await?;

        assert_eq!(
            visible(txn.as_mut()).await?,
            vec![(top.id, 0), (ids[0], 0), (ids[1], 0), (bottom.id, 0)]
        );
        let rows = txn.get_ordered_list_tasks("list").await?;
        ledger::validate(&rows)?;
        Ok(())
    }
}
