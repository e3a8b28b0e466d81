use crate::creator::new_journal_task;
use crate::errors::Result;
use crate::hooks::{self, Hooks};
use crate::lists::OrderedListTask;
use crate::ordering::{journal_list, ordered_list};
use crate::prefs::Preferences;
use crate::storage::StorageTxn;
use crate::task::{Alarm, Geofence, Tag, Task, TaskId};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

/// Copy each of the given tasks along with all of their descendants.  The copy of each given
/// task is placed at the top level; copies of descendants are attached to the copy of their
/// parent.
///
/// Returns the copies of the given tasks.  Missing tasks are skipped.
pub(crate) async fn duplicate(
    txn: &mut dyn StorageTxn,
    prefs: &Preferences,
    hooks: &mut dyn Hooks,
    task_ids: &[TaskId],
    now: DateTime<Utc>,
) -> Result<Vec<Task>> {
    let mut result = Vec::with_capacity(task_ids.len());
    for &task_id in task_ids {
        let Some(original) = txn.get_task(task_id).await? else {
            log::warn!("Cannot duplicate missing task {task_id}");
            continue;
        };
        let top = clone_task(txn, prefs, hooks, &original, 0, now).await?;

        // (original id, parent for its copy)
        let mut stack: Vec<(TaskId, TaskId)> = vec![];
        let mut seen = HashSet::from([original.id]);
        push_children(txn, &mut stack, original.id, top.id).await?;
        while let Some((original_id, new_parent)) = stack.pop() {
            if !seen.insert(original_id) {
                continue;
            }
            let Some(original) = txn.get_task(original_id).await? else {
                continue;
            };
            let clone = clone_task(txn, prefs, hooks, &original, new_parent, now).await?;
            push_children(txn, &mut stack, original_id, clone.id).await?;
        }
        result.push(top);
    }
    Ok(result)
}

/// Queue the live children of `original_id` so that they are popped in id order.
async fn push_children(
    txn: &mut dyn StorageTxn,
    stack: &mut Vec<(TaskId, TaskId)>,
    original_id: TaskId,
    new_parent: TaskId,
) -> Result<()> {
    let children = txn.get_children(original_id).await?;
    for child in txn.get_tasks(&children).await?.into_iter().rev() {
        if !child.is_deleted() {
            stack.push((child.id, new_parent));
        }
    }
    Ok(())
}

async fn clone_task(
    txn: &mut dyn StorageTxn,
    prefs: &Preferences,
    hooks: &mut dyn Hooks,
    original: &Task,
    new_parent: TaskId,
    now: DateTime<Utc>,
) -> Result<Task> {
    let clone = Task {
        id: 0,
        uuid: Uuid::nil(),
        created: Some(now),
        modified: Some(now),
        completed: None,
        calendar_uri: None,
        parent: new_parent,
        suppress_sync: true,
        suppress_refresh: true,
        ..original.clone()
    };
    let mut clone = txn.create_task(clone).await?;

    let tags = txn
        .get_tag_data_for_task(original.id)
        .await?
        .iter()
        .map(|tag_data| Tag::new(clone.id, clone.uuid, tag_data))
        .collect();
    txn.add_tags(tags).await?;

    let add_to_top = prefs.add_tasks_to_top();
    let ordered_row = txn
        .get_ordered_list_task(original.id)
        .await?
        .filter(|row| row.deleted.is_none());
    let journal_row = txn
        .get_journal_task(original.id)
        .await?
        .filter(|row| row.deleted.is_none());
    if let Some(row) = ordered_row {
        let remote_parent = if row.parent == new_parent {
            row.remote_parent
        } else {
            None
        };
        let row = OrderedListTask {
            parent: new_parent,
            remote_parent,
            ..OrderedListTask::new(clone.id, row.list_id)
        };
        ordered_list::insert(txn, row, add_to_top).await?;
    } else if let Some(row) = journal_row {
        let mut new_row = new_journal_task(&clone, &row.calendar);
        if row.parent == new_parent {
            new_row.remote_parent = row.remote_parent;
        }
        journal_list::insert(txn, new_row, add_to_top).await?;
    }

    for geofence in txn.get_geofences(original.id).await? {
        txn.add_geofence(Geofence {
            id: 0,
            task_id: clone.id,
            ..geofence
        })
        .await?;
    }

    let alarms = txn
        .get_alarms(original.id)
        .await?
        .into_iter()
        .map(|alarm| Alarm::new(clone.id, alarm.time))
        .collect();
    txn.add_alarms(alarms).await?;

    if let Some(calendar) = prefs.default_calendar() {
        if clone.has_due_date() {
            hooks::create_event(hooks, &mut clone, &calendar).await;
        }
    }
    txn.set_task(clone.clone()).await?;
    Ok(clone)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hooks::test::RecordingHooks;
    use crate::hooks::NoopHooks;
    use crate::lists::JournalTask;
    use crate::prefs::MapPreferences;
    use crate::storage::inmemory::InMemoryStorage;
    use crate::storage::Storage;
    use crate::task::TagData;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
    }

    async fn new_task(txn: &mut dyn StorageTxn, title: &str, parent: TaskId) -> Result<Task> {
        txn.create_task(Task {
            title: Some(title.into()),
            parent,
            created: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
            completed: Some(Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap()),
            calendar_uri: Some("content://events/9".into()),
            ..Task::default()
        })
        .await
    }

    fn sorted<T: Ord>(mut v: Vec<T>) -> Vec<T> {
        v.sort();
        v
    }

    #[tokio::test]
    async fn duplicates_subtree() -> Result<()> {
        let mut storage = InMemoryStorage::new();
        let mut txn = storage.txn().await?;
        let root = new_task(txn.as_mut(), "root", 0).await?;
        let a = new_task(txn.as_mut(), "a", root.id).await?;
        let b = new_task(txn.as_mut(), "b", root.id).await?;
        let count_before = txn.all_tasks().await?.len();

        let prefs = Preferences::default();
        let clones =
            duplicate(txn.as_mut(), &prefs, &mut NoopHooks, &[root.id], now()).await?;
        assert_eq!(clones.len(), 1);
        let clone = &clones[0];
        assert_eq!(txn.all_tasks().await?.len(), count_before + 3);

        let child_ids = txn.get_children(clone.id).await?;
        let children = txn.get_tasks(&child_ids).await?;
        assert_eq!(
            children
                .iter()
                .map(|t| t.title.clone().unwrap())
                .collect::<Vec<_>>(),
            vec!["a", "b"]
        );

        let originals = [root.uuid, a.uuid, b.uuid];
        for task in children.iter().chain(clones.iter()) {
            assert!(!task.uuid.is_nil());
            assert!(!originals.contains(&task.uuid));
            assert_eq!(task.created, Some(now()));
            assert_eq!(task.modified, Some(now()));
            assert_eq!(task.completed, None);
            assert_eq!(task.calendar_uri, None);
        }
        Ok(())
    }

    #[tokio::test]
    async fn duplicates_grandchildren_at_top_level() -> Result<()> {
        let mut storage = InMemoryStorage::new();
        let mut txn = storage.txn().await?;
        let root = new_task(txn.as_mut(), "root", 0).await?;
        let child = new_task(txn.as_mut(), "child", root.id).await?;
        let grandchild = new_task(txn.as_mut(), "grandchild", child.id).await?;

        let prefs = Preferences::default();
        let clones =
            duplicate(txn.as_mut(), &prefs, &mut NoopHooks, &[child.id], now()).await?;
        let clone = &clones[0];
        assert_eq!(clone.parent, 0);
        let grandchildren = txn.get_children(clone.id).await?;
        assert_eq!(grandchildren.len(), 1);
        assert_ne!(grandchildren[0], grandchild.id);
        let copy = txn.get_task(grandchildren[0]).await?.unwrap();
        assert_eq!(copy.parent, clone.id);
        assert_eq!(txn.get_children(root.id).await?, vec![child.id]);
        Ok(())
    }

    #[tokio::test]
    async fn subtask_copy_moves_to_root_of_list() -> Result<()> {
        let mut storage = InMemoryStorage::new();
        let mut txn = storage.txn().await?;
        let root = new_task(txn.as_mut(), "root", 0).await?;
        let child = new_task(txn.as_mut(), "child", root.id).await?;
        txn.set_ordered_list_task(OrderedListTask::new(root.id, "list"))
            .await?;
        txn.set_ordered_list_task(OrderedListTask {
            parent: root.id,
            remote_parent: Some("remote-root".into()),
            ..OrderedListTask::new(child.id, "list")
        })
        .await?;

        let mut map = MapPreferences::new();
        map.set("add_tasks_to_top", false);
        let prefs = Preferences::new(map);
        let clone = duplicate(txn.as_mut(), &prefs, &mut NoopHooks, &[child.id], now())
            .await?
            .remove(0);
        let row = txn.get_ordered_list_task(clone.id).await?.unwrap();
        assert_eq!((row.parent, row.order), (0, 1));
        assert_eq!(row.remote_parent, None);
        Ok(())
    }

    #[tokio::test]
    async fn skips_deleted_associations() -> Result<()> {
        let mut storage = InMemoryStorage::new();
        let mut txn = storage.txn().await?;
        let listed = new_task(txn.as_mut(), "listed", 0).await?;
        let journaled = new_task(txn.as_mut(), "journaled", 0).await?;
        txn.set_ordered_list_task(OrderedListTask {
            deleted: Some(now()),
            ..OrderedListTask::new(listed.id, "list")
        })
        .await?;
        txn.set_journal_task(JournalTask {
            deleted: Some(now()),
            ..JournalTask::new(journaled.id, "cal")
        })
        .await?;

        let prefs = Preferences::default();
        let clones = duplicate(
            txn.as_mut(),
            &prefs,
            &mut NoopHooks,
            &[listed.id, journaled.id],
            now(),
        )
        .await?;
        assert_eq!(clones.len(), 2);
        assert_eq!(txn.get_ordered_list_task(clones[0].id).await?, None);
        assert_eq!(txn.get_journal_task(clones[1].id).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn skips_deleted_children() -> Result<()> {
        let mut storage = InMemoryStorage::new();
        let mut txn = storage.txn().await?;
        let root = new_task(txn.as_mut(), "root", 0).await?;
        let mut gone = new_task(txn.as_mut(), "gone", root.id).await?;
        gone.deleted = Some(now());
        txn.set_task(gone).await?;

        let prefs = Preferences::default();
        let clones =
            duplicate(txn.as_mut(), &prefs, &mut NoopHooks, &[root.id], now()).await?;
        assert!(txn.get_children(clones[0].id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn copies_dependents() -> Result<()> {
        let mut storage = InMemoryStorage::new();
        let mut txn = storage.txn().await?;
        let task = new_task(txn.as_mut(), "task", 0).await?;
        let work = txn.create_tag_data(TagData::new("work")).await?;
        let home = txn.create_tag_data(TagData::new("home")).await?;
        txn.add_tags(vec![
            Tag::new(task.id, task.uuid, &work),
            Tag::new(task.id, task.uuid, &home),
        ])
        .await?;
        txn.add_geofence(Geofence::new(task.id, "office", true, false, 300))
            .await?;
        txn.add_geofence(Geofence::new(task.id, "gym", false, true, 50))
            .await?;
        txn.add_alarms(vec![Alarm::new(task.id, 1000), Alarm::new(task.id, -3600)])
            .await?;

        let prefs = Preferences::default();
        let clone = duplicate(txn.as_mut(), &prefs, &mut NoopHooks, &[task.id], now())
            .await?
            .remove(0);

        let tag_names = |tags: Vec<TagData>| sorted(tags.into_iter().map(|t| t.name).collect());
        assert_eq!(
            tag_names(txn.get_tag_data_for_task(clone.id).await?),
            tag_names(txn.get_tag_data_for_task(task.id).await?)
        );
        assert!(txn
            .get_tags(clone.id)
            .await?
            .iter()
            .all(|t| t.task_uuid == clone.uuid));

        let fences = |fences: Vec<Geofence>| {
            sorted(
                fences
                    .into_iter()
                    .map(|g| (g.place, g.arrival, g.departure, g.radius))
                    .collect(),
            )
        };
        assert_eq!(
            fences(txn.get_geofences(clone.id).await?),
            fences(txn.get_geofences(task.id).await?)
        );

        let times = |alarms: Vec<Alarm>| sorted(alarms.into_iter().map(|a| a.time).collect());
        let clone_alarms = txn.get_alarms(clone.id).await?;
        assert!(clone_alarms.iter().all(|a| a.task_id == clone.id));
        assert_eq!(times(clone_alarms), times(txn.get_alarms(task.id).await?));
        Ok(())
    }

    #[tokio::test]
    async fn copies_ordered_list_association() -> Result<()> {
        let mut storage = InMemoryStorage::new();
        let mut txn = storage.txn().await?;
        let root = new_task(txn.as_mut(), "root", 0).await?;
        let child = new_task(txn.as_mut(), "child", root.id).await?;
        txn.set_ordered_list_task(OrderedListTask::new(root.id, "list"))
            .await?;
        txn.set_ordered_list_task(OrderedListTask {
            parent: root.id,
            remote_parent: Some("remote-root".into()),
            ..OrderedListTask::new(child.id, "list")
        })
        .await?;

        let prefs = Preferences::default();
        let clone = duplicate(txn.as_mut(), &prefs, &mut NoopHooks, &[root.id], now())
            .await?
            .remove(0);
        let clone_child = txn.get_children(clone.id).await?[0];

        // added to the top, pushing the original down
        let row = txn.get_ordered_list_task(clone.id).await?.unwrap();
        assert_eq!((row.parent, row.order), (0, 0));
        assert_eq!(txn.get_ordered_list_task(root.id).await?.unwrap().order, 1);
        let row = txn.get_ordered_list_task(clone_child).await?.unwrap();
        assert_eq!((row.parent, row.order), (clone.id, 0));
        assert_eq!(row.remote_parent, None);
        assert_eq!(row.remote_id, None);
        Ok(())
    }

    #[tokio::test]
    async fn copies_journal_association() -> Result<()> {
        let mut storage = InMemoryStorage::new();
        let mut txn = storage.txn().await?;
        let task = new_task(txn.as_mut(), "task", 0).await?;
        txn.set_journal_task(JournalTask {
            remote_id: Some("uid-1".into()),
            ..JournalTask::new(task.id, "cal")
        })
        .await?;

        let mut map = MapPreferences::new();
        map.set("add_tasks_to_top", false);
        let prefs = Preferences::new(map);
        let clone = duplicate(txn.as_mut(), &prefs, &mut NoopHooks, &[task.id], now())
            .await?
            .remove(0);
        let row = txn.get_journal_task(clone.id).await?.unwrap();
        assert_eq!(row.calendar, "cal");
        assert_eq!(row.order, None);
        assert!(row.remote_id.is_some());
        assert_ne!(row.remote_id, Some("uid-1".into()));
        Ok(())
    }

    #[tokio::test]
    async fn recreates_calendar_events() -> Result<()> {
        let mut storage = InMemoryStorage::new();
        let mut txn = storage.txn().await?;
        let mut task = new_task(txn.as_mut(), "dated", 0).await?;
        task.due = Some(now());
        txn.set_task(task.clone()).await?;
        let undated = new_task(txn.as_mut(), "undated", 0).await?;

        let mut map = MapPreferences::new();
        map.set("default_calendar", "personal");
        let prefs = Preferences::new(map);
        let mut hooks = RecordingHooks::default();
        let clones = duplicate(
            txn.as_mut(),
            &prefs,
            &mut hooks,
            &[task.id, undated.id, 999],
            now(),
        )
        .await?;
        assert_eq!(clones.len(), 2);
        assert_eq!(clones[0].calendar_uri, Some("content://events/1".into()));
        assert_eq!(clones[1].calendar_uri, None);
        assert_eq!(
            hooks.recorded.lock().unwrap().events,
            vec![(clones[0].id, "personal".into())]
        );
        Ok(())
    }
}
