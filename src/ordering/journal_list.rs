use crate::errors::{Error, Result};
use crate::lists::JournalTask;
use crate::storage::StorageTxn;
use crate::task::TaskId;
use std::collections::{HashMap, HashSet};

/// One row of a visible journal list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalItem {
    pub task_id: TaskId,
    pub parent: TaskId,
    /// Depth in the hierarchy; 0 for top-level tasks.
    pub indent: usize,
}

/// Build the visible list of a journal list: each task followed by its subtree, siblings in
/// manual order (unordered tasks last) and then by id.  Tasks whose parent is not in the list
/// are shown at the top level.
pub(crate) fn visible_items(rows: &[JournalTask]) -> Vec<JournalItem> {
    let rows: Vec<&JournalTask> = rows.iter().filter(|r| r.deleted.is_none()).collect();
    let present: HashSet<TaskId> = rows.iter().map(|r| r.task_id).collect();

    let mut children: HashMap<TaskId, Vec<&JournalTask>> = HashMap::new();
    for row in &rows {
        let parent = if present.contains(&row.parent) && row.parent != row.task_id {
            row.parent
        } else {
            0
        };
        children.entry(parent).or_default().push(row);
    }
    for kids in children.values_mut() {
        kids.sort_by_key(|r| (r.order.is_none(), r.order, r.task_id));
    }

    let mut items = Vec::with_capacity(rows.len());
    let mut visited = HashSet::new();
    // (task, indent) pairs still to visit, in reverse order
    let mut stack: Vec<(&JournalTask, usize)> = children
        .get(&0)
        .map(|kids| kids.iter().rev().map(|r| (*r, 0)).collect())
        .unwrap_or_default();
    while let Some((row, indent)) = stack.pop() {
        if !visited.insert(row.task_id) {
            continue;
        }
        items.push(JournalItem {
            task_id: row.task_id,
            parent: row.parent,
            indent,
        });
        if let Some(kids) = children.get(&row.task_id) {
            stack.extend(kids.iter().rev().map(|r| (*r, indent + 1)));
        }
    }
    items
}

/// Determine whether dropping `moving` at `destination` would put it under one of its own
/// descendants, by walking up the hierarchy from the item at the destination.
pub(crate) fn task_is_child(items: &[JournalItem], moving: TaskId, destination: usize) -> bool {
    let mut index = destination;
    let Some(mut check) = items.get(index) else {
        return false;
    };
    while check.parent != 0 {
        if check.parent == moving {
            return true;
        }
        // look upwards for the parent of the current item
        let search = check.parent;
        while check.task_id != search {
            if index == 0 {
                log::warn!("Couldn't find parent {search}");
                return true;
            }
            index -= 1;
            check = &items[index];
        }
    }
    false
}

/// The deepest indent allowed after the item at `previous`.
pub(crate) fn max_indent(items: &[JournalItem], previous: usize) -> usize {
    items.get(previous).map(|i| i.indent + 1).unwrap_or(0)
}

/// The parent a task at `from` gets when dropped at `to` with the given indent.
fn new_parent(items: &[JournalItem], from: usize, to: usize, indent: usize) -> TaskId {
    let task = &items[from];
    if indent == 0 {
        return 0;
    }
    match to.checked_sub(1).and_then(|i| items.get(i)) {
        Some(previous) if indent == previous.indent => previous.parent,
        Some(previous) if indent > previous.indent => previous.task_id,
        _ => task.parent,
    }
}

/// Whether `task_id` is `ancestor` or one of its descendants, following journal parents.
fn is_within(rows: &[JournalTask], task_id: TaskId, ancestor: TaskId) -> bool {
    let parents: HashMap<TaskId, TaskId> = rows.iter().map(|r| (r.task_id, r.parent)).collect();
    let mut current = task_id;
    let mut seen = HashSet::new();
    while current != 0 && seen.insert(current) {
        if current == ancestor {
            return true;
        }
        current = parents.get(&current).copied().unwrap_or(0);
    }
    false
}

/// Re-parent the task at visible position `from` of the journal list when dropped at `to` with
/// the given indent, which is limited to one deeper than the item before `to`.  Returns false if
/// its parent did not change.
pub(crate) async fn moved(
    txn: &mut dyn StorageTxn,
    calendar: &str,
    from: usize,
    to: usize,
    indent: usize,
) -> Result<bool> {
    let rows = txn.get_journal_tasks(calendar).await?;
    let items = visible_items(&rows);
    let task = *items.get(from).ok_or_else(|| {
        Error::Usage(format!("No item at position {from} of {}", items.len()))
    })?;
    if to > items.len() {
        return Err(Error::Usage(format!(
            "Cannot move to position {to} of {}",
            items.len()
        )));
    }
    if task_is_child(&items, task.task_id, to) {
        return Err(Error::Usage(format!(
            "Cannot move task {} under its own subtask",
            task.task_id
        )));
    }

    let indent = match to.checked_sub(1) {
        Some(previous) => indent.min(max_indent(&items, previous)),
        None => 0,
    };
    let parent = new_parent(&items, from, to, indent);
    if parent == task.parent {
        return Ok(false);
    }
    if parent != 0 && is_within(&rows, parent, task.task_id) {
        return Err(Error::Usage(format!(
            "Cannot move task {} under its own subtask",
            task.task_id
        )));
    }

    let Some(mut row) = rows.iter().find(|r| r.task_id == task.task_id).cloned() else {
        return Ok(false);
    };
    if parent == 0 {
        row.remote_parent = None;
        row.parent = 0;
    } else {
        let Some(parent_row) = txn.get_journal_task(parent).await? else {
            return Ok(false);
        };
        row.remote_parent = parent_row.remote_id;
        row.parent = parent;
    }
    txn.set_journal_task(row).await?;
    super::touch(txn, task.task_id, parent).await?;
    Ok(true)
}

/// Store a new association row, first or last among its siblings.  Tasks without a manual order
/// sort after ordered ones and then by id, so a new task is last when left unordered.
pub(crate) async fn insert(
    txn: &mut dyn StorageTxn,
    mut row: JournalTask,
    add_to_top: bool,
) -> Result<()> {
    let rows = txn.get_journal_tasks(&row.calendar).await?;
    let siblings: Vec<Option<i64>> = rows
        .iter()
        .filter(|r| r.deleted.is_none() && r.parent == row.parent && r.task_id != row.task_id)
        .map(|r| r.order)
        .collect();
    row.order = if add_to_top {
        Some(siblings.iter().flatten().min().map_or(0, |o| o - 1))
    } else if siblings.iter().any(Option::is_none) {
        None
    } else {
        siblings.iter().flatten().max().map(|o| o + 1)
    };
    txn.set_journal_task(row).await
}
