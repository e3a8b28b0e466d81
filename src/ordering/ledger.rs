//! Manual ordering of the tasks in an ordered list.
//!
//! Each association row stores a `parent` and an `order` among the rows sharing that parent.
//! From these, every visible row gets two sort keys: the primary sort is the position of its
//! root (its own `order` for a root, the parent's `order` for a child), and the secondary sort is
//! its position under its parent (0 for a root).  Nesting is at most one level deep.
//!
//! Everything here is pure: functions take a snapshot of the rows of one list and either compute
//! a placement or update the rows in place.  Persisting the changed rows is up to the caller.

use crate::errors::{Error, Result};
use crate::lists::OrderedListTask;
use crate::task::TaskId;
use std::collections::{BTreeMap, HashMap, HashSet};

/// One row of the visible list, with its derived sort keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListItem {
    pub task_id: TaskId,
    /// Local id of the parent task, or 0.
    pub parent: TaskId,
    pub primary_sort: i64,
    pub secondary_sort: i64,
    pub has_children: bool,
}

impl ListItem {
    pub fn has_parent(&self) -> bool {
        self.parent != 0
    }
}

/// The destination of a move: a new parent and the sort keys the task should take there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub parent: TaskId,
    pub primary: i64,
    pub secondary: i64,
}

impl Placement {
    fn root(primary: i64) -> Placement {
        Placement {
            parent: 0,
            primary,
            secondary: 0,
        }
    }

    fn nested(parent: TaskId, secondary: i64) -> Placement {
        Placement {
            parent,
            primary: 0,
            secondary,
        }
    }

    /// The position among siblings this placement corresponds to.
    pub fn position(&self) -> i64 {
        if self.parent == 0 {
            self.primary
        } else {
            self.secondary
        }
    }
}

fn live(rows: &[OrderedListTask]) -> impl Iterator<Item = &OrderedListTask> {
    rows.iter().filter(|r| r.deleted.is_none())
}

/// Build the visible list from the rows of one list: roots in order, each followed by its
/// children in order.  Deleted rows are not visible.  Children whose parent is not a visible root
/// are left out; [`validate`] reports them.
pub fn visible_items(rows: &[OrderedListTask]) -> Vec<ListItem> {
    let mut roots: Vec<&OrderedListTask> = live(rows).filter(|r| !r.has_parent()).collect();
    roots.sort_by_key(|r| (r.order, r.task_id));

    let mut children: HashMap<TaskId, Vec<&OrderedListTask>> = HashMap::new();
    for row in live(rows).filter(|r| r.has_parent()) {
        children.entry(row.parent).or_default().push(row);
    }

    let mut items = Vec::with_capacity(rows.len());
    for root in roots {
        let mut kids = children.remove(&root.task_id).unwrap_or_default();
        kids.sort_by_key(|r| (r.order, r.task_id));
        items.push(ListItem {
            task_id: root.task_id,
            parent: 0,
            primary_sort: root.order,
            secondary_sort: 0,
            has_children: !kids.is_empty(),
        });
        for kid in kids {
            items.push(ListItem {
                task_id: kid.task_id,
                parent: root.task_id,
                primary_sort: root.order,
                secondary_sort: kid.order,
                has_children: false,
            });
        }
    }
    for (parent, orphans) in children {
        log::warn!(
            "{} rows refer to parent {parent}, which is not a visible root",
            orphans.len()
        );
    }
    items
}

/// Compute where the item at visible index `from` lands when dropped at index `to` with the given
/// indent (0 for top level, anything else for nested).
///
/// `to` is an insertion index into `items`, `0..=items.len()`.
pub fn compute_move(items: &[ListItem], from: usize, to: usize, indent: usize) -> Result<Placement> {
    let count = items.len();
    let task = items
        .get(from)
        .ok_or_else(|| Error::Usage(format!("No item at position {from} of {count}")))?;
    if to > count {
        return Err(Error::Usage(format!(
            "Cannot move to position {to} of {count}"
        )));
    }

    let placement = if to == 0 {
        Placement::root(0)
    } else {
        let previous = &items[to - 1];
        if to == count || to <= from {
            let offset = if to == count { 0 } else { 1 };
            if indent == 0 {
                Placement::root(previous.primary_sort + offset)
            } else if previous.has_parent() && previous.parent == task.parent {
                Placement::nested(previous.parent, previous.secondary_sort + offset)
            } else if previous.has_parent() {
                Placement::nested(previous.parent, previous.secondary_sort + 1)
            } else {
                Placement::nested(previous.task_id, 0)
            }
        } else if indent == 0 {
            let offset = if task.has_parent() { 1 } else { 0 };
            Placement::root(previous.primary_sort + offset)
        } else if previous.has_parent() && previous.parent == task.parent {
            Placement::nested(previous.parent, previous.secondary_sort)
        } else if previous.has_parent() {
            Placement::nested(previous.parent, previous.secondary_sort + 1)
        } else {
            Placement::nested(previous.task_id, 0)
        }
    };

    if placement.parent != 0 && task.has_children {
        return Err(Error::Usage(format!(
            "Task {} has subtasks and cannot be nested",
            task.task_id
        )));
    }
    log::trace!(
        "move {} from {from} to {to} (indent {indent}) -> {placement:?}",
        task.task_id
    );
    Ok(placement)
}

/// Move the row for `task_id` to `position` among the children of `parent` (0 for the top
/// level), shifting its old and new siblings so that each sibling group stays dense.
pub fn apply_move(
    rows: &mut [OrderedListTask],
    task_id: TaskId,
    parent: TaskId,
    position: i64,
) -> Result<()> {
    let idx = rows
        .iter()
        .position(|r| r.task_id == task_id && r.deleted.is_none())
        .ok_or_else(|| Error::Usage(format!("Task {task_id} is not in this list")))?;

    if parent != 0 {
        if parent == task_id {
            return Err(Error::Usage(format!(
                "Task {task_id} cannot be its own parent"
            )));
        }
        let parent_row = live(rows)
            .find(|r| r.task_id == parent)
            .ok_or_else(|| Error::Usage(format!("Parent {parent} is not in this list")))?;
        if parent_row.has_parent() {
            return Err(Error::Usage(format!(
                "Parent {parent} is itself a subtask"
            )));
        }
        if live(rows).any(|r| r.parent == task_id) {
            return Err(Error::Usage(format!(
                "Task {task_id} has subtasks and cannot be nested"
            )));
        }
    }

    let previous_parent = rows[idx].parent;
    let previous_position = rows[idx].order;
    for (i, row) in rows.iter_mut().enumerate() {
        if i == idx || row.deleted.is_some() {
            continue;
        }
        if previous_parent == parent {
            if row.parent != parent {
                continue;
            }
            if previous_position < position {
                // shift up the rows between the old and new positions
                if row.order > previous_position && row.order <= position {
                    row.order -= 1;
                }
            } else if row.order < previous_position && row.order >= position {
                row.order += 1;
            }
        } else if row.parent == previous_parent && row.order > previous_position {
            row.order -= 1;
        } else if row.parent == parent && row.order >= position {
            row.order += 1;
        }
    }

    let row = &mut rows[idx];
    row.parent = parent;
    row.order = position;
    Ok(())
}

/// Give `row` a position among its siblings in `rows`: the first position, shifting every
/// sibling down, or the position after the last sibling.
pub fn insert_and_shift(rows: &mut [OrderedListTask], row: &mut OrderedListTask, add_to_top: bool) {
    let (parent, task_id) = (row.parent, row.task_id);
    let siblings = rows
        .iter_mut()
        .filter(|r| r.deleted.is_none() && r.parent == parent && r.task_id != task_id);
    if add_to_top {
        row.order = 0;
        for sibling in siblings.filter(|r| r.order >= 0) {
            sibling.order += 1;
        }
    } else {
        row.order = siblings.map(|r| r.order + 1).max().unwrap_or(0);
    }
}

/// Check the consistency of the rows of one list: each sibling group's orders are exactly
/// `0..n`, every parent is a top-level row of the same list, and no row is its own parent.
pub fn validate(rows: &[OrderedListTask]) -> Result<()> {
    let roots: HashSet<TaskId> = live(rows)
        .filter(|r| !r.has_parent())
        .map(|r| r.task_id)
        .collect();

    let mut groups: BTreeMap<TaskId, Vec<i64>> = BTreeMap::new();
    for row in live(rows) {
        if row.parent == row.task_id {
            return Err(Error::Validation(format!(
                "Task {} is its own parent",
                row.task_id
            )));
        }
        if row.has_parent() && !roots.contains(&row.parent) {
            return Err(Error::Validation(format!(
                "Task {} has parent {}, which is not a top-level task of list {}",
                row.task_id, row.parent, row.list_id
            )));
        }
        groups.entry(row.parent).or_default().push(row.order);
    }

    for (parent, mut orders) in groups {
        orders.sort_unstable();
        for (expected, order) in orders.iter().enumerate() {
            if *order != expected as i64 {
                return Err(Error::Validation(format!(
                    "Children of {parent} have positions {orders:?}; expected 0..{}",
                    orders.len()
                )));
            }
        }
    }
    Ok(())
}
