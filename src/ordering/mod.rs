/*!
Manual ordering and re-parenting of the tasks in remote lists.

Ordered lists carry an explicit position for every task, maintained by the [`ledger`].  Journal
lists carry only the parent relationship, so moving a task there changes its indentation and
nothing else.
*/

use crate::errors::Result;
use crate::storage::StorageTxn;
use crate::task::TaskId;
use chrono::Utc;

pub(crate) mod journal_list;
pub mod ledger;
pub(crate) mod ordered_list;

pub use journal_list::JournalItem;
pub use ledger::{ListItem, Placement};

/// Record that a task was moved: update its parent and modification time.
async fn touch(txn: &mut dyn StorageTxn, task_id: TaskId, parent: TaskId) -> Result<()> {
    match txn.get_task(task_id).await? {
        Some(mut task) => {
            task.parent = parent;
            task.modified = Some(Utc::now());
            txn.set_task(task).await
        }
        None => {
            log::warn!("moved task {task_id} has an association but no task");
            Ok(())
        }
    }
}
