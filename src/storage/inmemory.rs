#![allow(clippy::new_without_default)]

use crate::errors::{Error, Result};
use crate::lists::{Account, Calendar, JournalTask, OrderedList, OrderedListTask};
use crate::storage::{Storage, StorageTxn};
use crate::task::{Alarm, Geofence, Place, Tag, TagData, Task, TaskId};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

#[derive(PartialEq, Debug, Clone, Default)]
struct Data {
    tasks: BTreeMap<TaskId, Task>,
    next_task_id: TaskId,
    tag_data: BTreeMap<u64, TagData>,
    next_tag_data_id: u64,
    tags: Vec<Tag>,
    ordered_list_tasks: BTreeMap<TaskId, OrderedListTask>,
    ordered_lists: HashMap<String, OrderedList>,
    journal_tasks: BTreeMap<TaskId, JournalTask>,
    calendars: HashMap<String, Calendar>,
    accounts: HashMap<String, Account>,
    places: HashMap<String, Place>,
    geofences: BTreeMap<u64, Geofence>,
    next_geofence_id: u64,
    alarms: BTreeMap<u64, Alarm>,
    next_alarm_id: u64,
}

struct Txn<'t> {
    storage: &'t mut InMemoryStorage,
    new_data: Option<Data>,
}

impl Txn<'_> {
    fn mut_data_ref(&mut self) -> &mut Data {
        if self.new_data.is_none() {
            self.new_data = Some(self.storage.data.clone());
        }
        if let Some(ref mut data) = self.new_data {
            data
        } else {
            unreachable!();
        }
    }

    fn data_ref(&mut self) -> &Data {
        if let Some(ref data) = self.new_data {
            data
        } else {
            &self.storage.data
        }
    }
}

#[async_trait]
impl StorageTxn for Txn<'_> {
    async fn create_task(&mut self, mut task: Task) -> Result<Task> {
        if task.id != 0 {
            return Err(Error::Database(format!("Task {} already has an id", task.id)));
        }
        let data = self.mut_data_ref();
        data.next_task_id += 1;
        task.id = data.next_task_id;
        if task.uuid.is_nil() {
            task.uuid = Uuid::new_v4();
        }
        data.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_task(&mut self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.data_ref().tasks.get(&id).cloned())
    }

    async fn get_tasks(&mut self, ids: &[TaskId]) -> Result<Vec<Task>> {
        let data = self.data_ref();
        Ok(ids.iter().filter_map(|id| data.tasks.get(id).cloned()).collect())
    }

    async fn set_task(&mut self, task: Task) -> Result<()> {
        let data = self.mut_data_ref();
        match data.tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task;
                Ok(())
            }
            None => Err(Error::Database(format!("Task {} does not exist", task.id))),
        }
    }

    async fn get_children(&mut self, id: TaskId) -> Result<Vec<TaskId>> {
        Ok(self
            .data_ref()
            .tasks
            .values()
            .filter(|t| t.parent == id && t.id != id)
            .map(|t| t.id)
            .collect())
    }

    async fn all_tasks(&mut self) -> Result<Vec<Task>> {
        Ok(self.data_ref().tasks.values().cloned().collect())
    }

    async fn get_tag_data_by_name(&mut self, name: &str) -> Result<Option<TagData>> {
        let name = name.to_lowercase();
        Ok(self
            .data_ref()
            .tag_data
            .values()
            .find(|td| td.name.to_lowercase() == name)
            .cloned())
    }

    async fn get_tag_data_by_uid(&mut self, uid: Uuid) -> Result<Option<TagData>> {
        Ok(self
            .data_ref()
            .tag_data
            .values()
            .find(|td| td.uid == uid)
            .cloned())
    }

    async fn all_tag_data(&mut self) -> Result<Vec<TagData>> {
        Ok(self.data_ref().tag_data.values().cloned().collect())
    }

    async fn create_tag_data(&mut self, mut tag_data: TagData) -> Result<TagData> {
        let data = self.mut_data_ref();
        data.next_tag_data_id += 1;
        tag_data.id = data.next_tag_data_id;
        data.tag_data.insert(tag_data.id, tag_data.clone());
        Ok(tag_data)
    }

    async fn get_tag_data_for_task(&mut self, task_id: TaskId) -> Result<Vec<TagData>> {
        let data = self.data_ref();
        Ok(data
            .tags
            .iter()
            .filter(|t| t.task_id == task_id)
            .filter_map(|t| data.tag_data.values().find(|td| td.uid == t.tag_uid))
            .cloned()
            .collect())
    }

    async fn get_tags(&mut self, task_id: TaskId) -> Result<Vec<Tag>> {
        Ok(self
            .data_ref()
            .tags
            .iter()
            .filter(|t| t.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn add_tags(&mut self, tags: Vec<Tag>) -> Result<()> {
        let data = self.mut_data_ref();
        for tag in tags {
            let exists = data
                .tags
                .iter()
                .any(|t| t.task_id == tag.task_id && t.tag_uid == tag.tag_uid);
            if !exists {
                data.tags.push(tag);
            }
        }
        Ok(())
    }

    async fn get_ordered_list_task(&mut self, task_id: TaskId) -> Result<Option<OrderedListTask>> {
        Ok(self.data_ref().ordered_list_tasks.get(&task_id).cloned())
    }

    async fn get_ordered_list_tasks(&mut self, list_id: &str) -> Result<Vec<OrderedListTask>> {
        Ok(self
            .data_ref()
            .ordered_list_tasks
            .values()
            .filter(|r| r.list_id == list_id)
            .cloned()
            .collect())
    }

    async fn set_ordered_list_task(&mut self, row: OrderedListTask) -> Result<()> {
        self.mut_data_ref()
            .ordered_list_tasks
            .insert(row.task_id, row);
        Ok(())
    }

    async fn get_ordered_list(&mut self, remote_id: &str) -> Result<Option<OrderedList>> {
        Ok(self.data_ref().ordered_lists.get(remote_id).cloned())
    }

    async fn set_ordered_list(&mut self, list: OrderedList) -> Result<()> {
        self.mut_data_ref()
            .ordered_lists
            .insert(list.remote_id.clone(), list);
        Ok(())
    }

    async fn get_journal_task(&mut self, task_id: TaskId) -> Result<Option<JournalTask>> {
        Ok(self.data_ref().journal_tasks.get(&task_id).cloned())
    }

    async fn get_journal_tasks(&mut self, calendar: &str) -> Result<Vec<JournalTask>> {
        Ok(self
            .data_ref()
            .journal_tasks
            .values()
            .filter(|r| r.calendar == calendar)
            .cloned()
            .collect())
    }

    async fn set_journal_task(&mut self, row: JournalTask) -> Result<()> {
        self.mut_data_ref().journal_tasks.insert(row.task_id, row);
        Ok(())
    }

    async fn get_calendar(&mut self, uuid: &str) -> Result<Option<Calendar>> {
        Ok(self.data_ref().calendars.get(uuid).cloned())
    }

    async fn set_calendar(&mut self, calendar: Calendar) -> Result<()> {
        self.mut_data_ref()
            .calendars
            .insert(calendar.uuid.clone(), calendar);
        Ok(())
    }

    async fn get_account(&mut self, uuid: &str) -> Result<Option<Account>> {
        Ok(self.data_ref().accounts.get(uuid).cloned())
    }

    async fn set_account(&mut self, account: Account) -> Result<()> {
        self.mut_data_ref()
            .accounts
            .insert(account.uuid.clone(), account);
        Ok(())
    }

    async fn get_place(&mut self, uid: &str) -> Result<Option<Place>> {
        Ok(self.data_ref().places.get(uid).cloned())
    }

    async fn set_place(&mut self, place: Place) -> Result<()> {
        self.mut_data_ref().places.insert(place.uid.clone(), place);
        Ok(())
    }

    async fn get_geofences(&mut self, task_id: TaskId) -> Result<Vec<Geofence>> {
        Ok(self
            .data_ref()
            .geofences
            .values()
            .filter(|g| g.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn add_geofence(&mut self, mut geofence: Geofence) -> Result<Geofence> {
        let data = self.mut_data_ref();
        data.next_geofence_id += 1;
        geofence.id = data.next_geofence_id;
        data.geofences.insert(geofence.id, geofence.clone());
        Ok(geofence)
    }

    async fn get_alarms(&mut self, task_id: TaskId) -> Result<Vec<Alarm>> {
        Ok(self
            .data_ref()
            .alarms
            .values()
            .filter(|a| a.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn add_alarms(&mut self, alarms: Vec<Alarm>) -> Result<()> {
        let data = self.mut_data_ref();
        for mut alarm in alarms {
            data.next_alarm_id += 1;
            alarm.id = data.next_alarm_id;
            data.alarms.insert(alarm.id, alarm);
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        // copy the new_data back into storage to commit the transaction
        if let Some(data) = self.new_data.take() {
            self.storage.data = data;
        }
        Ok(())
    }
}

/// InMemoryStorage is a simple in-memory task storage implementation.  It is not useful for
/// production data, but is useful for testing purposes.
#[derive(PartialEq, Debug, Clone)]
pub struct InMemoryStorage {
    data: Data,
}

impl InMemoryStorage {
    pub fn new() -> InMemoryStorage {
        InMemoryStorage {
            data: Data::default(),
        }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn txn<'a>(&'a mut self) -> Result<Box<dyn StorageTxn + Send + 'a>> {
        Ok(Box::new(Txn {
            storage: self,
            new_data: None,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    async fn storage() -> InMemoryStorage {
        InMemoryStorage::new()
    }

    crate::storage::test::storage_tests!(storage().await);
}
