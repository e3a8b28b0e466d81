use super::{schema, SqliteError, StoredUuid};
use crate::errors::{Error, Result};
use crate::lists::{Account, Calendar, JournalTask, OrderedList, OrderedListTask};
use crate::storage::config::AccessMode;
use crate::task::{Alarm, Geofence, Place, Tag, TagData, Task, TaskId};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Params};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

/// The synchronous half of the SQLite storage, owned by the actor thread.
pub(super) struct SqliteStorageInner {
    access_mode: AccessMode,
    con: Connection,
}

impl SqliteStorageInner {
    pub(super) fn new<P: AsRef<Path>>(
        directory: P,
        access_mode: AccessMode,
        create_if_missing: bool,
    ) -> Result<SqliteStorageInner> {
        let directory = directory.as_ref();
        if create_if_missing {
            // Ensure parent folder exists
            std::fs::create_dir_all(directory).map_err(|e| {
                Error::Database(format!("Cannot create directory {directory:?}: {e}"))
            })?;
        }

        let db_file = directory.join("taskweave.sqlite3");
        let exists = db_file.exists();

        let mut flags = OpenFlags::default();
        if access_mode == AccessMode::ReadOnly && exists {
            flags.remove(OpenFlags::SQLITE_OPEN_READ_WRITE);
            flags.insert(OpenFlags::SQLITE_OPEN_READ_ONLY);
        }
        if !create_if_missing || (access_mode == AccessMode::ReadOnly && exists) {
            flags.remove(OpenFlags::SQLITE_OPEN_CREATE);
        }
        let mut con = Connection::open_with_flags(&db_file, flags)
            .map_err(|e| Error::Database(format!("Cannot open {db_file:?}: {e}")))?;

        if access_mode == AccessMode::ReadOnly && exists {
            if schema::get_db_version(&mut con)? < schema::LATEST_VERSION {
                return Err(Error::Database(
                    "Database needs an upgrade but was opened read-only".into(),
                ));
            }
        } else {
            // Concurrent readers and a single writer.
            con.query_row("PRAGMA journal_mode=WAL", [], |_row| Ok(()))
                .map_err(|e| Error::Database(format!("Setting journal_mode=WAL: {e}")))?;
            schema::upgrade_db(&mut con)?;
        }

        Ok(Self { access_mode, con })
    }

    pub(super) fn txn(&mut self) -> Result<Txn<'_>> {
        let txn = self.con.transaction()?;
        Ok(Txn {
            txn: Some(txn),
            access_mode: self.access_mode,
        })
    }
}

pub(super) struct Txn<'t> {
    txn: Option<rusqlite::Transaction<'t>>,
    access_mode: AccessMode,
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

impl Txn<'_> {
    fn check_write_access(&self) -> Result<()> {
        if self.access_mode != AccessMode::ReadWrite {
            Err(SqliteError::ReadOnlyStorage.into())
        } else {
            Ok(())
        }
    }

    fn get_txn(&self) -> Result<&rusqlite::Transaction<'_>> {
        self.txn
            .as_ref()
            .ok_or(Error::from(SqliteError::TransactionAlreadyCommitted))
    }

    /// Fetch and deserialize the `data` column of at most one row.
    fn get_one<T: DeserializeOwned, P: Params>(&self, sql: &str, params: P) -> Result<Option<T>> {
        let t = self.get_txn()?;
        let data: Option<String> = t
            .query_row(sql, params, |r| r.get("data"))
            .optional()?;
        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    /// Fetch and deserialize the `data` column of every row.
    fn get_all<T: DeserializeOwned, P: Params>(&self, sql: &str, params: P) -> Result<Vec<T>> {
        let t = self.get_txn()?;
        let mut q = t.prepare(sql)?;
        let rows = q.query_map(params, |r| r.get::<_, String>("data"))?;
        let mut res = Vec::new();
        for data in rows {
            res.push(serde_json::from_str(&data?)?);
        }
        Ok(res)
    }

    /// Execute a write statement.
    fn write<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        self.check_write_access()?;
        let t = self.get_txn()?;
        Ok(t.execute(sql, params)?)
    }

    pub(super) fn create_task(&mut self, mut task: Task) -> Result<Task> {
        if task.id != 0 {
            return Err(Error::Database(format!("Task {} already has an id", task.id)));
        }
        if task.uuid.is_nil() {
            task.uuid = Uuid::new_v4();
        }
        self.write(
            "INSERT INTO tasks (uuid, parent, data) VALUES (?, ?, '')",
            params![StoredUuid(task.uuid), task.parent],
        )?;
        task.id = self.get_txn()?.last_insert_rowid() as TaskId;
        self.write(
            "UPDATE tasks SET data = ? WHERE id = ?",
            params![to_json(&task)?, task.id],
        )?;
        Ok(task)
    }

    pub(super) fn get_task(&mut self, id: TaskId) -> Result<Option<Task>> {
        self.get_one("SELECT data FROM tasks WHERE id = ? LIMIT 1", [id])
    }

    pub(super) fn get_tasks(&mut self, ids: &[TaskId]) -> Result<Vec<Task>> {
        let mut res = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = self.get_task(*id)? {
                res.push(task);
            }
        }
        Ok(res)
    }

    pub(super) fn set_task(&mut self, task: Task) -> Result<()> {
        let changed = self.write(
            "UPDATE tasks SET uuid = ?, parent = ?, data = ? WHERE id = ?",
            params![StoredUuid(task.uuid), task.parent, to_json(&task)?, task.id],
        )?;
        if changed == 0 {
            return Err(Error::Database(format!("Task {} does not exist", task.id)));
        }
        Ok(())
    }

    pub(super) fn get_children(&mut self, id: TaskId) -> Result<Vec<TaskId>> {
        let t = self.get_txn()?;
        let mut q = t.prepare("SELECT id FROM tasks WHERE parent = ? AND id != ? ORDER BY id")?;
        let rows = q.query_map([id, id], |r| r.get::<_, TaskId>(0))?;
        let mut res = Vec::new();
        for row in rows {
            res.push(row?);
        }
        Ok(res)
    }

    pub(super) fn all_tasks(&mut self) -> Result<Vec<Task>> {
        self.get_all("SELECT data FROM tasks ORDER BY id", [])
    }

    pub(super) fn get_tag_data_by_name(&mut self, name: &str) -> Result<Option<TagData>> {
        self.get_one(
            "SELECT data FROM tag_data WHERE name = ? COLLATE NOCASE ORDER BY id LIMIT 1",
            [name],
        )
    }

    pub(super) fn get_tag_data_by_uid(&mut self, uid: Uuid) -> Result<Option<TagData>> {
        self.get_one(
            "SELECT data FROM tag_data WHERE uid = ? LIMIT 1",
            [StoredUuid(uid)],
        )
    }

    pub(super) fn all_tag_data(&mut self) -> Result<Vec<TagData>> {
        self.get_all("SELECT data FROM tag_data ORDER BY id", [])
    }

    pub(super) fn create_tag_data(&mut self, mut tag_data: TagData) -> Result<TagData> {
        self.write(
            "INSERT INTO tag_data (uid, name, data) VALUES (?, ?, '')",
            params![StoredUuid(tag_data.uid), tag_data.name],
        )?;
        tag_data.id = self.get_txn()?.last_insert_rowid() as u64;
        self.write(
            "UPDATE tag_data SET data = ? WHERE id = ?",
            params![to_json(&tag_data)?, tag_data.id],
        )?;
        Ok(tag_data)
    }

    pub(super) fn get_tag_data_for_task(&mut self, task_id: TaskId) -> Result<Vec<TagData>> {
        self.get_all(
            "SELECT tag_data.data AS data FROM tags JOIN tag_data ON tags.tag_uid = tag_data.uid
                WHERE tags.task_id = ? ORDER BY tags.rowid",
            [task_id],
        )
    }

    pub(super) fn get_tags(&mut self, task_id: TaskId) -> Result<Vec<Tag>> {
        self.get_all(
            "SELECT data FROM tags WHERE task_id = ? ORDER BY rowid",
            [task_id],
        )
    }

    pub(super) fn add_tags(&mut self, tags: Vec<Tag>) -> Result<()> {
        for tag in tags {
            self.write(
                "INSERT OR IGNORE INTO tags (task_id, tag_uid, data) VALUES (?, ?, ?)",
                params![tag.task_id, StoredUuid(tag.tag_uid), to_json(&tag)?],
            )?;
        }
        Ok(())
    }

    pub(super) fn get_ordered_list_task(
        &mut self,
        task_id: TaskId,
    ) -> Result<Option<OrderedListTask>> {
        self.get_one(
            "SELECT data FROM ordered_list_tasks WHERE task_id = ? LIMIT 1",
            [task_id],
        )
    }

    pub(super) fn get_ordered_list_tasks(&mut self, list_id: &str) -> Result<Vec<OrderedListTask>> {
        self.get_all(
            "SELECT data FROM ordered_list_tasks WHERE list_id = ? ORDER BY task_id",
            [list_id],
        )
    }

    pub(super) fn set_ordered_list_task(&mut self, row: OrderedListTask) -> Result<()> {
        self.write(
            "INSERT OR REPLACE INTO ordered_list_tasks (task_id, list_id, data) VALUES (?, ?, ?)",
            params![row.task_id, row.list_id, to_json(&row)?],
        )?;
        Ok(())
    }

    pub(super) fn get_ordered_list(&mut self, remote_id: &str) -> Result<Option<OrderedList>> {
        self.get_one(
            "SELECT data FROM ordered_lists WHERE remote_id = ? LIMIT 1",
            [remote_id],
        )
    }

    pub(super) fn set_ordered_list(&mut self, list: OrderedList) -> Result<()> {
        self.write(
            "INSERT OR REPLACE INTO ordered_lists (remote_id, data) VALUES (?, ?)",
            params![list.remote_id, to_json(&list)?],
        )?;
        Ok(())
    }

    pub(super) fn get_journal_task(&mut self, task_id: TaskId) -> Result<Option<JournalTask>> {
        self.get_one(
            "SELECT data FROM journal_tasks WHERE task_id = ? LIMIT 1",
            [task_id],
        )
    }

    pub(super) fn get_journal_tasks(&mut self, calendar: &str) -> Result<Vec<JournalTask>> {
        self.get_all(
            "SELECT data FROM journal_tasks WHERE calendar = ? ORDER BY task_id",
            [calendar],
        )
    }

    pub(super) fn set_journal_task(&mut self, row: JournalTask) -> Result<()> {
        self.write(
            "INSERT OR REPLACE INTO journal_tasks (task_id, calendar, data) VALUES (?, ?, ?)",
            params![row.task_id, row.calendar, to_json(&row)?],
        )?;
        Ok(())
    }

    pub(super) fn get_calendar(&mut self, uuid: &str) -> Result<Option<Calendar>> {
        self.get_one("SELECT data FROM calendars WHERE uuid = ? LIMIT 1", [uuid])
    }

    pub(super) fn set_calendar(&mut self, calendar: Calendar) -> Result<()> {
        self.write(
            "INSERT OR REPLACE INTO calendars (uuid, data) VALUES (?, ?)",
            params![calendar.uuid, to_json(&calendar)?],
        )?;
        Ok(())
    }

    pub(super) fn get_account(&mut self, uuid: &str) -> Result<Option<Account>> {
        self.get_one("SELECT data FROM accounts WHERE uuid = ? LIMIT 1", [uuid])
    }

    pub(super) fn set_account(&mut self, account: Account) -> Result<()> {
        self.write(
            "INSERT OR REPLACE INTO accounts (uuid, data) VALUES (?, ?)",
            params![account.uuid, to_json(&account)?],
        )?;
        Ok(())
    }

    pub(super) fn get_place(&mut self, uid: &str) -> Result<Option<Place>> {
        self.get_one("SELECT data FROM places WHERE uid = ? LIMIT 1", [uid])
    }

    pub(super) fn set_place(&mut self, place: Place) -> Result<()> {
        self.write(
            "INSERT OR REPLACE INTO places (uid, data) VALUES (?, ?)",
            params![place.uid, to_json(&place)?],
        )?;
        Ok(())
    }

    pub(super) fn get_geofences(&mut self, task_id: TaskId) -> Result<Vec<Geofence>> {
        self.get_all(
            "SELECT data FROM geofences WHERE task_id = ? ORDER BY id",
            [task_id],
        )
    }

    pub(super) fn add_geofence(&mut self, mut geofence: Geofence) -> Result<Geofence> {
        self.write(
            "INSERT INTO geofences (task_id, data) VALUES (?, '')",
            [geofence.task_id],
        )?;
        geofence.id = self.get_txn()?.last_insert_rowid() as u64;
        self.write(
            "UPDATE geofences SET data = ? WHERE id = ?",
            params![to_json(&geofence)?, geofence.id],
        )?;
        Ok(geofence)
    }

    pub(super) fn get_alarms(&mut self, task_id: TaskId) -> Result<Vec<Alarm>> {
        self.get_all(
            "SELECT data FROM alarms WHERE task_id = ? ORDER BY id",
            [task_id],
        )
    }

    pub(super) fn add_alarms(&mut self, alarms: Vec<Alarm>) -> Result<()> {
        for mut alarm in alarms {
            self.write(
                "INSERT INTO alarms (task_id, data) VALUES (?, '')",
                [alarm.task_id],
            )?;
            alarm.id = self.get_txn()?.last_insert_rowid() as u64;
            self.write(
                "UPDATE alarms SET data = ? WHERE id = ?",
                params![to_json(&alarm)?, alarm.id],
            )?;
        }
        Ok(())
    }

    pub(super) fn commit(&mut self) -> Result<()> {
        let t = self
            .txn
            .take()
            .ok_or(Error::from(SqliteError::TransactionAlreadyCommitted))?;
        t.commit()
            .map_err(|e| Error::Database(format!("Committing transaction: {e}")))?;
        Ok(())
    }
}
