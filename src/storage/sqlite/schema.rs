use crate::errors::{Error, Result};
use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

/// A database schema version.
///
/// The first value is the major version, with different major versions completely incompatible
/// with one another.
///
/// The second is the minor version, with all minor versions in the same major version being
/// compatible with one another. A binary with a latest version of (MAJ, MIN) can safely operate
/// on any DB with major version MAJ, and can upgrade that DB to (MAJ, MIN) if necessary.
#[derive(Copy, Clone, Debug, PartialOrd, Ord, PartialEq, Eq)]
pub(super) struct DbVersion(pub u32, pub u32);

type UpgradeFn = fn(&Transaction) -> Result<()>;

/// DB Versions and functions to upgrade to them, in order.
const VERSIONS: &[(DbVersion, UpgradeFn)] = &[
    (DbVersion(0, 1), upgrade_to_0_1),
    (DbVersion(0, 2), upgrade_to_0_2),
];
pub(super) const LATEST_VERSION: DbVersion = VERSIONS[VERSIONS.len() - 1].0;

pub(super) fn upgrade_db(con: &mut Connection) -> Result<()> {
    let mut current_version = get_db_version(con)?;

    if current_version.0 > LATEST_VERSION.0 {
        return Err(Error::Database(
            "Database is too new for this version of taskweave".into(),
        ));
    }

    for (version, upgrade) in VERSIONS {
        if current_version < *version {
            log::debug!("upgrading task database to {version:?}");
            let t = con.transaction()?;
            upgrade(&t)?;
            t.commit()?;
            current_version = *version;
        }
    }

    Ok(())
}

/// Update to DbVersion(0, 1), creating all tables.
///
/// Every table stores the serialized record in `data`, with the columns used for lookups kept
/// alongside it.
fn upgrade_to_0_1(t: &Transaction) -> Result<()> {
    let create_tables = vec![
        "CREATE TABLE IF NOT EXISTS tasks (id INTEGER PRIMARY KEY AUTOINCREMENT, uuid STRING, parent INTEGER, data STRING);",
        "CREATE TABLE IF NOT EXISTS tag_data (id INTEGER PRIMARY KEY AUTOINCREMENT, uid STRING UNIQUE, name STRING, data STRING);",
        "CREATE TABLE IF NOT EXISTS tags (task_id INTEGER, tag_uid STRING, data STRING, PRIMARY KEY (task_id, tag_uid));",
        "CREATE TABLE IF NOT EXISTS ordered_list_tasks (task_id INTEGER PRIMARY KEY, list_id STRING, data STRING);",
        "CREATE TABLE IF NOT EXISTS ordered_lists (remote_id STRING PRIMARY KEY, data STRING);",
        "CREATE TABLE IF NOT EXISTS journal_tasks (task_id INTEGER PRIMARY KEY, calendar STRING, data STRING);",
        "CREATE TABLE IF NOT EXISTS calendars (uuid STRING PRIMARY KEY, data STRING);",
        "CREATE TABLE IF NOT EXISTS accounts (uuid STRING PRIMARY KEY, data STRING);",
        "CREATE TABLE IF NOT EXISTS places (uid STRING PRIMARY KEY, data STRING);",
        "CREATE TABLE IF NOT EXISTS geofences (id INTEGER PRIMARY KEY AUTOINCREMENT, task_id INTEGER, data STRING);",
        "CREATE TABLE IF NOT EXISTS alarms (id INTEGER PRIMARY KEY AUTOINCREMENT, task_id INTEGER, data STRING);",
    ];
    for q in create_tables {
        t.execute(q, []).context("Creating table")?;
    }

    create_version_table(t)?;
    set_db_version(t, DbVersion(0, 1))?;

    Ok(())
}

/// Update to DbVersion(0, 2), adding indexes for the per-task and per-list lookups.
fn upgrade_to_0_2(t: &Transaction) -> Result<()> {
    let create_indexes = vec![
        "CREATE INDEX IF NOT EXISTS tasks_by_parent ON tasks (parent)",
        "CREATE INDEX IF NOT EXISTS ordered_list_tasks_by_list ON ordered_list_tasks (list_id)",
        "CREATE INDEX IF NOT EXISTS journal_tasks_by_calendar ON journal_tasks (calendar)",
        "CREATE INDEX IF NOT EXISTS geofences_by_task ON geofences (task_id)",
        "CREATE INDEX IF NOT EXISTS alarms_by_task ON alarms (task_id)",
    ];
    for q in create_indexes {
        t.execute(q, []).context("Creating index")?;
    }

    set_db_version(t, DbVersion(0, 2))?;

    Ok(())
}

fn create_version_table(t: &Transaction) -> Result<()> {
    // The `singleton` column constrains this table to have no more than one row.
    t.execute(
        r#"CREATE TABLE IF NOT EXISTS version (
                singleton INTEGER PRIMARY KEY CHECK (singleton = 0),
                major INTEGER,
                minor INTEGER)"#,
        [],
    )
    .context("Creating table")?;
    Ok(())
}

/// Get the current DB version, from the `version` table. If the table or row does not exist, that
/// is considered version (0, 0).
pub(super) fn get_db_version(con: &mut Connection) -> Result<DbVersion> {
    let version: Option<(u32, u32)> = match con
        .query_row("SELECT major, minor FROM version", [], |r| {
            Ok((r.get("major")?, r.get("minor")?))
        })
        .optional()
    {
        Ok(v) => v,
        Err(err @ rusqlite::Error::SqliteFailure(_, _)) => {
            // The "version" table may not exist, in which case the version is (0, 0).
            if has_column(&con.transaction()?, "version", "major")? {
                return Err(err.into());
            }
            None
        }
        Err(err) => return Err(err.into()),
    };
    let (major, minor) = version.unwrap_or((0, 0));
    Ok(DbVersion(major, minor))
}

fn set_db_version(t: &Transaction, version: DbVersion) -> Result<()> {
    let DbVersion(major, minor) = version;
    t.execute(
        r#"INSERT INTO version (singleton, major, minor) VALUES (0, ?, ?)
               ON CONFLICT(singleton) do UPDATE SET major=?, minor=?"#,
        params![major, minor, major, minor],
    )?;
    Ok(())
}

fn has_column(t: &Transaction, table: &str, column: &str) -> Result<bool> {
    let res: u32 = t
        .query_row(
            "SELECT COUNT(*) AS c FROM pragma_table_xinfo(?) WHERE name=?",
            [table, column],
            |r| r.get(0),
        )
        .with_context(|| format!("Checking for {}.{}", table, column))?;
    Ok(res > 0)
}
