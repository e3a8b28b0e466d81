#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(unnameable_types)]
#![deny(clippy::dbg_macro)]
#![doc = include_str!("crate-doc.md")]

mod creator;
mod duplicator;
mod errors;
pub mod hooks;
#[cfg(feature = "journal-sync")]
pub mod journal;
pub mod lists;
pub mod ordering;
pub mod prefs;
mod replica;
pub mod storage;
pub mod task;
pub mod template;
pub mod title;
mod utils;

pub use creator::{NewTask, PendingPlacement};
pub use errors::Error;
pub use hooks::{Hooks, NoopHooks};
#[cfg(feature = "journal-sync")]
pub use journal::{JournalClient, JournalConfig};
pub use lists::{Account, AccountType, Calendar, DefaultList, JournalTask, OrderedList, OrderedListTask};
pub use prefs::{MapPreferences, PreferenceSource, Preferences};
pub use replica::Replica;
#[cfg(feature = "storage-sqlite")]
pub use storage::sqlite::SqliteStorage;
pub use storage::{AccessMode, StorageConfig};
pub use task::{Alarm, Geofence, HideUntil, Place, Tag, TagData, Task, TaskId, Urgency};
pub use template::TemplateValues;

/// Re-exported type from the `uuid` crate, for ease of compatibility for consumers of this crate.
pub use uuid::Uuid;

/// Re-exported chrono module.
pub use chrono;
