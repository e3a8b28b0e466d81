use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A journal, as listed by the server.  Its content is the sealed [`CollectionInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journal {
    pub uid: String,
    pub version: u32,
    #[serde(default)]
    pub owner: Option<String>,
    /// Base64 of the sealed collection info.
    pub content: String,
    /// Base64 of the journal key sealed with the owner's user key, for shared journals.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub read_only: bool,
}

/// One entry of a journal.  Entries are chained: each uid authenticates the previous uid and
/// this entry's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub uid: String,
    /// Base64 of the sealed [`SyncEntry`].
    pub content: String,
}

/// The metadata of a collection, stored encrypted as the content of its journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(rename = "type")]
    pub collection_type: String,
    #[serde(default)]
    pub uid: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<i32>,
    #[serde(default)]
    pub selected: bool,
}

fn default_version() -> u32 {
    super::CURRENT_VERSION
}

/// What a [`SyncEntry`] does to the item it carries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum SyncAction {
    Add,
    Change,
    Delete,
}

/// The decrypted content of an [`Entry`]: an action and the item (an iCalendar VTODO) it
/// applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEntry {
    pub action: SyncAction,
    pub content: String,
}

/// A user's key material, sealed with their derived key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub owner: String,
    pub version: u32,
    /// Base64 fingerprint of the user key.
    #[serde(default)]
    pub pubkey: Option<String>,
    /// Base64 of the sealed user key.
    #[serde(default)]
    pub content: Option<String>,
}

/// The requests a journal client makes of the server.
///
/// Failures are reported as [`crate::Error::Authentication`] when credentials are rejected,
/// [`crate::Error::OutOfSync`] when a `last` precondition does not match the end of the
/// journal, and [`crate::Error::Transport`] otherwise.
#[async_trait]
pub trait JournalTransport: Send {
    /// Exchange credentials for a session token, which is used for all later requests.
    async fn authenticate(&mut self, username: &str, password: &str) -> Result<String>;

    /// End the current session.
    async fn invalidate_token(&mut self) -> Result<()>;

    /// Get the user info for `owner`, if it has been created.
    async fn fetch_user_info(&mut self, owner: &str) -> Result<Option<UserInfo>>;

    async fn create_user_info(&mut self, user_info: &UserInfo) -> Result<()>;

    async fn list_journals(&mut self) -> Result<Vec<Journal>>;

    async fn fetch_journal(&mut self, uid: &str) -> Result<Journal>;

    async fn create_journal(&mut self, journal: &Journal) -> Result<()>;

    async fn update_journal(&mut self, journal: &Journal) -> Result<()>;

    async fn delete_journal(&mut self, uid: &str) -> Result<()>;

    /// Get up to `limit` entries following the entry with uid `last`, or from the beginning
    /// of the journal.
    async fn list_entries(
        &mut self,
        journal_uid: &str,
        last: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Entry>>;

    /// Append entries, provided the journal currently ends with the entry with uid `last`.
    async fn create_entries(
        &mut self,
        journal_uid: &str,
        entries: &[Entry],
        last: Option<&str>,
    ) -> Result<()>;
}
