/*!
Synchronization with an encrypted journal server.

A journal server stores one append-only journal per collection.  The journal itself carries the
collection's metadata ([`CollectionInfo`]), sealed with a key only the user holds; its entries
carry sealed changes ([`SyncEntry`]), each chained to the one before it.  The uid of the last
entry a replica has seen is its cursor (the "ctag") for that journal.

The [`JournalClient`] performs the protocol over a [`JournalTransport`], normally HTTP (see
[`JournalConfig`]).
*/

use crate::errors::{Error, Result};
use crate::lists::Calendar;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use uuid::Uuid;

mod config;
mod encryption;
mod http;
mod types;

pub use config::JournalConfig;
pub use encryption::derive_key;
pub use types::{CollectionInfo, Entry, Journal, JournalTransport, SyncAction, SyncEntry, UserInfo};

use encryption::{fingerprint, to_hex, Cryptor};

/// The latest protocol version this crate supports.
pub const CURRENT_VERSION: u32 = 2;
/// The collection type of task lists.
pub const TYPE_TASKS: &str = "TASKS";
/// Entries requested per page when pulling.
pub const MAX_FETCH: usize = 50;
/// Entries sent per request when pushing.
pub const MAX_PUSH: usize = 30;

const USER_INFO_SALT: &str = "userInfo";

/// Receives the entries pulled from a journal, one page at a time.
#[async_trait]
pub trait SyncEntryHandler: Send {
    async fn handle(&mut self, entries: Vec<(Entry, SyncEntry)>) -> Result<()>;
}

fn decode(value: &str, what: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| Error::Integrity(format!("{what} is not valid base64: {e}")))
}

/// The uid for an entry with the given content following `prev_uid`.
fn entry_uid(crypto: &Cryptor, prev_uid: Option<&str>, content: &str) -> String {
    to_hex(&crypto.hmac(&[
        prev_uid.unwrap_or_default().as_bytes(),
        content.as_bytes(),
    ]))
}

fn color_value(color: i32) -> Option<i32> {
    if color == 0 {
        None
    } else {
        Some(color)
    }
}

/// A client for one user's account on a journal server.
pub struct JournalClient {
    transport: Box<dyn JournalTransport>,
    username: String,
    encryption_password: String,
}

impl JournalClient {
    /// Create a client acting as `username`.  The encryption password is the key material
    /// produced by [`derive_key`].
    pub fn new(
        transport: Box<dyn JournalTransport>,
        username: impl Into<String>,
        encryption_password: impl Into<String>,
    ) -> JournalClient {
        JournalClient {
            transport,
            username: username.into(),
            encryption_password: encryption_password.into(),
        }
    }

    /// Exchange the account password for a session token.
    pub async fn get_token(&mut self, password: &str) -> Result<String> {
        self.transport.authenticate(&self.username, password).await
    }

    /// End the session.  Failures are logged and otherwise ignored.
    pub async fn invalidate_token(&mut self) {
        if let Err(e) = self.transport.invalidate_token().await {
            log::error!("Could not invalidate token: {e}");
        }
    }

    /// Get this user's key material, if it has been created.
    pub async fn user_info(&mut self) -> Result<Option<UserInfo>> {
        self.transport.fetch_user_info(&self.username).await
    }

    /// Create this user's key material on the server, returning it.
    pub async fn create_user_info(&mut self, derived_key: &str) -> Result<UserInfo> {
        let crypto = Cryptor::new(CURRENT_VERSION, derived_key, USER_INFO_SALT)?;
        let key = crypto.random_key()?;
        let user_info = UserInfo {
            owner: self.username.clone(),
            version: CURRENT_VERSION,
            pubkey: Some(STANDARD.encode(fingerprint(&key))),
            content: Some(STANDARD.encode(crypto.seal(&key, self.username.as_bytes())?)),
        };
        self.transport.create_user_info(&user_info).await?;
        Ok(user_info)
    }

    /// Unseal the user key from a user-info record.
    fn user_key(&self, user_info: &UserInfo) -> Result<Vec<u8>> {
        let crypto = Cryptor::new(user_info.version, &self.encryption_password, USER_INFO_SALT)?;
        let content = user_info
            .content
            .as_deref()
            .ok_or_else(|| Error::Integrity("User info has no content".into()))?;
        let key = crypto.unseal(&decode(content, "User info")?, user_info.owner.as_bytes())?;
        let expected = user_info.pubkey.as_deref().map(|k| decode(k, "Public key"));
        if let Some(expected) = expected {
            if expected? != fingerprint(&key) {
                return Err(Error::Integrity("User key does not match its fingerprint".into()));
            }
        }
        Ok(key)
    }

    /// Get the cryptor for a journal.  Journals with a shared key need the user info of the
    /// current user.
    fn get_crypto(&self, user_info: Option<&UserInfo>, journal: &Journal) -> Result<Cryptor> {
        let Some(sealed_key) = &journal.key else {
            return Cryptor::new(journal.version, &self.encryption_password, &journal.uid);
        };
        let user_info = user_info.ok_or_else(|| {
            Error::Usage(format!("Journal {} is shared, but no user info is available", journal.uid))
        })?;
        let user_crypto = Cryptor::from_key(journal.version, &self.user_key(user_info)?)?;
        let key = user_crypto.unseal(&decode(sealed_key, "Journal key")?, journal.uid.as_bytes())?;
        Cryptor::from_key(journal.version, &key)
    }

    /// Verify and decrypt the collection info of a journal.
    fn collection_info(&self, crypto: &Cryptor, journal: &Journal) -> Result<CollectionInfo> {
        let content = decode(&journal.content, "Journal content")?;
        let json = crypto.unseal(&content, journal.uid.as_bytes())?;
        let mut info: CollectionInfo = serde_json::from_slice(&json)
            .map_err(|e| Error::Integrity(format!("Invalid collection info: {e}")))?;
        info.uid = journal.uid.clone();
        Ok(info)
    }

    fn seal_collection_info(&self, crypto: &Cryptor, info: &CollectionInfo) -> Result<String> {
        let json = serde_json::to_vec(info)?;
        Ok(STANDARD.encode(crypto.seal(&json, info.uid.as_bytes())?))
    }

    /// Get the task collections on the server.  Journals that cannot be verified, or that were
    /// written by a newer version of the protocol, are skipped.
    pub async fn get_calendars(
        &mut self,
        user_info: Option<&UserInfo>,
    ) -> Result<Vec<(Journal, CollectionInfo)>> {
        let mut result = vec![];
        for journal in self.transport.list_journals().await? {
            let info = self
                .get_crypto(user_info, &journal)
                .and_then(|crypto| self.collection_info(&crypto, &journal));
            match info {
                Ok(info) if info.collection_type == TYPE_TASKS => {
                    log::debug!("Found collection {}", info.uid);
                    result.push((journal, info));
                }
                Ok(info) => log::debug!("Ignoring {} collection {}", info.collection_type, info.uid),
                Err(e @ (Error::Integrity(_) | Error::VersionTooNew { .. })) => {
                    log::warn!("Skipping journal {}: {e}", journal.uid);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }

    /// Pull the entries following `ctag`, verifying and decrypting each page before handing it
    /// to `handler`.  Returns the uid of the last entry handled, or `ctag` if there were none.
    ///
    /// An entry failing verification aborts the pull; pages already handled stay handled.
    pub async fn get_sync_entries(
        &mut self,
        user_info: Option<&UserInfo>,
        journal: &Journal,
        ctag: Option<String>,
        handler: &mut dyn SyncEntryHandler,
    ) -> Result<Option<String>> {
        let crypto = self.get_crypto(user_info, journal)?;
        let mut last = ctag;
        loop {
            let entries = self
                .transport
                .list_entries(&journal.uid, last.as_deref(), MAX_FETCH)
                .await?;
            let count = entries.len();

            let mut prev = last.clone();
            let mut page = Vec::with_capacity(count);
            for entry in entries {
                if entry_uid(&crypto, prev.as_deref(), &entry.content) != entry.uid {
                    return Err(Error::Integrity(format!(
                        "Entry {} of journal {} failed verification",
                        entry.uid, journal.uid
                    )));
                }
                let content = decode(&entry.content, "Entry content")?;
                let json = crypto.unseal(&content, journal.uid.as_bytes())?;
                let sync_entry: SyncEntry = serde_json::from_slice(&json)
                    .map_err(|e| Error::Integrity(format!("Invalid entry {}: {e}", entry.uid)))?;
                prev = Some(entry.uid.clone());
                page.push((entry, sync_entry));
            }

            if !page.is_empty() {
                handler.handle(page).await?;
                last = prev;
            }
            log::info!("Pulled {count} entries from journal {}", journal.uid);
            if count < MAX_FETCH {
                break;
            }
        }
        Ok(last)
    }

    /// Seal local changes into entries following `prev_uid`, ready for
    /// [`JournalClient::push_entries`].
    pub fn build_entries(
        &self,
        user_info: Option<&UserInfo>,
        journal: &Journal,
        prev_uid: Option<&str>,
        changes: &[SyncEntry],
    ) -> Result<Vec<Entry>> {
        let crypto = self.get_crypto(user_info, journal)?;
        let mut prev = prev_uid.map(String::from);
        let mut entries = Vec::with_capacity(changes.len());
        for change in changes {
            let json = serde_json::to_vec(change)?;
            let content = STANDARD.encode(crypto.seal(&json, journal.uid.as_bytes())?);
            let uid = entry_uid(&crypto, prev.as_deref(), &content);
            prev = Some(uid.clone());
            entries.push(Entry { uid, content });
        }
        Ok(entries)
    }

    /// Append entries to a journal in batches, each conditional on the journal ending at
    /// `ctag`.  `ctag` is advanced after each batch the server accepts, so on failure it
    /// identifies the last entry known to be stored.
    pub async fn push_entries(
        &mut self,
        journal: &Journal,
        entries: &[Entry],
        ctag: &mut Option<String>,
    ) -> Result<()> {
        for batch in entries.chunks(MAX_PUSH) {
            self.transport
                .create_entries(&journal.uid, batch, ctag.as_deref())
                .await?;
            if let Some(last) = batch.last() {
                *ctag = Some(last.uid.clone());
            }
            log::info!("Pushed {} entries to journal {}", batch.len(), journal.uid);
        }
        Ok(())
    }

    /// Create a new task collection, returning its uid.  A color of 0 means no color.
    pub async fn make_collection(&mut self, name: &str, color: i32) -> Result<String> {
        let uid = Uuid::new_v4().simple().to_string();
        let info = CollectionInfo {
            version: CURRENT_VERSION,
            collection_type: TYPE_TASKS.into(),
            uid: uid.clone(),
            display_name: name.into(),
            description: None,
            color: color_value(color),
            selected: true,
        };
        let crypto = Cryptor::new(CURRENT_VERSION, &self.encryption_password, &uid)?;
        let journal = Journal {
            uid: uid.clone(),
            version: CURRENT_VERSION,
            owner: Some(self.username.clone()),
            content: self.seal_collection_info(&crypto, &info)?,
            key: None,
            read_only: false,
        };
        self.transport.create_journal(&journal).await?;
        Ok(uid)
    }

    /// Rename and recolor the collection behind a journal list, returning its uid.  A color of
    /// 0 means no color.
    pub async fn update_collection(
        &mut self,
        calendar: &Calendar,
        name: &str,
        color: i32,
    ) -> Result<String> {
        let journal = self.transport.fetch_journal(&calendar.url).await?;
        let user_info = self.user_info().await?;
        let crypto = self.get_crypto(user_info.as_ref(), &journal)?;
        let mut info = self.collection_info(&crypto, &journal)?;
        info.display_name = name.into();
        info.color = color_value(color);
        let journal = Journal {
            content: self.seal_collection_info(&crypto, &info)?,
            ..journal
        };
        self.transport.update_journal(&journal).await?;
        Ok(journal.uid)
    }

    /// Delete the collection behind a journal list.
    pub async fn delete_collection(&mut self, calendar: &Calendar) -> Result<()> {
        self.transport.delete_journal(&calendar.url).await
    }
}
