#[cfg(feature = "storage-sqlite")]
use crate::storage::sqlite::SqliteError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
/// Errors returned from taskweave operations
pub enum Error {
    /// The journal server rejected the credentials or session token.
    #[error("Authentication Error: {0}")]
    Authentication(String),
    /// Encrypted data could not be decrypted or verified.
    #[error("Integrity Error: {0}")]
    Integrity(String),
    /// The server holds data written with a newer protocol version than this crate supports.
    #[error("Version {version} is newer than the supported version {supported}")]
    VersionTooNew {
        /// Version found in the remote data
        version: u32,
        /// Latest version this crate supports
        supported: u32,
    },
    /// A network or transport-level failure.
    #[error("Transport Error: {0}")]
    Transport(String),
    /// The journal has entries this replica has not seen, so a push based on the local ctag was
    /// refused.  Pull and retry.
    #[error("Local journal cursor is out of sync with the server")]
    OutOfSync,
    /// The manual-ordering ledger of a list is internally inconsistent.
    #[error("Validation Error: {0}")]
    Validation(String),
    /// A task-database-related error
    #[error("Task Database Error: {0}")]
    Database(String),
    /// A usage error
    #[error("Usage Error: {0}")]
    Usage(String),
    /// A general error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convert private and third party errors into Error::Other.
macro_rules! other_error {
    ( $error:ty ) => {
        impl From<$error> for Error {
            fn from(err: $error) -> Self {
                Self::Other(err.into())
            }
        }
    };
}
other_error!(io::Error);
other_error!(serde_json::Error);
other_error!(tokio::sync::oneshot::error::RecvError);

#[cfg(feature = "storage-sqlite")]
other_error!(rusqlite::Error);
#[cfg(feature = "storage-sqlite")]
other_error!(SqliteError);

#[cfg(feature = "journal-sync")]
other_error!(url::ParseError);
#[cfg(feature = "journal-sync")]
other_error!(base64::DecodeError);

/// Convert reqwest errors more carefully
#[cfg(feature = "journal-sync")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                Self::Authentication(err.to_string())
            }
            _ => Self::Transport(err.to_string()),
        }
    }
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn version_too_new_message() {
        let err = Error::VersionTooNew {
            version: 3,
            supported: 2,
        };
        assert_eq!(
            err.to_string(),
            "Version 3 is newer than the supported version 2"
        );
    }

    #[test]
    fn io_error_is_other() {
        let err: Error = io::Error::new(io::ErrorKind::Other, "uhoh").into();
        assert!(matches!(err, Error::Other(_)));
        assert_eq!(err.to_string(), "uhoh");
    }
}
