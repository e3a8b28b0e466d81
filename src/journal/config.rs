use super::http::HttpTransport;
use super::JournalClient;
use crate::errors::Result;

/// The configuration for access to a journal server.
pub struct JournalConfig {
    /// The base URL of the journal server
    pub url: String,

    /// The account's username
    pub username: String,

    /// Key material used to encrypt all journals, as produced by
    /// [`derive_key`](super::derive_key) from the user's encryption password.
    pub encryption_password: String,

    /// Session token from a previous [`JournalClient::get_token`], if any
    pub token: Option<String>,
}

impl JournalConfig {
    /// Get a client based on this configuration
    pub fn into_client(self) -> Result<JournalClient> {
        let transport = HttpTransport::new(&self.url, self.token)?;
        Ok(JournalClient::new(
            Box::new(transport),
            self.username,
            self.encryption_password,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::errors::Error;

    #[test]
    fn into_client() {
        let config = JournalConfig {
            url: "https://journal.example.com".into(),
            username: "alice".into(),
            encryption_password: "derived".into(),
            token: Some("t".into()),
        };
        assert!(config.into_client().is_ok());
    }

    #[test]
    fn into_client_bad_url() {
        let config = JournalConfig {
            url: "::".into(),
            username: "alice".into(),
            encryption_password: "derived".into(),
            token: None,
        };
        assert!(matches!(config.into_client(), Err(Error::Usage(_))));
    }
}
