//! HTTP transport for the journal API.
//!
//! This contains some utilities to make using `reqwest` easier, including getting
//! the correct TLS certificate store.

use super::types::{Entry, Journal, JournalTransport, UserInfo};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

#[cfg(not(any(feature = "tls-native-roots", feature = "tls-webpki-roots")))]
compile_error!(
    "Either feature \"tls-native-roots\" or \"tls-webpki-roots\" must be enabled for HTTP client support."
);

static USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Create a new [`reqwest::Client`] with configuration appropriate to this library.
pub(super) fn client() -> Result<reqwest::Client> {
    use std::time::Duration;

    let client = reqwest::Client::builder()
        .use_rustls_tls()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(15))
        .read_timeout(Duration::from_secs(120));

    let client = configure_proxy(client);
    // Select native or webpki certs depending on features
    let client = client.tls_built_in_root_certs(false);
    #[cfg(feature = "tls-native-roots")]
    let client = client.tls_built_in_native_certs(true);
    #[cfg(all(feature = "tls-webpki-roots", not(feature = "tls-native-roots")))]
    let client = client.tls_built_in_webpki_certs(true);

    Ok(client.build()?)
}

fn configure_proxy(mut client: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
    if let Ok(proxy_url) = env::var("HTTP_PROXY").or_else(|_| env::var("http_proxy")) {
        match reqwest::Proxy::http(&proxy_url) {
            Ok(proxy) => {
                client = client.proxy(proxy);
            }
            Err(e) => {
                log::warn!("Invalid HTTP_PROXY '{proxy_url}': {e}. Continuing without HTTP proxy.");
            }
        }
    }

    if let Ok(proxy_url) = env::var("HTTPS_PROXY").or_else(|_| env::var("https_proxy")) {
        match reqwest::Proxy::https(&proxy_url) {
            Ok(proxy) => {
                client = client.proxy(proxy);
            }
            Err(e) => {
                log::warn!(
                    "Invalid HTTPS_PROXY '{proxy_url}': {e}. Continuing without HTTPS proxy."
                );
            }
        }
    }
    client
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// A [`JournalTransport`] talking to a journal server over HTTP.
pub(crate) struct HttpTransport {
    base_url: Url,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Construct a new transport for the server at `url`, optionally with an existing session
    /// token.  Endpoint paths are appended to `url`.
    pub(crate) fn new(url: &str, token: Option<String>) -> Result<HttpTransport> {
        let mut url = Url::parse(url)
            .map_err(|_| Error::Usage(format!("Could not parse {url} as a URL")))?;
        // Ensure the path has a trailing slash, so that `Url::join` correctly appends
        // additional path segments to it.
        let path = url.path();
        if !path.ends_with('/') {
            url.set_path(&format!("{path}/"));
        }
        Ok(HttpTransport {
            base_url: url,
            token,
            client: client()?,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|_| {
            Error::Usage(format!(
                "Could not build url from base {} and path {path}",
                self.base_url
            ))
        })
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.header("Authorization", format!("Token {token}")),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        check_status(response).await
    }
}

/// Turn unsuccessful responses into errors.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Authentication(format!("{status}: {body}"))
        }
        StatusCode::CONFLICT => Error::OutOfSync,
        _ => Error::Transport(format!("{status}: {body}")),
    })
}

#[async_trait]
impl JournalTransport for HttpTransport {
    async fn authenticate(&mut self, username: &str, password: &str) -> Result<String> {
        let url = self.url("api-token-auth/")?;
        let response = self
            .send(
                self.client
                    .post(url)
                    .json(&Credentials { username, password }),
            )
            .await?;
        let token = response.json::<TokenResponse>().await?.token;
        self.token = Some(token.clone());
        Ok(token)
    }

    async fn invalidate_token(&mut self) -> Result<()> {
        let url = self.url("api/logout/")?;
        self.send(self.request(reqwest::Method::POST, url)).await?;
        self.token = None;
        Ok(())
    }

    async fn fetch_user_info(&mut self, owner: &str) -> Result<Option<UserInfo>> {
        let url = self.url(&format!("api/v1/user/{owner}/"))?;
        let response = self.request(reqwest::Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check_status(response).await?.json().await?))
    }

    async fn create_user_info(&mut self, user_info: &UserInfo) -> Result<()> {
        let url = self.url("api/v1/user/")?;
        self.send(self.request(reqwest::Method::POST, url).json(user_info))
            .await?;
        Ok(())
    }

    async fn list_journals(&mut self) -> Result<Vec<Journal>> {
        let url = self.url("api/v1/journals/")?;
        Ok(self
            .send(self.request(reqwest::Method::GET, url))
            .await?
            .json()
            .await?)
    }

    async fn fetch_journal(&mut self, uid: &str) -> Result<Journal> {
        let url = self.url(&format!("api/v1/journals/{uid}/"))?;
        Ok(self
            .send(self.request(reqwest::Method::GET, url))
            .await?
            .json()
            .await?)
    }

    async fn create_journal(&mut self, journal: &Journal) -> Result<()> {
        let url = self.url("api/v1/journals/")?;
        self.send(self.request(reqwest::Method::POST, url).json(journal))
            .await?;
        Ok(())
    }

    async fn update_journal(&mut self, journal: &Journal) -> Result<()> {
        let url = self.url(&format!("api/v1/journals/{}/", journal.uid))?;
        self.send(self.request(reqwest::Method::PUT, url).json(journal))
            .await?;
        Ok(())
    }

    async fn delete_journal(&mut self, uid: &str) -> Result<()> {
        let url = self.url(&format!("api/v1/journals/{uid}/"))?;
        self.send(self.request(reqwest::Method::DELETE, url)).await?;
        Ok(())
    }

    async fn list_entries(
        &mut self,
        journal_uid: &str,
        last: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Entry>> {
        let mut url = self.url(&format!("api/v1/journals/{journal_uid}/entries/"))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(last) = last {
                query.append_pair("last", last);
            }
            query.append_pair("limit", &limit.to_string());
        }
        Ok(self
            .send(self.request(reqwest::Method::GET, url))
            .await?
            .json()
            .await?)
    }

    async fn create_entries(
        &mut self,
        journal_uid: &str,
        entries: &[Entry],
        last: Option<&str>,
    ) -> Result<()> {
        let mut url = self.url(&format!("api/v1/journals/{journal_uid}/entries/"))?;
        if let Some(last) = last {
            url.query_pairs_mut().append_pair("last", last);
        }
        self.send(self.request(reqwest::Method::POST, url).json(entries))
            .await?;
        Ok(())
    }
}
