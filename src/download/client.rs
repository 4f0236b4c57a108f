//! HTTP client wrapper shared by the downloader and the crawler.
//!
//! Attaches feed credentials to every request and leaves status handling to
//! callers, since a failed ranged GET and a failed probe mean different things.

use std::fmt;
use std::time::Duration;

use reqwest::header::RANGE;
use reqwest::{Client, Method, Response};
use tracing::{debug, instrument};
use url::Url;

use super::constants::CONNECT_TIMEOUT_SECS;
use super::error::DownloadError;
use crate::user_agent;

/// Basic-auth credentials for the feed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: Option<String>,
}

impl Credentials {
    /// Creates credentials from a username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Some(password.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// HTTP client for feed requests.
///
/// Create once and reuse for every request of a run to benefit from
/// connection pooling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    credentials: Option<Credentials>,
}

impl HttpClient {
    /// Creates a client with the default connect timeout and no credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_connect_timeout(None, Duration::from_secs(CONNECT_TIMEOUT_SECS))
    }

    /// Creates a client that authenticates every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn with_credentials(credentials: Credentials) -> Result<Self, reqwest::Error> {
        Self::with_connect_timeout(
            Some(credentials),
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
        )
    }

    /// Creates a client with explicit credentials and connect timeout.
    ///
    /// Only connecting is bounded; a transfer that stalls mid-body blocks
    /// until the caller cancels it.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn with_connect_timeout(
        credentials: Option<Credentials>,
        connect_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        Ok(Self {
            client,
            credentials,
        })
    }

    /// Issues a metadata-only request.
    #[instrument(level = "debug", skip(self))]
    pub async fn head(&self, url: &str) -> Result<Response, DownloadError> {
        self.send(Method::HEAD, url, None).await
    }

    /// Issues a plain GET.
    #[instrument(level = "debug", skip(self))]
    pub async fn get(&self, url: &str) -> Result<Response, DownloadError> {
        self.send(Method::GET, url, None).await
    }

    /// Issues a GET for the inclusive byte range `first..=last`.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_range(
        &self,
        url: &str,
        first: u64,
        last: u64,
    ) -> Result<Response, DownloadError> {
        let range = format!("bytes={first}-{last}");
        self.send(Method::GET, url, Some(&range)).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        range: Option<&str>,
    ) -> Result<Response, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let mut request = self.client.request(method.clone(), parsed);
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, credentials.password.as_ref());
        }
        if let Some(range) = range {
            request = request.header(RANGE, range);
        }
        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        debug!(%method, status = response.status().as_u16(), "response received");
        Ok(response)
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}
