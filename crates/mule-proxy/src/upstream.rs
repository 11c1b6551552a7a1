//! Client for the upstream account API.
//!
//! Each call swaps the client's public identifier for the real credentials,
//! issues one GET, and decodes the `<Chars>` document. Nothing is retried:
//! the relay falls back to its cache instead.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client as ReqwestClient, StatusCode, Url};

use crate::credentials::Credential;
use crate::record::{AccountRecord, RecordError};

/// Query parameters the relay owns; client-supplied values are dropped.
const RESERVED_PARAMS: [&str; 3] = ["guid", "password", "muleDump"];

/// Result of a call that reached the upstream and decoded cleanly.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Usable(AccountRecord),
    /// Valid document without account data (empty `nextCharId`).
    Unusable,
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("invalid upstream request: {0}")]
    BadRequest(String),

    #[error("upstream unavailable: {0}")]
    Unavailable(#[source] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(StatusCode),

    #[error(transparent)]
    Decode(#[from] RecordError),
}

impl UpstreamError {
    /// Status reported to the client when no cached record can stand in.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) | Self::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Status(code) => *code,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: ReqwestClient,
    origin: Arc<str>,
}

impl UpstreamClient {
    /// Build a client for `origin` (scheme and host, e.g.
    /// `https://realmofthemadgod.appspot.com`).
    pub fn new(origin: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = ReqwestClient::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, origin))
    }

    pub fn with_client(http: ReqwestClient, origin: &str) -> Self {
        Self {
            http,
            origin: Arc::from(origin.trim_end_matches('/')),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Outbound URL: `<origin><path>?<client params>&guid=..&password=..&muleDump=true`.
    pub fn request_url(
        &self,
        path: &str,
        credential: &Credential,
        params: &[(String, String)],
    ) -> Result<Url, UpstreamError> {
        let mut url = Url::parse(&format!("{}{}", self.origin, path))
            .map_err(|e| UpstreamError::BadRequest(e.to_string()))?;

        url.query_pairs_mut()
            .extend_pairs(
                params
                    .iter()
                    .filter(|(k, _)| !RESERVED_PARAMS.contains(&k.as_str())),
            )
            .append_pair("guid", credential.username())
            .append_pair("password", credential.password())
            .append_pair("muleDump", "true");

        Ok(url)
    }

    pub async fn fetch(
        &self,
        path: &str,
        credential: &Credential,
        params: &[(String, String)],
    ) -> Result<Fetched, UpstreamError> {
        let url = self.request_url(path, credential, params)?;

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(UpstreamError::Unavailable)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        let body = resp.text().await.map_err(UpstreamError::Unavailable)?;
        let record = AccountRecord::from_xml(&body)?;

        tracing::debug!(
            public_id = %credential.public_id(),
            path,
            characters = record.chars.len(),
            "Fetched account record"
        );

        if record.is_usable() {
            Ok(Fetched::Usable(record))
        } else {
            Ok(Fetched::Unusable)
        }
    }
}
