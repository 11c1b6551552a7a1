//! Axum relay handler.
//!
//! ```text
//! resolve guid ──unknown──▶ 404
//!      │
//!      ├─ /account/verifyage ──▶ <Success/>
//!      │
//!   quota? ──exhausted──────────────────────────┐
//!      │                                        ▼
//!   upstream ──error / empty──▶ cached XML (or error status on miss)
//!      │
//!   usable ──▶ cache.put ──▶ JSON envelope
//! ```

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, ResultCache};
use crate::credentials::CredentialDirectory;
use crate::quota::QuotaGate;
use crate::record::{AccountRecord, Envelope, RecordError};
use crate::upstream::{Fetched, UpstreamClient, UpstreamError};

pub const CHAR_LIST_PATH: &str = "/char/list";
pub const VERIFY_AGE_PATH: &str = "/account/verifyage";
pub const BLOCKED_CONFIG_PATH: &str = "/config.json";

const VERIFY_AGE_BODY: &str = "<Success/>";
const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Shared state handed to every request.
#[derive(Clone)]
pub struct RelayState {
    pub directory: Arc<CredentialDirectory>,
    pub quota: Arc<QuotaGate>,
    pub cache: Arc<ResultCache>,
    pub upstream: UpstreamClient,
}

impl RelayState {
    /// State with an empty cache.
    pub fn new(directory: CredentialDirectory, quota: Arc<QuotaGate>, upstream: UpstreamClient) -> Self {
        Self {
            directory: Arc::new(directory),
            quota,
            cache: Arc::new(ResultCache::new()),
            upstream,
        }
    }
}

/// Build the router. When `static_dir` is set, paths not handled by the
/// relay are served from it, except `/config.json`, which is always 404.
pub fn router(state: RelayState, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route(CHAR_LIST_PATH, get(handle_relay))
        .route(VERIFY_AGE_PATH, get(handle_relay))
        .route(BLOCKED_CONFIG_PATH, any(|| async { StatusCode::NOT_FOUND }))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}

#[tracing::instrument(
    name = "relay",
    skip_all,
    fields(path = %uri.path(), public_id = tracing::field::Empty)
)]
async fn handle_relay(
    State(state): State<RelayState>,
    uri: Uri,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, RelayError> {
    let path = uri.path();
    let guid = params
        .iter()
        .find(|(k, _)| k == "guid")
        .map(|(_, v)| v.as_str())
        .unwrap_or_default();

    let credential = state
        .directory
        .resolve(guid)
        .ok_or(RelayError::IdentityNotFound)?;
    tracing::Span::current().record("public_id", tracing::field::display(credential.public_id()));

    if path == VERIFY_AGE_PATH {
        return Ok(xml_response(VERIFY_AGE_BODY.as_bytes().to_vec()));
    }

    let key = CacheKey::new(credential.public_id().clone(), path);

    if !state.quota.try_consume() {
        debug!(limit = state.quota.limit(), "Upstream quota exhausted, serving from cache");
        return serve_cached(&state.cache, &key, RelayError::CacheMiss);
    }

    match state.upstream.fetch(path, credential, &params).await {
        Ok(Fetched::Usable(record)) => {
            let response = live_response(&record);
            state.cache.put(key, record);
            info!("Serving fresh account record");
            Ok(response)
        }
        Ok(Fetched::Unusable) => {
            warn!("Upstream returned no account data, serving from cache");
            serve_cached(&state.cache, &key, RelayError::CacheMiss)
        }
        Err(e) => {
            warn!(error = %e, "Upstream request failed, serving from cache");
            serve_cached(&state.cache, &key, RelayError::Upstream(e))
        }
    }
}

/// Replay the cached record as XML, or fail with `on_miss`.
fn serve_cached(cache: &ResultCache, key: &CacheKey, on_miss: RelayError) -> Result<Response, RelayError> {
    let record = cache.get(key).ok_or(on_miss)?;
    Ok(xml_response(record.to_xml()?))
}

fn live_response(record: &AccountRecord) -> Response {
    (
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        axum::Json(Envelope::new(record)),
    )
        .into_response()
}

fn xml_response(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, XML_CONTENT_TYPE)], body).into_response()
}

/// Terminal outcomes of a relay request that are not a 200.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("unknown account identifier")]
    IdentityNotFound,

    #[error("no cached record available")]
    CacheMiss,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("failed to render cached record: {0}")]
    Render(#[from] RecordError),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::IdentityNotFound | Self::CacheMiss => StatusCode::NOT_FOUND,
            Self::Upstream(e) => e.status_code(),
            Self::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Relay error");
        } else {
            debug!(error = %self, status = status.as_u16(), "Relay request rejected");
        }
        status.into_response()
    }
}
