//! qBittorrent WebUI Mock Server
//!
//! An Axum application that emulates the subset of the qBittorrent WebUI API v2
//! used by the operator: cookie based login, torrent listing, adding magnet
//! links, deleting torrents and reporting the application version.
//!
//! State is kept in memory. Tests typically call [`spawn`] to bind an
//! ephemeral port and talk to the returned base URL.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Version string reported by `app/version`
pub const DEFAULT_VERSION: &str = "v5.1.4";

/// A torrent as returned by `torrents/info`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MockTorrent {
    pub hash: String,
    pub name: String,
    pub state: String,
    pub total_size: i64,
    pub content_path: String,
    pub added_on: i64,
    pub time_active: i64,
    pub amount_left: i64,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashSet<String>,
    torrents: BTreeMap<String, MockTorrent>,
    logins: u64,
}

/// Shared state of a running mock server
#[derive(Debug, Clone)]
pub struct MockState {
    username: String,
    password: String,
    version: String,
    inner: Arc<RwLock<Inner>>,
}

impl MockState {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            version: DEFAULT_VERSION.to_string(),
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Override the version string returned by `app/version`
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Seed a torrent as if it had been added earlier
    pub async fn insert_torrent(&self, torrent: MockTorrent) {
        self.inner
            .write()
            .await
            .torrents
            .insert(torrent.hash.to_lowercase(), torrent);
    }

    /// Mutate a stored torrent, e.g. to simulate download progress
    pub async fn update_torrent<F>(&self, hash: &str, f: F) -> bool
    where
        F: FnOnce(&mut MockTorrent),
    {
        let mut inner = self.inner.write().await;
        match inner.torrents.get_mut(&hash.to_lowercase()) {
            Some(torrent) => {
                f(torrent);
                true
            }
            None => false,
        }
    }

    pub async fn torrent(&self, hash: &str) -> Option<MockTorrent> {
        self.inner
            .read()
            .await
            .torrents
            .get(&hash.to_lowercase())
            .cloned()
    }

    pub async fn torrent_count(&self) -> usize {
        self.inner.read().await.torrents.len()
    }

    /// Number of successful logins served so far
    pub async fn login_count(&self) -> u64 {
        self.inner.read().await.logins
    }

    /// Drop every session, forcing clients to log in again
    pub async fn expire_sessions(&self) {
        self.inner.write().await.sessions.clear();
    }

    async fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(sid) = session_id(headers) else {
            return false;
        };
        self.inner.read().await.sessions.contains(&sid)
    }
}

/// Extract the `SID` value from the request `Cookie` header
fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == paths::SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// Pull the info hash out of a magnet URI (`xt=urn:btih:<hash>`)
#[must_use]
pub fn magnet_hash(magnet: &str) -> Option<String> {
    let start = magnet.find("btih:")? + "btih:".len();
    let rest = &magnet[start..];
    let end = rest.find('&').unwrap_or(rest.len());
    let hash = &rest[..end];
    (!hash.is_empty()).then(|| hash.to_lowercase())
}

/// Pull the display name (`dn=`) out of a magnet URI
fn magnet_display_name(magnet: &str) -> Option<String> {
    magnet
        .split(['?', '&'])
        .find_map(|part| part.strip_prefix("dn="))
        .map(|name| name.replace('+', " "))
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct InfoQuery {
    hashes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddForm {
    urls: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteForm {
    hashes: String,
    #[serde(default)]
    delete_files: bool,
}

async fn login(State(state): State<MockState>, Form(form): Form<LoginForm>) -> Response {
    if form.username != state.username || form.password != state.password {
        warn!("  Login rejected for user {}", form.username);
        return (StatusCode::OK, paths::LOGIN_FAILED_BODY).into_response();
    }

    let sid = uuid::Uuid::new_v4().simple().to_string();
    {
        let mut inner = state.inner.write().await;
        inner.sessions.insert(sid.clone());
        inner.logins += 1;
    }
    info!("  Login accepted for user {}", form.username);

    (
        StatusCode::OK,
        [(
            header::SET_COOKIE,
            format!("{}={sid}; HttpOnly; path=/", paths::SESSION_COOKIE),
        )],
        paths::LOGIN_OK_BODY,
    )
        .into_response()
}

async fn torrents_info(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<InfoQuery>,
) -> Response {
    if !state.authorized(&headers).await {
        return StatusCode::FORBIDDEN.into_response();
    }

    let inner = state.inner.read().await;
    let torrents: Vec<MockTorrent> = match query.hashes.as_deref() {
        Some(hashes) if !hashes.is_empty() => hashes
            .split('|')
            .filter_map(|hash| inner.torrents.get(&hash.to_lowercase()).cloned())
            .collect(),
        _ => inner.torrents.values().cloned().collect(),
    };
    Json(torrents).into_response()
}

async fn torrents_add(
    State(state): State<MockState>,
    headers: HeaderMap,
    Form(form): Form<AddForm>,
) -> Response {
    if !state.authorized(&headers).await {
        return StatusCode::FORBIDDEN.into_response();
    }

    let mut inner = state.inner.write().await;
    let mut added = 0;
    for url in form.urls.lines().map(str::trim).filter(|u| !u.is_empty()) {
        let Some(hash) = magnet_hash(url) else {
            warn!("  Ignoring unparseable magnet link");
            continue;
        };
        let name = magnet_display_name(url).unwrap_or_else(|| hash.clone());
        inner.torrents.entry(hash.clone()).or_insert_with(|| MockTorrent {
            content_path: format!("/downloads/{name}"),
            hash,
            name,
            state: "metaDL".to_string(),
            total_size: 0,
            added_on: 0,
            time_active: 0,
            amount_left: 0,
        });
        added += 1;
    }

    if added == 0 {
        return (StatusCode::OK, paths::LOGIN_FAILED_BODY).into_response();
    }
    info!("  Added {} torrent(s)", added);
    (StatusCode::OK, paths::LOGIN_OK_BODY).into_response()
}

async fn torrents_delete(
    State(state): State<MockState>,
    headers: HeaderMap,
    Form(form): Form<DeleteForm>,
) -> Response {
    if !state.authorized(&headers).await {
        return StatusCode::FORBIDDEN.into_response();
    }

    let mut inner = state.inner.write().await;
    for hash in form.hashes.split('|') {
        if inner.torrents.remove(&hash.to_lowercase()).is_some() {
            info!("  Deleted torrent {} (deleteFiles={})", hash, form.delete_files);
        }
    }
    StatusCode::OK.into_response()
}

async fn app_version(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers).await {
        return StatusCode::FORBIDDEN.into_response();
    }
    (StatusCode::OK, state.version.clone()).into_response()
}

/// Build the mock WebUI router
pub fn router(state: MockState) -> Router {
    Router::new()
        .route(paths::AUTH_LOGIN, post(login))
        .route(paths::TORRENTS_INFO, get(torrents_info))
        .route(paths::TORRENTS_ADD, post(torrents_add))
        .route(paths::TORRENTS_DELETE, post(torrents_delete))
        .route(paths::APP_VERSION, get(app_version))
        .with_state(state)
}

/// Serve the mock on an ephemeral localhost port
///
/// Returns the base URL (e.g. `http://127.0.0.1:41234`). The server runs until
/// the tokio runtime shuts down.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn spawn(state: MockState) -> anyhow::Result<String> {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    let app = router(state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!("Mock server stopped: {}", e);
        }
    });
    Ok(format!("http://{addr}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnet_hash() {
        assert_eq!(
            magnet_hash("magnet:?xt=urn:btih:ABCDEF0123&dn=ubuntu").as_deref(),
            Some("abcdef0123")
        );
        assert_eq!(magnet_hash("magnet:?dn=nothing"), None);
        assert_eq!(magnet_hash("magnet:?xt=urn:btih:&dn=x"), None);
    }

    #[test]
    fn test_magnet_display_name() {
        assert_eq!(
            magnet_display_name("magnet:?xt=urn:btih:abc&dn=ubuntu+iso").as_deref(),
            Some("ubuntu iso")
        );
        assert_eq!(magnet_display_name("magnet:?xt=urn:btih:abc"), None);
    }

    #[test]
    fn test_session_id_parses_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "foo=bar; SID=xyz".parse().unwrap());
        assert_eq!(session_id(&headers).as_deref(), Some("xyz"));
    }
}
