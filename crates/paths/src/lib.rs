//! Shared qBittorrent WebUI API path definitions
//!
//! This crate centralizes the WebUI API v2 paths so the operator's HTTP
//! client and the mock server used in tests always agree on the routes.
//!
//! Route constants are plain string literals because Axum routes require
//! `&'static str`.

/// Prefix shared by every WebUI API v2 endpoint
pub const API_PREFIX: &str = "/api/v2";

/// `POST` form `username`, `password`. Replies `Ok.` and sets the `SID` cookie.
pub const AUTH_LOGIN: &str = "/api/v2/auth/login";

/// `GET` with optional `hashes` query (pipe separated). Replies a JSON array.
pub const TORRENTS_INFO: &str = "/api/v2/torrents/info";

/// `POST` form `urls` (newline separated magnet URIs).
pub const TORRENTS_ADD: &str = "/api/v2/torrents/add";

/// `POST` form `hashes`, `deleteFiles`.
pub const TORRENTS_DELETE: &str = "/api/v2/torrents/delete";

/// `GET`. Replies the application version as plain text, e.g. `v5.1.4`.
pub const APP_VERSION: &str = "/api/v2/app/version";

/// Name of the session cookie issued by a successful login
pub const SESSION_COOKIE: &str = "SID";

/// Body returned by the login endpoint on success
pub const LOGIN_OK_BODY: &str = "Ok.";

/// Body returned by the login endpoint on bad credentials
pub const LOGIN_FAILED_BODY: &str = "Fails.";

/// Join a base URL and an API path, tolerating a trailing slash on the base
#[must_use]
pub fn join(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}
