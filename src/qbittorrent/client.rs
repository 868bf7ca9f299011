//! # qBittorrent WebUI Client
//!
//! `reqwest` client for the WebUI API v2. A session is the `SID` cookie
//! returned by `auth/login`; it is sent explicitly on every request.

use super::{Connector, QBittorrentApi, QbtError, TorrentInfo};
use async_trait::async_trait;
use reqwest::header::{COOKIE, REFERER, SET_COOKIE};
use reqwest::{StatusCode, Url};
use std::sync::Arc;
use tracing::{debug, warn};

/// Logged-in WebUI session
pub struct QBittorrentClient {
    http: reqwest::Client,
    base_url: String,
    sid: String,
}

impl std::fmt::Debug for QBittorrentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QBittorrentClient")
            .field("base_url", &self.base_url)
            .field("sid", &"***")
            .finish_non_exhaustive()
    }
}

fn validate_base_url(url: &str) -> Result<String, QbtError> {
    let parsed = Url::parse(url).map_err(|e| QbtError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(QbtError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {:?}", parsed.scheme()),
        });
    }
    Ok(url.trim_end_matches('/').to_string())
}

fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == paths::SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

impl QBittorrentClient {
    /// Log in and return a session
    ///
    /// # Errors
    ///
    /// [`QbtError::LoginFailed`] on rejected credentials (including the 403
    /// qBittorrent returns once an IP is banned), [`QbtError::InvalidUrl`] on
    /// a malformed base URL, [`QbtError::Http`] on transport errors.
    pub async fn login(
        http: reqwest::Client,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, QbtError> {
        let base_url = validate_base_url(base_url)?;
        let response = http
            .post(paths::join(&base_url, paths::AUTH_LOGIN))
            .header(REFERER, &base_url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            warn!("qBittorrent at {} refused login (403)", base_url);
            return Err(QbtError::LoginFailed {
                url: base_url,
                username: username.to_string(),
            });
        }
        if !status.is_success() {
            return Err(QbtError::Status {
                path: paths::AUTH_LOGIN,
                status: status.as_u16(),
            });
        }

        let sid = session_cookie(&response);
        let body = response.text().await?;
        if body.trim() != paths::LOGIN_OK_BODY {
            return Err(QbtError::LoginFailed {
                url: base_url,
                username: username.to_string(),
            });
        }
        let sid = sid.ok_or_else(|| QbtError::MissingSession {
            url: base_url.clone(),
            cookie: paths::SESSION_COOKIE,
        })?;

        debug!("Logged in to qBittorrent at {}", base_url);
        Ok(Self {
            http,
            base_url,
            sid,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn cookie(&self) -> String {
        format!("{}={}", paths::SESSION_COOKIE, self.sid)
    }

    fn get(&self, path: &'static str) -> reqwest::RequestBuilder {
        self.http
            .get(paths::join(&self.base_url, path))
            .header(COOKIE, self.cookie())
            .header(REFERER, &self.base_url)
    }

    fn post(&self, path: &'static str) -> reqwest::RequestBuilder {
        self.http
            .post(paths::join(&self.base_url, path))
            .header(COOKIE, self.cookie())
            .header(REFERER, &self.base_url)
    }

    async fn check(
        path: &'static str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, QbtError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(QbtError::Status {
                path,
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl QBittorrentApi for QBittorrentClient {
    async fn torrent_info(&self, hash: &str) -> Result<Option<TorrentInfo>, QbtError> {
        let hash = hash.to_lowercase();
        let response = self
            .get(paths::TORRENTS_INFO)
            .query(&[("hashes", hash.as_str())])
            .send()
            .await?;
        let torrents: Vec<TorrentInfo> = Self::check(paths::TORRENTS_INFO, response)
            .await?
            .json()
            .await?;
        Ok(torrents
            .into_iter()
            .find(|t| t.hash.eq_ignore_ascii_case(&hash)))
    }

    async fn add_torrent(&self, magnet_uri: &str) -> Result<(), QbtError> {
        let response = self
            .post(paths::TORRENTS_ADD)
            .form(&[("urls", magnet_uri)])
            .send()
            .await?;
        let body = Self::check(paths::TORRENTS_ADD, response)
            .await?
            .text()
            .await?;
        // qBittorrent answers 200 "Fails." when nothing could be added
        if body.trim() == paths::LOGIN_FAILED_BODY {
            return Err(QbtError::Rejected {
                path: paths::TORRENTS_ADD,
                body,
            });
        }
        Ok(())
    }

    async fn delete_torrent(&self, hash: &str, delete_files: bool) -> Result<(), QbtError> {
        let delete_files = if delete_files { "true" } else { "false" };
        let response = self
            .post(paths::TORRENTS_DELETE)
            .form(&[("hashes", hash), ("deleteFiles", delete_files)])
            .send()
            .await?;
        Self::check(paths::TORRENTS_DELETE, response).await?;
        Ok(())
    }

    async fn version(&self) -> Result<String, QbtError> {
        let response = self.get(paths::APP_VERSION).send().await?;
        let version = Self::check(paths::APP_VERSION, response)
            .await?
            .text()
            .await?;
        Ok(version.trim().to_string())
    }
}

/// [`Connector`] that logs in over HTTP
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    http: reqwest::Client,
}

impl HttpConnector {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(
        &self,
        url: &str,
        username: &str,
        password: &str,
    ) -> Result<Arc<dyn QBittorrentApi>, QbtError> {
        let client = QBittorrentClient::login(self.http.clone(), url, username, password).await?;
        Ok(Arc::new(client))
    }
}
