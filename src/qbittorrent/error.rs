//! Error types for the qBittorrent layer.

use thiserror::Error;

/// Failure talking to a qBittorrent WebUI
#[derive(Debug, Error)]
pub enum QbtError {
    #[error("invalid qBittorrent URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("login to {url} rejected for user {username:?}")]
    LoginFailed { url: String, username: String },

    #[error("login to {url} returned no {cookie} cookie")]
    MissingSession { url: String, cookie: &'static str },

    #[error("{path} returned HTTP {status}")]
    Status { path: &'static str, status: u16 },

    #[error("{path} rejected the request: {body}")]
    Rejected { path: &'static str, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Malformed user input that no amount of retrying will fix
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("'btih:' not found in magnet URI")]
    MissingInfoHash,

    #[error("no hash after 'btih:' in magnet URI")]
    EmptyInfoHash,

    #[error("invalid duration {0:?}")]
    InvalidDuration(String),
}
