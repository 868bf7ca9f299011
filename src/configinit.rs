//! # Config Init
//!
//! Init container step for managed servers: seeds `qBittorrent.conf` with
//! the WebUI login from the mounted credentials Secret so the first boot
//! already uses them. An existing config file is never touched.

use crate::qbittorrent::hash_password;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use zeroize::Zeroizing;

/// What [`run`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The config file already existed
    Skipped(PathBuf),
    Written(PathBuf),
}

/// `<config_dir>/qBittorrent/qBittorrent.conf`
#[must_use]
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join("qBittorrent").join("qBittorrent.conf")
}

/// Write the config file unless it exists
///
/// # Errors
///
/// Fails when `username` or `password` cannot be read from
/// `credentials_dir`, or when the config file cannot be written.
pub fn run(config_dir: &Path, credentials_dir: &Path) -> Result<Outcome> {
    let config_file = config_file_path(config_dir);
    if config_file.exists() {
        info!("{} already exists, skipping", config_file.display());
        return Ok(Outcome::Skipped(config_file));
    }

    let username = fs::read_to_string(credentials_dir.join("username"))
        .context("failed to read username")?;
    let password = Zeroizing::new(
        fs::read_to_string(credentials_dir.join("password")).context("failed to read password")?,
    );

    let content = render(username.trim(), &hash_password(password.trim()));

    if let Some(dir) = config_file.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }
    fs::write(&config_file, content)
        .with_context(|| format!("failed to write config file {}", config_file.display()))?;

    info!("Wrote {} with pre-seeded credentials", config_file.display());
    Ok(Outcome::Written(config_file))
}

fn render(username: &str, password_hash: &str) -> String {
    format!("[Preferences]\nWebUI\\Username={username}\nWebUI\\Password_PBKDF2=\"{password_hash}\"\n")
}
