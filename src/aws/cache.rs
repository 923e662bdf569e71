//! On-disk cache of MFA-backed session tokens, one file per profile.
//!
//! Each record is a small JSON object:
//!
//! ```text
//! {
//!   "AccessKeyId": "ASIA...",
//!   "SecretAccessKey": "...",
//!   "SessionToken": "...",
//!   "Expiration": "2026-10-17T18:04:05Z"
//! }
//! ```
//!
//! `Expiration` is always an RFC 3339 UTC instant. Any other encoding
//! (posix timestamps, relative seconds, records written by older releases)
//! is rejected as [`Error::CacheCorrupt`].

use aws_smithy_types::{DateTime, date_time::Format};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;

use super::SessionToken;
use crate::{
    constants,
    error::{Error, Result},
};

/// Serialized form of a [`SessionToken`]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct CacheRecord {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: String,
}

impl CacheRecord {
    fn encode(token: &SessionToken) -> std::result::Result<Self, String> {
        let expiration = token
            .expiration
            .fmt(Format::DateTime)
            .map_err(|e| e.to_string())?;

        Ok(Self {
            access_key_id: token.access_key_id.clone(),
            secret_access_key: token.secret_access_key.clone(),
            session_token: token.session_token.clone(),
            expiration,
        })
    }

    fn decode(self) -> std::result::Result<SessionToken, String> {
        let expiration = DateTime::from_str(&self.expiration, Format::DateTime)
            .map_err(|e| format!("invalid Expiration '{}': {e}", self.expiration))?;

        Ok(SessionToken {
            access_key_id: self.access_key_id,
            secret_access_key: self.secret_access_key,
            session_token: self.session_token,
            expiration,
        })
    }
}

/// File-backed session token cache
#[derive(Debug, Clone)]
pub struct CredentialCache {
    dir: PathBuf,
}

impl CredentialCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache rooted at `AWS_RUNAS_CACHE_DIR` or `~/.aws`
    pub fn from_env() -> anyhow::Result<Self> {
        use anyhow::Context;

        constants::cache_dir()
            .map(Self::new)
            .context("Failed to determine session token cache directory")
    }

    /// Path of the cache record for `profile`
    pub fn path_for(&self, profile: &str) -> PathBuf {
        self.dir.join(format!(
            "{}{}",
            constants::CACHE_FILE_PREFIX,
            sanitize(profile)
        ))
    }

    fn temp_path_for(&self, profile: &str) -> PathBuf {
        self.dir.join(format!(
            "{}{}.tmp",
            constants::CACHE_FILE_PREFIX,
            sanitize(profile)
        ))
    }

    /// Load the cached token for `profile`.
    ///
    /// Returns `Ok(None)` when no record exists and [`Error::CacheCorrupt`]
    /// when one exists but cannot be decoded.
    pub async fn load(&self, profile: &str) -> Result<Option<SessionToken>> {
        let path = self.path_for(profile);

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cached session token at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(Error::cache_corrupt(path, e)),
        };

        let record: CacheRecord =
            serde_json::from_str(&contents).map_err(|e| Error::cache_corrupt(&path, e))?;
        let token = record
            .decode()
            .map_err(|reason| Error::cache_corrupt(&path, reason))?;

        debug!("Loaded cached session token from {}", path.display());
        Ok(Some(token))
    }

    /// Persist `token` for `profile`, replacing any existing record atomically.
    ///
    /// The record is written to a sibling temp file created with mode 0600
    /// and then renamed over the final path.
    pub async fn save(&self, profile: &str, token: &SessionToken) -> Result<()> {
        let path = self.path_for(profile);
        let temp_path = self.temp_path_for(profile);

        let record = CacheRecord::encode(token).map_err(|reason| {
            Error::cache_write_failed(&path, std::io::Error::other(reason))
        })?;
        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| Error::cache_write_failed(&path, e.into()))?;

        if let Err(e) = write_private(&self.dir, &temp_path, &json).await {
            fs::remove_file(&temp_path).await.ok();
            return Err(Error::cache_write_failed(path, e));
        }

        if let Err(e) = fs::rename(&temp_path, &path).await {
            fs::remove_file(&temp_path).await.ok();
            return Err(Error::cache_write_failed(path, e));
        }

        debug!("Session token cached at {}", path.display());
        Ok(())
    }

    /// A token is dead once its expiration has been reached.
    pub fn is_expired(token: &SessionToken, now: DateTime) -> bool {
        token.expiration <= now
    }
}

async fn write_private(dir: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::create_dir_all(dir).await?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;

    // The temp file may predate this run with looser permissions
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    file.write_all(contents).await?;
    file.sync_all().await?;
    Ok(())
}

fn sanitize(profile: &str) -> String {
    profile
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect()
}
