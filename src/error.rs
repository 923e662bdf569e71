//! Error taxonomy for the credential cache, session broker and role discovery.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the core of `aws-runas`.
#[derive(Debug, Error)]
pub enum Error {
    /// The cache record exists but could not be decoded. Callers treat this as a miss.
    #[error("cached session token at {path} is unreadable: {reason}")]
    CacheCorrupt { path: PathBuf, reason: String },

    /// The freshly issued token could not be persisted.
    #[error("failed to write session token cache {path}")]
    CacheWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// STS rejected the request, or the MFA code could not be obtained.
    #[error("authentication failed: {0:#}")]
    AuthenticationFailed(anyhow::Error),

    /// Any single policy fetch or parse failed during discovery.
    #[error("role discovery failed: {0:#}")]
    RoleDiscoveryFailed(anyhow::Error),

    /// A policy statement was not an object or lacked `Action`, `Effect` or `Resource`.
    #[error("malformed policy statement: {0}")]
    MalformedPolicyStatement(&'static str),

    /// A whole policy document was not valid JSON or had no `Statement`.
    #[error("malformed policy document: {0}")]
    MalformedPolicyDocument(String),

    #[error("profile '{0}' not found in AWS config")]
    ProfileNotFound(String),

    #[error("profile '{0}' has no role_arn configured")]
    MissingRoleArn(String),

    #[error("failed to read AWS config {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

impl Error {
    pub fn cache_corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CacheCorrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn cache_write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CacheWriteFailed {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
