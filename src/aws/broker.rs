use aws_smithy_types::DateTime;
use dialoguer::Input;
use std::{sync::Arc, time::SystemTime};
use tracing::{debug, info, warn};

use super::{CredentialCache, SessionToken, provider::IdentityProvider};
use crate::error::{Error, Result};

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime {
        DateTime::from(SystemTime::now())
    }
}

/// Synchronous source of MFA codes
pub trait MfaPrompt: Send + Sync {
    fn prompt_for_code(&self) -> anyhow::Result<String>;
}

impl<F> MfaPrompt for F
where
    F: Fn() -> anyhow::Result<String> + Send + Sync,
{
    fn prompt_for_code(&self) -> anyhow::Result<String> {
        self()
    }
}

/// Reads the MFA code from the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl MfaPrompt for TerminalPrompt {
    fn prompt_for_code(&self) -> anyhow::Result<String> {
        let code = Input::<String>::new()
            .with_prompt("Enter MFA Code")
            .interact_text()?;
        Ok(code.trim().to_string())
    }
}

/// What the cache holds for a profile
#[derive(Debug)]
enum CacheState {
    NoCache,
    Valid(SessionToken),
    Expired,
}

/// Hands out session tokens, reusing the cached one while it is alive.
///
/// One broker serves one process run. Concurrent runs refreshing the same
/// profile race on the cache file; the last rename wins.
pub struct SessionTokenBroker {
    provider: Arc<dyn IdentityProvider>,
    cache: CredentialCache,
    prompt: Box<dyn MfaPrompt>,
    clock: Box<dyn Clock>,
    force_refresh: bool,
}

impl SessionTokenBroker {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        cache: CredentialCache,
        prompt: impl MfaPrompt + 'static,
    ) -> Self {
        Self {
            provider,
            cache,
            prompt: Box::new(prompt),
            clock: Box::new(SystemClock),
            force_refresh: false,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Always issue a new token, ignoring any cached one
    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    /// Return a live session token for `profile`, issuing and caching a new
    /// one when the cache is empty, expired, unreadable or bypassed.
    ///
    /// Failures from STS are returned as [`Error::AuthenticationFailed`] and
    /// never retried: an MFA code is good for one attempt only.
    pub async fn get_credentials(
        &self,
        profile: &str,
        mfa_serial: Option<&str>,
    ) -> Result<SessionToken> {
        if self.force_refresh {
            debug!("Forced refresh of session token for profile {}", profile);
            return self.reissue(profile, mfa_serial).await;
        }

        match self.lookup(profile).await {
            CacheState::Valid(token) => {
                debug!("Using cached session token for profile {}", profile);
                Ok(token)
            }
            CacheState::Expired => {
                debug!("Cached session token for profile {} has expired", profile);
                self.reissue(profile, mfa_serial).await
            }
            CacheState::NoCache => {
                debug!("No usable cached session token for profile {}", profile);
                self.reissue(profile, mfa_serial).await
            }
        }
    }

    async fn lookup(&self, profile: &str) -> CacheState {
        match self.cache.load(profile).await {
            Ok(Some(token)) if CredentialCache::is_expired(&token, self.clock.now()) => {
                CacheState::Expired
            }
            Ok(Some(token)) => CacheState::Valid(token),
            Ok(None) => CacheState::NoCache,
            Err(e) => {
                warn!("{e}; requesting a new session token");
                CacheState::NoCache
            }
        }
    }

    async fn reissue(&self, profile: &str, mfa_serial: Option<&str>) -> Result<SessionToken> {
        let mfa_code = match mfa_serial {
            Some(serial) => {
                debug!("Prompting for MFA code of device {}", serial);
                let code = self.prompt.prompt_for_code().map_err(|e| {
                    Error::AuthenticationFailed(e.context("Failed to read MFA code"))
                })?;
                Some(code)
            }
            None => None,
        };

        let token = self
            .provider
            .get_session_token(mfa_serial, mfa_code.as_deref())
            .await
            .map_err(Error::AuthenticationFailed)?;

        match self.cache.save(profile, &token).await {
            Ok(()) => info!("Session token cached for profile {}", profile),
            Err(e) => warn!("{e}; continuing with uncached session token"),
        }

        Ok(token)
    }
}
