//! Test doubles for [`IdentityProvider`], [`Clock`] and [`MfaPrompt`](super::MfaPrompt).

use anyhow::{Result, bail};
use async_trait::async_trait;
use aws_smithy_types::DateTime;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use super::{Clock, Principal, PrincipalKind, SessionToken, provider::IdentityProvider};

pub struct FixedClock(pub DateTime);

impl Clock for FixedClock {
    fn now(&self) -> DateTime {
        self.0
    }
}

pub fn fixed_code(code: &'static str) -> impl Fn() -> Result<String> + Send + Sync + 'static {
    move || Ok(code.to_string())
}

pub fn token_expiring_at(secs: i64) -> SessionToken {
    SessionToken {
        access_key_id: format!("ASIA{secs}"),
        secret_access_key: "secret".to_string(),
        session_token: "session".to_string(),
        expiration: DateTime::from_secs(secs),
    }
}

type FetchKey = (PrincipalKind, String, bool);

/// Scripted provider that records how it was called
#[derive(Default)]
pub struct MockProvider {
    issued: Option<SessionToken>,
    principal: Option<Principal>,
    policies: HashMap<FetchKey, Vec<String>>,
    failing: HashSet<FetchKey>,
    mfa_devices: Vec<String>,
    fetch_delay: Option<Duration>,
    session_token_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    last_mfa: Mutex<Option<(Option<String>, Option<String>)>>,
    last_assume: Mutex<Option<(String, String, String)>>,
}

impl MockProvider {
    /// Provider whose GetSessionToken returns `token`
    pub fn issuing(token: SessionToken) -> Self {
        Self {
            issued: Some(token),
            ..Default::default()
        }
    }

    /// Provider whose GetSessionToken always fails
    pub fn rejecting() -> Self {
        Self::default()
    }

    pub fn with_principal(mut self, user: &str, groups: &[&str]) -> Self {
        self.principal = Some(Principal {
            user_name: user.to_string(),
            arn: format!("arn:aws:iam::123456789012:user/{user}"),
            group_names: groups.iter().map(|g| g.to_string()).collect(),
        });
        self
    }

    pub fn with_policy(
        mut self,
        kind: PrincipalKind,
        name: &str,
        attached: bool,
        document: &str,
    ) -> Self {
        self.policies
            .entry((kind, name.to_string(), attached))
            .or_default()
            .push(document.to_string());
        self
    }

    pub fn with_failing_fetch(mut self, kind: PrincipalKind, name: &str, attached: bool) -> Self {
        self.failing.insert((kind, name.to_string(), attached));
        self
    }

    pub fn with_mfa_devices(mut self, serials: &[&str]) -> Self {
        self.mfa_devices = serials.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn session_token_calls(&self) -> usize {
        self.session_token_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Highest number of policy fetches observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn last_mfa(&self) -> Option<(Option<String>, Option<String>)> {
        self.last_mfa.lock().unwrap().clone()
    }

    pub fn last_assume(&self) -> Option<(String, String, String)> {
        self.last_assume.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn get_session_token(
        &self,
        mfa_serial: Option<&str>,
        mfa_code: Option<&str>,
    ) -> Result<SessionToken> {
        self.session_token_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_mfa.lock().unwrap() = Some((
            mfa_serial.map(str::to_string),
            mfa_code.map(str::to_string),
        ));

        match &self.issued {
            Some(token) => Ok(token.clone()),
            None => bail!("MultiFactorAuthentication failed with invalid MFA one time pass code"),
        }
    }

    async fn assume_role(
        &self,
        session: &SessionToken,
        role_arn: &str,
        session_name: &str,
    ) -> Result<SessionToken> {
        *self.last_assume.lock().unwrap() = Some((
            session.access_key_id.clone(),
            role_arn.to_string(),
            session_name.to_string(),
        ));

        Ok(SessionToken {
            access_key_id: "ASIAROLE".to_string(),
            secret_access_key: "role-secret".to_string(),
            session_token: "role-session".to_string(),
            expiration: session.expiration,
        })
    }

    async fn list_mfa_devices(&self) -> Result<Vec<String>> {
        Ok(self.mfa_devices.clone())
    }

    async fn fetch_policies(
        &self,
        kind: PrincipalKind,
        name: &str,
        attached: bool,
    ) -> Result<Vec<String>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let key = (kind, name.to_string(), attached);
        if self.failing.contains(&key) {
            bail!("AccessDenied listing policies of {:?} {}", kind, name);
        }
        Ok(self.policies.get(&key).cloned().unwrap_or_default())
    }

    async fn current_principal(&self) -> Result<Principal> {
        match &self.principal {
            Some(principal) => Ok(principal.clone()),
            None => bail!("no principal configured"),
        }
    }
}
