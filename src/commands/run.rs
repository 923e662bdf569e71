use anyhow::{Context, Result, bail};
use aws_smithy_types::DateTime;
use std::{env, process::Command, sync::Arc};
use tracing::{debug, info};

use crate::{
    aws::{
        AwsIdentityProvider, Clock, CredentialCache, IdentityProvider, SessionToken,
        SessionTokenBroker, SystemClock, TerminalPrompt,
    },
    config::{self, ProfileConfig},
    constants::{
        ENV_ACCESS_KEY_ID, ENV_SECRET_ACCESS_KEY, ENV_SECURITY_TOKEN, ENV_SESSION_TOKEN,
        ROLE_SESSION_NAME_PREFIX,
    },
    error::Error,
};

/// Assume the profile's role and export or exec with its credentials
#[derive(Debug, Clone, Default)]
pub struct RunCommand {
    pub refresh: bool,
    pub session: bool,
    pub expiration: bool,
    pub cmd: Vec<String>,
}

/// What a run resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// `--session`: the session token itself
    Session(SessionToken),
    /// `--expiration`: the session token whose lifetime is reported
    Expiration(SessionToken),
    /// Assumed-role credentials
    Role(SessionToken),
}

impl RunCommand {
    pub async fn execute(self, profile: &str) -> Result<()> {
        info!("Starting credential lookup for profile: {}", profile);

        let config = config::load(profile)?;
        let provider: Arc<dyn IdentityProvider> =
            Arc::new(AwsIdentityProvider::new(&config.source_profile));
        let broker =
            SessionTokenBroker::new(provider.clone(), CredentialCache::from_env()?, TerminalPrompt)
                .force_refresh(self.refresh);

        match self.resolve(&config, provider.as_ref(), &broker).await? {
            Outcome::Session(token) => print!("{}", export_lines(&token)),
            Outcome::Expiration(token) => {
                println!("{}", describe_expiration(&token, SystemClock.now()))
            }
            Outcome::Role(creds) if self.cmd.is_empty() => {
                debug!("No command given, printing eval()-able role credentials");
                print!("{}", export_lines(&creds));
            }
            Outcome::Role(creds) => {
                debug!("Running command with assumed role: {:?}", self.cmd);
                exec(&self.cmd, &creds)?;
            }
        }

        Ok(())
    }

    /// Obtain the session token and, unless only session details were
    /// asked for, exchange it for the profile's role.
    pub async fn resolve(
        &self,
        config: &ProfileConfig,
        provider: &dyn IdentityProvider,
        broker: &SessionTokenBroker,
    ) -> Result<Outcome> {
        let session = broker
            .get_credentials(&config.source_profile, config.mfa_serial.as_deref())
            .await?;

        if self.session {
            return Ok(Outcome::Session(session));
        }
        if self.expiration {
            return Ok(Outcome::Expiration(session));
        }

        let role_arn = config.role_arn()?;
        info!("Assuming role: {}", role_arn);

        let session_name = role_session_name(
            &env::var("USER").unwrap_or_else(|_| "__".to_string()),
            SystemClock.now(),
        );
        let creds = provider
            .assume_role(&session, role_arn, &session_name)
            .await
            .map_err(Error::AuthenticationFailed)?;

        Ok(Outcome::Role(creds))
    }
}

/// Credential environment for `creds`, in export order
pub fn credential_env(creds: &SessionToken) -> [(&'static str, &str); 4] {
    [
        (ENV_ACCESS_KEY_ID, creds.access_key_id.as_str()),
        (ENV_SECRET_ACCESS_KEY, creds.secret_access_key.as_str()),
        (ENV_SESSION_TOKEN, creds.session_token.as_str()),
        (ENV_SECURITY_TOKEN, creds.session_token.as_str()),
    ]
}

/// Shell-evaluable assignments of the credential environment
pub fn export_lines(creds: &SessionToken) -> String {
    let keyword = if cfg!(windows) { "set" } else { "export" };

    credential_env(creds)
        .iter()
        .map(|(key, value)| format!("{keyword} {key}={value}\n"))
        .collect()
}

/// `AWS-RUNAS-<user>-<unix seconds>`, restricted to what STS accepts
pub fn role_session_name(user: &str, now: DateTime) -> String {
    let user: String = user
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "+=,.@_-".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut name = format!("{ROLE_SESSION_NAME_PREFIX}-{user}-{}", now.secs());
    name.truncate(64);
    name
}

pub fn describe_expiration(token: &SessionToken, now: DateTime) -> String {
    let expires = chrono::DateTime::from_timestamp(token.expiration.secs(), 0)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%c").to_string())
        .unwrap_or_else(|| token.expiration.secs().to_string());

    let remaining = token.expiration.secs() - now.secs();
    if remaining <= 0 {
        return format!("Session credentials expired on {expires}");
    }

    let hours = remaining / 3600;
    let minutes = (remaining % 3600) / 60;
    format!("Session credentials will expire on {expires} ({hours} hours, {minutes} minutes)")
}

/// Replace the current process with `cmd`, credentials in its environment
#[cfg(unix)]
fn exec(cmd: &[String], creds: &SessionToken) -> Result<()> {
    use std::os::unix::process::CommandExt;

    let Some((program, args)) = cmd.split_first() else {
        bail!("No command given");
    };

    let err = Command::new(program)
        .args(args)
        .envs(credential_env(creds))
        .exec();
    Err(err).with_context(|| format!("Failed to execute {program}"))
}

/// Run `cmd` to completion and exit with its status
#[cfg(not(unix))]
fn exec(cmd: &[String], creds: &SessionToken) -> Result<()> {
    let Some((program, args)) = cmd.split_first() else {
        bail!("No command given");
    };

    let status = Command::new(program)
        .args(args)
        .envs(credential_env(creds))
        .status()
        .with_context(|| format!("Failed to execute {program}"))?;
    std::process::exit(status.code().unwrap_or(1));
}
