use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_iam::Client as IamClient;
use aws_sdk_sts::{Client as StsClient, config::Credentials as StsCredentials};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{Principal, PrincipalKind, SessionToken};
use crate::constants::DEFAULT_AWS_REGION;

/// STS and IAM operations needed by the broker and role discovery.
///
/// Implementations are bound to one AWS profile; the base credentials of
/// that profile are used for every call except [`assume_role`](Self::assume_role),
/// which authenticates with the session token it is given.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Issue a session token, MFA-backed when `mfa_serial` is set
    async fn get_session_token(
        &self,
        mfa_serial: Option<&str>,
        mfa_code: Option<&str>,
    ) -> Result<SessionToken>;

    /// Exchange a session token for credentials of `role_arn`
    async fn assume_role(
        &self,
        session: &SessionToken,
        role_arn: &str,
        session_name: &str,
    ) -> Result<SessionToken>;

    /// Serial numbers of the MFA devices of the calling user
    async fn list_mfa_devices(&self) -> Result<Vec<String>>;

    /// Raw JSON policy documents of a user or group, inline or attached
    async fn fetch_policies(
        &self,
        kind: PrincipalKind,
        name: &str,
        attached: bool,
    ) -> Result<Vec<String>>;

    /// The IAM user behind the profile credentials and its groups
    async fn current_principal(&self) -> Result<Principal>;
}

/// [`IdentityProvider`] backed by the AWS SDK
#[derive(Debug)]
pub struct AwsIdentityProvider {
    profile: String,
    config: OnceCell<SdkConfig>,
}

impl AwsIdentityProvider {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            config: OnceCell::new(),
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Load AWS config with automatic region fallback
    // Priority: ENV vars -> Config file -> EC2 metadata -> DEFAULT_AWS_REGION
    async fn sdk_config(&self) -> &SdkConfig {
        self.config
            .get_or_init(|| async {
                let loaded = aws_config::defaults(BehaviorVersion::latest())
                    .profile_name(&self.profile)
                    .load()
                    .await;

                match loaded.region() {
                    Some(region) => {
                        debug!("Using region: {}", region);
                        loaded
                    }
                    None => {
                        debug!(
                            "No region configured, using default {}",
                            DEFAULT_AWS_REGION
                        );
                        aws_config::defaults(BehaviorVersion::latest())
                            .profile_name(&self.profile)
                            .region(Region::new(DEFAULT_AWS_REGION))
                            .load()
                            .await
                    }
                }
            })
            .await
    }

    async fn sts(&self) -> StsClient {
        StsClient::new(self.sdk_config().await)
    }

    async fn iam(&self) -> IamClient {
        IamClient::new(self.sdk_config().await)
    }

    async fn inline_policies(
        &self,
        iam: &IamClient,
        kind: PrincipalKind,
        name: &str,
    ) -> Result<Vec<String>> {
        let policy_names: Vec<String> = match kind {
            PrincipalKind::User => iam
                .list_user_policies()
                .user_name(name)
                .into_paginator()
                .items()
                .send()
                .try_collect()
                .await
                .with_context(|| format!("Failed to list inline policies of user {name}"))?,
            PrincipalKind::Group => iam
                .list_group_policies()
                .group_name(name)
                .into_paginator()
                .items()
                .send()
                .try_collect()
                .await
                .with_context(|| format!("Failed to list inline policies of group {name}"))?,
        };

        let mut documents = Vec::with_capacity(policy_names.len());
        for policy_name in &policy_names {
            debug!("Fetching inline policy {} of {:?} {}", policy_name, kind, name);
            let document = match kind {
                PrincipalKind::User => iam
                    .get_user_policy()
                    .user_name(name)
                    .policy_name(policy_name)
                    .send()
                    .await
                    .with_context(|| format!("Failed to get user policy {policy_name}"))?
                    .policy_document()
                    .to_string(),
                PrincipalKind::Group => iam
                    .get_group_policy()
                    .group_name(name)
                    .policy_name(policy_name)
                    .send()
                    .await
                    .with_context(|| format!("Failed to get group policy {policy_name}"))?
                    .policy_document()
                    .to_string(),
            };
            documents.push(decode_document(&document)?);
        }

        Ok(documents)
    }

    async fn attached_policies(
        &self,
        iam: &IamClient,
        kind: PrincipalKind,
        name: &str,
    ) -> Result<Vec<String>> {
        let attached = match kind {
            PrincipalKind::User => iam
                .list_attached_user_policies()
                .user_name(name)
                .into_paginator()
                .items()
                .send()
                .try_collect()
                .await
                .with_context(|| format!("Failed to list attached policies of user {name}"))?,
            PrincipalKind::Group => iam
                .list_attached_group_policies()
                .group_name(name)
                .into_paginator()
                .items()
                .send()
                .try_collect()
                .await
                .with_context(|| format!("Failed to list attached policies of group {name}"))?,
        };

        let mut documents = Vec::with_capacity(attached.len());
        for policy in &attached {
            let Some(policy_arn) = policy.policy_arn() else {
                continue;
            };
            debug!("Fetching attached policy {} of {:?} {}", policy_arn, kind, name);

            let response = iam
                .get_policy()
                .policy_arn(policy_arn)
                .send()
                .await
                .with_context(|| format!("Failed to get policy {policy_arn}"))?;
            let version_id = response
                .policy()
                .and_then(|p| p.default_version_id())
                .with_context(|| format!("Policy {policy_arn} has no default version"))?;

            let version = iam
                .get_policy_version()
                .policy_arn(policy_arn)
                .version_id(version_id)
                .send()
                .await
                .with_context(|| {
                    format!("Failed to get version {version_id} of policy {policy_arn}")
                })?;
            let document = version
                .policy_version()
                .and_then(|v| v.document())
                .with_context(|| format!("Policy {policy_arn} returned no document"))?;

            documents.push(decode_document(document)?);
        }

        Ok(documents)
    }
}

#[async_trait]
impl IdentityProvider for AwsIdentityProvider {
    async fn get_session_token(
        &self,
        mfa_serial: Option<&str>,
        mfa_code: Option<&str>,
    ) -> Result<SessionToken> {
        info!("Calling AWS STS GetSessionToken");
        debug!("Profile: {}", self.profile);
        debug!("MFA serial: {:?}", mfa_serial);

        let response = self
            .sts()
            .await
            .get_session_token()
            .set_serial_number(mfa_serial.map(str::to_string))
            .set_token_code(mfa_code.map(str::to_string))
            .send()
            .await
            .context("Failed to get session token")?;

        let sts_creds = response
            .credentials()
            .context("AWS STS returned no credentials")?;

        info!("Successfully obtained session token");
        Ok(SessionToken::from(sts_creds))
    }

    async fn assume_role(
        &self,
        session: &SessionToken,
        role_arn: &str,
        session_name: &str,
    ) -> Result<SessionToken> {
        info!("Calling AWS STS AssumeRole");
        debug!("Role ARN: {}", role_arn);
        debug!("Session name: {}", session_name);

        let creds = StsCredentials::new(
            &session.access_key_id,
            &session.secret_access_key,
            Some(session.session_token.clone()),
            None,
            "aws-runas-session-token",
        );
        let config = aws_sdk_sts::config::Builder::from(self.sdk_config().await)
            .credentials_provider(creds)
            .build();
        let client = StsClient::from_conf(config);

        let response = client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .send()
            .await
            .with_context(|| format!("Failed to assume role {role_arn}"))?;

        let sts_creds = response
            .credentials()
            .context("AWS STS returned no credentials")?;

        info!("Successfully obtained AWS credentials");
        Ok(SessionToken::from(sts_creds))
    }

    async fn list_mfa_devices(&self) -> Result<Vec<String>> {
        info!("Calling AWS IAM ListMFADevices");

        let devices: Vec<_> = self
            .iam()
            .await
            .list_mfa_devices()
            .into_paginator()
            .items()
            .send()
            .try_collect()
            .await
            .context("Failed to list MFA devices")?;

        Ok(devices
            .iter()
            .map(|d| d.serial_number().to_string())
            .collect())
    }

    async fn fetch_policies(
        &self,
        kind: PrincipalKind,
        name: &str,
        attached: bool,
    ) -> Result<Vec<String>> {
        let iam = self.iam().await;
        if attached {
            self.attached_policies(&iam, kind, name).await
        } else {
            self.inline_policies(&iam, kind, name).await
        }
    }

    async fn current_principal(&self) -> Result<Principal> {
        info!("Calling AWS IAM GetUser");
        let iam = self.iam().await;

        let response = iam
            .get_user()
            .send()
            .await
            .context("Failed to get current IAM user")?;
        let user = response.user().context("AWS IAM returned no user")?;
        let user_name = user.user_name().to_string();

        let groups: Vec<_> = iam
            .list_groups_for_user()
            .user_name(&user_name)
            .into_paginator()
            .items()
            .send()
            .try_collect()
            .await
            .with_context(|| format!("Failed to list groups of user {user_name}"))?;

        Ok(Principal {
            arn: user.arn().to_string(),
            group_names: groups.iter().map(|g| g.group_name().to_string()).collect(),
            user_name,
        })
    }
}

/// IAM returns policy documents URL-encoded
fn decode_document(document: &str) -> Result<String> {
    urlencoding::decode(document)
        .map(|d| d.into_owned())
        .context("Failed to URL-decode policy document")
}
