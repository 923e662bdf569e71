use aws_smithy_types::DateTime;

pub mod broker;
pub mod cache;
pub mod discovery;
pub mod policy;
pub mod provider;

#[cfg(test)]
pub(crate) mod testing;

/// AWS temporary credentials structure
///
/// Used both for the MFA-backed session token and for the assumed-role
/// credentials obtained with it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionToken {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    /// Absolute UTC instant
    pub expiration: DateTime,
}

impl From<&aws_sdk_sts::types::Credentials> for SessionToken {
    fn from(creds: &aws_sdk_sts::types::Credentials) -> Self {
        Self {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().to_string(),
            expiration: *creds.expiration(),
        }
    }
}

/// Kind of IAM principal whose policies are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalKind {
    User,
    Group,
}

/// The calling IAM user and the groups it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_name: String,
    pub arn: String,
    pub group_names: Vec<String>,
}

// Re-export commonly used types (functions should be accessed via module path)
pub use broker::{Clock, MfaPrompt, SessionTokenBroker, SystemClock, TerminalPrompt};
pub use cache::CredentialCache;
pub use discovery::RoleDiscoveryEngine;
pub use provider::{AwsIdentityProvider, IdentityProvider};
