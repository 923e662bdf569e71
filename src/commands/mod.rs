pub mod mfa;
pub mod roles;
pub mod run;

pub use mfa::ListMfaCommand;
pub use roles::ListRolesCommand;
pub use run::RunCommand;

use crate::{config, error::Error};

/// Profile whose long-term credentials answer IAM queries for `profile`.
///
/// A role profile defers to its `source_profile`; a profile absent from the
/// AWS config file (credentials-file only) is used as is.
pub(crate) fn base_profile(profile: &str) -> crate::error::Result<String> {
    match config::load(profile) {
        Ok(config) => Ok(config.source_profile),
        Err(Error::ProfileNotFound(_) | Error::Config { .. }) => Ok(profile.to_string()),
        Err(e) => Err(e),
    }
}
