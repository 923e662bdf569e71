use crate::{
    constants::{self, DEFAULT_PROFILE},
    error::{Error, Result},
};
use ini::{Ini, Properties};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Settings of one profile in the AWS config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileConfig {
    pub profile: String,
    /// Profile whose long-term keys request the session token
    pub source_profile: String,
    pub role_arn: Option<String>,
    pub mfa_serial: Option<String>,
}

impl ProfileConfig {
    fn from_ini_section(profile: &str, section: &Properties) -> Self {
        let get = |key| {
            section
                .get(key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            profile: profile.to_string(),
            source_profile: get("source_profile").unwrap_or_else(|| profile.to_string()),
            role_arn: get("role_arn"),
            mfa_serial: get("mfa_serial"),
        }
    }

    fn bare(profile: &str) -> Self {
        Self {
            profile: profile.to_string(),
            source_profile: profile.to_string(),
            role_arn: None,
            mfa_serial: None,
        }
    }

    /// The role to assume, required for running commands
    pub fn role_arn(&self) -> Result<&str> {
        self.role_arn
            .as_deref()
            .ok_or_else(|| Error::MissingRoleArn(self.profile.clone()))
    }
}

fn section_name(profile: &str) -> String {
    if profile == DEFAULT_PROFILE {
        profile.to_string()
    } else {
        format!("profile {profile}")
    }
}

/// Load `profile` from the AWS config file
pub fn load(profile: &str) -> Result<ProfileConfig> {
    let path = get_config_path()?;
    load_from(&path, profile)
}

/// The default profile may live in the credentials file alone, so a missing
/// config file or `[default]` section yields a profile without role or MFA.
/// Named profiles must have a section.
pub fn load_from(path: &Path, profile: &str) -> Result<ProfileConfig> {
    debug!("Reading AWS config file {}", path.display());

    let is_default = profile == DEFAULT_PROFILE;
    if is_default && !path.exists() {
        debug!("No AWS config file, using bare default profile");
        return Ok(ProfileConfig::bare(profile));
    }

    let ini = Ini::load_from_file(path).map_err(|e| Error::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let config = match ini.section(Some(section_name(profile))) {
        Some(section) => ProfileConfig::from_ini_section(profile, section),
        None if is_default => {
            debug!("No [default] section, using bare default profile");
            ProfileConfig::bare(profile)
        }
        None => return Err(Error::ProfileNotFound(profile.to_string())),
    };

    debug!("Profile config: {:?}", config);
    Ok(config)
}

fn get_config_path() -> Result<PathBuf> {
    constants::get_aws_config_path().ok_or_else(|| Error::Config {
        path: PathBuf::new(),
        reason: "Failed to determine AWS config path".to_string(),
    })
}
