use std::{env, path::PathBuf};

use dirs;

/// AWS configuration directory name
pub const AWS_CONFIG_DIR_NAME: &str = ".aws";

/// AWS configuration file name
pub const AWS_CONFIG_FILE_NAME: &str = "config";

/// Name of the profile used when none is given
pub const DEFAULT_PROFILE: &str = "default";

/// File name prefix of cached session tokens (one file per profile)
pub const CACHE_FILE_PREFIX: &str = ".aws_session_token_";

/// Environment variable overriding the session token cache directory
pub const CACHE_DIR_ENV: &str = "AWS_RUNAS_CACHE_DIR";

/// Prefix of the role session name passed to AssumeRole
pub const ROLE_SESSION_NAME_PREFIX: &str = "AWS-RUNAS";

/// Default AWS region for STS/IAM operations when no region is configured
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Policy action granting role assumption
pub const ASSUME_ROLE_ACTION: &str = "sts:AssumeRole";

/// Credential variables exported for the assumed role.
/// `AWS_SECURITY_TOKEN` duplicates the session token for older SDKs.
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const ENV_SECURITY_TOKEN: &str = "AWS_SECURITY_TOKEN";

/// Get the AWS config file path
/// Respects AWS_CONFIG_FILE environment variable if set
pub fn get_aws_config_path() -> Option<PathBuf> {
    // Check environment variable first
    if let Ok(path) = env::var("AWS_CONFIG_FILE") {
        return Some(PathBuf::from(path));
    }

    // Use default AWS config location
    dirs::home_dir().map(|home| home.join(AWS_CONFIG_DIR_NAME).join(AWS_CONFIG_FILE_NAME))
}

/// Get the session token cache directory
/// Respects AWS_RUNAS_CACHE_DIR environment variable if set
pub fn cache_dir() -> Option<PathBuf> {
    if let Ok(path) = env::var(CACHE_DIR_ENV) {
        return Some(PathBuf::from(path));
    }

    dirs::home_dir().map(|home| home.join(AWS_CONFIG_DIR_NAME))
}

/// Resolve the profile to use: explicit argument, then AWS_PROFILE,
/// then AWS_DEFAULT_PROFILE, then `default`
pub fn resolve_profile(profile: Option<&str>) -> String {
    profile
        .map(str::to_string)
        .or_else(|| env::var("AWS_PROFILE").ok())
        .or_else(|| env::var("AWS_DEFAULT_PROFILE").ok())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_env<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
        let originals: Vec<(String, Option<String>)> = vars
            .iter()
            .map(|(k, _)| (k.to_string(), env::var(k).ok()))
            .collect();

        unsafe {
            for (k, v) in vars {
                match v {
                    Some(v) => env::set_var(k, v),
                    None => env::remove_var(k),
                }
            }
        }

        f();

        unsafe {
            for (k, v) in originals {
                match v {
                    Some(v) => env::set_var(&k, v),
                    None => env::remove_var(&k),
                }
            }
        }
    }

    #[test]
    #[serial]
    fn test_get_aws_config_path_with_env() {
        with_env(&[("AWS_CONFIG_FILE", Some("/custom/aws/config"))], || {
            assert_eq!(
                get_aws_config_path(),
                Some(PathBuf::from("/custom/aws/config"))
            );
        });
    }

    #[test]
    #[serial]
    fn test_get_aws_config_path_default() {
        with_env(&[("AWS_CONFIG_FILE", None)], || {
            if let Some(p) = get_aws_config_path() {
                let path_str = p.to_string_lossy();
                assert!(path_str.contains(AWS_CONFIG_DIR_NAME));
                assert!(path_str.contains(AWS_CONFIG_FILE_NAME));
            }
        });
    }

    #[test]
    #[serial]
    fn test_cache_dir_with_env() {
        with_env(&[(CACHE_DIR_ENV, Some("/tmp/runas-cache"))], || {
            assert_eq!(cache_dir(), Some(PathBuf::from("/tmp/runas-cache")));
        });
    }

    #[test]
    #[serial]
    fn test_cache_dir_default() {
        with_env(&[(CACHE_DIR_ENV, None)], || {
            if let Some(p) = cache_dir() {
                assert!(p.ends_with(AWS_CONFIG_DIR_NAME));
            }
        });
    }

    #[test]
    #[serial]
    fn test_resolve_profile_explicit_wins() {
        with_env(
            &[("AWS_PROFILE", Some("env")), ("AWS_DEFAULT_PROFILE", Some("dflt"))],
            || assert_eq!(resolve_profile(Some("dev")), "dev"),
        );
    }

    #[test]
    #[serial]
    fn test_resolve_profile_from_env() {
        with_env(
            &[("AWS_PROFILE", Some("env")), ("AWS_DEFAULT_PROFILE", Some("dflt"))],
            || assert_eq!(resolve_profile(None), "env"),
        );
        with_env(
            &[("AWS_PROFILE", None), ("AWS_DEFAULT_PROFILE", Some("dflt"))],
            || assert_eq!(resolve_profile(None), "dflt"),
        );
    }

    #[test]
    #[serial]
    fn test_resolve_profile_default() {
        with_env(
            &[("AWS_PROFILE", None), ("AWS_DEFAULT_PROFILE", None)],
            || assert_eq!(resolve_profile(None), DEFAULT_PROFILE),
        );
    }
}
