use anyhow::Result;
use std::sync::Arc;

use super::base_profile;
use crate::aws::{AwsIdentityProvider, IdentityProvider, Principal, RoleDiscoveryEngine};

/// Print every role ARN the calling user may assume
#[derive(Debug, Clone, Default)]
pub struct ListRolesCommand;

impl ListRolesCommand {
    pub async fn execute(self, profile: &str) -> Result<()> {
        let provider: Arc<dyn IdentityProvider> =
            Arc::new(AwsIdentityProvider::new(base_profile(profile)?));
        let (principal, roles) = RoleDiscoveryEngine::new(provider)
            .discover_current()
            .await?;

        print!("{}", render(&principal, &roles));
        Ok(())
    }
}

fn render(principal: &Principal, roles: &[String]) -> String {
    let mut out = format!(
        "Available role ARNs for {} ({})\n",
        principal.user_name, principal.arn
    );
    for role in roles {
        out.push_str(&format!("  {role}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let principal = Principal {
            user_name: "alice".to_string(),
            arn: "arn:aws:iam::123456789012:user/alice".to_string(),
            group_names: vec![],
        };
        let roles = vec![
            "arn:aws:iam::123456789012:role/A".to_string(),
            "arn:aws:iam::123456789012:role/B".to_string(),
        ];

        assert_eq!(
            render(&principal, &roles),
            "Available role ARNs for alice (arn:aws:iam::123456789012:user/alice)\n\
             \x20 arn:aws:iam::123456789012:role/A\n\
             \x20 arn:aws:iam::123456789012:role/B\n"
        );
    }

    #[test]
    fn test_render_without_roles() {
        let principal = Principal {
            user_name: "bob".to_string(),
            arn: "arn:aws:iam::123456789012:user/bob".to_string(),
            group_names: vec!["ops".to_string()],
        };
        assert_eq!(
            render(&principal, &[]),
            "Available role ARNs for bob (arn:aws:iam::123456789012:user/bob)\n"
        );
    }
}
