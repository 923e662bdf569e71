use anyhow::Result;
use tracing::info;

use super::base_profile;
use crate::aws::{AwsIdentityProvider, IdentityProvider};

/// Print the serial numbers of the user's MFA devices
#[derive(Debug, Clone, Default)]
pub struct ListMfaCommand;

impl ListMfaCommand {
    pub async fn execute(self, profile: &str) -> Result<()> {
        let provider = AwsIdentityProvider::new(base_profile(profile)?);
        for serial in Self::serials(&provider).await? {
            println!("{serial}");
        }
        Ok(())
    }

    pub async fn serials(provider: &dyn IdentityProvider) -> Result<Vec<String>> {
        let serials = provider.list_mfa_devices().await?;
        info!("Found {} MFA devices", serials.len());
        Ok(serials)
    }
}
