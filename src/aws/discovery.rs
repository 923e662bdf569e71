//! Discovery of the roles a principal may assume.
//!
//! Every principal gets four kinds of policy fetch: inline and attached
//! policies of the user, and inline and attached policies of each of its
//! groups. The fetches are independent IAM round trips and run as tasks on a
//! bounded pool; their role ARNs are merged into one sorted, deduplicated list.

use anyhow::Context;
use std::{collections::BTreeSet, num::NonZeroUsize, sync::Arc, thread};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, info};

use super::{Principal, PrincipalKind, policy, provider::IdentityProvider};
use crate::error::{Error, Result};

/// One policy fetch: whose policies, and inline or attached
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fetch {
    kind: PrincipalKind,
    name: String,
    attached: bool,
}

fn fetch_plan(principal: &Principal) -> Vec<Fetch> {
    let user = [(PrincipalKind::User, &principal.user_name)];
    let groups = principal
        .group_names
        .iter()
        .map(|g| (PrincipalKind::Group, g));

    user.into_iter()
        .chain(groups)
        .flat_map(|(kind, name)| {
            [false, true].map(|attached| Fetch {
                kind,
                name: name.clone(),
                attached,
            })
        })
        .collect()
}

pub struct RoleDiscoveryEngine {
    provider: Arc<dyn IdentityProvider>,
    max_workers: usize,
}

impl RoleDiscoveryEngine {
    /// Engine with one worker per available CPU
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let max_workers = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            provider,
            max_workers,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Look up the calling user and discover its roles
    pub async fn discover_current(&self) -> Result<(Principal, Vec<String>)> {
        let principal = self
            .provider
            .current_principal()
            .await
            .map_err(Error::RoleDiscoveryFailed)?;
        let roles = self.discover(&principal).await?;
        Ok((principal, roles))
    }

    /// Sorted, deduplicated role ARNs `principal` may assume.
    ///
    /// The first failing fetch aborts the remaining ones and fails the whole
    /// discovery; partial results are never returned.
    pub async fn discover(&self, principal: &Principal) -> Result<Vec<String>> {
        let plan = fetch_plan(principal);
        info!(
            "Discovering roles for {} ({} policy fetches, {} workers)",
            principal.user_name,
            plan.len(),
            self.max_workers
        );

        let pool = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = JoinSet::new();
        for fetch in plan {
            let provider = self.provider.clone();
            let pool = pool.clone();
            tasks.spawn(async move {
                let _permit = pool.acquire_owned().await.context("Worker pool closed")?;
                fetch_roles(provider.as_ref(), &fetch).await
            });
        }

        let mut roles = BTreeSet::new();
        while let Some(joined) = tasks.join_next().await {
            let result = joined
                .context("Role discovery task panicked")
                .and_then(|r| r);

            match result {
                Ok(arns) => roles.extend(arns),
                Err(e) => {
                    tasks.abort_all();
                    return Err(Error::RoleDiscoveryFailed(e));
                }
            }
        }

        debug!("Discovered {} roles", roles.len());
        Ok(roles.into_iter().collect())
    }
}

async fn fetch_roles(
    provider: &dyn IdentityProvider,
    fetch: &Fetch,
) -> anyhow::Result<Vec<String>> {
    let scope = if fetch.attached { "attached" } else { "inline" };
    let documents = provider
        .fetch_policies(fetch.kind, &fetch.name, fetch.attached)
        .await
        .with_context(|| {
            format!(
                "Failed to fetch {scope} policies of {:?} {}",
                fetch.kind, fetch.name
            )
        })?;

    let mut roles = Vec::new();
    for document in &documents {
        let arns = policy::parse(document).with_context(|| {
            format!(
                "Failed to parse {scope} policy of {:?} {}",
                fetch.kind, fetch.name
            )
        })?;
        roles.extend(arns);
    }
    Ok(roles)
}
